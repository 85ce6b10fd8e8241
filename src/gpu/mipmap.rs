//! Mip chain regeneration for the accumulation surface.
//!
//! Each level is a linear-filtered blit of the level above it.

use wgpu::{BindGroup, Buffer, CommandEncoder, Device, Queue};

use super::programs::ShaderPrograms;
use super::textures::RenderTarget;

/// Uniform data for the textured blit.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct BlitUniforms {
    pub uv_scale: f32,
    pub _padding: [f32; 3],
}

impl BlitUniforms {
    pub fn new(uv_scale: f32) -> Self {
        Self {
            uv_scale,
            _padding: [0.0; 3],
        }
    }
}

pub(crate) fn create_blit_uniforms(device: &Device, label: &'static str) -> Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: std::mem::size_of::<BlitUniforms>() as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Bind groups reading level `i - 1` for every level `i > 0` of one target.
///
/// Tied to a specific allocation; rebuild it whenever the target is reallocated.
pub struct MipChain {
    bind_groups: Vec<BindGroup>,
}

impl MipChain {
    pub fn new(device: &Device, queue: &Queue, programs: &ShaderPrograms, target: &RenderTarget) -> Self {
        let uniforms = create_blit_uniforms(device, "mip_blit_uniforms");
        queue.write_buffer(&uniforms, 0, bytemuck::bytes_of(&BlitUniforms::new(1.0)));

        let bind_groups = (1..target.mip_levels())
            .map(|level| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("mip_bind_group"),
                    layout: &programs.sampled_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: uniforms.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(target.mip_view(level - 1)),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::Sampler(&programs.sampler),
                        },
                    ],
                })
            })
            .collect();

        Self { bind_groups }
    }

    /// Record one blit pass per level below the base.
    pub fn record(&self, encoder: &mut CommandEncoder, programs: &ShaderPrograms, target: &RenderTarget) {
        for (i, bind_group) in self.bind_groups.iter().enumerate() {
            let level = i as u32 + 1;
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("mip_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target.mip_view(level),
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            pass.set_pipeline(&programs.blit);
            pass.set_bind_group(0, bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
    }
}
