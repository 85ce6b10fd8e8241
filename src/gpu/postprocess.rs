//! Glow cascade and final composite.
//!
//! The phosphor image is turned into two blurred copies before tone mapping:
//! 1. Downsample the visible part of the accumulation surface to 256² and
//!    blur it horizontally then vertically (tight glow)
//! 2. Downsample the tight glow to 32² and blur it along two skewed
//!    diagonals (wide scatter)
//! 3. Composite beam, tight glow, wide scatter and overlay into the display

use wgpu::{Buffer, CommandEncoder, Device, Queue, TextureView};

use super::mipmap::{create_blit_uniforms, BlitUniforms};
use super::programs::ShaderPrograms;
use super::textures::RenderTarget;
use crate::settings::ConfigSnapshot;

/// Edge length of the tight glow surfaces.
pub const TIGHT_GLOW_SIZE: u32 = 256;

/// Edge length of the wide scatter surfaces.
pub const WIDE_GLOW_SIZE: u32 = 32;

/// Uniform data for one blur pass.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct BlurUniforms {
    offset: [f32; 2],
    _padding: [f32; 2],
}

/// Uniform data for the composite pass.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct CompositeUniforms {
    colour: [f32; 3],
    exposure: f32,
    saturation: f32,
    resize_for_canvas: f32,
    ambient: f32,
    _padding: f32,
}

/// Tone-mapping parameters for one presented frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeParams {
    pub exposure: f32,
    pub saturation: f32,
    /// Beam tint.
    pub colour: [f32; 3],
    /// Ambient light reflected by the screen overlay.
    pub ambient: f32,
}

impl CompositeParams {
    pub fn from_snapshot(snapshot: &ConfigSnapshot) -> Self {
        Self {
            exposure: snapshot.exposure(),
            saturation: snapshot.saturation,
            colour: snapshot.colour(),
            ambient: snapshot.ambient,
        }
    }
}

impl Default for CompositeParams {
    fn default() -> Self {
        Self::from_snapshot(&ConfigSnapshot::default())
    }
}

/// Square viewport of `min(width, height)` centred in the output.
pub fn centred_viewport(width: u32, height: u32) -> (f32, f32, f32) {
    let side = width.min(height);
    let x = (width - side) / 2;
    let y = (height - side) / 2;
    (x as f32, y as f32, side as f32)
}

/// Blur offsets for the four glow passes, in texture coordinates.
fn blur_offsets() -> [[f32; 2]; 4] {
    let tight = 1.0 / TIGHT_GLOW_SIZE as f32;
    let wide = 1.0 / WIDE_GLOW_SIZE as f32;
    [
        [tight, 0.0],
        [0.0, tight],
        [wide, 1.0 / 60.0],
        [-1.0 / 60.0, wide],
    ]
}

/// The four glow surfaces and their per-pass uniforms.
pub struct BloomCascade {
    tight_a: RenderTarget,
    tight_b: RenderTarget,
    wide_a: RenderTarget,
    wide_b: RenderTarget,

    // One buffer per pass so every pass in a submission sees its own values.
    downsample_uniforms: Buffer,
    scatter_uniforms: Buffer,
    blur_uniforms: [Buffer; 4],
    composite_uniforms: Buffer,
}

impl BloomCascade {
    pub fn new(device: &Device, queue: &Queue) -> Self {
        let blur_uniforms = [
            "blur_uniforms_h",
            "blur_uniforms_v",
            "blur_uniforms_d1",
            "blur_uniforms_d2",
        ]
        .map(|label| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: std::mem::size_of::<BlurUniforms>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });
        for (buffer, offset) in blur_uniforms.iter().zip(blur_offsets()) {
            let uniforms = BlurUniforms {
                offset,
                _padding: [0.0; 2],
            };
            queue.write_buffer(buffer, 0, bytemuck::bytes_of(&uniforms));
        }

        let scatter_uniforms = create_blit_uniforms(device, "scatter_blit_uniforms");
        queue.write_buffer(&scatter_uniforms, 0, bytemuck::bytes_of(&BlitUniforms::new(1.0)));

        let composite_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("composite_uniforms"),
            size: std::mem::size_of::<CompositeUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            tight_a: RenderTarget::for_glow(device, "tight_glow_a", TIGHT_GLOW_SIZE),
            tight_b: RenderTarget::for_glow(device, "tight_glow_b", TIGHT_GLOW_SIZE),
            wide_a: RenderTarget::for_glow(device, "wide_glow_a", WIDE_GLOW_SIZE),
            wide_b: RenderTarget::for_glow(device, "wide_glow_b", WIDE_GLOW_SIZE),
            downsample_uniforms: create_blit_uniforms(device, "downsample_blit_uniforms"),
            scatter_uniforms,
            blur_uniforms,
            composite_uniforms,
        }
    }

    /// Record the glow passes and the composite into `output`.
    ///
    /// `resize_for_canvas` is the fraction of the accumulation surface in
    /// use; `viewport` is `(x, y, side)` of the square drawn into `output`.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        programs: &ShaderPrograms,
        composite: &wgpu::RenderPipeline,
        accumulation: &RenderTarget,
        overlay: &TextureView,
        resize_for_canvas: f32,
        params: &CompositeParams,
        output: &TextureView,
        viewport: (f32, f32, f32),
    ) {
        queue.write_buffer(
            &self.downsample_uniforms,
            0,
            bytemuck::bytes_of(&BlitUniforms::new(resize_for_canvas)),
        );
        let uniforms = CompositeUniforms {
            colour: params.colour,
            exposure: params.exposure,
            saturation: params.saturation,
            resize_for_canvas,
            ambient: params.ambient,
            _padding: 0.0,
        };
        queue.write_buffer(&self.composite_uniforms, 0, bytemuck::bytes_of(&uniforms));

        let passes = [
            // Tight glow
            (&programs.blit, &self.downsample_uniforms, accumulation.view(), &self.tight_a),
            (&programs.blur, &self.blur_uniforms[0], self.tight_a.view(), &self.tight_b),
            (&programs.blur, &self.blur_uniforms[1], self.tight_b.view(), &self.tight_a),
            // Wide scatter
            (&programs.blit, &self.scatter_uniforms, self.tight_a.view(), &self.wide_a),
            (&programs.blur, &self.blur_uniforms[2], self.wide_a.view(), &self.wide_b),
            (&programs.blur, &self.blur_uniforms[3], self.wide_b.view(), &self.wide_a),
        ];
        for (pipeline, uniforms, input, target) in passes {
            self.sampled_pass(device, encoder, programs, pipeline, uniforms, input, target.view());
        }

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("composite_bind_group"),
            layout: &programs.composite_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.composite_uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(accumulation.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(self.tight_a.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(self.wide_a.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(overlay),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(&programs.sampler),
                },
            ],
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("composite_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        let (x, y, side) = viewport;
        pass.set_viewport(x, y, side, side, 0.0, 1.0);
        pass.set_pipeline(composite);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
    }

    /// Run one fullscreen pass sampling `input` into `output`.
    #[allow(clippy::too_many_arguments)]
    fn sampled_pass(
        &self,
        device: &Device,
        encoder: &mut CommandEncoder,
        programs: &ShaderPrograms,
        pipeline: &wgpu::RenderPipeline,
        uniforms: &Buffer,
        input: &TextureView,
        output: &TextureView,
    ) {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("glow_bind_group"),
            layout: &programs.sampled_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(input),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&programs.sampler),
                },
            ],
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("glow_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
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

        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_sizes() {
        assert_eq!(std::mem::size_of::<BlurUniforms>(), 16);
        assert_eq!(std::mem::size_of::<CompositeUniforms>(), 32);
    }

    #[test]
    fn test_params_from_snapshot() {
        let snapshot = ConfigSnapshot {
            brightness: 2.0,
            saturation: 0.25,
            ..Default::default()
        };
        let params = CompositeParams::from_snapshot(&snapshot);
        assert_eq!(params.exposure, 1.0);
        assert_eq!(params.saturation, 0.25);
        assert_eq!(params.colour, snapshot.colour());
        assert_eq!(params.ambient, 0.0);
    }

    #[test]
    fn test_centred_viewport() {
        assert_eq!(centred_viewport(512, 512), (0.0, 0.0, 512.0));
        assert_eq!(centred_viewport(800, 600), (100.0, 0.0, 600.0));
        assert_eq!(centred_viewport(300, 500), (0.0, 100.0, 300.0));
    }

    #[test]
    fn test_wide_blur_is_skewed() {
        let offsets = blur_offsets();
        assert_eq!(offsets[0][1], 0.0);
        assert_eq!(offsets[1][0], 0.0);
        assert!(offsets[2][0] > 0.0 && offsets[2][1] > 0.0);
        assert!(offsets[3][0] < 0.0 && offsets[3][1] > 0.0);
    }
}
