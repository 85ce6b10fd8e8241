//! The screen overlay: smudge texture plus graticule.
//!
//! The overlay is a 512² 8-bit texture sampled by the composite pass. Its
//! green channel carries the smudge/noise pattern that modulates the glow;
//! the red channel additionally carries the graticule when enabled.

use image::{imageops, Rgba, RgbaImage};
use wgpu::{BindGroup, Buffer, Device, Queue};

use super::programs::ShaderPrograms;
use super::textures::RenderTarget;
use crate::audio::generate_white_noise;
use crate::settings::OverlaySelection;

/// Edge length of the overlay texture.
pub const OVERLAY_SIZE: u32 = 512;

/// Placeholder grey used when no smudge image is shown.
pub const NEUTRAL_GREY: Rgba<u8> = Rgba([128, 128, 128, 255]);

/// Colour written by the graticule (only its red component lands).
const GRATICULE_COLOUR: [f32; 4] = [0.01, 0.1, 0.01, 1.0];

const NOISE_SEED: u64 = 0x05ee_d5c0;

const GRID_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

/// Vertex layout of [`graticule_segments`] points.
pub const GRID_VERTEX_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: 8,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &GRID_ATTRIBUTES,
};

/// Graticule line segments as `[x0, y0, x1, y1]` in clip space.
///
/// Ten divisions of 45 units each, with five minor ticks per division, long
/// ticks on the centre axes and short marks on the 2.5 and 7.5 rows. Grid
/// units map to clip space with a 31-unit margin on a 512-unit screen.
pub fn graticule_segments() -> Vec<[f32; 4]> {
    const STEP: f32 = 45.0;
    let mut grid: Vec<[f32; 4]> = Vec::with_capacity(1020);

    for i in 0..=10 {
        let s = i as f32 * STEP;
        grid.push([0.0, s, 10.0 * STEP, s]);
        grid.push([s, 0.0, s, 10.0 * STEP]);
        if i == 0 || i == 10 {
            continue;
        }
        // Centre axes get longer ticks.
        let (below, above) = if i == 5 { (5.0, 4.0) } else { (2.0, 1.0) };
        for j in 0..=50 {
            let t = j as f32 * STEP / 5.0;
            grid.push([t, s - below, t, s + above]);
            grid.push([s - below, t, s + above, t]);
        }
    }

    for j in 0..=50 {
        if j % 5 == 0 {
            continue;
        }
        let t = j as f32 * STEP / 5.0;
        grid.push([t - 2.0, 2.5 * STEP, t + 2.0, 2.5 * STEP]);
        grid.push([t - 2.0, 7.5 * STEP, t + 2.0, 7.5 * STEP]);
    }

    let to_clip = |v: f32| (v + 31.0) / 256.0 - 1.0;
    grid.into_iter().map(|segment| segment.map(to_clip)).collect()
}

/// Soft procedural smudge pattern used when the host supplies no image.
pub fn noise_image(seed: u64) -> RgbaImage {
    let noise = generate_white_noise((OVERLAY_SIZE * OVERLAY_SIZE) as usize, 1.0, seed);
    let raw = RgbaImage::from_fn(OVERLAY_SIZE, OVERLAY_SIZE, |x, y| {
        let n = noise[(y * OVERLAY_SIZE + x) as usize];
        let v = (128.0 + 96.0 * n).clamp(0.0, 255.0) as u8;
        Rgba([v, v, v, 255])
    });
    imageops::blur(&raw, 2.0)
}

/// Base image of the overlay before the graticule is drawn.
pub fn base_image(smudges: bool, smudge: Option<&RgbaImage>) -> RgbaImage {
    if !smudges {
        return RgbaImage::from_pixel(OVERLAY_SIZE, OVERLAY_SIZE, NEUTRAL_GREY);
    }
    match smudge {
        Some(img) if img.dimensions() == (OVERLAY_SIZE, OVERLAY_SIZE) => img.clone(),
        Some(img) => imageops::resize(
            img,
            OVERLAY_SIZE,
            OVERLAY_SIZE,
            imageops::FilterType::Triangle,
        ),
        None => noise_image(NOISE_SEED),
    }
}

/// Overlay texture and the resources to redraw it.
pub struct Overlay {
    target: RenderTarget,
    grid_vertices: Buffer,
    grid_vertex_count: u32,
    fill_bind_group: BindGroup,
    selection: Option<OverlaySelection>,
}

impl Overlay {
    pub fn new(device: &Device, queue: &Queue, programs: &ShaderPrograms) -> Self {
        let target = RenderTarget::for_overlay(device, OVERLAY_SIZE);

        let segments = graticule_segments();
        let grid_vertices = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("graticule_vertices"),
            size: std::mem::size_of_val(segments.as_slice()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&grid_vertices, 0, bytemuck::cast_slice(&segments));

        let fill_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("graticule_uniforms"),
            size: std::mem::size_of_val(&GRATICULE_COLOUR) as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&fill_uniforms, 0, bytemuck::cast_slice(&GRATICULE_COLOUR));

        let fill_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("graticule_bind_group"),
            layout: &programs.fill_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: fill_uniforms.as_entire_binding(),
            }],
        });

        Self {
            target,
            grid_vertices,
            grid_vertex_count: (segments.len() * 2) as u32,
            fill_bind_group,
            selection: None,
        }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        self.target.view()
    }

    /// Selection the texture currently reflects, if it has been built.
    pub fn selection(&self) -> Option<OverlaySelection> {
        self.selection
    }

    /// Upload the base image and draw the graticule over it.
    pub fn rebuild(
        &mut self,
        device: &Device,
        queue: &Queue,
        programs: &ShaderPrograms,
        selection: OverlaySelection,
        smudge: Option<&RgbaImage>,
    ) {
        log::debug!(
            "Rebuilding overlay (graticule: {}, smudges: {})",
            selection.graticule,
            selection.smudges
        );

        let image = base_image(selection.smudges, smudge);
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: self.target.texture(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * OVERLAY_SIZE),
                rows_per_image: Some(OVERLAY_SIZE),
            },
            wgpu::Extent3d {
                width: OVERLAY_SIZE,
                height: OVERLAY_SIZE,
                depth_or_array_layers: 1,
            },
        );

        if selection.graticule {
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("graticule_encoder"),
            });
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("graticule_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: self.target.view(),
                        resolve_target: None,
                        depth_slice: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                    multiview_mask: None,
                });

                pass.set_pipeline(&programs.graticule);
                pass.set_bind_group(0, &self.fill_bind_group, &[]);
                pass.set_vertex_buffer(0, self.grid_vertices.slice(..));
                pass.draw(0..self.grid_vertex_count, 0..1);
            }
            queue.submit(std::iter::once(encoder.finish()));
        }

        self.selection = Some(selection);
    }
}
