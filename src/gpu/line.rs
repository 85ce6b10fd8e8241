//! Beam geometry and the per-block phosphor pass.
//!
//! Every consecutive pair of trace points becomes one instanced quad
//! (`draw(0..4, 0..edges)` as a triangle strip). The pass first fades the
//! accumulation surface toward black, then adds the new segments on top.

use wgpu::{BindGroup, BindGroupLayout, Buffer, Device, Queue, RenderPass};

use crate::audio::FilterSettings;
use crate::settings::{ConfigSnapshot, StreamFormat};

/// Per-segment instance data.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LineInstance {
    /// Segment start (x, y, brightness).
    pub start: [f32; 3],
    /// Segment end (x, y, brightness).
    pub end: [f32; 3],
    /// Segment index within the batch.
    pub edge: f32,
}

impl LineInstance {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32];

    /// Instance-rate vertex buffer layout.
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<LineInstance>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Uniform data for the line shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct LineUniforms {
    gain: f32,
    size: f32,
    intensity: f32,
    n_edges: f32,
    _padding: [f32; 4],
}

/// Uniform data for the fade fill.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct FadeUniforms {
    colour: [f32; 4],
}

/// One trace to draw, all series the same length.
#[derive(Debug, Clone, Copy)]
pub struct Trace<'a> {
    pub x: &'a [f32],
    pub y: &'a [f32],
    pub z: &'a [f32],
}

impl<'a> Trace<'a> {
    pub fn new(x: &'a [f32], y: &'a [f32], z: &'a [f32]) -> Self {
        Self { x, y, z }
    }

    /// Number of points; extra samples in longer series are ignored.
    pub fn len(&self) -> usize {
        self.x.len().min(self.y.len()).min(self.z.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of segments between consecutive points.
    pub fn edges(&self) -> usize {
        self.len().saturating_sub(1)
    }
}

/// Beam parameters for one block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineParams {
    /// Clip-space scale applied to sample values.
    pub gain: f32,
    /// Beam half-width in clip units.
    pub focus: f32,
    pub intensity: f32,
    /// Fraction faded toward black before drawing.
    pub fade_amount: f32,
    pub invert: bool,
}

impl LineParams {
    pub fn from_snapshot(
        snapshot: &ConfigSnapshot,
        stream: &StreamFormat,
        filter: &FilterSettings,
    ) -> Self {
        Self {
            gain: snapshot.line_gain(),
            focus: snapshot.focus,
            intensity: snapshot.line_intensity(stream.sample_rate, filter),
            fade_amount: snapshot.fade_amount(stream.block_len),
            invert: snapshot.invert_xy,
        }
    }
}

impl Default for LineParams {
    fn default() -> Self {
        Self::from_snapshot(
            &ConfigSnapshot::default(),
            &StreamFormat::default(),
            &FilterSettings::default(),
        )
    }
}

/// Build one instance per segment of `trace`.
///
/// With `invert` both axes are negated; brightness is left alone.
pub fn build_instances(trace: &Trace<'_>, invert: bool, out: &mut Vec<LineInstance>) {
    let sign = if invert { -1.0 } else { 1.0 };
    let point = |i: usize| [trace.x[i] * sign, trace.y[i] * sign, trace.z[i]];

    out.clear();
    out.reserve(trace.edges());
    for i in 0..trace.edges() {
        out.push(LineInstance {
            start: point(i),
            end: point(i + 1),
            edge: i as f32,
        });
    }
}

/// GPU buffers for the fade and line draws.
pub struct LineBatch {
    instance_buffer: Buffer,
    capacity: usize,
    line_uniforms: Buffer,
    line_bind_group: BindGroup,
    fade_uniforms: Buffer,
    fade_bind_group: BindGroup,
    scratch: Vec<LineInstance>,
    edges: u32,
}

impl LineBatch {
    pub fn new(
        device: &Device,
        line_layout: &BindGroupLayout,
        fill_layout: &BindGroupLayout,
        max_points: usize,
    ) -> Self {
        let capacity = max_points.saturating_sub(1).max(1);
        let instance_buffer = Self::create_instance_buffer(device, capacity);

        let line_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("line_uniforms"),
            size: std::mem::size_of::<LineUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let line_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("line_bind_group"),
            layout: line_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: line_uniforms.as_entire_binding(),
            }],
        });

        let fade_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("fade_uniforms"),
            size: std::mem::size_of::<FadeUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let fade_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("fade_bind_group"),
            layout: fill_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: fade_uniforms.as_entire_binding(),
            }],
        });

        Self {
            instance_buffer,
            capacity,
            line_uniforms,
            line_bind_group,
            fade_uniforms,
            fade_bind_group,
            scratch: Vec::with_capacity(capacity),
            edges: 0,
        }
    }

    fn create_instance_buffer(device: &Device, capacity: usize) -> Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("line_instances"),
            size: (std::mem::size_of::<LineInstance>() * capacity) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Segments uploaded by the last [`LineBatch::upload`].
    pub fn edges(&self) -> u32 {
        self.edges
    }

    /// Upload geometry and uniforms for one block, growing the instance
    /// buffer if the trace is longer than anything seen so far.
    pub fn upload(&mut self, device: &Device, queue: &Queue, trace: &Trace<'_>, params: &LineParams) {
        build_instances(trace, params.invert, &mut self.scratch);
        if self.scratch.len() > self.capacity {
            self.capacity = self.scratch.len().next_power_of_two();
            log::debug!("Growing line instance buffer to {} segments", self.capacity);
            self.instance_buffer = Self::create_instance_buffer(device, self.capacity);
        }
        self.edges = self.scratch.len() as u32;
        if !self.scratch.is_empty() {
            queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&self.scratch));
        }

        let uniforms = LineUniforms {
            gain: params.gain,
            size: params.focus,
            intensity: params.intensity,
            n_edges: self.edges.max(1) as f32,
            _padding: [0.0; 4],
        };
        queue.write_buffer(&self.line_uniforms, 0, bytemuck::bytes_of(&uniforms));

        let fade = FadeUniforms {
            colour: [0.0, 0.0, 0.0, params.fade_amount],
        };
        queue.write_buffer(&self.fade_uniforms, 0, bytemuck::bytes_of(&fade));
    }

    /// Record the fade and the line draw into an open pass on the accumulation surface.
    pub fn draw(
        &self,
        pass: &mut RenderPass<'_>,
        fade_pipeline: &wgpu::RenderPipeline,
        line_pipeline: &wgpu::RenderPipeline,
    ) {
        pass.set_pipeline(fade_pipeline);
        pass.set_bind_group(0, &self.fade_bind_group, &[]);
        pass.draw(0..3, 0..1);

        if self.edges > 0 {
            pass.set_pipeline(line_pipeline);
            pass.set_bind_group(0, &self.line_bind_group, &[]);
            pass.set_vertex_buffer(0, self.instance_buffer.slice(..));
            // 4 vertices per segment (triangle strip quad)
            pass.draw(0..4, 0..self.edges);
        }
    }
}
