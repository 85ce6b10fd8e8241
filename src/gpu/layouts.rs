//! Bind group layout builders for the scope's shader programs.
//!
//! Provides reusable helpers for creating wgpu bind group layouts.

use wgpu::{BindGroupLayout, BindGroupLayoutEntry, Device, ShaderStages};

/// Builder for creating bind group layouts with common patterns.
pub struct BindGroupLayoutBuilder {
    label: Option<&'static str>,
    entries: Vec<BindGroupLayoutEntry>,
}

impl BindGroupLayoutBuilder {
    /// Create a new bind group layout builder.
    pub fn new(label: &'static str) -> Self {
        Self {
            label: Some(label),
            entries: Vec::new(),
        }
    }

    /// Add a uniform buffer entry.
    pub fn uniform(mut self, binding: u32, visibility: ShaderStages) -> Self {
        self.entries.push(BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
        self
    }

    /// Add a 2D texture entry.
    pub fn texture_2d(mut self, binding: u32, visibility: ShaderStages) -> Self {
        self.entries.push(BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        self
    }

    /// Add a filtering sampler entry.
    pub fn sampler(mut self, binding: u32, visibility: ShaderStages) -> Self {
        self.entries.push(BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
        self
    }

    /// Build the bind group layout.
    pub fn build(self, device: &Device) -> BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: self.label,
            entries: &self.entries,
        })
    }
}

/// Fill program: a single colour uniform.
pub fn create_fill_layout(device: &Device) -> BindGroupLayout {
    BindGroupLayoutBuilder::new("fill_bind_group_layout")
        .uniform(0, ShaderStages::FRAGMENT)
        .build(device)
}

/// Line program: beam uniforms read by both stages.
pub fn create_line_layout(device: &Device) -> BindGroupLayout {
    BindGroupLayoutBuilder::new("line_bind_group_layout")
        .uniform(0, ShaderStages::VERTEX | ShaderStages::FRAGMENT)
        .build(device)
}

/// Blur and textured-blit programs (uniforms, texture, sampler).
pub fn create_sampled_layout(device: &Device) -> BindGroupLayout {
    BindGroupLayoutBuilder::new("sampled_bind_group_layout")
        .uniform(0, ShaderStages::VERTEX | ShaderStages::FRAGMENT)
        .texture_2d(1, ShaderStages::FRAGMENT)
        .sampler(2, ShaderStages::FRAGMENT)
        .build(device)
}

/// Composite program (uniforms, line, tight glow, wide glow, overlay, sampler).
pub fn create_composite_layout(device: &Device) -> BindGroupLayout {
    BindGroupLayoutBuilder::new("composite_bind_group_layout")
        .uniform(0, ShaderStages::FRAGMENT)
        .texture_2d(1, ShaderStages::FRAGMENT)
        .texture_2d(2, ShaderStages::FRAGMENT)
        .texture_2d(3, ShaderStages::FRAGMENT)
        .texture_2d(4, ShaderStages::FRAGMENT)
        .sampler(5, ShaderStages::FRAGMENT)
        .build(device)
}
