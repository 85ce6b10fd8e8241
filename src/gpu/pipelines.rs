//! Render pipeline builders for GPU rendering.
//!
//! Provides reusable helpers for creating wgpu render pipelines.

use wgpu::{
    BindGroupLayout, ColorTargetState, ColorWrites, Device, PipelineLayout, PrimitiveTopology,
    RenderPipeline, ShaderModule, TextureFormat, VertexBufferLayout,
};

/// Additive blending used to accumulate beam energy.
pub const ADDITIVE_BLENDING: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

/// Builder for creating render pipelines with common patterns.
pub struct RenderPipelineBuilder<'a> {
    label: Option<&'static str>,
    layout: Option<&'a PipelineLayout>,
    shader: &'a ShaderModule,
    vertex_entry: &'static str,
    fragment_entry: &'static str,
    vertex_buffers: Vec<VertexBufferLayout<'static>>,
    format: TextureFormat,
    blend: Option<wgpu::BlendState>,
    write_mask: ColorWrites,
    topology: PrimitiveTopology,
}

impl<'a> RenderPipelineBuilder<'a> {
    /// Create a new render pipeline builder for a shader module.
    pub fn new(label: &'static str, shader: &'a ShaderModule) -> Self {
        Self {
            label: Some(label),
            layout: None,
            shader,
            vertex_entry: "vs_main",
            fragment_entry: "fs_main",
            vertex_buffers: Vec::new(),
            format: TextureFormat::Rgba8Unorm,
            blend: Some(wgpu::BlendState::REPLACE),
            write_mask: ColorWrites::ALL,
            topology: PrimitiveTopology::TriangleList,
        }
    }

    /// Set the pipeline layout.
    pub fn layout(mut self, layout: &'a PipelineLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Set the vertex shader entry point only.
    pub fn vertex_entry(mut self, entry: &'static str) -> Self {
        self.vertex_entry = entry;
        self
    }

    /// Set vertex buffer layouts.
    pub fn vertex_buffers(mut self, buffers: Vec<VertexBufferLayout<'static>>) -> Self {
        self.vertex_buffers = buffers;
        self
    }

    /// Set the texture format.
    pub fn format(mut self, format: TextureFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the blend state.
    pub fn blend(mut self, blend: wgpu::BlendState) -> Self {
        self.blend = Some(blend);
        self
    }

    /// Restrict which colour channels the pipeline writes.
    pub fn write_mask(mut self, mask: ColorWrites) -> Self {
        self.write_mask = mask;
        self
    }

    /// Set the primitive topology.
    pub fn topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    /// Build the render pipeline.
    pub fn build(self, device: &Device) -> RenderPipeline {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: self.label,
            layout: self.layout,
            vertex: wgpu::VertexState {
                module: self.shader,
                entry_point: Some(self.vertex_entry),
                buffers: &self.vertex_buffers,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: self.shader,
                entry_point: Some(self.fragment_entry),
                targets: &[Some(ColorTargetState {
                    format: self.format,
                    blend: self.blend,
                    write_mask: self.write_mask,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: self.topology,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    }
}

/// Create a pipeline layout from bind group layouts.
pub fn create_pipeline_layout(
    device: &Device,
    label: &'static str,
    layouts: &[&BindGroupLayout],
) -> PipelineLayout {
    device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: layouts,
        immediate_size: 0,
    })
}

/// Create a fullscreen pipeline (no vertex buffers, draws 3 vertices).
pub fn create_fullscreen_pipeline(
    device: &Device,
    label: &'static str,
    layout: &PipelineLayout,
    shader: &ShaderModule,
    format: TextureFormat,
    blend: wgpu::BlendState,
) -> RenderPipeline {
    RenderPipelineBuilder::new(label, shader)
        .layout(layout)
        .format(format)
        .blend(blend)
        .build(device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::GpuContext;

    #[tokio::test]
    async fn test_pipeline_layout_creation() {
        let ctx = match GpuContext::new().await {
            Ok(ctx) => ctx,
            Err(_) => return,
        };

        let bind_group_layout =
            ctx.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("test"),
                    entries: &[],
                });

        let _layout = create_pipeline_layout(&ctx.device, "test_layout", &[&bind_group_layout]);
    }

    #[test]
    fn test_additive_blending_accumulates() {
        assert_eq!(ADDITIVE_BLENDING.color.src_factor, wgpu::BlendFactor::One);
        assert_eq!(ADDITIVE_BLENDING.color.dst_factor, wgpu::BlendFactor::One);
    }
}
