//! The scope's five shader programs and the pipelines built from them.
//!
//! Shaders are compiled once at startup. Any compiler error aborts
//! initialisation with the compiler's own diagnostic text.

use wgpu::{
    BindGroupLayout, ColorWrites, Device, PrimitiveTopology, RenderPipeline, Sampler,
    ShaderModule, TextureFormat,
};

use super::context::GpuError;
use super::layouts::{
    create_composite_layout, create_fill_layout, create_line_layout, create_sampled_layout,
};
use super::line::LineInstance;
use super::overlay::GRID_VERTEX_LAYOUT;
use super::pipelines::{
    create_fullscreen_pipeline, create_pipeline_layout, RenderPipelineBuilder, ADDITIVE_BLENDING,
};
use super::textures::HDR_FORMAT;

/// Format of the overlay texture.
pub const OVERLAY_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

/// Format of headless captures.
pub const CAPTURE_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

/// Compile a WGSL module and fail with its diagnostics on error.
pub async fn compile_shader(
    device: &Device,
    label: &'static str,
    source: &str,
) -> Result<ShaderModule, GpuError> {
    // Without a scope the device's default handler panics on invalid WGSL.
    let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    let validation = scope.pop();

    let info = module.get_compilation_info().await;
    let errors: Vec<String> = info
        .messages
        .iter()
        .filter(|m| matches!(m.message_type, wgpu::CompilationMessageType::Error))
        .map(|m| match &m.location {
            Some(loc) => format!("{}:{}: {}", loc.line_number, loc.line_position, m.message),
            None => m.message.clone(),
        })
        .collect();

    let validation = validation.await;

    if !errors.is_empty() {
        return Err(GpuError::ShaderCompilation {
            label,
            diagnostics: errors.join("\n"),
        });
    }
    match validation {
        None => Ok(module),
        Some(e) => Err(GpuError::ShaderCompilation {
            label,
            diagnostics: e.to_string(),
        }),
    }
}

/// Bind group layouts, pipelines and the shared sampler.
pub struct ShaderPrograms {
    pub fill_layout: BindGroupLayout,
    pub line_layout: BindGroupLayout,
    pub sampled_layout: BindGroupLayout,
    pub composite_layout: BindGroupLayout,

    /// Blend toward black on the accumulation surface.
    pub fade: RenderPipeline,
    /// Graticule lines into the overlay's red channel.
    pub graticule: RenderPipeline,
    /// Additive beam segments.
    pub line: RenderPipeline,
    pub blur: RenderPipeline,
    /// Plain copy between HDR surfaces (glow downsample, mip generation).
    pub blit: RenderPipeline,
    composite: RenderPipeline,
    composite_capture: Option<RenderPipeline>,
    display_format: TextureFormat,

    pub sampler: Sampler,
}

impl ShaderPrograms {
    pub async fn new(device: &Device, display_format: TextureFormat) -> Result<Self, GpuError> {
        let fill_shader = compile_shader(device, "fill", include_str!("shaders/fill.wgsl")).await?;
        let line_shader = compile_shader(device, "line", include_str!("shaders/line.wgsl")).await?;
        let blur_shader = compile_shader(device, "blur", include_str!("shaders/blur.wgsl")).await?;
        let textured_shader =
            compile_shader(device, "textured", include_str!("shaders/textured.wgsl")).await?;
        let composite_shader =
            compile_shader(device, "composite", include_str!("shaders/composite.wgsl")).await?;

        let fill_layout = create_fill_layout(device);
        let line_layout = create_line_layout(device);
        let sampled_layout = create_sampled_layout(device);
        let composite_layout = create_composite_layout(device);

        let fill_pipeline_layout =
            create_pipeline_layout(device, "fill_pipeline_layout", &[&fill_layout]);
        let line_pipeline_layout =
            create_pipeline_layout(device, "line_pipeline_layout", &[&line_layout]);
        let sampled_pipeline_layout =
            create_pipeline_layout(device, "sampled_pipeline_layout", &[&sampled_layout]);
        let composite_pipeline_layout =
            create_pipeline_layout(device, "composite_pipeline_layout", &[&composite_layout]);

        let fade = create_fullscreen_pipeline(
            device,
            "fade_pipeline",
            &fill_pipeline_layout,
            &fill_shader,
            HDR_FORMAT,
            wgpu::BlendState::ALPHA_BLENDING,
        );

        let graticule = RenderPipelineBuilder::new("graticule_pipeline", &fill_shader)
            .layout(&fill_pipeline_layout)
            .vertex_entry("vs_points")
            .vertex_buffers(vec![GRID_VERTEX_LAYOUT])
            .topology(PrimitiveTopology::LineList)
            .format(OVERLAY_FORMAT)
            .blend(wgpu::BlendState::ALPHA_BLENDING)
            .write_mask(ColorWrites::RED)
            .build(device);

        let line = RenderPipelineBuilder::new("line_pipeline", &line_shader)
            .layout(&line_pipeline_layout)
            .vertex_buffers(vec![LineInstance::layout()])
            .topology(PrimitiveTopology::TriangleStrip)
            .format(HDR_FORMAT)
            .blend(ADDITIVE_BLENDING)
            .build(device);

        let blur = create_fullscreen_pipeline(
            device,
            "blur_pipeline",
            &sampled_pipeline_layout,
            &blur_shader,
            HDR_FORMAT,
            wgpu::BlendState::REPLACE,
        );

        let blit = create_fullscreen_pipeline(
            device,
            "blit_pipeline",
            &sampled_pipeline_layout,
            &textured_shader,
            HDR_FORMAT,
            wgpu::BlendState::REPLACE,
        );

        let composite = create_fullscreen_pipeline(
            device,
            "composite_pipeline",
            &composite_pipeline_layout,
            &composite_shader,
            display_format,
            wgpu::BlendState::REPLACE,
        );
        let composite_capture = (display_format != CAPTURE_FORMAT).then(|| {
            create_fullscreen_pipeline(
                device,
                "composite_capture_pipeline",
                &composite_pipeline_layout,
                &composite_shader,
                CAPTURE_FORMAT,
                wgpu::BlendState::REPLACE,
            )
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("scope_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            ..Default::default()
        });

        Ok(Self {
            fill_layout,
            line_layout,
            sampled_layout,
            composite_layout,
            fade,
            graticule,
            line,
            blur,
            blit,
            composite,
            composite_capture,
            display_format,
            sampler,
        })
    }

    /// Composite pipeline targeting `format`, if one was built for it.
    pub fn composite_for(&self, format: TextureFormat) -> Option<&RenderPipeline> {
        if format == self.display_format {
            Some(&self.composite)
        } else if format == CAPTURE_FORMAT {
            self.composite_capture.as_ref()
        } else {
            None
        }
    }

    pub fn display_format(&self) -> TextureFormat {
        self.display_format
    }
}
