//! The phosphor scope renderer.
//!
//! Owns every GPU resource of the scope. Resources are created in a fixed
//! order (context, shader programs, vertex buffers, textures) and released
//! together when the renderer is dropped.

use image::RgbaImage;
use wgpu::{TextureFormat, TextureView};

use super::context::{GpuContext, GpuError};
use super::line::{LineBatch, LineParams, Trace};
use super::mipmap::MipChain;
use super::overlay::Overlay;
use super::postprocess::{centred_viewport, BloomCascade, CompositeParams};
use super::programs::{ShaderPrograms, CAPTURE_FORMAT};
use super::textures::{allocation_size, clamp_resolution, ReadbackBuffer, RenderTarget};
use crate::pipeline::FrameSink;
use crate::settings::{ConfigSnapshot, OverlaySelection};

/// Configuration for the renderer.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Format of the surfaces passed to [`ScopeRenderer::present`].
    pub display_format: TextureFormat,
    /// Initial display edge length in pixels; also the capture size.
    pub display_size: u32,
    /// Largest trace expected per block. Longer traces grow the buffer.
    pub max_points: usize,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            display_format: TextureFormat::Rgba8Unorm,
            display_size: 512,
            max_points: 512 * 6 + 1,
        }
    }
}

/// A view to composite into.
pub struct DisplaySurface {
    pub view: TextureView,
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
}

impl DisplaySurface {
    pub fn new(view: TextureView, format: TextureFormat, width: u32, height: u32) -> Self {
        Self {
            view,
            format,
            width,
            height,
        }
    }
}

/// GPU side of the scope: accumulation, glow, overlay and composite.
pub struct ScopeRenderer {
    ctx: GpuContext,
    config: RendererConfig,
    programs: ShaderPrograms,
    line: LineBatch,

    accumulation: RenderTarget,
    mips: MipChain,
    bloom: BloomCascade,
    overlay: Overlay,
    capture_target: RenderTarget,
    readback: ReadbackBuffer,

    resolution: u32,
    pending_resize: Option<u32>,
    pending_overlay: Option<OverlaySelection>,
    smudge_image: Option<RgbaImage>,
}

impl ScopeRenderer {
    /// Create a renderer on a new headless GPU context.
    pub async fn new(config: RendererConfig) -> Result<Self, GpuError> {
        let ctx = GpuContext::new().await?;
        Self::with_context(ctx, config).await
    }

    /// Create a renderer on an existing context.
    pub async fn with_context(ctx: GpuContext, config: RendererConfig) -> Result<Self, GpuError> {
        let programs = ShaderPrograms::new(&ctx.device, config.display_format).await?;

        let line = LineBatch::new(
            &ctx.device,
            &programs.line_layout,
            &programs.fill_layout,
            config.max_points,
        );

        let resolution = clamp_resolution(config.display_size);
        let accumulation = RenderTarget::for_accumulation(&ctx.device, allocation_size(resolution));
        let mips = MipChain::new(&ctx.device, &ctx.queue, &programs, &accumulation);
        let bloom = BloomCascade::new(&ctx.device, &ctx.queue);

        let mut overlay = Overlay::new(&ctx.device, &ctx.queue, &programs);
        overlay.rebuild(
            &ctx.device,
            &ctx.queue,
            &programs,
            ConfigSnapshot::default().overlay(),
            None,
        );

        let capture_target =
            RenderTarget::for_output(&ctx.device, "capture_texture", config.display_size, CAPTURE_FORMAT);
        let readback = ReadbackBuffer::new(&ctx.device, config.display_size, config.display_size);

        log::info!(
            "Scope renderer ready: resolution {} (allocated {}), display {:?}",
            resolution,
            accumulation.size(),
            config.display_format
        );

        Ok(Self {
            ctx,
            config,
            programs,
            line,
            accumulation,
            mips,
            bloom,
            overlay,
            capture_target,
            readback,
            resolution,
            pending_resize: None,
            pending_overlay: None,
            smudge_image: None,
        })
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }

    /// Get GPU adapter info.
    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.ctx.adapter_info()
    }

    /// Edge length of the region of the accumulation surface in use.
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Edge length of the allocated accumulation texture.
    pub fn allocated_size(&self) -> u32 {
        self.accumulation.size()
    }

    /// Overlay layers currently shown.
    pub fn overlay_selection(&self) -> Option<OverlaySelection> {
        self.overlay.selection()
    }

    /// Replace the smudge pattern; takes effect at the next frame boundary.
    pub fn set_smudge_image(&mut self, image: RgbaImage) {
        self.smudge_image = Some(image);
        let selection = self
            .pending_overlay
            .or(self.overlay.selection())
            .unwrap_or_default();
        self.pending_overlay = Some(selection);
    }

    /// Defer a display resize to the next frame boundary.
    pub fn request_resize(&mut self, width: u32, height: u32) {
        self.pending_resize = Some(width.min(height));
    }

    /// Defer an overlay change to the next frame boundary.
    pub fn select_overlay(&mut self, selection: OverlaySelection) {
        if self.overlay.selection() != Some(selection) || self.pending_overlay.is_some() {
            self.pending_overlay = Some(selection);
        }
    }

    /// Apply resize and overlay changes queued since the last frame.
    fn apply_pending(&mut self) {
        if let Some(display_size) = self.pending_resize.take() {
            let resolution = clamp_resolution(display_size);
            if resolution != self.resolution {
                let size = allocation_size(resolution);
                if size != self.accumulation.size() {
                    log::info!("Reallocating accumulation texture: {} -> {}", self.accumulation.size(), size);
                    self.accumulation = RenderTarget::for_accumulation(&self.ctx.device, size);
                    self.mips = MipChain::new(&self.ctx.device, &self.ctx.queue, &self.programs, &self.accumulation);
                }
                log::debug!("Resolution {} -> {}", self.resolution, resolution);
                self.resolution = resolution;
            }
        }

        if let Some(selection) = self.pending_overlay.take() {
            self.overlay.rebuild(
                &self.ctx.device,
                &self.ctx.queue,
                &self.programs,
                selection,
                self.smudge_image.as_ref(),
            );
        }
    }

    fn resize_for_canvas(&self) -> f32 {
        self.resolution as f32 / self.accumulation.size() as f32
    }

    /// Fade the accumulation surface, draw one trace into it and refresh its mips.
    pub fn draw_trace(&mut self, trace: &Trace<'_>, params: &LineParams) -> Result<(), GpuError> {
        self.apply_pending();
        self.line.upload(&self.ctx.device, &self.ctx.queue, trace, params);

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("draw_encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("phosphor_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: self.accumulation.mip_view(0),
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

            let side = self.resolution as f32;
            pass.set_viewport(0.0, 0.0, side, side, 0.0, 1.0);
            self.line.draw(&mut pass, &self.programs.fade, &self.programs.line);
        }

        self.mips.record(&mut encoder, &self.programs, &self.accumulation);
        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    /// Run the glow cascade and composite into `surface`.
    pub fn present(&mut self, surface: &DisplaySurface, params: &CompositeParams) -> Result<(), GpuError> {
        self.apply_pending();
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("present_encoder"),
            });
        self.record_composite(
            &mut encoder,
            &surface.view,
            surface.format,
            (surface.width, surface.height),
            params,
        )?;
        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    /// Composite into the offscreen capture target and read it back.
    ///
    /// Returns tightly packed RGBA8 rows, `display_size²` pixels.
    pub fn capture(&mut self, params: &CompositeParams) -> Result<Vec<u8>, GpuError> {
        self.apply_pending();
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("capture_encoder"),
            });
        let size = self.capture_target.size();
        self.record_composite(
            &mut encoder,
            self.capture_target.view(),
            CAPTURE_FORMAT,
            (size, size),
            params,
        )?;
        self.readback.copy_from(&mut encoder, self.capture_target.texture());
        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        self.readback.read_pixels(&self.ctx.device)
    }

    fn record_composite(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        output: &TextureView,
        format: TextureFormat,
        (width, height): (u32, u32),
        params: &CompositeParams,
    ) -> Result<(), GpuError> {
        let composite = self
            .programs
            .composite_for(format)
            .ok_or(GpuError::UnsupportedFormat(format))?;

        self.bloom.record(
            &self.ctx.device,
            &self.ctx.queue,
            encoder,
            &self.programs,
            composite,
            &self.accumulation,
            self.overlay.view(),
            self.resize_for_canvas(),
            params,
            output,
            centred_viewport(width, height),
        );
        Ok(())
    }
}

impl FrameSink for ScopeRenderer {
    type Surface = DisplaySurface;

    fn request_resize(&mut self, width: u32, height: u32) {
        ScopeRenderer::request_resize(self, width, height);
    }

    fn select_overlay(&mut self, selection: OverlaySelection) {
        ScopeRenderer::select_overlay(self, selection);
    }

    fn draw_trace(&mut self, trace: &Trace<'_>, params: &LineParams) -> Result<(), GpuError> {
        ScopeRenderer::draw_trace(self, trace, params)
    }

    fn present(&mut self, surface: &DisplaySurface, params: &CompositeParams) -> Result<(), GpuError> {
        ScopeRenderer::present(self, surface, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn renderer(config: RendererConfig) -> Option<ScopeRenderer> {
        match ScopeRenderer::new(config).await {
            Ok(renderer) => Some(renderer),
            Err(GpuError::NoAdapter) | Err(GpuError::DeviceRequest(_)) => {
                eprintln!("Skipping test - GPU not available");
                None
            }
            Err(e) => panic!("renderer init failed: {e}"),
        }
    }

    fn small_config() -> RendererConfig {
        RendererConfig {
            display_size: 200,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config_fits_one_block() {
        let config = RendererConfig::default();
        assert_eq!(config.max_points, 3073);
        assert_eq!(config.display_format, TextureFormat::Rgba8Unorm);
    }

    #[tokio::test]
    async fn test_renderer_allocates_power_of_two() {
        let Some(renderer) = renderer(small_config()).await else {
            return;
        };
        assert_eq!(renderer.resolution(), 200);
        assert_eq!(renderer.allocated_size(), 256);
        assert_eq!(
            renderer.overlay_selection(),
            Some(OverlaySelection {
                graticule: true,
                smudges: true
            })
        );
    }

    #[tokio::test]
    async fn test_resize_is_deferred_to_next_frame() {
        let Some(mut renderer) = renderer(small_config()).await else {
            return;
        };

        renderer.request_resize(2000, 900);
        assert_eq!(renderer.resolution(), 200);

        let x = [0.0, 0.5];
        let y = [0.0, 0.5];
        let z = [1.0, 1.0];
        renderer
            .draw_trace(&Trace::new(&x, &y, &z), &LineParams::default())
            .unwrap();
        assert_eq!(renderer.resolution(), 900);
        assert_eq!(renderer.allocated_size(), 1024);

        renderer.request_resize(10, 10);
        renderer.capture(&CompositeParams::default()).unwrap();
        assert_eq!(renderer.resolution(), 128);
        assert_eq!(renderer.allocated_size(), 128);
    }

    #[tokio::test]
    async fn test_blank_capture_is_black() {
        let config = RendererConfig {
            display_size: 128,
            ..Default::default()
        };
        let Some(mut renderer) = renderer(config).await else {
            return;
        };
        renderer.select_overlay(OverlaySelection::default());

        let pixels = renderer.capture(&CompositeParams::default()).unwrap();
        assert_eq!(pixels.len(), 128 * 128 * 4);
        assert!(pixels.chunks(4).all(|p| p[0] == 0 && p[1] == 0 && p[2] == 0));
    }
}
