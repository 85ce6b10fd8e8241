//! Texture management for GPU rendering.

use wgpu::{Device, Texture, TextureFormat, TextureUsages, TextureView};

use super::context::GpuError;

/// Format of the accumulation and glow surfaces.
pub const HDR_FORMAT: TextureFormat = TextureFormat::Rgba16Float;

/// Smallest and largest accumulation resolution.
pub const MIN_RESOLUTION: u32 = 128;
pub const MAX_RESOLUTION: u32 = 1024;

/// Number of mip levels in a full chain for a square of `size`.
pub fn mip_level_count(size: u32) -> u32 {
    32 - size.max(1).leading_zeros()
}

/// Clamp a display size to the supported accumulation range.
pub fn clamp_resolution(display_size: u32) -> u32 {
    display_size.clamp(MIN_RESOLUTION, MAX_RESOLUTION)
}

/// Allocation size for a drawing resolution: the next power of two.
///
/// Small display changes therefore keep the same allocation; only the drawn
/// viewport shrinks or grows.
pub fn allocation_size(resolution: u32) -> u32 {
    clamp_resolution(resolution)
        .next_power_of_two()
        .min(MAX_RESOLUTION)
}

/// A render target that owns both texture and view.
/// The texture must outlive its view, so we keep them together.
pub struct RenderTarget {
    texture: Texture,
    view: TextureView,
    mip_views: Vec<TextureView>,
    size: u32,
}

impl RenderTarget {
    /// Create a new square render target with the specified usage flags.
    pub fn new(
        device: &Device,
        label: &str,
        size: u32,
        mip_levels: u32,
        format: TextureFormat,
        usage: TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
            mip_level_count: mip_levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mip_views = (0..mip_levels)
            .map(|level| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(label),
                    base_mip_level: level,
                    mip_level_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();
        Self {
            texture,
            view,
            mip_views,
            size,
        }
    }

    /// Persistent phosphor surface with a full mip chain.
    pub fn for_accumulation(device: &Device, size: u32) -> Self {
        Self::new(
            device,
            "accumulation_texture",
            size,
            mip_level_count(size),
            HDR_FORMAT,
            TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING,
        )
    }

    /// Single-level glow surface used by the blur cascade.
    pub fn for_glow(device: &Device, label: &str, size: u32) -> Self {
        Self::new(
            device,
            label,
            size,
            1,
            HDR_FORMAT,
            TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING,
        )
    }

    /// 8-bit overlay surface that is written once and then sampled.
    pub fn for_overlay(device: &Device, size: u32) -> Self {
        Self::new(
            device,
            "overlay_texture",
            size,
            1,
            TextureFormat::Rgba8Unorm,
            TextureUsages::RENDER_ATTACHMENT
                | TextureUsages::TEXTURE_BINDING
                | TextureUsages::COPY_DST,
        )
    }

    /// Create a render target for final output (can be copied to CPU).
    pub fn for_output(device: &Device, label: &str, size: u32, format: TextureFormat) -> Self {
        Self::new(
            device,
            label,
            size,
            1,
            format,
            TextureUsages::RENDER_ATTACHMENT | TextureUsages::COPY_SRC,
        )
    }

    /// View over every mip level, for sampling.
    pub fn view(&self) -> &TextureView {
        &self.view
    }

    /// View of a single mip level, for rendering into.
    pub fn mip_view(&self, level: u32) -> &TextureView {
        &self.mip_views[level as usize]
    }

    pub fn mip_levels(&self) -> u32 {
        self.mip_views.len() as u32
    }

    /// Edge length in texels of mip level 0.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Get the underlying texture (for copy operations).
    pub fn texture(&self) -> &Texture {
        &self.texture
    }
}

/// Readback buffer for copying GPU texture data to CPU.
pub struct ReadbackBuffer {
    buffer: wgpu::Buffer,
    width: u32,
    height: u32,
    padded_row_bytes: u32,
    unpadded_row_bytes: u32,
}

impl ReadbackBuffer {
    /// Create a new readback buffer sized for the given dimensions.
    pub fn new(device: &Device, width: u32, height: u32) -> Self {
        let bytes_per_pixel = 4u32;
        let unpadded_row_bytes = width * bytes_per_pixel;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_row_bytes = unpadded_row_bytes.div_ceil(align) * align;

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback_buffer"),
            size: (padded_row_bytes * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        Self {
            buffer,
            width,
            height,
            padded_row_bytes,
            unpadded_row_bytes,
        }
    }

    /// Get the padded bytes per row (for texture copy).
    pub fn padded_row_bytes(&self) -> u32 {
        self.padded_row_bytes
    }

    /// Record a copy of `texture` (level 0) into this buffer.
    pub fn copy_from(&self, encoder: &mut wgpu::CommandEncoder, texture: &Texture) {
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_row_bytes),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Read pixels from the mapped buffer, removing row padding.
    pub fn read_pixels(&self, device: &wgpu::Device) -> Result<Vec<u8>, GpuError> {
        let buffer_slice = self.buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| GpuError::Readback(e.to_string()))?;
        receiver
            .recv()
            .map_err(|e| GpuError::Readback(e.to_string()))?
            .map_err(|e| GpuError::Readback(e.to_string()))?;

        let mut pixels = Vec::with_capacity((self.width * self.height * 4) as usize);
        {
            let data = buffer_slice.get_mapped_range();
            for row in 0..self.height {
                let start = (row * self.padded_row_bytes) as usize;
                let end = start + self.unpadded_row_bytes as usize;
                pixels.extend_from_slice(&data[start..end]);
            }
        }
        self.buffer.unmap();
        Ok(pixels)
    }
}
