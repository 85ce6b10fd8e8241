//! GPU rendering using wgpu.
//!
//! Provides the phosphor pipeline: persistence fade and beam drawing into an
//! accumulation surface, mip regeneration, a two-stage glow cascade and the
//! final tone-mapping composite.

pub mod context;
pub mod layouts;
pub mod line;
pub mod mipmap;
pub mod overlay;
pub mod pipelines;
pub mod postprocess;
pub mod programs;
pub mod renderer;
pub mod textures;

pub use context::{GpuContext, GpuError};
pub use line::{build_instances, LineBatch, LineInstance, LineParams, Trace};
pub use overlay::{base_image, graticule_segments, noise_image, Overlay, OVERLAY_SIZE};
pub use postprocess::{BloomCascade, CompositeParams};
pub use programs::{ShaderPrograms, CAPTURE_FORMAT};
pub use renderer::{DisplaySurface, RendererConfig, ScopeRenderer};
pub use textures::{allocation_size, clamp_resolution, MAX_RESOLUTION, MIN_RESOLUTION};
