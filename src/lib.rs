//! Phosphor Scope Core
//!
//! Phosphor-style CRT oscilloscope rendering for streamed 2- and 3-channel
//! sample blocks.
//!
//! # Features
//!
//! - Lanczos upsampling with phase continuity across block boundaries
//! - Edge-triggered sweep time base
//! - Base64/binary PCM payload decoding
//! - GPU rendering via wgpu: persistence fade, additive beam, mip chain,
//!   two-stage glow and tone-mapped composite with graticule overlay
//! - A block driver that sequences host payloads into frames

pub mod audio;
pub mod gpu;
pub mod pipeline;
pub mod settings;

// Re-export commonly used types
pub use audio::{
    decode_payload, FilterSettings, KernelTable, Payload, Resampler, SampleBlock, SweepGenerator,
    SweepParams,
};
pub use gpu::{
    CompositeParams, DisplaySurface, GpuContext, GpuError, LineParams, RendererConfig,
    ScopeRenderer, Trace,
};
pub use pipeline::{
    BlockOutcome, DriverState, FrameDriver, FrameSink, PipelineError, SettingsSource,
};
pub use settings::{colour_from_hue, ConfigSnapshot, OverlaySelection, StreamFormat};
