//! Sample-domain processing.
//!
//! This module provides:
//! - Lanczos kernel tables and block-continuous upsampling
//! - The triggered sweep time base
//! - Host payload decoding into sample blocks
//! - Synthetic signal generators for tests and demos

pub mod block;
pub mod kernel;
pub mod resampler;
pub mod sweep;
pub mod synth;

pub use block::{decode_payload, decode_pcm, BlockError, Payload, SampleBlock};
pub use kernel::{KernelError, KernelTable};
pub use resampler::{FilterSettings, ResampleError, Resampler};
pub use sweep::{SweepGenerator, SweepParams, SweepStep};
pub use synth::{
    circle_block, encode_pcm, generate_white_noise, lissajous_block, trigger_pattern,
};
