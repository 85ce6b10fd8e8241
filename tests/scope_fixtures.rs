//! Shared test fixtures for scope integration tests.
#![allow(dead_code)]

use base64::{engine::general_purpose, Engine as _};
use phosphor_scope::audio::{circle_block, encode_pcm, SampleBlock};
use phosphor_scope::gpu::{CompositeParams, GpuError, LineParams, Trace};
use phosphor_scope::pipeline::FrameSink;
use phosphor_scope::settings::{OverlaySelection, StreamFormat};
use phosphor_scope::Payload;

pub const SAMPLE_RATE: u32 = 48_000;
pub const BLOCK_LEN: usize = 512;

/// Route `log` output through the test harness.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// The stream shape used throughout the tests.
pub fn stream() -> StreamFormat {
    StreamFormat {
        sample_rate: SAMPLE_RATE as f32,
        block_len: BLOCK_LEN,
    }
}

/// Block `index` of a 440 Hz unit circle as a base64 payload.
pub fn circle_payload(index: usize) -> Payload {
    base64_payload(&circle_block(440.0, SAMPLE_RATE, BLOCK_LEN, index), 2)
}

pub fn base64_payload(block: &SampleBlock, channels: usize) -> Payload {
    Payload::Base64(general_purpose::STANDARD.encode(encode_pcm(block, channels)))
}

/// Euclidean distance of every point from the origin.
pub fn radii(x: &[f32], y: &[f32]) -> Vec<f32> {
    x.iter()
        .zip(y)
        .map(|(x, y)| (x * x + y * y).sqrt())
        .collect()
}

/// A sink that records what it was asked to do.
#[derive(Default)]
pub struct RecordingSink {
    pub traces: Vec<RecordedTrace>,
    pub overlays: Vec<OverlaySelection>,
    pub resizes: Vec<(u32, u32)>,
    pub presents: Vec<CompositeParams>,
    /// Fail the next `draw_trace` call.
    pub fail_next_draw: bool,
}

pub struct RecordedTrace {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Vec<f32>,
    pub params: LineParams,
}

impl FrameSink for RecordingSink {
    type Surface = ();

    fn request_resize(&mut self, width: u32, height: u32) {
        self.resizes.push((width, height));
    }

    fn select_overlay(&mut self, selection: OverlaySelection) {
        self.overlays.push(selection);
    }

    fn draw_trace(&mut self, trace: &Trace<'_>, params: &LineParams) -> Result<(), GpuError> {
        if std::mem::take(&mut self.fail_next_draw) {
            return Err(GpuError::Readback("device lost".into()));
        }
        self.traces.push(RecordedTrace {
            x: trace.x.to_vec(),
            y: trace.y.to_vec(),
            z: trace.z.to_vec(),
            params: *params,
        });
        Ok(())
    }

    fn present(&mut self, _surface: &(), params: &CompositeParams) -> Result<(), GpuError> {
        self.presents.push(*params);
        Ok(())
    }
}
