//! Synthetic signal generation for testing.
//!
//! Generates noise, Lissajous blocks, trigger patterns and interleaved
//! PCM payloads for unit tests, integration tests, benches and the demo.

use super::block::SampleBlock;

/// Generate white noise.
///
/// Uses a simple linear congruential generator for reproducibility.
pub fn generate_white_noise(num_samples: usize, amplitude: f32, seed: u64) -> Vec<f32> {
    let mut state = seed;
    let a: u64 = 6364136223846793005;
    let c: u64 = 1442695040888963407;

    (0..num_samples)
        .map(|_| {
            state = state.wrapping_mul(a).wrapping_add(c);
            let normalized = (state as f32 / u64::MAX as f32) * 2.0 - 1.0;
            amplitude * normalized
        })
        .collect()
}

/// Generate block `index` of a continuous Lissajous figure.
///
/// X and Y run at `freq_x`/`freq_y` with a quarter-cycle phase offset, so equal
/// frequencies trace a circle of radius `amplitude`.
pub fn lissajous_block(
    freq_x: f32,
    freq_y: f32,
    sample_rate: u32,
    block_len: usize,
    index: usize,
    amplitude: f32,
) -> SampleBlock {
    let offset = (index * block_len) as f64 / sample_rate as f64;
    let series = |freq: f32, phase: f64| -> Vec<f32> {
        (0..block_len)
            .map(|i| {
                let t = offset + i as f64 / sample_rate as f64;
                (amplitude as f64 * (2.0 * std::f64::consts::PI * freq as f64 * t + phase).sin())
                    as f32
            })
            .collect()
    };
    let x = series(freq_x, 0.0);
    let y = series(freq_y, std::f64::consts::FRAC_PI_2);
    SampleBlock::from_channels(x, y, None)
}

/// Generate block `index` of a circle (`X = sin`, `Y = cos`).
pub fn circle_block(frequency: f32, sample_rate: u32, block_len: usize, index: usize) -> SampleBlock {
    lissajous_block(frequency, frequency, sample_rate, block_len, index, 1.0)
}

/// Square trigger pattern that starts low and toggles at each edge index.
pub fn trigger_pattern(num_samples: usize, edges: &[usize], low: f32, high: f32) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let toggles = edges.iter().filter(|&&e| e <= i).count();
            if toggles % 2 == 0 {
                low
            } else {
                high
            }
        })
        .collect()
}

/// Interleave a block into little-endian f32 PCM, `channels` wide.
pub fn encode_pcm(block: &SampleBlock, channels: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(block.len() * channels * 4);
    for i in 0..block.len() {
        let frame = [block.x[i], block.y[i], block.z[i]];
        for value in &frame[..channels.min(3)] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }
    bytes
}
