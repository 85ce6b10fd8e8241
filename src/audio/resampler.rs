//! Block-continuous Lanczos upsampling.
//!
//! Each call interpolates one block against the tail of the block before it,
//! so the trace lags the input by `2 * order` samples but joins seamlessly
//! across block boundaries.

use super::kernel::{KernelError, KernelTable};

/// Errors that can occur while resampling a block.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResampleError {
    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),
    #[error("Previous block has {previous} samples but current block has {current}")]
    LengthMismatch { previous: usize, current: usize },
    #[error("Block of {len} samples is shorter than the filter footprint of {needed}")]
    BlockTooShort { len: usize, needed: usize },
}

/// Filter parameters shared by every channel of the stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSettings {
    /// Lanczos order `a` (taps on each side of the centre).
    pub order: usize,
    /// Output samples per input sample.
    pub steps: usize,
    /// Exponent applied to the Lanczos window.
    pub tweak: f32,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            order: 8,
            steps: 6,
            tweak: 1.5,
        }
    }
}

impl FilterSettings {
    /// Length of the smoothed output for a block of `block_len` samples.
    pub fn smoothed_len(&self, block_len: usize) -> usize {
        block_len * self.steps + 1
    }

    /// Shortest block the filter can process without reading outside the
    /// two-block window.
    pub fn min_block_len(&self) -> usize {
        (3 * self.order).saturating_sub(1).max(2 * self.order)
    }
}

/// Lanczos upsampler holding the kernel and a reusable two-block window.
#[derive(Debug, Clone)]
pub struct Resampler {
    kernel: KernelTable,
    window: Vec<f32>,
}

impl Resampler {
    /// Create a resampler, building its kernel table once.
    pub fn new(settings: FilterSettings) -> Result<Self, ResampleError> {
        let kernel = KernelTable::build(settings.order, settings.steps, settings.tweak)?;
        Ok(Self::with_kernel(kernel))
    }

    /// Create a resampler around an existing kernel table.
    pub fn with_kernel(kernel: KernelTable) -> Self {
        Self {
            kernel,
            window: Vec::new(),
        }
    }

    pub fn kernel(&self) -> &KernelTable {
        &self.kernel
    }

    pub fn settings(&self) -> FilterSettings {
        FilterSettings {
            order: self.kernel.order(),
            steps: self.kernel.steps(),
            tweak: self.kernel.tweak(),
        }
    }

    /// Upsample `current` using the tail of `previous` for continuity.
    ///
    /// Returns exactly `N * steps + 1` samples.
    pub fn resample(&mut self, previous: &[f32], current: &[f32]) -> Result<Vec<f32>, ResampleError> {
        let mut out = Vec::new();
        self.resample_into(previous, current, &mut out)?;
        Ok(out)
    }

    /// Like [`Resampler::resample`], writing into a caller-owned buffer.
    pub fn resample_into(
        &mut self,
        previous: &[f32],
        current: &[f32],
        out: &mut Vec<f32>,
    ) -> Result<(), ResampleError> {
        let n = current.len();
        if previous.len() != n {
            return Err(ResampleError::LengthMismatch {
                previous: previous.len(),
                current: n,
            });
        }
        let settings = self.settings();
        let needed = settings.min_block_len();
        if n < needed {
            return Err(ResampleError::BlockTooShort { len: n, needed });
        }

        let a = settings.order as isize;
        let steps = settings.steps;

        self.window.clear();
        self.window.extend_from_slice(previous);
        self.window.extend_from_slice(current);

        out.clear();
        out.reserve(settings.smoothed_len(n));

        let start = n - 2 * settings.order;
        for position in start..start + n {
            out.push(self.window[position]);
            for r in 1..steps as isize {
                let mut acc = 0.0f32;
                for k in (-a + 1)..a {
                    let sample = self.window[(position as isize + k) as usize];
                    acc += sample * self.kernel.at(-r + k * steps as isize);
                }
                out.push(acc);
            }
        }
        out.push(self.window[2 * n - 2 * settings.order]);

        Ok(())
    }
}
