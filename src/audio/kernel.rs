//! Windowed-sinc (Lanczos) coefficient tables.
//!
//! The table holds one half of a symmetric kernel sampled at `steps`
//! sub-positions per input sample, out to `order` input samples. The
//! resampler looks coefficients up by absolute phase offset.

use std::f64::consts::PI;

/// Errors raised when building a kernel table.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KernelError {
    #[error("Filter order must be at least 1")]
    ZeroOrder,
    #[error("Upsampling steps must be at least 1")]
    ZeroSteps,
}

/// Immutable Lanczos coefficient table of `order * steps` entries.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelTable {
    order: usize,
    steps: usize,
    tweak: f32,
    coefficients: Vec<f32>,
}

impl KernelTable {
    /// Build the table for `(order, steps, tweak)`.
    ///
    /// `K[0] = 1` and for `i > 0`, with `x = πi/steps`:
    /// `K[i] = sinc(x) * (order * sin(x / order) / x) ^ tweak`.
    /// The computation is pure, so identical inputs give bit-identical tables.
    pub fn build(order: usize, steps: usize, tweak: f32) -> Result<Self, KernelError> {
        if order == 0 {
            return Err(KernelError::ZeroOrder);
        }
        if steps == 0 {
            return Err(KernelError::ZeroSteps);
        }

        let radius = order * steps;
        let a = order as f64;
        let t = tweak as f64;
        let mut coefficients = Vec::with_capacity(radius);
        coefficients.push(1.0);

        for i in 1..radius {
            let x = PI * i as f64 / steps as f64;
            let sinc = x.sin() / x;
            let window = a * (x / a).sin() / x;
            coefficients.push((sinc * window.powf(t)) as f32);
        }

        Ok(Self {
            order,
            steps,
            tweak,
            coefficients,
        })
    }

    /// Number of input samples on each side of the kernel centre.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Output samples generated per input sample.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Window exponent the table was built with.
    pub fn tweak(&self) -> f32 {
        self.tweak
    }

    /// Raw coefficients, `order * steps` long.
    pub fn coefficients(&self) -> &[f32] {
        &self.coefficients
    }

    /// Coefficient at a signed phase offset (the kernel is even), or `None`
    /// outside the kernel's support.
    pub fn get(&self, offset: isize) -> Option<f32> {
        self.coefficients.get(offset.unsigned_abs()).copied()
    }

    /// Inner-loop lookup; callers keep `|offset| < order * steps`.
    #[inline]
    pub(crate) fn at(&self, offset: isize) -> f32 {
        self.coefficients[offset.unsigned_abs()]
    }

    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }
}
