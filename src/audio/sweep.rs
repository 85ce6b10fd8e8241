//! Triggered time-base generator.
//!
//! When the sweep is on, the X channel is replaced by a linear ramp that
//! advances by `2 * sample_period / sweep_min_time` per sample and restarts
//! at [`SWEEP_RESET_POSITION`] on a rising crossing of the trigger level, once
//! the ramp has run past [`SWEEP_ARM_POSITION`].

/// Position the ramp must exceed before a trigger can restart it.
pub const SWEEP_ARM_POSITION: f32 = 1.1;
/// Position the ramp restarts from on a trigger.
pub const SWEEP_RESET_POSITION: f32 = -1.3;
/// Ramp position at startup.
pub const SWEEP_START_POSITION: f32 = -1.0;

/// Per-block sweep parameters derived from the settings snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepParams {
    /// Seconds for the ramp to travel one unit of half-screen.
    pub sweep_min_time: f32,
    /// Trigger level on the trigger channel.
    pub trigger_value: f32,
    /// Linear display gain; the ramp is divided by it so it spans the screen
    /// regardless of gain.
    pub gain: f32,
    /// Seconds per input sample.
    pub sample_period: f32,
}

impl SweepParams {
    /// Build sweep parameters from milliseconds per division (10 divisions).
    pub fn from_ms_per_div(ms_per_div: f32, trigger_value: f32, main_gain: f32, sample_rate: f32) -> Self {
        Self {
            sweep_min_time: ms_per_div * 10.0 / 1000.0,
            trigger_value,
            gain: 2.0f32.powf(main_gain),
            sample_period: 1.0 / sample_rate,
        }
    }

    /// Ramp advance per sample.
    pub fn increment(&self) -> f32 {
        2.0 * self.sample_period / self.sweep_min_time
    }
}

/// Outcome of advancing the sweep by one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepStep {
    /// X value emitted for this sample.
    pub x: f32,
    /// Whether the ramp restarted on this sample.
    pub reset: bool,
}

/// Edge-triggered auto-reset ramp, carried across blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepGenerator {
    position: f32,
    below_trigger: bool,
}

impl Default for SweepGenerator {
    fn default() -> Self {
        Self {
            position: SWEEP_START_POSITION,
            below_trigger: false,
        }
    }
}

impl SweepGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current ramp position.
    pub fn position(&self) -> f32 {
        self.position
    }

    /// Whether the previous trigger sample was below the trigger level.
    pub fn below_trigger(&self) -> bool {
        self.below_trigger
    }

    /// Advance one sample given the trigger channel's value at that sample.
    pub fn step(&mut self, trigger_sample: f32, params: &SweepParams) -> SweepStep {
        let x = self.position / params.gain;
        self.position += params.increment();

        let reset = self.position > SWEEP_ARM_POSITION
            && self.below_trigger
            && trigger_sample >= params.trigger_value;
        if reset {
            self.position = SWEEP_RESET_POSITION;
        }
        self.below_trigger = trigger_sample < params.trigger_value;

        SweepStep { x, reset }
    }

    /// Overwrite `x` with the ramp, triggering on `trigger`.
    ///
    /// Returns the number of resets within the block.
    pub fn apply(&mut self, x: &mut [f32], trigger: &[f32], params: &SweepParams) -> usize {
        let mut resets = 0;
        for (out, &sample) in x.iter_mut().zip(trigger) {
            let step = self.step(sample, params);
            *out = step.x;
            if step.reset {
                resets += 1;
            }
        }
        resets
    }
}
