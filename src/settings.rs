//! Per-block configuration snapshot and the display quantities derived from it.
//!
//! The host serialises its settings object as camelCase JSON once per block.
//! A [`ConfigSnapshot`] is never mutated after parsing; every consumer takes it
//! by reference.

use serde::{Deserialize, Serialize};

use crate::audio::{FilterSettings, SweepParams};

/// Sample rate the line intensity is calibrated against.
pub const REFERENCE_SAMPLE_RATE: f32 = 41_000.0;

/// Block length the fade amount is calibrated against.
pub const REFERENCE_BLOCK_LEN: f32 = 512.0;

/// Screen-space scale applied on top of the user gain.
pub const GAIN_CALIBRATION: f32 = 450.0 / 512.0;

/// Extra brightness factor, on top of `steps`, applied when upsampling is off.
/// Tuned by eye to match the filtered trace.
pub const UNFILTERED_INTENSITY_OFFSET: f32 = 1.5;

/// Errors raised while reading host settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Malformed settings JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported channel count {0}, expected 2 or 3")]
    Channels(usize),
}

/// Immutable per-block settings record supplied by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSnapshot {
    #[serde(default = "ConfigSnapshot::default_brightness")]
    pub brightness: f32,
    #[serde(default = "ConfigSnapshot::default_intensity")]
    pub intensity: f32,
    #[serde(default = "ConfigSnapshot::default_persistence")]
    pub persistence: f32,
    #[serde(default = "ConfigSnapshot::default_saturation")]
    pub saturation: f32,
    /// Beam width in clip-space units.
    #[serde(default = "ConfigSnapshot::default_focus")]
    pub focus: f32,
    /// Beam hue in degrees.
    #[serde(default = "ConfigSnapshot::default_hue")]
    pub hue: f32,
    #[serde(default = "ConfigSnapshot::default_true")]
    pub upsampling: bool,
    #[serde(default = "ConfigSnapshot::default_channels")]
    pub num_channels: usize,
    #[serde(default = "ConfigSnapshot::default_true")]
    pub graticule: bool,
    #[serde(default = "ConfigSnapshot::default_true")]
    pub smudges: bool,
    #[serde(default, rename = "swapXY")]
    pub swap_xy: bool,
    #[serde(default)]
    pub sweep_on: bool,
    #[serde(default = "ConfigSnapshot::default_sweep_ms_div")]
    pub sweep_ms_div: f32,
    #[serde(default)]
    pub sweep_trigger_value: f32,
    /// Gain exponent; the trace is scaled by `2^main_gain`.
    #[serde(default)]
    pub main_gain: f32,
    #[serde(default, rename = "invertXY")]
    pub invert_xy: bool,
    #[serde(default)]
    pub freeze_image: bool,
    /// Ambient light on the faceplate, `0..=5`.
    #[serde(default)]
    pub ambient: f32,
}

impl ConfigSnapshot {
    fn default_brightness() -> f32 {
        3.0
    }
    fn default_intensity() -> f32 {
        3.0
    }
    fn default_persistence() -> f32 {
        0.5
    }
    fn default_saturation() -> f32 {
        1.0
    }
    fn default_focus() -> f32 {
        0.008
    }
    fn default_hue() -> f32 {
        125.0
    }
    fn default_true() -> bool {
        true
    }
    fn default_channels() -> usize {
        2
    }
    fn default_sweep_ms_div() -> f32 {
        1.0
    }

    /// Parse a host settings object.
    ///
    /// Values are not range-checked here; the driver calls [`Self::validate`]
    /// per block and skips blocks whose snapshot fails it.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(2..=3).contains(&self.num_channels) {
            return Err(SettingsError::Channels(self.num_channels));
        }
        Ok(())
    }

    pub fn overlay(&self) -> OverlaySelection {
        OverlaySelection {
            graticule: self.graticule,
            smudges: self.smudges,
        }
    }

    /// Fraction of the accumulated image faded toward black per block.
    pub fn fade_amount(&self, block_len: usize) -> f32 {
        let amount = 0.5f32.powf(self.persistence) * 0.4 * block_len as f32 / REFERENCE_BLOCK_LEN;
        amount.clamp(0.0, 1.0)
    }

    /// Clip-space scale applied to sample values.
    pub fn line_gain(&self) -> f32 {
        2.0f32.powf(self.main_gain) * GAIN_CALIBRATION
    }

    /// Per-segment beam intensity, normalised for sample rate and filtering.
    pub fn line_intensity(&self, sample_rate: f32, filter: &FilterSettings) -> f32 {
        let intensity = self.intensity * (REFERENCE_SAMPLE_RATE / sample_rate);
        if self.upsampling {
            intensity
        } else {
            intensity * (filter.steps as f32 + UNFILTERED_INTENSITY_OFFSET)
        }
    }

    /// Tone-mapping exposure.
    pub fn exposure(&self) -> f32 {
        2.0f32.powf(self.brightness - 2.0)
    }

    /// Beam tint for the configured hue.
    pub fn colour(&self) -> [f32; 3] {
        colour_from_hue(self.hue)
    }

    pub fn sweep_params(&self, sample_rate: f32) -> SweepParams {
        SweepParams::from_ms_per_div(
            self.sweep_ms_div,
            self.sweep_trigger_value,
            self.main_gain,
            sample_rate,
        )
    }
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self {
            brightness: Self::default_brightness(),
            intensity: Self::default_intensity(),
            persistence: Self::default_persistence(),
            saturation: Self::default_saturation(),
            focus: Self::default_focus(),
            hue: Self::default_hue(),
            upsampling: true,
            num_channels: Self::default_channels(),
            graticule: true,
            smudges: true,
            swap_xy: false,
            sweep_on: false,
            sweep_ms_div: Self::default_sweep_ms_div(),
            sweep_trigger_value: 0.0,
            main_gain: 0.0,
            invert_xy: false,
            freeze_image: false,
            ambient: 0.0,
        }
    }
}

/// Which overlay layers are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverlaySelection {
    pub graticule: bool,
    pub smudges: bool,
}

/// Stream shape fixed by the host at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamFormat {
    pub sample_rate: f32,
    pub block_len: usize,
}

impl Default for StreamFormat {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            block_len: 512,
        }
    }
}

/// Map a hue in degrees onto the three-segment colour wheel.
///
/// Each 120° segment cross-fades two primaries with square-root ramps so the
/// perceived brightness stays even across the wheel.
pub fn colour_from_hue(hue: f32) -> [f32; 3] {
    let hue = hue.rem_euclid(360.0);
    let alpha = (hue / 120.0).fract();
    let start = (1.0 - alpha).sqrt();
    let end = alpha.sqrt();
    if hue < 120.0 {
        [start, end, 0.0]
    } else if hue < 240.0 {
        [0.0, start, end]
    } else {
        [end, 0.0, start]
    }
}
