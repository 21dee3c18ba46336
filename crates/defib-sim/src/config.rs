//! Simulator configuration.
//!
//! Every timing constant of the device and every waveform parameter lives
//! here rather than in the code that uses it. Configuration files are YAML
//! with camelCase keys; missing keys fall back to the defaults below.
//!
//! ```yaml
//! device:
//!   chargeIncrement: 2
//!   chargeIntervalMs: 100
//!   synchroDelayMs: 5000
//! waveform:
//!   samplingRate: 250
//!   durationSeconds: 10
//!   seed: 42
//! ```

use crate::result::{SimError, SimResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors raised when a configuration is out of range
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("chargeIncrement must be within 1..=100, got {0}")]
    InvalidChargeIncrement(u8),

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("samplingRate must be within 1..=10000 Hz, got {0}")]
    InvalidSamplingRate(u32),

    #[error("durationSeconds must be positive and finite")]
    InvalidWindow,
}

/// Device timing constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceTiming {
    /// Percentage points added to `chargeProgress` per ramp tick
    pub charge_increment: u8,
    /// Interval between ramp ticks
    pub charge_interval_ms: u64,
    /// How long the charge button reads as pressed
    pub charge_button_pulse_ms: u64,
    /// How long the shock button reads as pressed
    pub shock_button_pulse_ms: u64,
    /// Wait for the R-wave sync window before a synchronized shock
    pub synchro_delay_ms: u64,
    /// Minimum pacer intensity (mA) that captures the ventricle
    pub pacing_capture_threshold: u16,
}

impl Default for DeviceTiming {
    fn default() -> Self {
        Self {
            charge_increment: 2,
            charge_interval_ms: 100,
            charge_button_pulse_ms: 300,
            shock_button_pulse_ms: 500,
            synchro_delay_ms: 5000,
            pacing_capture_threshold: 50,
        }
    }
}

impl DeviceTiming {
    /// Virtual time a full charge takes with these settings
    #[must_use]
    pub fn full_charge_ms(&self) -> u64 {
        let ticks = 100_u64.div_ceil(u64::from(self.charge_increment.max(1)));
        ticks * self.charge_interval_ms
    }

    /// Check ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.charge_increment == 0 || self.charge_increment > 100 {
            return Err(ConfigError::InvalidChargeIncrement(self.charge_increment));
        }
        if self.charge_interval_ms == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "chargeIntervalMs",
            });
        }
        Ok(())
    }
}

/// Waveform buffer parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WaveformConfig {
    /// Samples per second
    pub sampling_rate: u32,
    /// Length of one scrollable trace
    pub duration_seconds: f32,
    /// Tail blend window for seamless looping
    pub blend_duration_ms: u32,
    /// PRNG seed for jitter and noise
    pub seed: u64,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 250,
            duration_seconds: 10.0,
            blend_duration_ms: 200,
            seed: 0x5EED_EC61,
        }
    }
}

impl WaveformConfig {
    /// Number of samples in one trace
    #[must_use]
    pub fn sample_count(&self) -> usize {
        (self.duration_seconds * self.sampling_rate as f32).round() as usize
    }

    /// Check ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampling_rate == 0 || self.sampling_rate > 10_000 {
            return Err(ConfigError::InvalidSamplingRate(self.sampling_rate));
        }
        if !self.duration_seconds.is_finite() || self.duration_seconds <= 0.0 {
            return Err(ConfigError::InvalidWindow);
        }
        Ok(())
    }
}

/// Root configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimConfig {
    /// Device timing constants
    pub device: DeviceTiming,
    /// Waveform parameters
    pub waveform: WaveformConfig,
}

impl SimConfig {
    /// Parse and validate a YAML configuration.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yaml_ng::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
        Ok(Self::from_yaml(&text)?)
    }

    /// Check every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.device.validate()?;
        self.waveform.validate()
    }
}
