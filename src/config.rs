//! Configuration management.
//!
//! Settings load from `config/<name>.toml` through the `config` crate and
//! deserialize with serde. Every field has a default so a partial file (or no
//! file sections at all) still produces a runnable configuration; semantic
//! checks live in [`Settings::validate`] and run before the pipeline starts.

use std::path::PathBuf;
use std::time::Duration;

use config::Config;
use serde::Deserialize;

use crate::error::{AppResult, MeterError};

/// Top-level application settings.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    /// Log level filter for the tracing subscriber (`trace`..`error`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Acquisition-source settings.
    #[serde(default)]
    pub acquisition: AcquisitionSettings,
    /// Measurement pipeline settings.
    #[serde(default)]
    pub processing: ProcessingSettings,
    /// Calibration constants and optional persisted file.
    #[serde(default)]
    pub calibration: CalibrationSettings,
}

/// Settings for the acquisition source and the read loop around it.
#[derive(Debug, Deserialize, Clone)]
pub struct AcquisitionSettings {
    /// Target sample rate of the continuous acquisition, in Hz.
    #[serde(default = "default_sample_rate_hz")]
    pub sample_rate_hz: u32,
    /// Channel the waveform input is wired to; samples tagged with any other
    /// channel are dropped.
    #[serde(default = "default_channel")]
    pub channel: u8,
    /// Maximum samples per frame read (DMA conversion frame size).
    #[serde(default = "default_frame_capacity")]
    pub frame_capacity: usize,
    /// Bounded timeout for each frame read, in milliseconds.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Fixed yield between read-loop iterations, in milliseconds, so the
    /// acquisition task does not starve lower-priority tasks.
    #[serde(default = "default_read_yield_ms")]
    pub read_yield_ms: u64,
    /// Backoff after a read timeout, in milliseconds.
    #[serde(default = "default_timeout_backoff_ms")]
    pub timeout_backoff_ms: u64,
    /// Escalated backoff once timeouts exceed
    /// [`crate::pipeline::TIMEOUT_ESCALATION_THRESHOLD`] consecutive reads.
    #[serde(default = "default_timeout_backoff_long_ms")]
    pub timeout_backoff_long_ms: u64,
    /// Fixed backoff after a hardware read error, in milliseconds.
    #[serde(default = "default_hardware_backoff_ms")]
    pub hardware_backoff_ms: u64,
}

/// Settings for cycle averaging and batch timing.
#[derive(Debug, Deserialize, Clone)]
pub struct ProcessingSettings {
    /// Number of completed cycles the rolling average spans.
    #[serde(default = "default_cycles_to_average")]
    pub cycles_to_average: usize,
    /// Lowest fundamental frequency of interest, in Hz. Together with
    /// `cycles_to_average` this sizes the batch so a full averaging window
    /// fits even at the slowest expected input.
    #[serde(default = "default_min_expected_freq_hz")]
    pub min_expected_freq_hz: u32,
    /// Target wall-clock interval between batch starts, in milliseconds.
    /// Slack inside the interval is spent on drain reads, not sleep.
    #[serde(default = "default_target_batch_interval_ms")]
    pub target_batch_interval_ms: u64,
}

/// Calibration constants consumed at boot.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CalibrationSettings {
    /// Millivolts per raw count.
    pub scale_mv_per_count: Option<f64>,
    /// Offset added after scaling, in millivolts.
    pub offset_mv: Option<f64>,
    /// Optional persisted constants file; when present and readable it takes
    /// precedence over the inline constants.
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_sample_rate_hz() -> u32 {
    25_000
}
fn default_channel() -> u8 {
    4
}
fn default_frame_capacity() -> usize {
    512
}
fn default_read_timeout_ms() -> u64 {
    100
}
fn default_read_yield_ms() -> u64 {
    5
}
fn default_timeout_backoff_ms() -> u64 {
    100
}
fn default_timeout_backoff_long_ms() -> u64 {
    250
}
fn default_hardware_backoff_ms() -> u64 {
    1000
}
fn default_cycles_to_average() -> usize {
    10
}
fn default_min_expected_freq_hz() -> u32 {
    20
}
fn default_target_batch_interval_ms() -> u64 {
    1000
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            sample_rate_hz: default_sample_rate_hz(),
            channel: default_channel(),
            frame_capacity: default_frame_capacity(),
            read_timeout_ms: default_read_timeout_ms(),
            read_yield_ms: default_read_yield_ms(),
            timeout_backoff_ms: default_timeout_backoff_ms(),
            timeout_backoff_long_ms: default_timeout_backoff_long_ms(),
            hardware_backoff_ms: default_hardware_backoff_ms(),
        }
    }
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            cycles_to_average: default_cycles_to_average(),
            min_expected_freq_hz: default_min_expected_freq_hz(),
            target_batch_interval_ms: default_target_batch_interval_ms(),
        }
    }
}

impl Settings {
    /// Load settings from `config/<name>.toml` (default: `config/default`).
    pub fn new(config_name: Option<&str>) -> AppResult<Self> {
        let config_path = format!("config/{}", config_name.unwrap_or("default"));
        let s = Config::builder()
            .add_source(config::File::with_name(&config_path).required(false))
            .build()
            .map_err(MeterError::Config)?;

        let settings: Settings = s.try_deserialize().map_err(MeterError::Config)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Semantic validation of values that parse but cannot work.
    pub fn validate(&self) -> AppResult<()> {
        if self.acquisition.sample_rate_hz == 0 {
            return Err(MeterError::Configuration(
                "acquisition.sample_rate_hz must be non-zero".into(),
            ));
        }
        if self.acquisition.frame_capacity == 0 {
            return Err(MeterError::Configuration(
                "acquisition.frame_capacity must be non-zero".into(),
            ));
        }
        if self.processing.cycles_to_average == 0 {
            return Err(MeterError::Configuration(
                "processing.cycles_to_average must be non-zero".into(),
            ));
        }
        if self.processing.min_expected_freq_hz == 0 {
            return Err(MeterError::Configuration(
                "processing.min_expected_freq_hz must be non-zero".into(),
            ));
        }
        if self.processing.min_expected_freq_hz > self.acquisition.sample_rate_hz {
            return Err(MeterError::Configuration(
                "processing.min_expected_freq_hz exceeds the sample rate".into(),
            ));
        }
        Ok(())
    }

    /// Samples per batch: one full averaging window at the lowest expected
    /// frequency, `(1 / min_expected_freq_hz) * cycles_to_average * sample_rate_hz`.
    pub fn max_samples_per_batch(&self) -> u32 {
        let per_cycle = self.acquisition.sample_rate_hz / self.processing.min_expected_freq_hz;
        per_cycle.saturating_mul(self.processing.cycles_to_average as u32)
    }

    /// Bounded frame-read timeout.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.acquisition.read_timeout_ms)
    }

    /// Target wall-clock interval between batch starts.
    pub fn target_batch_interval(&self) -> Duration {
        Duration::from_millis(self.processing.target_batch_interval_ms)
    }

    /// Theoretical time one full frame takes to acquire at the target rate.
    pub fn frame_acquisition_time(&self) -> Duration {
        Duration::from_secs_f64(
            self.acquisition.frame_capacity as f64 / f64::from(self.acquisition.sample_rate_hz),
        )
    }
}
