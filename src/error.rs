//! Application error types.
//!
//! The primary error type, [`MeterError`], consolidates the failure modes of
//! the measurement service with `thiserror`. Transient acquisition failures
//! (timeouts, driver faults) are represented separately by
//! [`crate::acquisition::AcquisitionError`] because the read loop handles them
//! in place with backoff and batch poisoning; they only surface as
//! `MeterError` when a caller propagates them out of the pipeline.

use thiserror::Error;

use crate::acquisition::AcquisitionError;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, MeterError>;

/// Primary error type for the measurement service.
#[derive(Error, Debug)]
pub enum MeterError {
    /// Configuration file parsing failed.
    ///
    /// Wraps `config::ConfigError` from the `config` crate: syntax errors,
    /// missing required fields, or type mismatches in the TOML files.
    /// Permanent; requires fixing the configuration file.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration validation failed.
    ///
    /// Values parsed correctly but are semantically invalid (zero sample
    /// rate, empty averaging window, and so on). Caught by
    /// [`crate::config::Settings::validate`] before the pipeline starts.
    #[error("configuration validation error: {0}")]
    Configuration(String),

    /// Standard I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Calibration constants could not be loaded, saved, or applied.
    #[error("calibration error: {0}")]
    Calibration(String),

    /// An acquisition failure escaped the read loop.
    ///
    /// Inside the pipeline both timeout and hardware faults are retried with
    /// backoff and poison the enclosing batch; this variant exists for the
    /// unrecoverable case, failing to start the source at boot.
    #[error("acquisition error: {0}")]
    Acquisition(#[from] AcquisitionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = MeterError::Configuration("sample_rate_hz must be non-zero".into());
        assert_eq!(
            err.to_string(),
            "configuration validation error: sample_rate_hz must be non-zero"
        );
    }

    #[test]
    fn acquisition_error_converts() {
        let err: MeterError = AcquisitionError::TimedOut.into();
        assert!(err.to_string().contains("timed out"));
    }
}
