//! Tracing subscriber initialization.
//!
//! Structured logging via `tracing` + `tracing-subscriber`. The filter comes
//! from the configured log level, overridable through `RUST_LOG` as usual.

use tracing_subscriber::EnvFilter;

use crate::error::{AppResult, MeterError};

/// Initialize the global tracing subscriber with the given default level.
///
/// `RUST_LOG` takes precedence over `level` when set. Returns an error if a
/// global subscriber is already installed.
pub fn init(level: &str) -> AppResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| MeterError::Configuration(format!("invalid log level '{level}': {e}")))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| MeterError::Configuration(format!("tracing init failed: {e}")))?;

    Ok(())
}
