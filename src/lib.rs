//! # signal-daq
//!
//! A continuous waveform acquisition and measurement service. The pipeline
//! polls a DMA-backed acquisition source for frames of raw samples, converts
//! them to millivolts through a calibration provider, detects waveform cycles
//! against a dynamic per-frame threshold, averages per-cycle frequency and RMS
//! over a rolling window, and publishes one measurement per batch into a
//! lock-free shared register that a bus responder can read from an
//! interrupt-like context.
//!
//! ## Crate structure
//!
//! - **`acquisition`**: the [`acquisition::AcquisitionSource`] trait and raw
//!   sample types. Hardware drivers live behind this seam.
//! - **`averager`**: fixed-capacity ring of completed cycles with rolling
//!   averaging.
//! - **`batch`**: per-batch statistics, the poison flag, and the batch timing
//!   controller that decides what gets published.
//! - **`calibration`**: raw-count-to-millivolts conversion and the persisted
//!   calibration constants.
//! - **`config`**: `Settings` loaded from TOML via the `config` crate.
//! - **`convert`**: channel validation and sample conversion.
//! - **`cycle`**: zero-crossing cycle detection and per-cycle metrics.
//! - **`error`**: the application error type, built with `thiserror`.
//! - **`logging`**: `tracing` subscriber initialization.
//! - **`mock_adc`**: a simulated acquisition source with scripted fault
//!   injection, used by tests and the demo binary.
//! - **`pipeline`**: the long-lived acquisition/processing loop tying the
//!   above together.
//! - **`shared`**: the atomically published measurement register and its
//!   4-byte wire format.

pub mod acquisition;
pub mod averager;
pub mod batch;
pub mod calibration;
pub mod config;
pub mod convert;
pub mod cycle;
pub mod error;
pub mod logging;
pub mod mock_adc;
pub mod pipeline;
pub mod shared;
