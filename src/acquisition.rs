//! Acquisition source abstraction.
//!
//! The pipeline never talks to hardware directly; it drives anything that
//! implements [`AcquisitionSource`]. A real driver wraps a DMA-fed continuous
//! ADC peripheral; [`crate::mock_adc::MockAdc`] provides a simulated source
//! for tests and the demo binary.
//!
//! The contract mirrors a continuous-mode ADC driver: `start()` once at boot,
//! then `read_frame()` in a tight loop with a bounded timeout. Frame length
//! varies per read and is bounded by the caller's buffer. Each sample carries
//! the channel tag it was acquired on; the converter drops samples from
//! unexpected channels rather than trusting the pattern configuration.

use std::time::Duration;

use thiserror::Error;

/// One raw sample as delivered by the acquisition peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawSample {
    /// Channel the sample was acquired on.
    pub channel: u8,
    /// Raw converter count (12-bit sources use 0..=4095).
    pub raw_count: u16,
}

/// Failure modes of a frame read.
///
/// Neither variant is fatal to the pipeline: the read loop retries with
/// backoff and poisons the enclosing batch. Re-initialization of a faulted
/// source is an operator decision, never automatic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    /// No frame became available within the read timeout.
    ///
    /// Expected under load; the caller tracks consecutive timeouts and
    /// escalates its backoff delay.
    #[error("acquisition read timed out")]
    TimedOut,

    /// The driver reported an unexpected fault.
    #[error("acquisition hardware error: {0}")]
    Hardware(String),
}

/// A continuous, DMA-backed sampling source polled for frames of raw samples.
///
/// Implementations must deliver samples in acquisition order and must not
/// block longer than the supplied timeout in `read_frame`. The handle is
/// exclusively owned and driven by the acquisition task; `Send` so the
/// pipeline can run on its own thread.
pub trait AcquisitionSource: Send {
    /// Start continuous acquisition. Called once before the read loop.
    ///
    /// Failure here is the one unrecoverable condition in the system; the
    /// caller treats it as fatal to the process.
    fn start(&mut self) -> Result<(), AcquisitionError>;

    /// Read the next frame into `buf`, returning the number of samples
    /// written. Returns [`AcquisitionError::TimedOut`] if no data arrived
    /// within `timeout`.
    fn read_frame(
        &mut self,
        buf: &mut [RawSample],
        timeout: Duration,
    ) -> Result<usize, AcquisitionError>;
}
