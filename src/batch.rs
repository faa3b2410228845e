//! Per-batch statistics and the batch timing controller.
//!
//! A batch is a fixed-sample-count, fixed-cadence window: the controller
//! counts valid samples until `max_samples_per_batch` is reached, decides what
//! to publish, and reports how much wall-clock slack remains before the next
//! batch should start. Any read failure, zero-valid-sample frame, or
//! degenerate cycle inside the window poisons it: a poisoned batch publishes
//! `{0, 0}`, never an average computed from partial data. The poison clears
//! itself at the next batch start, so the pipeline self-heals each boundary.

use std::time::{Duration, Instant};

use crate::averager::CycleAverage;
use crate::config::Settings;
use crate::shared::Measurement;

/// Single-pass statistics over the valid samples of the current batch.
///
/// Unlike the cycle accumulator this keeps running across cycle boundaries
/// within the same batch; it backs the DC-corrected fallback RMS when a batch
/// completes without a single full cycle.
#[derive(Debug, Default, Clone)]
pub struct BatchAccumulator {
    samples: u32,
    sum_mv: f64,
    sum_sq_mv: f64,
    valid: bool,
}

impl BatchAccumulator {
    /// Fold one frame of valid samples into the batch statistics.
    pub fn add_frame(&mut self, frame_mv: &[u32]) {
        for &mv in frame_mv {
            let v = f64::from(mv);
            self.sum_mv += v;
            self.sum_sq_mv += v * v;
        }
        self.samples += frame_mv.len() as u32;
    }

    /// Valid samples accumulated this batch.
    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// Whether the batch is still publishable.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Invalidate the batch for the remainder of the window.
    pub fn poison(&mut self) {
        self.valid = false;
    }

    /// AC-coupled RMS over the whole batch, variance clamped at zero.
    pub fn rms_mv(&self) -> f32 {
        if self.samples == 0 {
            return 0.0;
        }
        let n = f64::from(self.samples);
        let mean = self.sum_mv / n;
        let variance = (self.sum_sq_mv / n - mean * mean).max(0.0);
        variance.sqrt() as f32
    }

    /// Reset to an empty, valid batch.
    pub fn reset(&mut self) {
        self.samples = 0;
        self.sum_mv = 0.0;
        self.sum_sq_mv = 0.0;
        self.valid = true;
    }
}

/// What a completed batch resolved to.
///
/// The register protocol flattens this to two `u16` fields, which makes
/// "no cycle detected" and a genuine DC input indistinguishable on the wire;
/// the tri-state exists so logs and in-process consumers keep the
/// distinction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BatchOutcome {
    /// An error or degenerate condition invalidated the window.
    Poisoned,
    /// Valid samples but no full cycle: amplitude only.
    DcOnly {
        /// DC-corrected RMS over the whole batch, in millivolts.
        rms_mv: u16,
    },
    /// The rolling cycle average.
    Averaged {
        /// Mean frequency over the averaging window, in Hz.
        frequency_hz: u16,
        /// Mean RMS over the averaging window, in millivolts.
        rms_mv: u16,
    },
}

impl BatchOutcome {
    /// The measurement this outcome publishes.
    pub fn measurement(self) -> Measurement {
        match self {
            BatchOutcome::Poisoned => Measurement::default(),
            BatchOutcome::DcOnly { rms_mv } => Measurement {
                frequency_hz: 0,
                rms_millivolts: rms_mv,
            },
            BatchOutcome::Averaged {
                frequency_hz,
                rms_mv,
            } => Measurement {
                frequency_hz,
                rms_millivolts: rms_mv,
            },
        }
    }
}

fn round_to_u16(value: f32) -> u16 {
    value.round().clamp(0.0, f32::from(u16::MAX)) as u16
}

/// Groups acquisition into fixed-size batches aligned to a wall-clock cadence.
pub struct BatchController {
    max_samples_per_batch: u32,
    target_interval: Duration,
    batch_start: Instant,
    acc: BatchAccumulator,
}

impl BatchController {
    /// Build a controller from the processing settings.
    pub fn new(settings: &Settings) -> Self {
        let mut acc = BatchAccumulator::default();
        acc.reset();
        Self {
            max_samples_per_batch: settings.max_samples_per_batch(),
            target_interval: settings.target_batch_interval(),
            batch_start: Instant::now(),
            acc,
        }
    }

    /// Configured samples per batch.
    pub fn max_samples_per_batch(&self) -> u32 {
        self.max_samples_per_batch
    }

    /// Fold a frame of valid samples into the current batch.
    pub fn note_frame(&mut self, frame_mv: &[u32]) {
        self.acc.add_frame(frame_mv);
    }

    /// Poison the current batch.
    pub fn poison(&mut self) {
        self.acc.poison();
    }

    /// Whether the batch is still publishable.
    pub fn is_valid(&self) -> bool {
        self.acc.is_valid()
    }

    /// Whether enough valid samples have accumulated to complete the batch.
    pub fn is_complete(&self) -> bool {
        self.acc.samples() >= self.max_samples_per_batch
    }

    /// Resolve the completed batch into an outcome.
    ///
    /// `cycle_average` is the ring average when at least one cycle completed
    /// this batch, `None` otherwise. Does not reset any state; callers
    /// publish the outcome and then call [`BatchController::begin`].
    pub fn conclude(&self, cycle_average: Option<CycleAverage>) -> BatchOutcome {
        if !self.acc.is_valid() {
            return BatchOutcome::Poisoned;
        }
        match cycle_average {
            Some(avg) => BatchOutcome::Averaged {
                frequency_hz: round_to_u16(avg.frequency_hz),
                rms_mv: round_to_u16(avg.rms_mv),
            },
            None => BatchOutcome::DcOnly {
                rms_mv: round_to_u16(self.acc.rms_mv()),
            },
        }
    }

    /// Wall-clock time since the batch started.
    pub fn elapsed(&self) -> Duration {
        self.batch_start.elapsed()
    }

    /// Configured cadence between batch starts.
    pub fn target_interval(&self) -> Duration {
        self.target_interval
    }

    /// Slack remaining before the target cadence, `None` once overrun.
    pub fn slack(&self) -> Option<Duration> {
        self.target_interval.checked_sub(self.elapsed()).filter(|d| !d.is_zero())
    }

    /// Start the next batch: clear the accumulator, re-arm the poison flag,
    /// and record the new batch start time.
    pub fn begin(&mut self) {
        self.acc.reset();
        self.batch_start = Instant::now();
    }
}
