//! The long-lived acquisition and processing loop.
//!
//! One task owns the whole measurement path: it polls the acquisition source
//! for frames, converts and validates samples, runs cycle detection, folds
//! completed cycles into the rolling average, and lets the batch controller
//! decide what to publish into the shared register at each batch boundary.
//! All accumulators are local state threaded through this loop; the injected
//! [`SharedMeasurement`] handle is the only state that crosses the task
//! boundary.
//!
//! The loop is designed to run unattended indefinitely: read failures poison
//! the current batch and are retried with backoff, the batch boundary resets
//! the poison flag, and nothing allocates after construction except the
//! per-frame cycle list.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::acquisition::{AcquisitionError, AcquisitionSource, RawSample};
use crate::averager::CycleRing;
use crate::batch::{BatchController, BatchOutcome};
use crate::config::Settings;
use crate::convert::SampleConverter;
use crate::cycle::CycleDetector;
use crate::error::AppResult;
use crate::shared::SharedMeasurement;

/// Consecutive timeouts after which the read backoff escalates.
pub const TIMEOUT_ESCALATION_THRESHOLD: u32 = 10;

/// Consecutive timeouts at which a hardware-attention alarm is logged.
pub const TIMEOUT_ALARM_THRESHOLD: u32 = 20;

/// Successful reads between periodic health log lines.
const HEALTH_LOG_INTERVAL: u64 = 1000;

/// Safety margin subtracted from the theoretical frame time when spacing
/// drain reads, so the drain never falls behind the converter.
const DRAIN_SAFETY_MARGIN: Duration = Duration::from_millis(2);

/// The acquisition/processing task.
///
/// Generic over the source so tests and the demo binary can drive it with
/// [`crate::mock_adc::MockAdc`] while a hardware build supplies a real
/// driver.
pub struct Pipeline<S: AcquisitionSource> {
    source: S,
    converter: SampleConverter,
    detector: CycleDetector,
    ring: CycleRing,
    controller: BatchController,
    shared: Arc<SharedMeasurement>,

    read_timeout: Duration,
    read_yield: Duration,
    timeout_backoff: Duration,
    timeout_backoff_long: Duration,
    hardware_backoff: Duration,
    frame_time: Duration,

    frame_buf: Vec<RawSample>,
    mv_buf: Vec<u32>,

    consecutive_timeouts: u32,
    total_successful_reads: u64,
    batches_published: u64,
}

impl<S: AcquisitionSource> Pipeline<S> {
    /// Assemble the pipeline from its collaborators and settings.
    pub fn new(
        source: S,
        converter: SampleConverter,
        shared: Arc<SharedMeasurement>,
        settings: &Settings,
    ) -> Self {
        Self {
            source,
            converter,
            detector: CycleDetector::new(settings.acquisition.sample_rate_hz),
            ring: CycleRing::new(settings.processing.cycles_to_average),
            controller: BatchController::new(settings),
            shared,
            read_timeout: settings.read_timeout(),
            read_yield: Duration::from_millis(settings.acquisition.read_yield_ms),
            timeout_backoff: Duration::from_millis(settings.acquisition.timeout_backoff_ms),
            timeout_backoff_long: Duration::from_millis(
                settings.acquisition.timeout_backoff_long_ms,
            ),
            hardware_backoff: Duration::from_millis(settings.acquisition.hardware_backoff_ms),
            frame_time: settings.frame_acquisition_time(),
            frame_buf: vec![RawSample::default(); settings.acquisition.frame_capacity],
            mv_buf: Vec::with_capacity(settings.acquisition.frame_capacity),
            consecutive_timeouts: 0,
            total_successful_reads: 0,
            batches_published: 0,
        }
    }

    /// Start continuous acquisition. Failure here is fatal to the process;
    /// there is no automatic re-initialization later.
    pub fn start(&mut self) -> AppResult<()> {
        self.source.start()?;
        info!(
            max_samples_per_batch = self.controller.max_samples_per_batch(),
            "acquisition started"
        );
        Ok(())
    }

    /// Run the loop forever. Only returns on a panic-free unreachable path;
    /// all read failures are absorbed with backoff.
    pub fn run(&mut self) {
        self.run_batches(u64::MAX);
    }

    /// Drive the loop until `batches` batch publications have occurred.
    /// Used by tests and bounded runs; `run` passes `u64::MAX`.
    pub fn run_batches(&mut self, batches: u64) {
        let target = self.batches_published.saturating_add(batches);
        while self.batches_published < target {
            self.step();
            if !self.read_yield.is_zero() {
                thread::sleep(self.read_yield);
            }
        }
    }

    /// Batches published since construction.
    pub fn batches_published(&self) -> u64 {
        self.batches_published
    }

    /// One read-loop iteration: a single frame read plus any batch boundary
    /// it triggers.
    fn step(&mut self) {
        match self.source.read_frame(&mut self.frame_buf, self.read_timeout) {
            Ok(n) => {
                self.consecutive_timeouts = 0;
                self.total_successful_reads += 1;
                if self.total_successful_reads % HEALTH_LOG_INTERVAL == 0 {
                    debug!(
                        reads = self.total_successful_reads,
                        batches = self.batches_published,
                        "read-loop health"
                    );
                }
                self.process_frame(n);
            }
            Err(AcquisitionError::TimedOut) => {
                self.consecutive_timeouts += 1;
                self.controller.poison();
                if self.consecutive_timeouts == 1 || self.consecutive_timeouts % 5 == 0 {
                    warn!(
                        consecutive = self.consecutive_timeouts,
                        "acquisition read timed out"
                    );
                }
                if self.consecutive_timeouts == TIMEOUT_ALARM_THRESHOLD {
                    error!(
                        consecutive = self.consecutive_timeouts,
                        "persistent acquisition timeouts; hardware may need attention"
                    );
                }
                let backoff = if self.consecutive_timeouts > TIMEOUT_ESCALATION_THRESHOLD {
                    self.timeout_backoff_long
                } else {
                    self.timeout_backoff
                };
                thread::sleep(backoff);
            }
            Err(AcquisitionError::Hardware(message)) => {
                self.controller.poison();
                error!(error = %message, "acquisition read error");
                thread::sleep(self.hardware_backoff);
            }
        }

        if self.controller.is_complete() {
            self.finish_batch();
        }
    }

    /// Convert, detect, and accumulate one successfully read frame.
    fn process_frame(&mut self, n: usize) {
        self.mv_buf.clear();
        for sample in &self.frame_buf[..n] {
            if let Some(mv) = self.converter.convert(*sample) {
                self.mv_buf.push(mv);
            }
        }

        if self.mv_buf.is_empty() {
            // Covers both an empty read and a frame tagged entirely for the
            // wrong channel; no usable samples means the window cannot be
            // trusted.
            warn!(raw_samples = n, "frame contained no valid samples");
            self.controller.poison();
            return;
        }

        let frame_cycles = self.detector.process_frame(&self.mv_buf);
        if frame_cycles.degenerate > 0 {
            warn!(
                count = frame_cycles.degenerate,
                "degenerate cycle discarded"
            );
            self.controller.poison();
        }
        for cycle in frame_cycles.completed {
            self.ring.push(cycle);
        }

        self.controller.note_frame(&self.mv_buf);
    }

    /// Publish the batch outcome, reset per-batch state, and hold the cadence.
    fn finish_batch(&mut self) {
        let k = self.ring.cycles_since_reset();
        let outcome = self.controller.conclude(self.ring.average_last(k));
        let measurement = outcome.measurement();
        self.shared.publish(measurement);
        self.batches_published += 1;

        match outcome {
            BatchOutcome::Averaged { .. } => info!(
                frequency_hz = measurement.frequency_hz,
                rms_mv = measurement.rms_millivolts,
                cycles = k,
                "batch published"
            ),
            BatchOutcome::DcOnly { .. } => info!(
                rms_mv = measurement.rms_millivolts,
                "batch published without cycles (amplitude only)"
            ),
            BatchOutcome::Poisoned => warn!("batch poisoned; published zero measurement"),
        }

        self.ring.reset_batch();
        self.detector.reset();

        if self.controller.slack().is_some() {
            self.drain_slack();
        } else {
            let overrun = self
                .controller
                .elapsed()
                .saturating_sub(self.controller.target_interval());
            if !overrun.is_zero() {
                warn!(overrun_ms = overrun.as_millis() as u64, "batch interval overrun");
            }
        }

        self.controller.begin();
    }

    /// Spend remaining batch slack on drain reads so the hardware's DMA
    /// queue cannot back up while the pipeline would otherwise idle. Drained
    /// frames are discarded; reads are spaced by the theoretical per-frame
    /// acquisition time minus a small safety margin.
    fn drain_slack(&mut self) {
        let spacing = self.frame_time.saturating_sub(DRAIN_SAFETY_MARGIN);
        let mut drained = 0u32;
        while let Some(remaining) = self.controller.slack() {
            let timeout = self.read_timeout.min(remaining);
            match self.source.read_frame(&mut self.frame_buf, timeout) {
                Ok(_) => drained += 1,
                Err(AcquisitionError::TimedOut) => {}
                Err(AcquisitionError::Hardware(message)) => {
                    error!(error = %message, "acquisition error during drain");
                    break;
                }
            }
            if let Some(remaining) = self.controller.slack() {
                thread::sleep(spacing.min(remaining));
            }
        }
        debug!(drained, "drained acquisition backlog during batch slack");
    }
}
