//! Zero-crossing cycle detection and per-cycle metrics.
//!
//! A cycle is one full waveform period, delimited by two consecutive upward
//! crossings of a dynamic threshold. The threshold is the mean voltage of the
//! current acquisition frame, recomputed once per frame: this keeps the
//! detector centered as the DC offset drifts with temperature or supply,
//! without a separate mean-calibration step. The accepted cost is a small
//! detection bias when a frame boundary falls mid-cycle.
//!
//! Metrics are computed with single-pass accumulators so the detector runs
//! indefinitely in constant memory. RMS uses the AC-coupled form
//! `sqrt(mean(x^2) - mean(x)^2)` with the variance clamped at zero before the
//! square root, so rounding at very low amplitude yields zero rather than NaN.

/// Frequency and RMS of one completed waveform cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletedCycle {
    /// Fundamental frequency, `sample_rate / samples_in_cycle`.
    pub frequency_hz: f32,
    /// AC-coupled RMS voltage over the cycle, in millivolts.
    pub rms_mv: f32,
}

/// Online accumulator for the cycle currently in progress.
///
/// Reset in place on every completed cycle and at each batch start; never
/// reallocated.
#[derive(Debug, Default, Clone)]
pub struct CycleAccumulator {
    samples: u32,
    sum_mv: f64,
    sum_sq_mv: f64,
}

impl CycleAccumulator {
    /// Fold one sample into the running sums.
    pub fn add(&mut self, mv: f64) {
        self.samples += 1;
        self.sum_mv += mv;
        self.sum_sq_mv += mv * mv;
    }

    /// Samples accumulated since the last reset.
    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// Reset to empty, keeping the allocation-free representation.
    pub fn reset(&mut self) {
        self.samples = 0;
        self.sum_mv = 0.0;
        self.sum_sq_mv = 0.0;
    }

    /// Close the cycle and compute its metrics.
    ///
    /// Returns `None` for a degenerate cycle (one sample or fewer): that
    /// indicates threshold noise or a detector fault rather than a real
    /// low-amplitude cycle, and the caller poisons the batch instead of
    /// recording it.
    pub fn complete(&self, sample_rate_hz: u32) -> Option<CompletedCycle> {
        if self.samples <= 1 {
            return None;
        }
        let n = f64::from(self.samples);
        let period_seconds = n / f64::from(sample_rate_hz);
        let frequency_hz = if period_seconds > 1e-6 {
            1.0 / period_seconds
        } else {
            0.0
        };
        let mean = self.sum_mv / n;
        let variance = (self.sum_sq_mv / n - mean * mean).max(0.0);
        Some(CompletedCycle {
            frequency_hz: frequency_hz as f32,
            rms_mv: variance.sqrt() as f32,
        })
    }
}

/// Cycles detected in one frame.
#[derive(Debug, Default)]
pub struct FrameCycles {
    /// Cycles completed within the frame, in detection order.
    pub completed: Vec<CompletedCycle>,
    /// Degenerate cycles discarded within the frame. Any non-zero count
    /// poisons the enclosing batch.
    pub degenerate: u32,
}

/// Detects upward threshold crossings and produces per-cycle metrics.
pub struct CycleDetector {
    sample_rate_hz: u32,
    /// Whether an upward crossing has opened a cycle that the next upward
    /// crossing will close.
    cycle_open: bool,
    /// Previous sample, `None` until the first sample of a batch arrives.
    last_sample_mv: Option<i64>,
    acc: CycleAccumulator,
}

impl CycleDetector {
    /// New detector for the given sample rate.
    pub fn new(sample_rate_hz: u32) -> Self {
        Self {
            sample_rate_hz,
            cycle_open: false,
            last_sample_mv: None,
            acc: CycleAccumulator::default(),
        }
    }

    /// Run detection over one frame of valid converted samples.
    ///
    /// The dynamic threshold for the whole frame is the frame's mean voltage.
    /// Every sample is accumulated before the crossing check, so the sample
    /// that triggers a completion still belongs to the cycle it closes.
    pub fn process_frame(&mut self, frame_mv: &[u32]) -> FrameCycles {
        let mut out = FrameCycles::default();
        if frame_mv.is_empty() {
            return out;
        }

        let threshold =
            frame_mv.iter().map(|&mv| f64::from(mv)).sum::<f64>() / frame_mv.len() as f64;

        for &mv in frame_mv {
            let current = i64::from(mv);
            let last = self.last_sample_mv.unwrap_or(current);

            self.acc.add(mv as f64);

            let above_now = current as f64 >= threshold;
            let above_before = last as f64 >= threshold;

            if above_now != above_before && above_now {
                // Rising edge. Close the open cycle, or open one on the
                // first edge and drop the pre-edge samples from the
                // accumulator so they do not stretch the first period.
                if self.cycle_open {
                    match self.acc.complete(self.sample_rate_hz) {
                        Some(cycle) => out.completed.push(cycle),
                        None => out.degenerate += 1,
                    }
                } else {
                    self.cycle_open = true;
                }
                self.acc.reset();
            }
            // Falling edges need no bookkeeping: the open cycle stays open
            // until the next rising edge closes it.

            self.last_sample_mv = Some(current);
        }

        out
    }

    /// Reset all per-cycle state at a batch boundary.
    pub fn reset(&mut self) {
        self.cycle_open = false;
        self.last_sample_mv = None;
        self.acc.reset();
    }
}
