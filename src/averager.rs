//! Rolling average over the most recent completed cycles.
//!
//! [`CycleRing`] is a fixed-capacity circular buffer created once at task
//! start. Pushes overwrite the oldest entry on wraparound; the write index is
//! always in `[0, capacity)`. A separate batch-scoped counter tracks how many
//! cycles arrived since the last batch reset, saturating at capacity for the
//! "how many to average" decision only, so an average never includes slots
//! that were never written.

use crate::cycle::CompletedCycle;

/// Mean frequency and RMS over a window of completed cycles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleAverage {
    /// Mean frequency over the window, in Hz.
    pub frequency_hz: f32,
    /// Mean RMS over the window, in millivolts.
    pub rms_mv: f32,
}

/// Fixed-capacity ring of the most recent completed cycles.
pub struct CycleRing {
    entries: Vec<CompletedCycle>,
    capacity: usize,
    /// Next write position, always `< capacity`.
    index: usize,
    /// Cycles pushed since the last batch reset, saturating.
    seen_since_reset: usize,
}

impl CycleRing {
    /// Create a ring holding up to `capacity` cycles. The backing storage is
    /// allocated once and lives for the task's lifetime.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            index: 0,
            seen_since_reset: 0,
        }
    }

    /// Record a completed cycle, overwriting the oldest entry once full.
    pub fn push(&mut self, cycle: CompletedCycle) {
        if self.entries.len() < self.capacity {
            self.entries.push(cycle);
        } else {
            self.entries[self.index] = cycle;
        }
        self.index = (self.index + 1) % self.capacity;
        self.seen_since_reset = self.seen_since_reset.saturating_add(1);
    }

    /// How many entries the next batch average may span: cycles seen since
    /// the last batch reset, capped by what has actually been written.
    pub fn cycles_since_reset(&self) -> usize {
        self.seen_since_reset.min(self.entries.len())
    }

    /// Mean frequency and RMS over the most recent `k` entries.
    ///
    /// Returns `None` when `k == 0` (a valid state: the batch saw no full
    /// cycle) or when `k` exceeds the written entries.
    pub fn average_last(&self, k: usize) -> Option<CycleAverage> {
        if k == 0 || k > self.entries.len() {
            return None;
        }
        let mut sum_freq = 0.0f64;
        let mut sum_rms = 0.0f64;
        for back in 1..=k {
            let idx = (self.index + self.capacity - back) % self.capacity;
            let entry = self.entries[idx];
            sum_freq += f64::from(entry.frequency_hz);
            sum_rms += f64::from(entry.rms_mv);
        }
        Some(CycleAverage {
            frequency_hz: (sum_freq / k as f64) as f32,
            rms_mv: (sum_rms / k as f64) as f32,
        })
    }

    /// Start a new batch window. Entries stay in place (the ring keeps its
    /// history); only the batch-scoped counter resets.
    pub fn reset_batch(&mut self) {
        self.seen_since_reset = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycle(freq: f32, rms: f32) -> CompletedCycle {
        CompletedCycle {
            frequency_hz: freq,
            rms_mv: rms,
        }
    }

    #[test]
    fn empty_ring_has_no_average() {
        let ring = CycleRing::new(10);
        assert_eq!(ring.cycles_since_reset(), 0);
        assert!(ring.average_last(0).is_none());
    }

    #[test]
    fn partial_fill_averages_only_written_entries() {
        let mut ring = CycleRing::new(10);
        ring.push(cycle(50.0, 1000.0));
        ring.push(cycle(52.0, 1010.0));
        ring.push(cycle(48.0, 990.0));

        assert_eq!(ring.cycles_since_reset(), 3);
        let avg = ring.average_last(3).unwrap();
        assert!((avg.frequency_hz - 50.0).abs() < 1e-4);
        assert!((avg.rms_mv - 1000.0).abs() < 1e-2);

        // More than written is refused, never read from unwritten slots.
        assert!(ring.average_last(4).is_none());
    }

    #[test]
    fn wraparound_overwrites_oldest() {
        let mut ring = CycleRing::new(3);
        for i in 0..5 {
            ring.push(cycle(10.0 * (i + 1) as f32, 100.0));
        }
        // Entries now hold cycles 3, 4, 5 (30/40/50 Hz).
        let avg = ring.average_last(3).unwrap();
        assert!((avg.frequency_hz - 40.0).abs() < 1e-4);
    }

    #[test]
    fn batch_reset_caps_the_window() {
        let mut ring = CycleRing::new(10);
        for _ in 0..6 {
            ring.push(cycle(50.0, 1000.0));
        }
        ring.reset_batch();
        assert_eq!(ring.cycles_since_reset(), 0);

        ring.push(cycle(60.0, 500.0));
        ring.push(cycle(62.0, 510.0));
        assert_eq!(ring.cycles_since_reset(), 2);
        let avg = ring.average_last(ring.cycles_since_reset()).unwrap();
        assert!((avg.frequency_hz - 61.0).abs() < 1e-4);
    }

    #[test]
    fn seen_counter_saturates_at_capacity() {
        let mut ring = CycleRing::new(4);
        for _ in 0..100 {
            ring.push(cycle(50.0, 1000.0));
        }
        assert_eq!(ring.cycles_since_reset(), 4);
    }
}
