//! Simulated acquisition source.
//!
//! `MockAdc` stands in for the DMA-backed ADC peripheral in tests and in the
//! demo binary. It synthesizes a configurable waveform sample-by-sample at
//! the nominal rate (reads return instantly; the batch controller supplies
//! real-time pacing) and supports scripted fault injection so the read loop's
//! timeout, hardware-error, and channel-mismatch paths can be exercised
//! deterministically.
//!
//! Noise uses a seeded `ChaCha8Rng` so failure scenarios reproduce exactly
//! across runs.

use std::collections::VecDeque;
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::acquisition::{AcquisitionError, AcquisitionSource, RawSample};

/// Full-scale count of the simulated 12-bit converter.
const FULL_SCALE: f64 = 4095.0;

/// Waveform shapes the simulated source can produce, in raw counts.
#[derive(Debug, Clone, Copy)]
pub enum Waveform {
    /// A pure sine: `offset + amplitude * sin(2π f t)`.
    Sine {
        /// Fundamental frequency in Hz.
        frequency_hz: f64,
        /// Peak amplitude in counts.
        amplitude_counts: f64,
        /// DC offset in counts.
        offset_counts: f64,
    },
    /// A linear ramp from `from_counts` down to `to_counts` over
    /// `duration_samples`, holding the final value afterwards. Produces
    /// amplitude without a single upward crossing.
    RampDown {
        /// Starting level in counts.
        from_counts: f64,
        /// Final level in counts.
        to_counts: f64,
        /// Samples over which the ramp descends.
        duration_samples: u64,
    },
    /// A constant DC level.
    Constant {
        /// Level in counts.
        counts: f64,
    },
}

impl Waveform {
    fn value_at(&self, sample_index: u64, sample_rate_hz: u32) -> f64 {
        match *self {
            Waveform::Sine {
                frequency_hz,
                amplitude_counts,
                offset_counts,
            } => {
                let t = sample_index as f64 / f64::from(sample_rate_hz);
                offset_counts
                    + amplitude_counts * (2.0 * std::f64::consts::PI * frequency_hz * t).sin()
            }
            Waveform::RampDown {
                from_counts,
                to_counts,
                duration_samples,
            } => {
                let progress =
                    (sample_index as f64 / duration_samples.max(1) as f64).min(1.0);
                from_counts + (to_counts - from_counts) * progress
            }
            Waveform::Constant { counts } => counts,
        }
    }
}

/// A fault consumed by the next `read_frame` call, one per read.
#[derive(Debug, Clone)]
pub enum ReadFault {
    /// Report a read timeout.
    TimedOut,
    /// Report a driver fault.
    Hardware(String),
    /// Deliver a full frame tagged with the wrong channel.
    WrongChannel,
    /// Deliver an empty frame (zero samples read).
    Empty,
}

/// Configuration for the simulated source.
#[derive(Debug, Clone)]
pub struct MockAdcConfig {
    /// Nominal sample rate in Hz.
    pub sample_rate_hz: u32,
    /// Channel tag stamped on produced samples.
    pub channel: u8,
    /// Samples produced per read (capped by the caller's buffer).
    pub samples_per_read: usize,
    /// Signal shape.
    pub waveform: Waveform,
    /// Uniform noise amplitude in counts (0 disables noise).
    pub noise_counts: f64,
    /// RNG seed for reproducible noise; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for MockAdcConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 25_000,
            channel: 4,
            samples_per_read: 512,
            waveform: Waveform::Sine {
                frequency_hz: 50.0,
                amplitude_counts: 1414.2,
                offset_counts: 2000.0,
            },
            noise_counts: 0.0,
            seed: None,
        }
    }
}

/// Simulated DMA-fed ADC source.
pub struct MockAdc {
    config: MockAdcConfig,
    rng: ChaCha8Rng,
    faults: VecDeque<ReadFault>,
    sample_index: u64,
    started: bool,
}

impl MockAdc {
    /// Build a source from its configuration.
    pub fn new(config: MockAdcConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            config,
            rng,
            faults: VecDeque::new(),
            sample_index: 0,
            started: false,
        }
    }

    /// Queue faults to be consumed by subsequent reads, in order.
    pub fn inject_faults(&mut self, faults: impl IntoIterator<Item = ReadFault>) {
        self.faults.extend(faults);
    }

    /// Total samples generated so far.
    pub fn samples_generated(&self) -> u64 {
        self.sample_index
    }

    fn next_raw_count(&mut self) -> u16 {
        let mut value = self
            .config
            .waveform
            .value_at(self.sample_index, self.config.sample_rate_hz);
        if self.config.noise_counts > 0.0 {
            value += self
                .rng
                .gen_range(-self.config.noise_counts..=self.config.noise_counts);
        }
        self.sample_index += 1;
        value.round().clamp(0.0, FULL_SCALE) as u16
    }

    fn fill(&mut self, buf: &mut [RawSample], channel: u8) -> usize {
        let n = self.config.samples_per_read.min(buf.len());
        for i in 0..n {
            let raw_count = self.next_raw_count();
            buf[i] = RawSample { channel, raw_count };
        }
        n
    }
}

impl AcquisitionSource for MockAdc {
    fn start(&mut self) -> Result<(), AcquisitionError> {
        self.started = true;
        Ok(())
    }

    fn read_frame(
        &mut self,
        buf: &mut [RawSample],
        _timeout: Duration,
    ) -> Result<usize, AcquisitionError> {
        if !self.started {
            return Err(AcquisitionError::Hardware(
                "read before start".to_string(),
            ));
        }

        if let Some(fault) = self.faults.pop_front() {
            return match fault {
                ReadFault::TimedOut => Err(AcquisitionError::TimedOut),
                ReadFault::Hardware(message) => Err(AcquisitionError::Hardware(message)),
                ReadFault::WrongChannel => {
                    let wrong = self.config.channel.wrapping_add(1);
                    Ok(self.fill(buf, wrong))
                }
                ReadFault::Empty => Ok(0),
            };
        }

        let channel = self.config.channel;
        Ok(self.fill(buf, channel))
    }
}
