//! The shared result register.
//!
//! The latest published measurement crosses the task boundary through a
//! single `AtomicU32` holding both fields, so the bus-responder side always
//! reads a consistent frequency/RMS pair without taking a lock. The writer
//! (the acquisition task, at batch boundaries) stores with `Release`; readers
//! load with `Acquire`. Neither side can block the other, which keeps the
//! reader safe to call from an interrupt-like context without priority
//! inversion.
//!
//! The 4-byte little-endian wire layout `[freq_lo, freq_hi, rms_lo, rms_hi]`
//! is a compatibility contract with the downstream bus master.

use std::sync::atomic::{AtomicU32, Ordering};

/// The latest published frequency and RMS reading.
///
/// `frequency_hz == 0` doubles as the "no cycle detected this batch" marker;
/// a true 0 Hz (DC) input is represented identically by design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Measurement {
    /// Averaged fundamental frequency, in Hz.
    pub frequency_hz: u16,
    /// Averaged RMS voltage, in millivolts.
    pub rms_millivolts: u16,
}

impl Measurement {
    /// Serialize into the fixed 4-byte little-endian bus format.
    pub fn to_wire(self) -> [u8; 4] {
        let f = self.frequency_hz.to_le_bytes();
        let r = self.rms_millivolts.to_le_bytes();
        [f[0], f[1], r[0], r[1]]
    }

    /// Parse the 4-byte little-endian bus format.
    pub fn from_wire(bytes: [u8; 4]) -> Self {
        Self {
            frequency_hz: u16::from_le_bytes([bytes[0], bytes[1]]),
            rms_millivolts: u16::from_le_bytes([bytes[2], bytes[3]]),
        }
    }

    fn pack(self) -> u32 {
        u32::from(self.frequency_hz) | (u32::from(self.rms_millivolts) << 16)
    }

    fn unpack(word: u32) -> Self {
        Self {
            frequency_hz: (word & 0xFFFF) as u16,
            rms_millivolts: (word >> 16) as u16,
        }
    }
}

/// Lock-free last-value register for the published measurement.
///
/// Single writer (the acquisition task), any number of readers. Created once
/// at process start with zeroed defaults; no history is retained.
#[derive(Debug, Default)]
pub struct SharedMeasurement {
    word: AtomicU32,
}

impl SharedMeasurement {
    /// New register holding the zeroed default measurement.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a new measurement as one indivisible store.
    pub fn publish(&self, measurement: Measurement) {
        self.word.store(measurement.pack(), Ordering::Release);
    }

    /// Read the latest measurement. Never blocks.
    pub fn get(&self) -> Measurement {
        Measurement::unpack(self.word.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn starts_zeroed() {
        let shared = SharedMeasurement::new();
        assert_eq!(shared.get(), Measurement::default());
    }

    #[test]
    fn publish_then_get() {
        let shared = SharedMeasurement::new();
        let m = Measurement {
            frequency_hz: 50,
            rms_millivolts: 1000,
        };
        shared.publish(m);
        assert_eq!(shared.get(), m);
    }

    #[test]
    fn wire_format_is_little_endian_pairs() {
        let m = Measurement {
            frequency_hz: 0x0201,
            rms_millivolts: 0x03E8,
        };
        assert_eq!(m.to_wire(), [0x01, 0x02, 0xE8, 0x03]);
        assert_eq!(Measurement::from_wire(m.to_wire()), m);
    }

    #[test]
    fn concurrent_reads_see_consistent_pairs() {
        let shared = Arc::new(SharedMeasurement::new());

        // The writer only ever publishes pairs where rms == freq + 1; a torn
        // read would break that relation.
        shared.publish(Measurement {
            frequency_hz: 0,
            rms_millivolts: 1,
        });
        let writer = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                for i in 0..10_000u16 {
                    shared.publish(Measurement {
                        frequency_hz: i,
                        rms_millivolts: i.wrapping_add(1),
                    });
                }
            })
        };
        let reader = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                for _ in 0..10_000 {
                    let m = shared.get();
                    assert_eq!(m.rms_millivolts, m.frequency_hz.wrapping_add(1));
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
    }
}
