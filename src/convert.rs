//! Channel validation and sample conversion.
//!
//! Maps each raw sample to millivolts through the calibration provider, but
//! only when its channel tag matches the configured acquisition channel.
//! Samples from any other channel are invalid: they are excluded from all
//! statistics while still counting toward the raw read.

use std::sync::Arc;

use crate::acquisition::RawSample;
use crate::calibration::Calibration;

/// Converts raw samples to calibrated millivolts, dropping channel mismatches.
#[derive(Clone)]
pub struct SampleConverter {
    calibration: Arc<dyn Calibration>,
    channel: u8,
}

impl SampleConverter {
    /// Build a converter bound to the configured acquisition channel.
    pub fn new(calibration: Arc<dyn Calibration>, channel: u8) -> Self {
        Self {
            calibration,
            channel,
        }
    }

    /// Calibrated millivolts for `sample`, or `None` when the sample was
    /// tagged for a different channel.
    pub fn convert(&self, sample: RawSample) -> Option<u32> {
        if sample.channel != self.channel {
            return None;
        }
        Some(self.calibration.to_millivolts(sample.raw_count))
    }

    /// The channel this converter accepts.
    pub fn channel(&self) -> u8 {
        self.channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{CalibrationConstants, LinearCalibration};

    fn converter(channel: u8) -> SampleConverter {
        let cal = LinearCalibration::new(CalibrationConstants {
            scale_mv_per_count: 1.0,
            offset_mv: 0.0,
        });
        SampleConverter::new(Arc::new(cal), channel)
    }

    #[test]
    fn matching_channel_converts() {
        let c = converter(4);
        let sample = RawSample {
            channel: 4,
            raw_count: 1500,
        };
        assert_eq!(c.convert(sample), Some(1500));
    }

    #[test]
    fn mismatched_channel_is_invalid() {
        let c = converter(4);
        let sample = RawSample {
            channel: 3,
            raw_count: 1500,
        };
        assert_eq!(c.convert(sample), None);
    }
}
