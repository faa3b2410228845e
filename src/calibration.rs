//! Raw-count-to-millivolts calibration.
//!
//! The core consumes calibration as a capability: anything implementing
//! [`Calibration`] can back the sample converter. The provided
//! [`LinearCalibration`] applies the two scalar correction constants the
//! characterization workflow produces (`mv = raw * scale + offset`).
//! Constants are read-only from the pipeline's perspective after boot.
//!
//! [`CalibrationConstants`] doubles as the on-disk format: a small TOML file
//! loaded at boot and rewritten on demand by the (external) calibration
//! capture workflow.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppResult, MeterError};

/// Converts a raw sample count to a voltage in millivolts.
///
/// Must be deterministic and side-effect-free; the pipeline calls it once per
/// valid sample.
pub trait Calibration: Send + Sync {
    /// Calibrated voltage for `raw_count`, in millivolts.
    fn to_millivolts(&self, raw_count: u16) -> u32;
}

/// The scalar correction constants applied to raw counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConstants {
    /// Millivolts per raw count.
    pub scale_mv_per_count: f64,
    /// Offset added after scaling, in millivolts. May be negative.
    pub offset_mv: f64,
}

impl Default for CalibrationConstants {
    fn default() -> Self {
        // 12-bit full scale mapped onto a 2500 mV input range.
        Self {
            scale_mv_per_count: 2500.0 / 4095.0,
            offset_mv: 0.0,
        }
    }
}

impl CalibrationConstants {
    /// Load constants from a TOML file.
    pub fn load(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| MeterError::Calibration(format!("{}: {e}", path.display())))
    }

    /// Persist constants to a TOML file.
    pub fn save(&self, path: &Path) -> AppResult<()> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| MeterError::Calibration(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

/// Linear calibration: `mv = raw * scale + offset`, clamped at zero.
#[derive(Debug, Clone)]
pub struct LinearCalibration {
    constants: CalibrationConstants,
}

impl LinearCalibration {
    /// Build a calibration from the given constants.
    pub fn new(constants: CalibrationConstants) -> Self {
        Self { constants }
    }

    /// The constants in effect.
    pub fn constants(&self) -> CalibrationConstants {
        self.constants
    }
}

impl Calibration for LinearCalibration {
    fn to_millivolts(&self, raw_count: u16) -> u32 {
        let mv = f64::from(raw_count) * self.constants.scale_mv_per_count
            + self.constants.offset_mv;
        // A miscalibrated negative offset must not wrap into a huge voltage.
        mv.round().max(0.0) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1:1 counts-to-millivolts calibration, handy for tests.
    pub(crate) fn unity() -> LinearCalibration {
        LinearCalibration::new(CalibrationConstants {
            scale_mv_per_count: 1.0,
            offset_mv: 0.0,
        })
    }

    #[test]
    fn linear_conversion() {
        let cal = LinearCalibration::new(CalibrationConstants {
            scale_mv_per_count: 0.5,
            offset_mv: 100.0,
        });
        assert_eq!(cal.to_millivolts(0), 100);
        assert_eq!(cal.to_millivolts(2000), 1100);
    }

    #[test]
    fn negative_result_clamps_to_zero() {
        let cal = LinearCalibration::new(CalibrationConstants {
            scale_mv_per_count: 0.5,
            offset_mv: -500.0,
        });
        assert_eq!(cal.to_millivolts(10), 0);
    }

    #[test]
    fn unity_is_identity() {
        assert_eq!(unity().to_millivolts(1234), 1234);
    }

    #[test]
    fn constants_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calibration.toml");

        let constants = CalibrationConstants {
            scale_mv_per_count: 0.6105,
            offset_mv: -12.5,
        };
        constants.save(&path).unwrap();

        let loaded = CalibrationConstants::load(&path).unwrap();
        assert_eq!(loaded, constants);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = CalibrationConstants::load(Path::new("/nonexistent/calibration.toml"))
            .unwrap_err();
        assert!(matches!(err, MeterError::Io(_)));
    }
}
