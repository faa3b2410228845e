//! CLI entry point.
//!
//! Runs the measurement pipeline against the simulated acquisition source and
//! a reader thread standing in for the bus responder. Hardware builds swap
//! the source behind [`signal_daq::acquisition::AcquisitionSource`]; the rest
//! of the pipeline is identical.
//!
//! ```bash
//! signal_daq --frequency-hz 50 --amplitude-mv-rms 1000
//! ```

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use signal_daq::calibration::{CalibrationConstants, LinearCalibration};
use signal_daq::config::Settings;
use signal_daq::convert::SampleConverter;
use signal_daq::logging;
use signal_daq::mock_adc::{MockAdc, MockAdcConfig, Waveform};
use signal_daq::pipeline::Pipeline;
use signal_daq::shared::SharedMeasurement;

#[derive(Parser)]
#[command(name = "signal-daq")]
#[command(about = "Continuous waveform frequency/RMS measurement service", long_about = None)]
struct Cli {
    /// Configuration name under config/ (default: "default").
    #[arg(long)]
    config: Option<String>,

    /// Simulated waveform frequency in Hz.
    #[arg(long, default_value = "50.0")]
    frequency_hz: f64,

    /// Simulated waveform amplitude in mV RMS.
    #[arg(long, default_value = "1000.0")]
    amplitude_mv_rms: f64,

    /// Simulated uniform noise amplitude in raw counts.
    #[arg(long, default_value = "0.0")]
    noise_counts: f64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::new(cli.config.as_deref())?;
    logging::init(&settings.log_level)?;

    let constants = load_calibration(&settings)?;
    let calibration = LinearCalibration::new(constants);
    info!(
        scale_mv_per_count = constants.scale_mv_per_count,
        offset_mv = constants.offset_mv,
        "calibration loaded"
    );

    // Simulated source: express the requested mV amplitude in raw counts
    // through the inverse of the calibration scale.
    let amplitude_counts =
        cli.amplitude_mv_rms * std::f64::consts::SQRT_2 / constants.scale_mv_per_count;
    let offset_counts = 2048.0;
    let source = MockAdc::new(MockAdcConfig {
        sample_rate_hz: settings.acquisition.sample_rate_hz,
        channel: settings.acquisition.channel,
        samples_per_read: settings.acquisition.frame_capacity,
        waveform: Waveform::Sine {
            frequency_hz: cli.frequency_hz,
            amplitude_counts,
            offset_counts,
        },
        noise_counts: cli.noise_counts,
        seed: None,
    });

    let shared = Arc::new(SharedMeasurement::new());
    let converter = SampleConverter::new(Arc::new(calibration), settings.acquisition.channel);
    let mut pipeline = Pipeline::new(source, converter, Arc::clone(&shared), &settings);

    pipeline
        .start()
        .context("failed to start acquisition source")?;

    let acquisition = thread::Builder::new()
        .name("acquisition".to_string())
        .spawn(move || pipeline.run())
        .context("failed to spawn acquisition thread")?;

    // Stand-in for the bus responder: read the register once per second and
    // log the 4-byte frame it would serve.
    let responder = {
        let shared = Arc::clone(&shared);
        thread::Builder::new()
            .name("bus-responder".to_string())
            .spawn(move || loop {
                thread::sleep(Duration::from_secs(1));
                let measurement = shared.get();
                info!(
                    frequency_hz = measurement.frequency_hz,
                    rms_mv = measurement.rms_millivolts,
                    wire = ?measurement.to_wire(),
                    "register read"
                );
            })
            .context("failed to spawn responder thread")?
    };

    if acquisition.join().is_err() {
        error!("acquisition thread panicked");
    }
    drop(responder);
    Ok(())
}

fn load_calibration(settings: &Settings) -> Result<CalibrationConstants> {
    if let Some(path) = &settings.calibration.file {
        if path.exists() {
            return CalibrationConstants::load(path)
                .with_context(|| format!("loading calibration from {}", path.display()));
        }
    }
    let defaults = CalibrationConstants::default();
    Ok(CalibrationConstants {
        scale_mv_per_count: settings
            .calibration
            .scale_mv_per_count
            .unwrap_or(defaults.scale_mv_per_count),
        offset_mv: settings.calibration.offset_mv.unwrap_or(defaults.offset_mv),
    })
}
