//! End-to-end pipeline tests against the simulated acquisition source.
//!
//! These exercise the published behavior of whole batches: the nominal
//! sine-measurement scenario, the poisoned-batch paths, and the
//! amplitude-only fallback when a batch completes without a single cycle.

use std::sync::Arc;

use signal_daq::calibration::{CalibrationConstants, LinearCalibration};
use signal_daq::config::Settings;
use signal_daq::convert::SampleConverter;
use signal_daq::mock_adc::{MockAdc, MockAdcConfig, ReadFault, Waveform};
use signal_daq::pipeline::Pipeline;
use signal_daq::shared::{Measurement, SharedMeasurement};

/// 1:1 counts-to-millivolts calibration so raw counts read as millivolts.
fn unity_calibration() -> LinearCalibration {
    LinearCalibration::new(CalibrationConstants {
        scale_mv_per_count: 1.0,
        offset_mv: 0.0,
    })
}

fn build(
    settings: &Settings,
    adc: MockAdc,
) -> (Pipeline<MockAdc>, Arc<SharedMeasurement>) {
    let shared = Arc::new(SharedMeasurement::new());
    let converter =
        SampleConverter::new(Arc::new(unity_calibration()), settings.acquisition.channel);
    let pipeline = Pipeline::new(adc, converter, Arc::clone(&shared), settings);
    (pipeline, shared)
}

/// Settings sized for quick batches: 1 kHz rate, 80 valid samples per batch.
fn fast_settings() -> Settings {
    let mut settings = Settings::default();
    settings.acquisition.sample_rate_hz = 1000;
    settings.acquisition.frame_capacity = 40;
    settings.acquisition.read_yield_ms = 0;
    settings.acquisition.timeout_backoff_ms = 1;
    settings.acquisition.timeout_backoff_long_ms = 1;
    settings.acquisition.hardware_backoff_ms = 1;
    settings.processing.cycles_to_average = 2;
    settings.processing.min_expected_freq_hz = 25;
    settings.processing.target_batch_interval_ms = 0;
    settings
}

fn fast_sine_adc() -> MockAdc {
    MockAdc::new(MockAdcConfig {
        sample_rate_hz: 1000,
        channel: 4,
        samples_per_read: 40,
        waveform: Waveform::Sine {
            frequency_hz: 50.0,
            amplitude_counts: 1000.0,
            offset_counts: 1500.0,
        },
        noise_counts: 0.0,
        seed: Some(1),
    })
}

#[test]
fn reference_scenario_50hz_1000mv_rms() {
    // 25 kHz sample rate, 50 Hz pure sine, 1000 mV RMS, 10-cycle window,
    // batch sized for 25 cycles at the minimum expected frequency.
    let mut settings = Settings::default();
    settings.acquisition.read_yield_ms = 0;
    settings.processing.target_batch_interval_ms = 0;
    settings.validate().unwrap();
    assert_eq!(settings.max_samples_per_batch(), 12_500);

    let amplitude_peak = 1000.0 * std::f64::consts::SQRT_2;
    let adc = MockAdc::new(MockAdcConfig {
        sample_rate_hz: 25_000,
        channel: settings.acquisition.channel,
        samples_per_read: 512,
        waveform: Waveform::Sine {
            frequency_hz: 50.0,
            amplitude_counts: amplitude_peak,
            offset_counts: 2000.0,
        },
        noise_counts: 0.0,
        seed: Some(1),
    });

    let (mut pipeline, shared) = build(&settings, adc);
    pipeline.start().unwrap();
    pipeline.run_batches(1);

    let m = shared.get();
    assert!(
        (49..=51).contains(&m.frequency_hz),
        "frequency {} Hz out of tolerance",
        m.frequency_hz
    );
    assert!(
        (990..=1010).contains(&m.rms_millivolts),
        "rms {} mV out of tolerance",
        m.rms_millivolts
    );
}

#[test]
fn timeout_inside_batch_publishes_zeroes() {
    let settings = fast_settings();
    let mut adc = fast_sine_adc();
    adc.inject_faults([ReadFault::TimedOut]);

    let (mut pipeline, shared) = build(&settings, adc);
    pipeline.start().unwrap();
    pipeline.run_batches(1);

    assert_eq!(shared.get(), Measurement::default());
}

#[test]
fn hardware_error_inside_batch_publishes_zeroes() {
    let settings = fast_settings();
    let mut adc = fast_sine_adc();
    adc.inject_faults([ReadFault::Hardware("dma overrun".into())]);

    let (mut pipeline, shared) = build(&settings, adc);
    pipeline.start().unwrap();
    pipeline.run_batches(1);

    assert_eq!(shared.get(), Measurement::default());
}

#[test]
fn wrong_channel_frame_poisons_batch() {
    let settings = fast_settings();
    let mut adc = fast_sine_adc();
    adc.inject_faults([ReadFault::WrongChannel]);

    let (mut pipeline, shared) = build(&settings, adc);
    pipeline.start().unwrap();
    pipeline.run_batches(1);

    // The mismatched frame yields zero valid samples, so the whole window is
    // untrusted even though later frames were clean.
    assert_eq!(shared.get(), Measurement::default());
}

#[test]
fn batch_without_cycles_publishes_dc_rms() {
    let settings = fast_settings();
    // A falling ramp has amplitude but never an upward crossing: 3000 down
    // to 1000 counts over 200 samples, 10 counts per sample.
    let adc = MockAdc::new(MockAdcConfig {
        sample_rate_hz: 1000,
        channel: 4,
        samples_per_read: 40,
        waveform: Waveform::RampDown {
            from_counts: 3000.0,
            to_counts: 1000.0,
            duration_samples: 200,
        },
        noise_counts: 0.0,
        seed: Some(1),
    });

    let (mut pipeline, shared) = build(&settings, adc);
    pipeline.start().unwrap();
    pipeline.run_batches(1);

    let m = shared.get();
    assert_eq!(m.frequency_hz, 0, "no frequency must be reported");
    // 80 batch samples stepping down 10 counts each: DC-corrected RMS is
    // sqrt(step^2 * (n^2 - 1) / 12) = 230.9 mV.
    assert!(
        (229..=233).contains(&m.rms_millivolts),
        "rms {} mV out of tolerance",
        m.rms_millivolts
    );
}

#[test]
fn consecutive_batches_stay_stable() {
    let settings = fast_settings();
    let (mut pipeline, shared) = build(&settings, fast_sine_adc());
    pipeline.start().unwrap();

    for _ in 0..5 {
        pipeline.run_batches(1);
        let m = shared.get();
        assert!(
            (49..=51).contains(&m.frequency_hz),
            "frequency {} Hz drifted",
            m.frequency_hz
        );
        assert!(
            (690..=720).contains(&m.rms_millivolts),
            "rms {} mV drifted",
            m.rms_millivolts
        );
    }
    assert_eq!(pipeline.batches_published(), 5);
}
