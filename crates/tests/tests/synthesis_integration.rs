//! Integration tests for stimulus synthesis
//!
//! These tests drive synthesis the way a play action does: parameters come
//! from the store, waveforms are checked for length, level and spectrum.

use calibrate_core::domain::dsp::{self, attenuation_gain, octave_band_edges};
use calibrate_core::domain::params::{ParamId, ParameterStore};
use calibrate_core::domain::stimulus::{
    synthesize_noise, synthesize_tone, white_noise, NoiseSettings, Stimulus, StimulusKind,
    SynthesisError,
};
use calibrate_tests::band_energy;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::f64::consts::PI;

const FS: f64 = 44100.0;

// ============================================================================
// TONE
// ============================================================================

#[test]
fn test_tone_example_scenario() {
    let tone = synthesize_tone(1000.0, 1.0, 1.0, FS);

    assert_eq!(tone.len(), 44100);
    assert!(tone[0].abs() < 1e-12);
    let expected = (2.0 * PI * 1000.0 * 22050.0 / FS).sin();
    assert!((tone[22050] - expected).abs() < 1e-9);
}

#[test]
fn test_tone_rms_approaches_sine_rms() {
    let short = dsp::rms(&synthesize_tone(500.0, 0.8, 0.5, FS));
    let long = dsp::rms(&synthesize_tone(500.0, 0.8, 5.0, FS));
    let ideal = 0.8 / 2f64.sqrt();

    assert!(short < long);
    assert!(long < ideal);
    assert!((ideal - long) / ideal < 0.005);
}

#[test]
fn test_tone_energy_is_at_its_frequency() {
    let tone = synthesize_tone(2000.0, 1.0, 1.0, FS);
    let inside = band_energy(&tone, FS, 1900.0, 2100.0);
    let total = band_energy(&tone, FS, 0.0, FS / 2.0);
    assert!(inside / total > 0.97);
}

#[test]
fn test_tone_from_store_uses_db_amplitude() {
    let mut params = ParameterStore::new();
    params.set(ParamId::ToneAmplitude, "-8.686").unwrap();
    params.set(ParamId::ToneDuration, "0.5").unwrap();

    let mut rng = StdRng::seed_from_u64(0);
    let quiet = Stimulus::from_params(StimulusKind::Tone, &params)
        .render(FS, &mut rng)
        .unwrap();
    let full = synthesize_tone(1000.0, 1.0, 0.5, FS);

    let ratio = dsp::rms(&quiet) / dsp::rms(&full);
    assert!((ratio - (-1.0f64).exp()).abs() < 1e-9);
}

// ============================================================================
// NOISE
// ============================================================================

#[test]
fn test_noise_example_scenario() {
    let settings = NoiseSettings {
        center_hz: 1000.0,
        bandwidth_oct: 1.0 / 3.0,
        rms: 0.18,
        attenuation_db: 0.0,
        duration_s: 1.0,
    };
    let mut rng = StdRng::seed_from_u64(2024);
    let noise = settings.synthesize(FS, &mut rng).unwrap();

    assert_eq!(noise.len(), 44100);
    assert!(noise.iter().all(|s| s.is_finite()));
}

#[test]
fn test_noise_level_is_band_share_of_rms() {
    // Normalization happens on the broadband noise, so the band keeps the
    // share of power that falls between its edges
    let (low, high) = octave_band_edges(1000.0, 1.0 / 3.0);
    let expected = 0.18 * ((high - low) / (FS / 2.0)).sqrt();

    for seed in [1, 2, 3, 4] {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = synthesize_noise(1000.0, 1.0 / 3.0, 0.18, 0.0, 1.0, FS, &mut rng).unwrap();
        let ratio = dsp::rms(&noise) / expected;
        assert!((ratio - 1.0).abs() < 0.15, "seed {} ratio {}", seed, ratio);
    }
}

#[test]
fn test_low_calibration_bands_stay_bounded() {
    for (center, fs) in [(20.0, 44100.0), (25.0, 44100.0), (31.5, 96000.0)] {
        let mut rng = StdRng::seed_from_u64(1);
        let noise = synthesize_noise(center, 1.0 / 3.0, 0.18, 0.0, 2.0, fs, &mut rng).unwrap();
        let (low, high) = octave_band_edges(center, 1.0 / 3.0);

        let peak = noise.iter().fold(0.0f64, |m, s| m.max(s.abs()));
        assert!(peak < 1.0, "center {} fs {} peak {}", center, fs, peak);

        let inside = band_energy(&noise, fs, low, high);
        let above = band_energy(&noise, fs, high * 2.0, fs / 2.0);
        assert!(inside > 10.0 * above, "center {} inside {} above {}", center, inside, above);
    }
}

#[test]
fn test_noise_level_stages() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut stage = white_noise(44100, &mut rng);

    dsp::normalize_rms(&mut stage, 0.18);
    assert!((dsp::rms(&stage) - 0.18).abs() < 1e-12);

    dsp::attenuate(&mut stage, 12.0);
    let expected = 0.18 * (-12.0f64 / 8.6860).exp();
    assert!((dsp::rms(&stage) - expected).abs() < 1e-12);
}

#[test]
fn test_noise_is_band_limited() {
    let mut rng = StdRng::seed_from_u64(99);
    let noise = synthesize_noise(1000.0, 1.0 / 3.0, 0.18, 0.0, 1.0, FS, &mut rng).unwrap();
    let (low, high) = octave_band_edges(1000.0, 1.0 / 3.0);
    assert_eq!((low, high), (891.0, 1122.0));

    let inside = band_energy(&noise, FS, low, high);
    // One octave beyond each edge, a 6th-order slope is 36 dB down
    let outside =
        band_energy(&noise, FS, 0.0, low / 2.0) + band_energy(&noise, FS, high * 2.0, FS / 2.0);

    assert!(inside > 100.0 * outside, "inside {} outside {}", inside, outside);
}

#[test]
fn test_noise_band_follows_center() {
    let mut rng = StdRng::seed_from_u64(5);
    let noise = synthesize_noise(4000.0, 1.0, 0.18, 0.0, 1.0, FS, &mut rng).unwrap();
    let (low, high) = octave_band_edges(4000.0, 1.0);

    let inside = band_energy(&noise, FS, low, high);
    let around_1k = band_energy(&noise, FS, 800.0, 1250.0);
    assert!(inside > 100.0 * around_1k);
}

#[test]
fn test_noise_attenuation_scales_output() {
    let plain = synthesize_noise(1000.0, 1.0, 0.18, 0.0, 0.5, FS, &mut StdRng::seed_from_u64(4))
        .unwrap();
    let quiet = synthesize_noise(1000.0, 1.0, 0.18, 10.0, 0.5, FS, &mut StdRng::seed_from_u64(4))
        .unwrap();

    let ratio = dsp::rms(&quiet) / dsp::rms(&plain);
    assert!((ratio - attenuation_gain(10.0)).abs() < 1e-9);
}

#[test]
fn test_noise_rejects_band_beyond_nyquist_at_low_rate() {
    let mut params = ParameterStore::new();
    params.set(ParamId::SampleRate, "8000").unwrap();
    params.set(ParamId::NoiseCenter, "3800").unwrap();

    let mut rng = StdRng::seed_from_u64(0);
    let err = Stimulus::from_params(StimulusKind::Noise, &params)
        .render(params.get_f64(ParamId::SampleRate), &mut rng)
        .unwrap_err();

    assert!(matches!(err, SynthesisError::InvalidBand { nyquist, .. } if nyquist == 4000.0));
}

#[test]
fn test_synthesis_is_repeatable() {
    let params = ParameterStore::new();
    let noise = Stimulus::from_params(StimulusKind::Noise, &params);

    let a = noise.render(8000.0, &mut StdRng::seed_from_u64(77)).unwrap();
    let b = noise.render(8000.0, &mut StdRng::seed_from_u64(77)).unwrap();
    assert_eq!(a, b);

    let tone = Stimulus::from_params(StimulusKind::Tone, &params);
    let mut rng = StdRng::seed_from_u64(0);
    assert_eq!(tone.render(8000.0, &mut rng).unwrap(), tone.render(8000.0, &mut rng).unwrap());
}

// ============================================================================
// PARAMETER STORE
// ============================================================================

#[test]
fn test_reset_round_trip_for_every_parameter() {
    let mut params = ParameterStore::new();
    for id in ParamId::ALL {
        params.set(id, "1").unwrap();
    }
    for id in ParamId::ALL {
        params.reset_to_default(id);
        assert_eq!(params.get(id), id.spec().default, "{}", id);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_noise_bounded_across_band_centers(
        fs in prop::sample::select(vec![8000.0, 22050.0, 44100.0, 48000.0, 96000.0]),
        position in 0.0f64..=1.0,
        seed in any::<u64>(),
    ) {
        let center = 20.0 + position * (0.4 * fs - 20.0);
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = synthesize_noise(center, 1.0 / 3.0, 0.18, 0.0, 0.25, fs, &mut rng).unwrap();

        prop_assert!(noise.iter().all(|s| s.is_finite()));
        let peak = noise.iter().fold(0.0f64, |m, s| m.max(s.abs()));
        prop_assert!(peak < 1.0, "center {} fs {} peak {}", center, fs, peak);
    }
}

proptest! {
    #[test]
    fn prop_noise_length(duration in 0.0f64..0.5, seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = synthesize_noise(1000.0, 1.0, 0.18, 0.0, duration, 16000.0, &mut rng).unwrap();
        prop_assert_eq!(noise.len(), (duration * 16000.0).round() as usize);
    }
}
