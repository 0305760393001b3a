//! Calibration stimulus synthesis
//!
//! Two stimulus kinds are supported:
//! - a ramped pure tone
//! - band-limited Gaussian noise, RMS-normalized, attenuated, filtered by a
//!   6th-order Butterworth high-pass/low-pass cascade and ramped
//!
//! Both synthesizers are pure functions of their settings (and, for noise,
//! of the random generator's state).

use crate::domain::audio::{self, DeviceId, PlaybackRequest};
use crate::domain::dsp::{
    self, apply_ramps, attenuate, attenuation_gain, normalize_rms, octave_band_edges,
    sample_count, sosfilt, Butterworth, DspError,
};
use crate::domain::params::{ParamId, ParameterStore};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use std::f64::consts::PI;
use std::fmt;
use thiserror::Error;
use tracing::{debug, instrument};

/// Order of each Butterworth stage in the noise band-pass
pub const FILTER_ORDER: usize = 6;

/// Errors raised before or during synthesis
#[derive(Debug, Error, PartialEq)]
pub enum SynthesisError {
    /// A band edge lies at or above Nyquist, or at or below 0 Hz
    #[error(
        "invalid bandpass range for given sample rate: {low}-{high} Hz (Nyquist is {nyquist} Hz)"
    )]
    InvalidBand { low: f64, high: f64, nyquist: f64 },

    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(f64),

    #[error("Invalid duration: {0} s")]
    InvalidDuration(f64),

    #[error("Filter error: {0}")]
    Filter(#[from] DspError),

    /// Synthesis produced NaN or infinite samples
    #[error("Synthesized signal is not finite")]
    NonFiniteOutput,
}

pub type Result<T> = std::result::Result<T, SynthesisError>;

/// Kind of stimulus a play action produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StimulusKind {
    Tone,
    Noise,
}

impl fmt::Display for StimulusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StimulusKind::Tone => f.write_str("tone"),
            StimulusKind::Noise => f.write_str("noise"),
        }
    }
}

fn check_timing(duration_s: f64, sample_rate_hz: f64) -> Result<()> {
    if !(sample_rate_hz.is_finite() && sample_rate_hz > 0.0) {
        return Err(SynthesisError::InvalidSampleRate(sample_rate_hz));
    }
    if !(duration_s.is_finite() && duration_s >= 0.0) {
        return Err(SynthesisError::InvalidDuration(duration_s));
    }
    Ok(())
}

// ============================================================================
// TONE
// ============================================================================

/// Synthesize a ramped sine tone
///
/// `sample[i] = amplitude * sin(2 pi f i / fs)` for `i` in
/// `0..round(duration_s * fs)`, followed by the 20 ms onset/offset ramps.
/// Signals shorter than two ramps get overlapping ramps.
pub fn synthesize_tone(
    frequency_hz: f64,
    amplitude: f64,
    duration_s: f64,
    sample_rate_hz: f64,
) -> Vec<f64> {
    let len = sample_count(duration_s, sample_rate_hz);
    let step = 2.0 * PI * frequency_hz / sample_rate_hz;

    let mut signal: Vec<f64> = (0..len)
        .map(|i| amplitude * (step * i as f64).sin())
        .collect();
    apply_ramps(&mut signal, sample_rate_hz);

    debug!(frequency_hz, amplitude, samples = len, "Synthesized tone");
    signal
}

/// Tone parameters as read from the store
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneSettings {
    pub frequency_hz: f64,
    /// `(0, 1]` is a linear scale; `<= 0` is dB relative to full scale
    pub amplitude: f64,
    pub duration_s: f64,
}

impl Default for ToneSettings {
    fn default() -> Self {
        Self {
            frequency_hz: 1000.0,
            amplitude: 1.0,
            duration_s: 10.0,
        }
    }
}

impl ToneSettings {
    pub fn from_params(params: &ParameterStore) -> Self {
        Self {
            frequency_hz: params.get_f64(ParamId::ToneFrequency),
            amplitude: params.get_f64(ParamId::ToneAmplitude),
            duration_s: params.get_f64(ParamId::ToneDuration),
        }
    }

    /// Amplitude as a linear scale factor
    pub fn linear_amplitude(&self) -> f64 {
        if self.amplitude > 0.0 {
            self.amplitude
        } else {
            attenuation_gain(-self.amplitude)
        }
    }

    /// Validate timing and synthesize
    pub fn synthesize(&self, sample_rate_hz: f64) -> Result<Vec<f64>> {
        check_timing(self.duration_s, sample_rate_hz)?;
        Ok(synthesize_tone(
            self.frequency_hz,
            self.linear_amplitude(),
            self.duration_s,
            sample_rate_hz,
        ))
    }
}

// ============================================================================
// NOISE
// ============================================================================

/// Zero-mean, unit-variance Gaussian noise
pub fn white_noise<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<f64> {
    (0..len)
        .map(|_| -> f64 { StandardNormal.sample(&mut *rng) })
        .collect()
}

/// Band edges for `center_hz`/`bandwidth_oct`, checked against Nyquist
pub fn checked_band_edges(
    center_hz: f64,
    bandwidth_oct: f64,
    sample_rate_hz: f64,
) -> Result<(f64, f64)> {
    let nyquist = sample_rate_hz / 2.0;
    let (low, high) = octave_band_edges(center_hz, bandwidth_oct);
    let in_range = |edge: f64| edge > 0.0 && edge < nyquist;
    if !(in_range(low) && in_range(high)) {
        return Err(SynthesisError::InvalidBand { low, high, nyquist });
    }
    Ok((low, high))
}

/// Synthesize band-limited noise
///
/// Steps, in order: Gaussian white noise of `round(duration_s * fs)`
/// samples, RMS normalization to `rms`, attenuation by `attenuation_db`,
/// 6th-order Butterworth high-pass at the lower band edge, 6th-order
/// low-pass at the upper edge, onset/offset ramps. Each filter runs as a
/// cascade of second-order sections.
///
/// The band is checked before any noise is drawn, so an invalid band leaves
/// `rng` untouched.
#[instrument(skip(rng))]
pub fn synthesize_noise<R: Rng + ?Sized>(
    center_hz: f64,
    bandwidth_oct: f64,
    rms: f64,
    attenuation_db: f64,
    duration_s: f64,
    sample_rate_hz: f64,
    rng: &mut R,
) -> Result<Vec<f64>> {
    check_timing(duration_s, sample_rate_hz)?;
    let (low, high) = checked_band_edges(center_hz, bandwidth_oct, sample_rate_hz)?;

    let nyquist = sample_rate_hz / 2.0;
    let high_pass = Butterworth::high_pass(FILTER_ORDER, low / nyquist).sections()?;
    let low_pass = Butterworth::low_pass(FILTER_ORDER, high / nyquist).sections()?;
    debug!(low, high, "Designed noise band-pass");

    let mut signal = white_noise(sample_count(duration_s, sample_rate_hz), rng);
    normalize_rms(&mut signal, rms);
    attenuate(&mut signal, attenuation_db);
    sosfilt(&high_pass, &mut signal)?;
    sosfilt(&low_pass, &mut signal)?;
    apply_ramps(&mut signal, sample_rate_hz);

    if !signal.iter().all(|s| s.is_finite()) {
        return Err(SynthesisError::NonFiniteOutput);
    }

    debug!(samples = signal.len(), out_rms = dsp::rms(&signal), "Synthesized noise");
    Ok(signal)
}

/// Noise parameters as read from the store
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseSettings {
    pub center_hz: f64,
    pub bandwidth_oct: f64,
    pub rms: f64,
    pub attenuation_db: f64,
    pub duration_s: f64,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            center_hz: 1000.0,
            bandwidth_oct: 0.333333,
            rms: 0.18,
            attenuation_db: 0.0,
            duration_s: 10.0,
        }
    }
}

impl NoiseSettings {
    pub fn from_params(params: &ParameterStore) -> Self {
        Self {
            center_hz: params.get_f64(ParamId::NoiseCenter),
            bandwidth_oct: params.get_f64(ParamId::NoiseBandwidth),
            rms: params.get_f64(ParamId::NoiseRms),
            attenuation_db: params.get_f64(ParamId::NoiseAttenuation),
            duration_s: params.get_f64(ParamId::NoiseDuration),
        }
    }

    /// Lower and upper band edges in Hz
    pub fn band_edges(&self) -> (f64, f64) {
        octave_band_edges(self.center_hz, self.bandwidth_oct)
    }

    pub fn synthesize<R: Rng + ?Sized>(&self, sample_rate_hz: f64, rng: &mut R) -> Result<Vec<f64>> {
        synthesize_noise(
            self.center_hz,
            self.bandwidth_oct,
            self.rms,
            self.attenuation_db,
            self.duration_s,
            sample_rate_hz,
            rng,
        )
    }
}

// ============================================================================
// DEVICE AND STIMULUS
// ============================================================================

/// Output device parameters as read from the store
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceSettings {
    pub device: DeviceId,
    /// Whole Hz: the rate both synthesis and the output stream run at
    pub sample_rate_hz: f64,
    pub channels: i64,
    /// 1-based
    pub output_channel: i64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            device: DeviceId::new(0),
            sample_rate_hz: 44100.0,
            channels: 2,
            output_channel: 1,
        }
    }
}

impl DeviceSettings {
    pub fn from_params(params: &ParameterStore) -> Self {
        Self {
            device: DeviceId::new(params.get_int(ParamId::DeviceId).max(0) as usize),
            sample_rate_hz: params.get_f64(ParamId::SampleRate).round(),
            channels: params.get_int(ParamId::Channels),
            output_channel: params.get_int(ParamId::OutputChannel),
        }
    }

    /// Package a synthesized waveform for the playback backend
    pub fn playback_request(&self, waveform: &[f64]) -> audio::Result<PlaybackRequest> {
        PlaybackRequest::new(
            self.device,
            self.channels,
            self.output_channel,
            self.sample_rate_hz,
            waveform,
        )
    }
}

/// A fully specified stimulus, ready to render
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stimulus {
    Tone(ToneSettings),
    Noise(NoiseSettings),
}

impl Stimulus {
    /// Read the settings for `kind` from the store
    pub fn from_params(kind: StimulusKind, params: &ParameterStore) -> Self {
        match kind {
            StimulusKind::Tone => Stimulus::Tone(ToneSettings::from_params(params)),
            StimulusKind::Noise => Stimulus::Noise(NoiseSettings::from_params(params)),
        }
    }

    pub fn kind(&self) -> StimulusKind {
        match self {
            Stimulus::Tone(_) => StimulusKind::Tone,
            Stimulus::Noise(_) => StimulusKind::Noise,
        }
    }

    pub fn render<R: Rng + ?Sized>(&self, sample_rate_hz: f64, rng: &mut R) -> Result<Vec<f64>> {
        match self {
            Stimulus::Tone(tone) => tone.synthesize(sample_rate_hz),
            Stimulus::Noise(noise) => noise.synthesize(sample_rate_hz, rng),
        }
    }

    /// Status line shown while this stimulus plays
    pub fn playing_status(&self) -> String {
        match self {
            Stimulus::Tone(_) => "Playing tone...".to_string(),
            Stimulus::Noise(noise) => {
                let (low, high) = noise.band_edges();
                format!("Playing noise; {}-{} Hz", low, high)
            }
        }
    }

    /// Status line shown once playback has run to the end
    pub fn finished_status(&self) -> String {
        format!("Played {}", self.kind())
    }
}
