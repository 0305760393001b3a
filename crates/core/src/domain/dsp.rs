//! Digital signal processing building blocks for stimulus synthesis
//!
//! This module provides:
//! - Hanning windows and the fixed 20 ms onset/offset ramps
//! - RMS measurement, RMS normalization and dB attenuation
//! - Octave-band edge computation
//! - Butterworth filter design, as a transfer function or as cascaded
//!   second-order sections
//! - Direct-form IIR filtering and biquad cascades
//!
//! Everything works on `f64` buffers. Synthesis runs once per play action,
//! not in a real-time callback, so precision wins over throughput here.

use num_complex::Complex64;
use std::f64::consts::PI;
use thiserror::Error;
use tracing::trace;

/// Errors raised while designing or applying filters
#[derive(Debug, Error, PartialEq)]
pub enum DspError {
    /// Normalized cutoff must lie strictly between 0 and 1 (1 = Nyquist)
    #[error("Invalid normalized cutoff {0}: must be in (0, 1)")]
    InvalidCutoff(f64),

    #[error("Invalid filter order {0}")]
    InvalidOrder(usize),

    /// Leading denominator coefficient is zero
    #[error("Filter denominator a[0] must be non-zero")]
    ZeroDenominator,

    /// A pole lies on or outside the unit circle
    #[error("Unstable filter: pole radius {0}")]
    UnstablePole(f64),
}

pub type Result<T> = std::result::Result<T, DspError>;

/// Length of each onset/offset ramp in seconds
pub const RAMP_SECONDS: f64 = 0.02;

/// Divisor converting dB to a natural-log exponent: `gain = exp(-dB / DB_PER_NEPER)`
pub const DB_PER_NEPER: f64 = 8.6860;

/// Number of samples for `duration_s` at `sample_rate_hz`
pub fn sample_count(duration_s: f64, sample_rate_hz: f64) -> usize {
    (duration_s * sample_rate_hz).round().max(0.0) as usize
}

// ============================================================================
// WINDOWS AND RAMPS
// ============================================================================

/// Symmetric Hanning window: `0.5 - 0.5 cos(2 pi n / (len - 1))`
pub fn hanning(len: usize) -> Vec<f64> {
    match len {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let denom = (len - 1) as f64;
            (0..len)
                .map(|n| 0.5 - 0.5 * (2.0 * PI * n as f64 / denom).cos())
                .collect()
        }
    }
}

/// Ramp length in samples for the given sample rate
pub fn ramp_len(sample_rate_hz: f64) -> usize {
    (RAMP_SECONDS * sample_rate_hz).round().max(0.0) as usize
}

/// Apply the raised-cosine onset and offset ramps in place
///
/// With `r = ramp_len(sample_rate_hz)` and `w = hanning(2r)`, the first `r`
/// samples are multiplied by `w[..r]` and the last `r - 1` samples by the
/// last `r - 1` values of `w`. Signals shorter than a ramp are ramped as far
/// as they reach; when the two ramps overlap both gains apply.
pub fn apply_ramps(signal: &mut [f64], sample_rate_hz: f64) {
    let r = ramp_len(sample_rate_hz);
    if r == 0 || signal.is_empty() {
        return;
    }

    let window = hanning(2 * r);
    let len = signal.len();

    for (sample, gain) in signal.iter_mut().zip(&window[..r]) {
        *sample *= gain;
    }

    let tail = (r - 1).min(len);
    let tail_gains = &window[window.len() - (r - 1)..];
    for (sample, gain) in signal[len - tail..]
        .iter_mut()
        .zip(&tail_gains[tail_gains.len() - tail..])
    {
        *sample *= gain;
    }

    trace!(ramp = r, len, "Applied onset/offset ramps");
}

// ============================================================================
// LEVELS
// ============================================================================

/// Root-mean-square amplitude (0 for an empty signal)
pub fn rms(signal: &[f64]) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = signal.iter().map(|&s| s * s).sum();
    (sum_sq / signal.len() as f64).sqrt()
}

/// Scale `signal` so its RMS equals `target`
///
/// A silent signal has no defined scale factor and is left untouched.
pub fn normalize_rms(signal: &mut [f64], target: f64) {
    let current = rms(signal);
    if current == 0.0 {
        return;
    }
    let scale = target / current;
    for sample in signal.iter_mut() {
        *sample *= scale;
    }
}

/// Linear gain for an attenuation of `attenuation_db`
pub fn attenuation_gain(attenuation_db: f64) -> f64 {
    (-attenuation_db / DB_PER_NEPER).exp()
}

/// Attenuate `signal` in place by `attenuation_db`
pub fn attenuate(signal: &mut [f64], attenuation_db: f64) {
    let gain = attenuation_gain(attenuation_db);
    for sample in signal.iter_mut() {
        *sample *= gain;
    }
}

/// Lower and upper edges (rounded to whole Hz) of a band `bandwidth_oct`
/// octaves wide, centered geometrically on `center_hz`
pub fn octave_band_edges(center_hz: f64, bandwidth_oct: f64) -> (f64, f64) {
    let half = bandwidth_oct / 2.0;
    let low = (center_hz * 2.0_f64.powf(-half)).round();
    let high = (center_hz * 2.0_f64.powf(half)).round();
    (low, high)
}

// ============================================================================
// BUTTERWORTH DESIGN
// ============================================================================

/// Response shape of a designed filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    LowPass,
    HighPass,
}

/// Transfer function coefficients, highest power first
///
/// `y[n] = (b[0] x[n] + ... + b[M] x[n-M] - a[1] y[n-1] - ... - a[N] y[n-N]) / a[0]`
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCoeffs {
    pub b: Vec<f64>,
    pub a: Vec<f64>,
}

impl FilterCoeffs {
    /// Complex frequency response at `omega` radians per sample
    pub fn response(&self, omega: f64) -> Complex64 {
        let z_inv = Complex64::from_polar(1.0, -omega);
        let eval = |coeffs: &[f64]| {
            coeffs
                .iter()
                .rev()
                .fold(Complex64::new(0.0, 0.0), |acc, &c| acc * z_inv + c)
        };
        eval(self.b.as_slice()) / eval(self.a.as_slice())
    }

    /// Magnitude response at `freq_hz` for a filter running at `sample_rate_hz`
    pub fn gain_at(&self, freq_hz: f64, sample_rate_hz: f64) -> f64 {
        self.response(2.0 * PI * freq_hz / sample_rate_hz).norm()
    }
}

/// Digital Butterworth filter specification
///
/// The cutoff is normalized so that 1.0 is the Nyquist frequency. Design goes
/// analog prototype -> frequency transform -> bilinear transform, with the
/// cutoff pre-warped so the -3 dB point lands exactly on the requested
/// frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Butterworth {
    pub order: usize,
    pub cutoff: f64,
    pub kind: FilterKind,
}

impl Butterworth {
    pub fn low_pass(order: usize, cutoff: f64) -> Self {
        Self {
            order,
            cutoff,
            kind: FilterKind::LowPass,
        }
    }

    pub fn high_pass(order: usize, cutoff: f64) -> Self {
        Self {
            order,
            cutoff,
            kind: FilterKind::HighPass,
        }
    }

    /// Compute the transfer function coefficients
    ///
    /// A single high-order polynomial loses precision when the cutoff is a
    /// small fraction of Nyquist; filter signals with [`Butterworth::sections`].
    pub fn design(&self) -> Result<FilterCoeffs> {
        let zpk = self.zpk()?;

        let b = poly(&zpk.zeros)
            .into_iter()
            .map(|c| c.re * zpk.gain)
            .collect();
        let a = poly(&zpk.poles).into_iter().map(|c| c.re).collect();

        trace!(order = self.order, cutoff = self.cutoff, kind = ?self.kind, "Designed Butterworth filter");
        Ok(FilterCoeffs { b, a })
    }

    /// Factor the filter into second-order sections
    ///
    /// Conjugate pole pairs share a section; an odd order leaves one
    /// first-order section. Each section has unit gain at DC (low-pass) or
    /// Nyquist (high-pass), so the cascade does too.
    pub fn sections(&self) -> Result<Vec<BiquadCoeffs>> {
        let zpk = self.zpk()?;
        let n = zpk.poles.len();
        // Butterworth gain is exactly 1 at the pass-band reference
        let reference = match self.kind {
            FilterKind::LowPass => 1.0,
            FilterKind::HighPass => -1.0,
        };

        let mut sections = Vec::with_capacity(n.div_ceil(2));
        for k in 0..n / 2 {
            let pole = zpk.poles[k];
            let zero = zpk.zeros[k].re;
            sections.push(BiquadCoeffs::normalized_at(
                [1.0, -2.0 * zero, zero * zero],
                [-2.0 * pole.re, pole.norm_sqr()],
                reference,
            ));
        }
        if n % 2 == 1 {
            let pole = zpk.poles[n / 2].re;
            let zero = zpk.zeros[n / 2].re;
            sections.push(BiquadCoeffs::normalized_at([1.0, -zero, 0.0], [-pole, 0.0], reference));
        }

        trace!(order = n, cutoff = self.cutoff, kind = ?self.kind, "Designed Butterworth sections");
        Ok(sections)
    }

    /// Digital zeros, poles and gain
    ///
    /// Poles come out ordered so that `poles[k]` and `poles[n - 1 - k]` are
    /// conjugates, with the real pole (odd orders) in the middle.
    fn zpk(&self) -> Result<Zpk> {
        if self.order == 0 {
            return Err(DspError::InvalidOrder(self.order));
        }
        if !(self.cutoff > 0.0 && self.cutoff < 1.0) {
            return Err(DspError::InvalidCutoff(self.cutoff));
        }

        let n = self.order;
        // Analog prototype: poles on the left half of the unit circle, no zeros, unit gain
        let prototype: Vec<Complex64> = (0..n)
            .map(|k| {
                let m = (2 * k) as f64 - (n as f64 - 1.0);
                -Complex64::from_polar(1.0, PI * m / (2.0 * n as f64))
            })
            .collect();

        // Bilinear transform runs at fs = 2 so that the cutoff is relative to Nyquist
        let fs2 = 4.0;
        let warped = fs2 * (PI * self.cutoff / 2.0).tan();

        let (zeros, poles, gain) = match self.kind {
            FilterKind::LowPass => {
                let poles: Vec<Complex64> = prototype.iter().map(|p| *p * warped).collect();
                (Vec::new(), poles, warped.powi(n as i32))
            }
            FilterKind::HighPass => {
                let prod_neg: Complex64 = prototype.iter().map(|p| -*p).product();
                let poles: Vec<Complex64> = prototype.iter().map(|p| warped / *p).collect();
                (vec![Complex64::new(0.0, 0.0); n], poles, prod_neg.inv().re)
            }
        };

        let num: Complex64 = zeros.iter().map(|z| fs2 - *z).product();
        let den: Complex64 = poles.iter().map(|p| fs2 - *p).product();
        let digital_gain = gain * (num / den).re;

        let mut digital_zeros: Vec<Complex64> =
            zeros.iter().map(|z| (fs2 + *z) / (fs2 - *z)).collect();
        digital_zeros.resize(poles.len(), Complex64::new(-1.0, 0.0));
        let digital_poles: Vec<Complex64> = poles.iter().map(|p| (fs2 + *p) / (fs2 - *p)).collect();

        Ok(Zpk {
            zeros: digital_zeros,
            poles: digital_poles,
            gain: digital_gain,
        })
    }
}

struct Zpk {
    zeros: Vec<Complex64>,
    poles: Vec<Complex64>,
    gain: f64,
}

/// Polynomial coefficients (highest power first) with the given roots
fn poly(roots: &[Complex64]) -> Vec<Complex64> {
    let mut coeffs = vec![Complex64::new(1.0, 0.0)];
    for root in roots {
        let mut next = vec![Complex64::new(0.0, 0.0); coeffs.len() + 1];
        for (i, c) in coeffs.iter().enumerate() {
            next[i] += *c;
            next[i + 1] -= *root * *c;
        }
        coeffs = next;
    }
    coeffs
}

// ============================================================================
// IIR FILTERING
// ============================================================================

/// Stateful IIR filter in transposed Direct Form II
///
/// Starts from rest (zero initial conditions), so filtering a whole buffer in
/// one call and in several consecutive calls gives identical output.
#[derive(Debug, Clone, PartialEq)]
pub struct IirFilter {
    b: Vec<f64>,
    a: Vec<f64>,
    state: Vec<f64>,
}

impl IirFilter {
    /// Create a filter, normalizing so that `a[0] == 1`
    pub fn new(coeffs: &FilterCoeffs) -> Result<Self> {
        let a0 = coeffs.a.first().copied().unwrap_or(0.0);
        if a0 == 0.0 {
            return Err(DspError::ZeroDenominator);
        }

        let len = coeffs.b.len().max(coeffs.a.len());
        let mut b: Vec<f64> = coeffs.b.iter().map(|c| c / a0).collect();
        let mut a: Vec<f64> = coeffs.a.iter().map(|c| c / a0).collect();
        b.resize(len, 0.0);
        a.resize(len, 0.0);

        Ok(Self {
            b,
            a,
            state: vec![0.0; len.saturating_sub(1)],
        })
    }

    /// Process a single sample
    #[inline]
    fn process_sample(&mut self, x: f64) -> f64 {
        let order = self.state.len();
        if order == 0 {
            return self.b[0] * x;
        }

        let y = self.b[0] * x + self.state[0];
        for i in 0..order - 1 {
            self.state[i] = self.b[i + 1] * x + self.state[i + 1] - self.a[i + 1] * y;
        }
        self.state[order - 1] = self.b[order] * x - self.a[order] * y;
        y
    }

    /// Process a buffer of samples in place
    pub fn process(&mut self, buffer: &mut [f64]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Reset filter state
    pub fn reset(&mut self) {
        self.state.fill(0.0);
    }
}

/// Filter `signal` in place with `coeffs`, starting from rest
pub fn lfilter(coeffs: &FilterCoeffs, signal: &mut [f64]) -> Result<()> {
    IirFilter::new(coeffs)?.process(signal);
    Ok(())
}

// ============================================================================
// SECOND-ORDER SECTIONS
// ============================================================================

/// Biquad filter coefficients
///
/// `y[n] = b0 x[n] + b1 x[n-1] + b2 x[n-2] - a1 y[n-1] - a2 y[n-2]`
/// (a0 is normalized to 1.0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        // Unity gain (no filtering)
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }
}

impl BiquadCoeffs {
    /// Scale the numerator so the gain at `z = reference` (1 or -1) is 1
    fn normalized_at(b: [f64; 3], a: [f64; 2], reference: f64) -> Self {
        let num = b[0] + b[1] * reference + b[2];
        let den = 1.0 + a[0] * reference + a[1];
        let scale = den / num;
        Self {
            b0: b[0] * scale,
            b1: b[1] * scale,
            b2: b[2] * scale,
            a1: a[0],
            a2: a[1],
        }
    }

    /// Largest pole magnitude; the section is stable when this is below 1
    pub fn pole_radius(&self) -> f64 {
        // Roots of z^2 + a1 z + a2
        let disc = Complex64::new(self.a1 * self.a1 - 4.0 * self.a2, 0.0).sqrt();
        let p1 = (-self.a1 + disc) / 2.0;
        let p2 = (-self.a1 - disc) / 2.0;
        p1.norm().max(p2.norm())
    }

    /// Complex frequency response at `omega` radians per sample
    pub fn response(&self, omega: f64) -> Complex64 {
        let z1 = Complex64::from_polar(1.0, -omega);
        let z2 = z1 * z1;
        (z1 * self.b1 + z2 * self.b2 + self.b0) / (z1 * self.a1 + z2 * self.a2 + 1.0)
    }
}

/// Stateful biquad filter using Direct Form I
#[derive(Debug, Clone, PartialEq)]
pub struct BiquadFilter {
    coeffs: BiquadCoeffs,
    // Previous input samples (x[n-1], x[n-2])
    x1: f64,
    x2: f64,
    // Previous output samples (y[n-1], y[n-2])
    y1: f64,
    y2: f64,
}

impl BiquadFilter {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    #[inline]
    fn process_sample(&mut self, x: f64) -> f64 {
        let c = &self.coeffs;
        let y = c.b0 * x + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }

    pub fn process(&mut self, buffer: &mut [f64]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

/// Cascade of biquad sections, applied in order
#[derive(Debug, Clone, PartialEq)]
pub struct SosFilter {
    stages: Vec<BiquadFilter>,
}

impl SosFilter {
    /// Build a cascade, refusing any section with a pole on or outside the unit circle
    pub fn new(sections: &[BiquadCoeffs]) -> Result<Self> {
        for section in sections {
            let radius = section.pole_radius();
            if !(radius < 1.0) {
                return Err(DspError::UnstablePole(radius));
            }
        }
        Ok(Self {
            stages: sections.iter().copied().map(BiquadFilter::new).collect(),
        })
    }

    pub fn process(&mut self, buffer: &mut [f64]) {
        for stage in &mut self.stages {
            stage.process(buffer);
        }
    }

    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }

    /// Magnitude response at `freq_hz` for a cascade running at `sample_rate_hz`
    pub fn gain_at(&self, freq_hz: f64, sample_rate_hz: f64) -> f64 {
        let omega = 2.0 * PI * freq_hz / sample_rate_hz;
        self.stages
            .iter()
            .map(|stage| stage.coeffs.response(omega).norm())
            .product()
    }
}

/// Filter `signal` in place through cascaded `sections`, starting from rest
pub fn sosfilt(sections: &[BiquadCoeffs], signal: &mut [f64]) -> Result<()> {
    SosFilter::new(sections)?.process(signal);
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
