//! # Butterworth Filters
//!
//! Digital Butterworth design and zero-phase application.
//!
//! ## Design steps:
//! 1. Analog low-pass prototype poles on the unit circle in the left half plane
//! 2. Pre-warp the normalized cutoffs so the bilinear transform lands them exactly
//! 3. Transform the prototype to low-pass / high-pass / band-pass at the warped cutoffs
//! 4. Bilinear transform to the z-plane
//! 5. Group poles and zeros into cascaded second-order sections (biquads)
//!
//! Working in poles/zeros and cascading biquads keeps order-5 band-pass filters with
//! very low cutoffs numerically stable, which a single high-order polynomial does not.
//!
//! `SosFilter::filtfilt` runs the cascade forward then backward over an odd-extended
//! copy of the input with steady-state initial conditions, so the output has no phase
//! shift relative to the input.

use crate::error::{AudioError, AudioResult};
use rustfft::num_complex::Complex64;
use std::f64::consts::PI;

/// Order of every band filter the pipeline designs
pub const BUTTERWORTH_ORDER: usize = 5;

/// Sampling frequency used for design in normalized units (Nyquist = 1)
const DESIGN_FS: f64 = 2.0;

/// Imaginary parts below this are treated as real roots
const REAL_ROOT_TOLERANCE: f64 = 1e-10;

/// Frequency band of a filter, in Hz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterBand {
    LowPass { cutoff_hz: f64 },
    HighPass { cutoff_hz: f64 },
    BandPass { low_hz: f64, high_hz: f64 },
}

/// One second-order section, `a[0]` is always 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b: [f64; 3],
    pub a: [f64; 3],
}

impl Biquad {
    /// Gain at 0 Hz.
    fn dc_gain(&self) -> f64 {
        self.b.iter().sum::<f64>() / self.a.iter().sum::<f64>()
    }

    /// State that a unit step input would settle to (transposed direct form II).
    fn step_state(&self) -> [f64; 2] {
        let [b0, b1, b2] = self.b;
        let [_, a1, a2] = self.a;
        let c0 = b1 - a1 * b0;
        let c1 = b2 - a2 * b0;
        let z0 = (c0 + c1) / (1.0 + a1 + a2);
        [z0, c1 - a2 * z0]
    }

    #[cfg(test)]
    fn response_at(&self, z_inv: Complex64) -> Complex64 {
        let z_inv2 = z_inv * z_inv;
        let num = Complex64::new(self.b[0], 0.0) + z_inv * self.b[1] + z_inv2 * self.b[2];
        let den = Complex64::new(1.0, 0.0) + z_inv * self.a[1] + z_inv2 * self.a[2];
        num / den
    }
}

/// A cascade of biquads.
#[derive(Debug, Clone, PartialEq)]
pub struct SosFilter {
    sections: Vec<Biquad>,
}

impl SosFilter {
    /// Design a digital Butterworth filter of `order` for `band` at `sample_rate`.
    ///
    /// Every edge frequency, divided by the Nyquist frequency, must fall strictly
    /// inside (0, 1). A band-pass also needs `low_hz < high_hz`.
    pub fn butterworth(order: usize, band: FilterBand, sample_rate: u32) -> AudioResult<Self> {
        if order == 0 {
            return Err(AudioError::InvalidFilterParameters(
                "filter order must be at least 1".to_string(),
            ));
        }
        let nyquist = sample_rate as f64 / 2.0;
        let prototype = analog_prototype(order);

        let (zeros, poles, gain) = match band {
            FilterBand::LowPass { cutoff_hz } => {
                let wo = prewarp(normalize(cutoff_hz, nyquist)?);
                to_lowpass(&prototype, wo)
            }
            FilterBand::HighPass { cutoff_hz } => {
                let wo = prewarp(normalize(cutoff_hz, nyquist)?);
                to_highpass(&prototype, wo)
            }
            FilterBand::BandPass { low_hz, high_hz } => {
                let low = normalize(low_hz, nyquist)?;
                let high = normalize(high_hz, nyquist)?;
                if low >= high {
                    return Err(AudioError::InvalidFilterParameters(format!(
                        "band-pass edges must be increasing, got {} Hz to {} Hz",
                        low_hz, high_hz
                    )));
                }
                to_bandpass(&prototype, prewarp(low), prewarp(high))
            }
        };

        let (zeros, poles, gain) = bilinear(&zeros, &poles, gain);
        Ok(Self::from_zpk(&zeros, &poles, gain))
    }

    fn from_zpk(zeros: &[Complex64], poles: &[Complex64], gain: f64) -> Self {
        let numerators = quadratic_factors(zeros);
        let denominators = quadratic_factors(poles);
        let count = numerators.len().max(denominators.len());

        let mut sections: Vec<Biquad> = (0..count)
            .map(|i| Biquad {
                b: numerators.get(i).copied().unwrap_or([1.0, 0.0, 0.0]),
                a: denominators.get(i).copied().unwrap_or([1.0, 0.0, 0.0]),
            })
            .collect();

        if let Some(first) = sections.first_mut() {
            for coefficient in first.b.iter_mut() {
                *coefficient *= gain;
            }
        }

        Self { sections }
    }

    #[cfg(test)]
    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Magnitude of the (single-pass) frequency response at `freq_hz`.
    #[cfg(test)]
    pub fn magnitude_at(&self, freq_hz: f64, sample_rate: u32) -> f64 {
        let omega = 2.0 * PI * freq_hz / sample_rate as f64;
        let z_inv = Complex64::new(0.0, -omega).exp();
        self.sections
            .iter()
            .fold(Complex64::new(1.0, 0.0), |acc, s| acc * s.response_at(z_inv))
            .norm()
    }

    /// Single causal pass through the cascade, starting from `initial` section states.
    fn run(&self, input: &[f64], initial: &[[f64; 2]]) -> Vec<f64> {
        let mut output = input.to_vec();
        for (section, state) in self.sections.iter().zip(initial) {
            let [b0, b1, b2] = section.b;
            let [_, a1, a2] = section.a;
            let [mut z0, mut z1] = *state;
            for sample in output.iter_mut() {
                let x = *sample;
                let y = b0 * x + z0;
                z0 = b1 * x - a1 * y + z1;
                z1 = b2 * x - a2 * y;
                *sample = y;
            }
        }
        output
    }

    /// Causal filtering from rest.
    pub fn filter(&self, input: &[f64]) -> Vec<f64> {
        let rest = vec![[0.0; 2]; self.sections.len()];
        self.run(input, &rest)
    }

    /// Zero-phase forward-backward filtering.
    pub fn filtfilt(&self, input: &[f64]) -> Vec<f64> {
        if input.is_empty() {
            return Vec::new();
        }

        let pad = self.pad_len().min(input.len() - 1);
        let extended = odd_extend(input, pad);
        let step = self.step_states();
        let scaled = |level: f64| -> Vec<[f64; 2]> {
            step.iter().map(|[z0, z1]| [z0 * level, z1 * level]).collect()
        };

        let mut forward = self.run(&extended, &scaled(extended[0]));
        forward.reverse();
        let mut backward = self.run(&forward, &scaled(forward[0]));
        backward.reverse();

        backward[pad..pad + input.len()].to_vec()
    }

    /// Per-section states for a unit step, each scaled by the DC gain of the sections before it.
    fn step_states(&self) -> Vec<[f64; 2]> {
        let mut scale = 1.0;
        self.sections
            .iter()
            .map(|section| {
                let [z0, z1] = section.step_state();
                let state = [z0 * scale, z1 * scale];
                scale *= section.dc_gain();
                state
            })
            .collect()
    }

    /// Edge padding used by `filtfilt`: three times the effective number of taps.
    fn pad_len(&self) -> usize {
        let first_order_b = self.sections.iter().filter(|s| s.b[2] == 0.0).count();
        let first_order_a = self.sections.iter().filter(|s| s.a[2] == 0.0).count();
        let taps = 2 * self.sections.len() + 1 - first_order_b.min(first_order_a);
        3 * taps
    }
}

fn normalize(freq_hz: f64, nyquist: f64) -> AudioResult<f64> {
    let normalized = freq_hz / nyquist;
    if normalized > 0.0 && normalized < 1.0 {
        Ok(normalized)
    } else {
        Err(AudioError::InvalidFilterParameters(format!(
            "cutoff {} Hz must lie strictly between 0 and the Nyquist frequency ({} Hz)",
            freq_hz, nyquist
        )))
    }
}

fn prewarp(normalized: f64) -> f64 {
    2.0 * DESIGN_FS * (PI * normalized / DESIGN_FS).tan()
}

fn analog_prototype(order: usize) -> Vec<Complex64> {
    (0..order)
        .map(|k| {
            let m = 2.0 * k as f64 - order as f64 + 1.0;
            -Complex64::new(0.0, PI * m / (2.0 * order as f64)).exp()
        })
        .collect()
}

type Zpk = (Vec<Complex64>, Vec<Complex64>, f64);

fn to_lowpass(prototype: &[Complex64], wo: f64) -> Zpk {
    let poles = prototype.iter().map(|p| *p * wo).collect();
    (Vec::new(), poles, wo.powi(prototype.len() as i32))
}

fn to_highpass(prototype: &[Complex64], wo: f64) -> Zpk {
    let poles: Vec<Complex64> = prototype.iter().map(|p| Complex64::new(wo, 0.0) / *p).collect();
    let zeros = vec![Complex64::new(0.0, 0.0); prototype.len()];
    let denominator = prototype
        .iter()
        .fold(Complex64::new(1.0, 0.0), |acc, p| acc * -*p);
    (zeros, poles, (Complex64::new(1.0, 0.0) / denominator).re)
}

fn to_bandpass(prototype: &[Complex64], low: f64, high: f64) -> Zpk {
    let bandwidth = high - low;
    let center_sq = Complex64::new(low * high, 0.0);
    let scaled: Vec<Complex64> = prototype.iter().map(|p| *p * (bandwidth / 2.0)).collect();

    let mut poles = Vec::with_capacity(scaled.len() * 2);
    poles.extend(scaled.iter().map(|&p| p + (p * p - center_sq).sqrt()));
    poles.extend(scaled.iter().map(|&p| p - (p * p - center_sq).sqrt()));

    let zeros = vec![Complex64::new(0.0, 0.0); prototype.len()];
    (zeros, poles, bandwidth.powi(prototype.len() as i32))
}

fn bilinear(zeros: &[Complex64], poles: &[Complex64], gain: f64) -> Zpk {
    let fs2 = Complex64::new(2.0 * DESIGN_FS, 0.0);
    let map = |s: &Complex64| (fs2 + *s) / (fs2 - *s);

    let mut digital_zeros: Vec<Complex64> = zeros.iter().map(map).collect();
    digital_zeros.resize(poles.len(), Complex64::new(-1.0, 0.0));
    let digital_poles = poles.iter().map(map).collect();

    let num = zeros.iter().fold(Complex64::new(1.0, 0.0), |acc, z| acc * (fs2 - *z));
    let den = poles.iter().fold(Complex64::new(1.0, 0.0), |acc, p| acc * (fs2 - *p));

    (digital_zeros, digital_poles, gain * (num / den).re)
}

/// Group roots into monic polynomials of degree ≤ 2 (`[1, c1, c2]`).
///
/// A lone real root (odd count) comes first as a first-order factor. Remaining real roots
/// are paired smallest with largest. Conjugate pairs follow, ordered so the roots closest
/// to the unit circle end up in the last sections.
fn quadratic_factors(roots: &[Complex64]) -> Vec<[f64; 3]> {
    let mut real: Vec<f64> = roots
        .iter()
        .filter(|r| r.im.abs() <= REAL_ROOT_TOLERANCE)
        .map(|r| r.re)
        .collect();
    let mut complex: Vec<Complex64> = roots
        .iter()
        .filter(|r| r.im > REAL_ROOT_TOLERANCE)
        .copied()
        .collect();

    real.sort_by(|a, b| a.total_cmp(b));
    complex.sort_by(|a, b| a.norm().total_cmp(&b.norm()));

    let mut factors = Vec::with_capacity(roots.len() / 2 + 1);
    if real.len() % 2 == 1 {
        let lone = real.remove(real.len() / 2);
        factors.push([1.0, -lone, 0.0]);
    }
    let half = real.len() / 2;
    for i in 0..half {
        let (r1, r2) = (real[i], real[real.len() - 1 - i]);
        factors.push([1.0, -(r1 + r2), r1 * r2]);
    }
    for root in complex {
        factors.push([1.0, -2.0 * root.re, root.norm_sqr()]);
    }
    factors
}

fn odd_extend(input: &[f64], pad: usize) -> Vec<f64> {
    if pad == 0 {
        return input.to_vec();
    }
    let last_index = input.len() - 1;
    let first = input[0];
    let last = input[last_index];

    let mut extended = Vec::with_capacity(input.len() + 2 * pad);
    extended.extend((1..=pad).rev().map(|i| 2.0 * first - input[i]));
    extended.extend_from_slice(input);
    extended.extend((1..=pad).map(|i| 2.0 * last - input[last_index - i]));
    extended
}
