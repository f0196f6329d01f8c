//! # Spectral Analysis
//!
//! FFT-based views of a waveform used by the visualizations:
//! - `Spectrum`: magnitude of the full-length DFT over the non-negative half
//! - `Spectrogram`: Hann-windowed STFT magnitude in dB relative to its own peak

use crate::audio::waveform::Waveform;
use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::PI;

pub const STFT_SIZE: usize = 2048;
pub const STFT_HOP: usize = 512;

/// Magnitudes below this are clamped before taking the log
const AMPLITUDE_FLOOR: f64 = 1e-5;
/// Dynamic range kept below the peak
const TOP_DB: f64 = 80.0;

/// Magnitude spectrum over bins `0..N/2`.
#[derive(Debug, Clone)]
pub struct Spectrum {
    pub frequencies: Vec<f64>,
    pub magnitudes: Vec<f64>,
}

impl Spectrum {
    pub fn compute(waveform: &Waveform) -> Self {
        let n = waveform.len();
        if n == 0 {
            return Self {
                frequencies: Vec::new(),
                magnitudes: Vec::new(),
            };
        }

        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(n);
        let mut buffer: Vec<Complex<f64>> = waveform
            .samples()
            .iter()
            .map(|&s| Complex::new(s, 0.0))
            .collect();
        fft.process(&mut buffer);

        let half = n / 2;
        let bin_width = waveform.sample_rate() as f64 / n as f64;
        Self {
            frequencies: (0..half).map(|k| k as f64 * bin_width).collect(),
            magnitudes: buffer[..half].iter().map(|c| c.norm()).collect(),
        }
    }

    /// Frequency of the strongest bin, if any.
    pub fn dominant_frequency(&self) -> Option<f64> {
        self.magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| self.frequencies[k])
    }

    /// Magnitude of the bin closest to `freq_hz`.
    #[cfg(test)]
    pub fn magnitude_near(&self, freq_hz: f64) -> Option<f64> {
        self.frequencies
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1 - freq_hz).abs().total_cmp(&(b.1 - freq_hz).abs()))
            .map(|(k, _)| self.magnitudes[k])
    }
}

/// STFT magnitude in dB, one column of `STFT_SIZE / 2 + 1` bins per frame.
#[derive(Debug, Clone)]
pub struct Spectrogram {
    pub frames: Vec<Vec<f64>>,
    pub sample_rate: u32,
}

impl Spectrogram {
    /// Centered STFT (frames padded with zeros by half a window on both sides).
    pub fn compute(waveform: &Waveform) -> Self {
        let samples = waveform.samples();
        let half_window = STFT_SIZE / 2;
        let frame_count = 1 + samples.len() / STFT_HOP;
        let window = hann_window(STFT_SIZE);

        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(STFT_SIZE);

        let mut magnitudes = Vec::with_capacity(frame_count);
        for frame in 0..frame_count {
            // Index of the frame's first sample in the unpadded signal
            let start = (frame * STFT_HOP) as isize - half_window as isize;
            let mut buffer: Vec<Complex<f64>> = (0..STFT_SIZE)
                .map(|i| {
                    let idx = start + i as isize;
                    let sample = if idx >= 0 && (idx as usize) < samples.len() {
                        samples[idx as usize] * window[i]
                    } else {
                        0.0
                    };
                    Complex::new(sample, 0.0)
                })
                .collect();
            fft.process(&mut buffer);
            magnitudes.push(buffer[..=half_window].iter().map(|c| c.norm()).collect::<Vec<f64>>());
        }

        Self {
            frames: amplitude_to_db(magnitudes),
            sample_rate: waveform.sample_rate(),
        }
    }

    pub fn bin_count(&self) -> usize {
        STFT_SIZE / 2 + 1
    }

    #[cfg(test)]
    pub fn bin_frequency(&self, bin: usize) -> f64 {
        bin as f64 * self.sample_rate as f64 / STFT_SIZE as f64
    }
}

/// Periodic Hann window.
fn hann_window(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / size as f64).cos())
        .collect()
}

/// `20 * log10(max(floor, |S|) / max(floor, max|S|))`, clipped to `TOP_DB` below the peak.
fn amplitude_to_db(magnitudes: Vec<Vec<f64>>) -> Vec<Vec<f64>> {
    let reference = magnitudes
        .iter()
        .flatten()
        .fold(0.0f64, |acc, &m| acc.max(m))
        .max(AMPLITUDE_FLOOR);
    let reference_db = 20.0 * reference.log10();

    let mut db: Vec<Vec<f64>> = magnitudes
        .into_iter()
        .map(|frame| {
            frame
                .into_iter()
                .map(|m| 20.0 * m.max(AMPLITUDE_FLOOR).log10() - reference_db)
                .collect()
        })
        .collect();

    let top = db.iter().flatten().fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
    let floor = top - TOP_DB;
    for value in db.iter_mut().flatten() {
        *value = value.max(floor);
    }
    db
}
