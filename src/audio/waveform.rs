//! # Waveform Storage
//!
//! A `Waveform` is a mono sequence of samples plus its sample rate. Between requests the
//! waveform only exists as a WAV file in the session's storage; every operation reads it
//! back with `load_canonical`, which down-mixes to mono and converts to the canonical
//! sample rate so all downstream DSP sees the same Nyquist frequency.
//!
//! ## On-disk format:
//! - Written as 16-bit PCM mono
//! - Read from 8/16/24-bit PCM or 32-bit float, any channel count
//! - Writes go to a `.part` sibling first and are renamed into place, so a reader
//!   never observes a half-written artifact

use crate::error::{AudioError, AudioResult};
use rubato::{FftFixedIn, Resampler};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Input chunk size for the FFT resampler
const RESAMPLE_CHUNK: usize = 1024;

/// Mono audio samples tagged with their sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f64>,
    sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f64>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds (`len / sample_rate`).
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Replace the samples, keeping the sample rate.
    pub fn with_samples(&self, samples: Vec<f64>) -> Self {
        Self::new(samples, self.sample_rate)
    }
}

/// Read a WAV file and down-mix it to mono at its native sample rate.
pub fn read_wav(path: &Path) -> AudioResult<Waveform> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let (header, data) = wav::read(&mut reader)
        .map_err(|e| AudioError::Decode(format!("{}: {}", path.display(), e)))?;

    let interleaved: Vec<f64> = match data {
        wav::BitDepth::Eight(samples) => samples
            .into_iter()
            .map(|s| (s as f64 - 128.0) / 128.0)
            .collect(),
        wav::BitDepth::Sixteen(samples) => samples
            .into_iter()
            .map(|s| s as f64 / 32768.0)
            .collect(),
        wav::BitDepth::TwentyFour(samples) => samples
            .into_iter()
            .map(|s| s as f64 / 8_388_608.0)
            .collect(),
        wav::BitDepth::ThirtyTwoFloat(samples) => samples.into_iter().map(f64::from).collect(),
        wav::BitDepth::Empty => {
            return Err(AudioError::Decode(format!(
                "{}: no sample data",
                path.display()
            )))
        }
    };

    let channels = header.channel_count.max(1) as usize;
    let mono = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f64>() / frame.len() as f64)
            .collect()
    };

    Ok(Waveform::new(mono, header.sampling_rate))
}

/// Read a stored waveform and bring it to the canonical sample rate.
pub fn load_canonical(path: &Path, target_rate: u32) -> AudioResult<Waveform> {
    let waveform = read_wav(path)?;
    resample(&waveform, target_rate)
}

/// Write a mono waveform as 16-bit PCM, atomically replacing `path`.
pub fn write_wav(path: &Path, waveform: &Waveform) -> AudioResult<()> {
    let pcm: Vec<i16> = waveform
        .samples()
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0).round() as i16)
        .collect();

    let header = wav::Header::new(wav::WAV_FORMAT_PCM, 1, waveform.sample_rate(), 16);
    let partial = partial_path(path);

    let result = File::create(&partial)
        .and_then(|mut file| wav::write(header, &wav::BitDepth::Sixteen(pcm), &mut file))
        .and_then(|_| fs::rename(&partial, path));

    if let Err(e) = result {
        let _ = fs::remove_file(&partial);
        return Err(AudioError::Io(e));
    }

    Ok(())
}

/// Sibling path used while an artifact is being written (`<name>.part`).
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

/// Convert a waveform to `target_rate` with an FFT-based resampler.
///
/// The resampler's output delay is trimmed so the result stays time-aligned, and the
/// output length is `round(len * target_rate / source_rate)`.
pub fn resample(waveform: &Waveform, target_rate: u32) -> AudioResult<Waveform> {
    let source_rate = waveform.sample_rate();
    if source_rate == target_rate || waveform.is_empty() {
        return Ok(Waveform::new(waveform.samples().to_vec(), target_rate));
    }
    if source_rate == 0 || target_rate == 0 {
        return Err(AudioError::Resample(format!(
            "cannot resample from {} Hz to {} Hz",
            source_rate, target_rate
        )));
    }

    let samples = waveform.samples();
    let input_frames = samples.len();
    let expected_frames =
        (input_frames as f64 * target_rate as f64 / source_rate as f64).round() as usize;

    let mut resampler = FftFixedIn::<f64>::new(
        source_rate as usize,
        target_rate as usize,
        RESAMPLE_CHUNK,
        2,
        1,
    )?;
    let delay = resampler.output_delay();

    let mut output = Vec::with_capacity(expected_frames + delay + RESAMPLE_CHUNK);
    let mut pos = 0;
    // Keep feeding (zero-padded) chunks until the delayed tail has been flushed out
    while output.len() < expected_frames + delay {
        let frames_needed = resampler.input_frames_next();
        let mut chunk = vec![0.0f64; frames_needed];
        if pos < input_frames {
            let take = frames_needed.min(input_frames - pos);
            chunk[..take].copy_from_slice(&samples[pos..pos + take]);
        }
        pos += frames_needed;

        let processed = resampler.process(&[chunk], None)?;
        if processed[0].is_empty() {
            break;
        }
        output.extend_from_slice(&processed[0]);
    }

    output.drain(..delay.min(output.len()));
    output.truncate(expected_frames);

    Ok(Waveform::new(output, target_rate))
}
