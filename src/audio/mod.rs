//! # Audio Processing Module
//!
//! Everything that touches samples: acquisition of remote audio, filter design and
//! application, effects, spectral analysis and plot rendering.
//!
//! ## Key Components:
//! - **Waveform**: mono samples + sample rate, WAV I/O and resampling
//! - **SosFilter**: Butterworth design and zero-phase filtering
//! - **Effects**: echo, intensity blend, peak normalization
//! - **Spectral / Render**: spectrum, spectrogram and their PNG plots
//! - **AudioPipeline**: the session-scoped filter / visualize / describe operations
//! - **AcquisitionAdapter**: downloads a URL into a session's source waveform
//!
//! ## Audio Format:
//! - **Sample Rate**: 22.05 kHz canonical rate (configurable)
//! - **Channels**: Mono; multi-channel input is averaged on load
//! - **Storage**: 16-bit PCM WAV, one file per artifact

pub mod acquisition;  // Remote download into session storage
pub mod effects;      // Echo, blend, normalization
pub mod filters;      // Butterworth second-order sections
pub mod pipeline;     // Session-scoped audio operations
pub mod render;       // PNG plots
pub mod spectral;     // FFT spectrum and STFT
pub mod waveform;     // Sample container and WAV I/O

pub use acquisition::{AcquisitionAdapter, AudioFetcher, YtDlpFetcher};
pub use pipeline::{AudioInfo, AudioPipeline, FilterType, VisualizationKind};
