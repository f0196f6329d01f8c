//! # Signal Pipeline
//!
//! The three audio operations a session can run, all expressed over session-scoped files:
//!
//! - `apply_filter`: source waveform → filter or echo → blend → normalize → stored WAV
//! - `render_visualization`: current waveform → waveform / spectrogram / spectrum PNG
//! - `describe`: sample rate, duration and sample count of the current waveform
//!
//! ## Artifacts:
//! | Artifact                    | Written by            | Meaning                           |
//! |-----------------------------|-----------------------|-----------------------------------|
//! | `downloaded_audio.wav`      | acquisition           | pristine source, never modified   |
//! | `filtered_<type>.wav`       | `apply_filter`        | output of that filter type        |
//! | `processed.wav`             | `apply_filter`        | latest filter output ("current")  |
//! | `<kind>.png`                | `render_visualization`| rendered plot                     |
//!
//! Nothing is cached in memory between calls: every operation re-reads its input from
//! disk, so sessions share no mutable audio state. Each filter starts from the pristine
//! source, while plots and `describe` reflect the latest filter output when there is one.
//!
//! All operations are synchronous and CPU-bound; HTTP handlers run them on the blocking
//! thread pool.

use crate::audio::effects::{self, ECHO_DECAY_FACTOR, ECHO_DELAY_SECONDS};
use crate::audio::filters::{FilterBand, SosFilter, BUTTERWORTH_ORDER};
use crate::audio::render;
use crate::audio::spectral::{Spectrogram, Spectrum};
use crate::audio::waveform::{self, Waveform};
use crate::error::{AudioError, AudioResult};
use crate::session::{SessionId, SessionRegistry};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub const SOURCE_ARTIFACT: &str = "downloaded_audio.wav";
pub const PROCESSED_ARTIFACT: &str = "processed.wav";

/// Fixed band edges are kept below this fraction of the Nyquist frequency
const FIXED_BAND_NYQUIST_LIMIT: f64 = 0.99;

/// The six supported filter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterType {
    LowPass,
    HighPass,
    BandPassBass,
    BandPassMids,
    BandPassTreble,
    Echo,
}

impl FilterType {
    pub const ALL: [FilterType; 6] = [
        FilterType::LowPass,
        FilterType::HighPass,
        FilterType::BandPassBass,
        FilterType::BandPassMids,
        FilterType::BandPassTreble,
        FilterType::Echo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterType::LowPass => "low_pass",
            FilterType::HighPass => "high_pass",
            FilterType::BandPassBass => "band_pass_bass",
            FilterType::BandPassMids => "band_pass_mids",
            FilterType::BandPassTreble => "band_pass_treble",
            FilterType::Echo => "echo",
        }
    }

    /// Name of the WAV artifact this filter writes.
    pub fn artifact_name(&self) -> String {
        format!("filtered_{}.wav", self.as_str())
    }

    /// Frequency band for the band-limiting variants; `None` for echo.
    ///
    /// `cutoff_hz` only applies to low/high pass. The fixed bands (bass 20–250 Hz,
    /// mids 250–5000 Hz, treble 5000–20000 Hz) are clamped below Nyquist so they stay
    /// designable at the canonical rate.
    pub fn band(&self, cutoff_hz: f64, sample_rate: u32) -> Option<FilterBand> {
        let fixed = |low: f64, high: f64| {
            let limit = FIXED_BAND_NYQUIST_LIMIT * sample_rate as f64 / 2.0;
            FilterBand::BandPass {
                low_hz: low.min(limit),
                high_hz: high.min(limit),
            }
        };

        match self {
            FilterType::LowPass => Some(FilterBand::LowPass { cutoff_hz }),
            FilterType::HighPass => Some(FilterBand::HighPass { cutoff_hz }),
            FilterType::BandPassBass => Some(fixed(20.0, 250.0)),
            FilterType::BandPassMids => Some(fixed(250.0, 5000.0)),
            FilterType::BandPassTreble => Some(fixed(5000.0, 20000.0)),
            FilterType::Echo => None,
        }
    }
}

impl FromStr for FilterType {
    type Err = AudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterType::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| AudioError::UnsupportedFilterType(s.to_string()))
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three supported plots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisualizationKind {
    Waveform,
    Spectrogram,
    Spectrum,
}

impl VisualizationKind {
    pub const ALL: [VisualizationKind; 3] = [
        VisualizationKind::Waveform,
        VisualizationKind::Spectrogram,
        VisualizationKind::Spectrum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VisualizationKind::Waveform => "waveform",
            VisualizationKind::Spectrogram => "spectrogram",
            VisualizationKind::Spectrum => "spectrum",
        }
    }

    pub fn artifact_name(&self) -> String {
        format!("{}.png", self.as_str())
    }
}

impl FromStr for VisualizationKind {
    type Err = AudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VisualizationKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| AudioError::UnsupportedVisualizationType(s.to_string()))
    }
}

/// Summary of a session's current waveform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioInfo {
    pub sample_rate: u32,
    pub duration_seconds: f64,
    pub sample_count: usize,
    pub channel_count: u16,
}

impl AudioInfo {
    fn of(waveform: &Waveform) -> Self {
        Self {
            sample_rate: waveform.sample_rate(),
            duration_seconds: waveform.duration_seconds(),
            sample_count: waveform.len(),
            channel_count: 1,
        }
    }
}

/// Stateless audio operations over a session's stored artifacts.
pub struct AudioPipeline {
    registry: Arc<SessionRegistry>,
    sample_rate: u32,
}

impl AudioPipeline {
    /// `sample_rate` is the canonical rate every stored waveform is loaded at.
    pub fn new(registry: Arc<SessionRegistry>, sample_rate: u32) -> Self {
        Self {
            registry,
            sample_rate,
        }
    }

    /// Whether the session has a stored source waveform.
    pub fn has_audio(&self, id: &SessionId) -> bool {
        self.registry.resolve_path(id, SOURCE_ARTIFACT).exists()
    }

    /// Filter the session's source audio and store the result.
    ///
    /// Returns the artifact name of the filtered WAV (`filtered_<type>.wav`); the same
    /// waveform also becomes the session's `processed.wav`.
    ///
    /// ## Errors:
    /// - `NoAudioLoaded` when the session has no source waveform
    /// - `UnsupportedFilterType` for an unknown `filter_type`
    /// - `InvalidFilterParameters` for a cutoff outside (0, Nyquist) or an intensity outside [0, 1]
    pub fn apply_filter(
        &self,
        id: &SessionId,
        filter_type: &str,
        cutoff_hz: f64,
        intensity: f64,
    ) -> AudioResult<String> {
        if !self.has_audio(id) {
            return Err(AudioError::NoAudioLoaded);
        }
        let filter: FilterType = filter_type.parse()?;
        let source = self.registry.resolve_path(id, SOURCE_ARTIFACT);

        let started = Instant::now();
        let original = waveform::load_canonical(&source, self.sample_rate)?;
        let processed = process(&original, filter, cutoff_hz, intensity)?;

        let artifact = filter.artifact_name();
        waveform::write_wav(&self.registry.resolve_path(id, &artifact), &processed)?;
        waveform::write_wav(&self.registry.resolve_path(id, PROCESSED_ARTIFACT), &processed)?;

        debug!(
            session_id = %id,
            filter = %filter,
            cutoff_hz,
            intensity,
            samples = processed.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Filter applied"
        );
        Ok(artifact)
    }

    /// Render a plot of the session's current waveform and return its artifact name.
    pub fn render_visualization(&self, id: &SessionId, kind: &str) -> AudioResult<String> {
        let path = self.current_waveform_path(id).ok_or(AudioError::NoAudioLoaded)?;
        let kind: VisualizationKind = kind.parse()?;

        let started = Instant::now();
        let waveform = waveform::load_canonical(&path, self.sample_rate)?;
        let image = match kind {
            VisualizationKind::Waveform => render::render_waveform(&waveform),
            VisualizationKind::Spectrogram => {
                render::render_spectrogram(&Spectrogram::compute(&waveform))
            }
            VisualizationKind::Spectrum => {
                let spectrum = Spectrum::compute(&waveform);
                debug!(session_id = %id, dominant_hz = ?spectrum.dominant_frequency(), "Spectrum computed");
                render::render_spectrum(&spectrum)
            }
        };

        let artifact = kind.artifact_name();
        render::save_png(&image, &self.registry.resolve_path(id, &artifact))?;

        debug!(
            session_id = %id,
            kind = kind.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Visualization rendered"
        );
        Ok(artifact)
    }

    /// Describe the session's current waveform, or `None` if nothing is loaded.
    pub fn describe(&self, id: &SessionId) -> AudioResult<Option<AudioInfo>> {
        let Some(path) = self.current_waveform_path(id) else {
            return Ok(None);
        };
        let waveform = waveform::load_canonical(&path, self.sample_rate)?;
        Ok(Some(AudioInfo::of(&waveform)))
    }

    /// Latest filter output if any, else the source.
    fn current_waveform_path(&self, id: &SessionId) -> Option<PathBuf> {
        [PROCESSED_ARTIFACT, SOURCE_ARTIFACT]
            .into_iter()
            .map(|artifact| self.registry.resolve_path(id, artifact))
            .find(|path| path.exists())
    }
}

/// Apply one filter type to a waveform: filter or echo, blend, then peak-normalize.
///
/// Band filters are order-5 Butterworth; the echo repeats the signal 0.3 s later at
/// `intensity * 0.6` of its level.
pub fn process(
    original: &Waveform,
    filter: FilterType,
    cutoff_hz: f64,
    intensity: f64,
) -> AudioResult<Waveform> {
    if !(0.0..=1.0).contains(&intensity) {
        return Err(AudioError::InvalidFilterParameters(format!(
            "intensity {} must be between 0 and 1",
            intensity
        )));
    }

    let samples = original.samples();
    let sample_rate = original.sample_rate();

    let mixed = match filter.band(cutoff_hz, sample_rate) {
        Some(band) => {
            let design = SosFilter::butterworth(BUTTERWORTH_ORDER, band, sample_rate)?;
            let filtered = design.filtfilt(samples);
            effects::blend(samples, &filtered, intensity)
        }
        // Echo mixes direct and delayed sound itself
        None => effects::echo(
            samples,
            sample_rate,
            ECHO_DELAY_SECONDS,
            intensity * ECHO_DECAY_FACTOR,
        ),
    };

    Ok(original.with_samples(effects::normalize(&mixed)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    use std::time::Duration;
    use tempfile::TempDir;

    const SR: u32 = 22050;

    struct Fixture {
        _dir: TempDir,
        registry: Arc<SessionRegistry>,
        pipeline: AudioPipeline,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(SessionRegistry::new(dir.path(), Duration::from_secs(1800)).unwrap());
        let pipeline = AudioPipeline::new(Arc::clone(&registry), SR);
        Fixture {
            _dir: dir,
            registry,
            pipeline,
        }
    }

    fn tones(freqs: &[f64], seconds: f64) -> Waveform {
        let n = (SR as f64 * seconds) as usize;
        let samples = (0..n)
            .map(|i| {
                let t = i as f64 / SR as f64;
                freqs.iter().map(|f| (2.0 * PI * f * t).sin()).sum::<f64>() / freqs.len() as f64
            })
            .collect();
        Waveform::new(samples, SR)
    }

    fn load_session(fixture: &Fixture, source: &Waveform) -> SessionId {
        let id = fixture.registry.create();
        waveform::write_wav(&fixture.registry.resolve_path(&id, SOURCE_ARTIFACT), source).unwrap();
        id
    }

    fn read_artifact(fixture: &Fixture, id: &SessionId, artifact: &str) -> Waveform {
        waveform::read_wav(&fixture.registry.resolve_path(id, artifact)).unwrap()
    }

    #[test]
    fn test_filter_type_parsing() {
        for filter in FilterType::ALL {
            assert_eq!(filter.as_str().parse::<FilterType>().unwrap(), filter);
        }
        assert!(matches!(
            "band_pass".parse::<FilterType>(),
            Err(AudioError::UnsupportedFilterType(_))
        ));
        assert!(matches!(
            "histogram".parse::<VisualizationKind>(),
            Err(AudioError::UnsupportedVisualizationType(_))
        ));
    }

    #[test]
    fn test_every_filter_type_produces_an_artifact() {
        let fixture = fixture();
        let id = load_session(&fixture, &tones(&[100.0, 1000.0, 7000.0], 1.0));

        for filter in FilterType::ALL {
            let artifact = fixture
                .pipeline
                .apply_filter(&id, filter.as_str(), 1000.0, 1.0)
                .unwrap();
            assert_eq!(artifact, format!("filtered_{}.wav", filter.as_str()));

            let output = read_artifact(&fixture, &id, &artifact);
            assert_eq!(output.len(), SR as usize);
            assert!(effects::peak(output.samples()) > 0.99);
        }

        let err = fixture.pipeline.apply_filter(&id, "notch", 1000.0, 1.0).unwrap_err();
        assert!(matches!(err, AudioError::UnsupportedFilterType(_)));
    }

    #[test]
    fn test_intensity_zero_reproduces_normalized_original() {
        let original = tones(&[100.0, 3000.0], 0.5);
        let expected = effects::normalize(original.samples());

        for filter in FilterType::ALL {
            let output = process(&original, filter, 1000.0, 0.0).unwrap();
            assert_eq!(output.samples(), expected.as_slice(), "{}", filter);
        }
    }

    #[test]
    fn test_intensity_one_is_fully_filtered() {
        let original = tones(&[100.0, 3000.0], 0.5);

        let design = SosFilter::butterworth(5, FilterBand::LowPass { cutoff_hz: 1000.0 }, SR).unwrap();
        let expected = effects::normalize(&design.filtfilt(original.samples()));

        let output = process(&original, FilterType::LowPass, 1000.0, 1.0).unwrap();
        assert_eq!(output.samples(), expected.as_slice());
    }

    #[test]
    fn test_intensity_out_of_range_is_rejected() {
        let original = tones(&[440.0], 0.1);
        for intensity in [-0.1, 1.5, f64::NAN] {
            assert!(matches!(
                process(&original, FilterType::Echo, 1000.0, intensity),
                Err(AudioError::InvalidFilterParameters(_))
            ));
        }
    }

    #[test]
    fn test_cutoff_at_or_above_nyquist_is_rejected() {
        let fixture = fixture();
        let id = load_session(&fixture, &tones(&[440.0], 0.5));

        for cutoff in [11025.0, 12000.0] {
            let err = fixture.pipeline.apply_filter(&id, "low_pass", cutoff, 1.0).unwrap_err();
            assert!(matches!(err, AudioError::InvalidFilterParameters(_)));
        }
    }

    #[test]
    fn test_no_audio_guard() {
        let fixture = fixture();
        let id = fixture.registry.create();

        assert!(matches!(
            fixture.pipeline.apply_filter(&id, "low_pass", 1000.0, 1.0),
            Err(AudioError::NoAudioLoaded)
        ));
        assert!(matches!(
            fixture.pipeline.render_visualization(&id, "waveform"),
            Err(AudioError::NoAudioLoaded)
        ));
        assert_eq!(fixture.pipeline.describe(&id).unwrap(), None);
        assert!(!fixture.pipeline.has_audio(&id));
    }

    #[test]
    fn test_lowpass_attenuates_440hz_sine() {
        let fixture = fixture();
        let source = tones(&[440.0], 5.0);
        let id = load_session(&fixture, &source);

        let artifact = fixture.pipeline.apply_filter(&id, "low_pass", 200.0, 1.0).unwrap();
        let output = read_artifact(&fixture, &id, &artifact);

        assert!((effects::peak(output.samples()) - 1.0).abs() < 1e-3);

        let input_energy = Spectrum::compute(&source).magnitude_near(440.0).unwrap();
        let output_energy = Spectrum::compute(&output).magnitude_near(440.0).unwrap();
        assert!(output_energy < 0.05 * input_energy);
    }

    #[test]
    fn test_echo_of_unit_impulse() {
        let mut samples = vec![0.0; SR as usize];
        samples[0] = 1.0;

        let output = process(&Waveform::new(samples, SR), FilterType::Echo, 1000.0, 0.5).unwrap();
        let delay = (0.3 * SR as f64).round() as usize;

        let peaks: Vec<usize> = output
            .samples()
            .iter()
            .enumerate()
            .filter(|(_, s)| s.abs() > 1e-9)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(peaks, vec![0, delay]);
        assert!((output.samples()[delay] / output.samples()[0] - 0.5 * 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let fixture = fixture();
        let source = tones(&[100.0, 3000.0], 1.0);
        let low = load_session(&fixture, &source);
        let high = load_session(&fixture, &source);

        let pipeline = &fixture.pipeline;
        let (low_artifact, high_artifact) = std::thread::scope(|scope| {
            let a = scope.spawn(|| pipeline.apply_filter(&low, "low_pass", 1000.0, 1.0).unwrap());
            let b = scope.spawn(|| pipeline.apply_filter(&high, "high_pass", 1000.0, 1.0).unwrap());
            (a.join().unwrap(), b.join().unwrap())
        });

        let low_path = fixture.registry.resolve_path(&low, &low_artifact);
        let high_path = fixture.registry.resolve_path(&high, &high_artifact);
        assert_ne!(low_path, high_path);

        let low_out = Spectrum::compute(&read_artifact(&fixture, &low, &low_artifact));
        let high_out = Spectrum::compute(&read_artifact(&fixture, &high, &high_artifact));
        assert!((low_out.dominant_frequency().unwrap() - 100.0).abs() < 2.0);
        assert!((high_out.dominant_frequency().unwrap() - 3000.0).abs() < 2.0);
    }

    #[test]
    fn test_each_filter_starts_from_source() {
        let fixture = fixture();
        let id = load_session(&fixture, &tones(&[100.0, 3000.0], 1.0));

        fixture.pipeline.apply_filter(&id, "low_pass", 1000.0, 1.0).unwrap();
        let artifact = fixture.pipeline.apply_filter(&id, "high_pass", 1000.0, 1.0).unwrap();

        let output = Spectrum::compute(&read_artifact(&fixture, &id, &artifact));
        assert!((output.dominant_frequency().unwrap() - 3000.0).abs() < 2.0);
    }

    #[test]
    fn test_render_every_kind() {
        let fixture = fixture();
        let id = load_session(&fixture, &tones(&[440.0], 1.0));

        for kind in VisualizationKind::ALL {
            let artifact = fixture.pipeline.render_visualization(&id, kind.as_str()).unwrap();
            assert_eq!(artifact, format!("{}.png", kind.as_str()));
            let image = image::open(fixture.registry.resolve_path(&id, &artifact)).unwrap();
            assert_eq!(image.width(), render::IMAGE_WIDTH);
        }

        assert!(matches!(
            fixture.pipeline.render_visualization(&id, "histogram"),
            Err(AudioError::UnsupportedVisualizationType(_))
        ));
    }

    #[test]
    fn test_describe_tracks_current_waveform() {
        let fixture = fixture();
        let id = load_session(&fixture, &tones(&[440.0], 2.0));

        let info = fixture.pipeline.describe(&id).unwrap().unwrap();
        assert_eq!(info.sample_rate, SR);
        assert_eq!(info.sample_count, 44100);
        assert_eq!(info.channel_count, 1);
        assert!((info.duration_seconds - 2.0).abs() < 1e-9);

        fixture.pipeline.apply_filter(&id, "echo", 1000.0, 1.0).unwrap();
        assert!(fixture.registry.resolve_path(&id, PROCESSED_ARTIFACT).exists());
        assert_eq!(fixture.pipeline.describe(&id).unwrap().unwrap().sample_count, 44100);
    }

    #[test]
    fn test_treble_band_is_clamped_below_nyquist() {
        match FilterType::BandPassTreble.band(1000.0, SR) {
            Some(FilterBand::BandPass { low_hz, high_hz }) => {
                assert_eq!(low_hz, 5000.0);
                assert!(high_hz < SR as f64 / 2.0);
            }
            other => panic!("unexpected band {:?}", other),
        }
        assert_eq!(FilterType::Echo.band(1000.0, SR), None);
    }
}
