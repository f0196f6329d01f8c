//! # Audio Acquisition
//!
//! Turns a remote URL into a session's canonical source waveform.
//!
//! ## Flow:
//! 1. An `AudioFetcher` downloads and extracts the audio to `<sid>_download.wav`
//! 2. The raw file is decoded, down-mixed to mono and resampled to the canonical rate
//! 3. The result is stored as `<sid>_downloaded_audio.wav` (16-bit PCM)
//! 4. The raw download is removed
//!
//! Any failure surfaces as `AudioError::Fetch` and leaves no source artifact behind, so a
//! failed download can never be mistaken for loaded audio.
//!
//! The production fetcher shells out to `yt-dlp`; tests plug in fetchers that write
//! WAV files directly.

use crate::audio::pipeline::{PROCESSED_ARTIFACT, SOURCE_ARTIFACT};
use crate::audio::waveform;
use crate::config::DownloaderConfig;
use crate::error::{AudioError, AudioResult};
use crate::session::{SessionId, SessionRegistry};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info};

/// Raw download before decoding
pub const RAW_DOWNLOAD_ARTIFACT: &str = "download.wav";

/// Something that can download a URL's audio as a WAV file.
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    /// Write the audio behind `url` as an uncompressed WAV file at `destination`.
    async fn fetch(&self, url: &str, destination: &Path) -> AudioResult<()>;
}

/// Fetcher backed by the `yt-dlp` command line tool (needs `ffmpeg` for extraction).
pub struct YtDlpFetcher {
    settings: DownloaderConfig,
}

impl YtDlpFetcher {
    pub fn new(settings: DownloaderConfig) -> Self {
        Self { settings }
    }

    /// Build the `yt-dlp` invocation that extracts `url` to `destination` as WAV.
    fn command(&self, url: &str, destination: &Path) -> Command {
        // yt-dlp picks the extension itself; the WAV post-processor makes it `.wav`
        let template = destination.with_extension("%(ext)s");

        let mut cmd = Command::new(&self.settings.program);
        cmd.arg("--format").arg("bestaudio/best");
        cmd.arg("--extract-audio");
        cmd.arg("--audio-format").arg("wav");
        cmd.arg("--output").arg(template);
        cmd.arg("--quiet");
        cmd.arg("--no-warnings");
        cmd.arg("--no-playlist");
        cmd.arg("--user-agent").arg(&self.settings.user_agent);

        if !self.settings.player_clients.is_empty() {
            cmd.arg("--extractor-args").arg(format!(
                "youtube:player_client={}",
                self.settings.player_clients.join(",")
            ));
        }

        if self.settings.skip_certificate_check {
            cmd.arg("--no-check-certificate");
        }

        cmd.arg(url);
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl AudioFetcher for YtDlpFetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> AudioResult<()> {
        let mut cmd = self.command(url, destination);
        debug!("Executing downloader command: {:?}", cmd.as_std());

        let limit = Duration::from_secs(self.settings.timeout_secs);
        let output = tokio::time::timeout(limit, cmd.output())
            .await
            .map_err(|_| {
                AudioError::Fetch(format!("download timed out after {}s", limit.as_secs()))
            })?
            .map_err(|e| {
                AudioError::Fetch(format!("failed to run {}: {}", self.settings.program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("no error output");
            return Err(AudioError::Fetch(format!(
                "{} exited with {}: {}",
                self.settings.program, output.status, reason
            )));
        }

        if !destination.exists() {
            return Err(AudioError::Fetch(
                "downloader finished without producing a WAV file".to_string(),
            ));
        }

        Ok(())
    }
}

/// Fetches remote audio into session-scoped storage.
pub struct AcquisitionAdapter {
    registry: Arc<SessionRegistry>,
    fetcher: Arc<dyn AudioFetcher>,
    sample_rate: u32,
}

impl AcquisitionAdapter {
    pub fn new(registry: Arc<SessionRegistry>, fetcher: Arc<dyn AudioFetcher>, sample_rate: u32) -> Self {
        Self {
            registry,
            fetcher,
            sample_rate,
        }
    }

    /// Download `url` into the session and return the source artifact name.
    ///
    /// A new download replaces the session's source and discards its previous
    /// filter output.
    pub async fn fetch(&self, url: &str, id: &SessionId) -> AudioResult<String> {
        let url = url.trim();
        if url.is_empty() {
            return Err(AudioError::Fetch("no URL given".to_string()));
        }

        let raw = self.registry.resolve_path(id, RAW_DOWNLOAD_ARTIFACT);
        let source = self.registry.resolve_path(id, SOURCE_ARTIFACT);

        info!(session_id = %id, url = %url, "Downloading audio");
        let started = Instant::now();

        let result = self.download_and_store(url, &raw, &source).await;
        let _ = std::fs::remove_file(&raw);

        match result {
            Ok(duration_seconds) => {
                let _ = std::fs::remove_file(self.registry.resolve_path(id, PROCESSED_ARTIFACT));
                info!(
                    session_id = %id,
                    duration_seconds,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Audio downloaded"
                );
                Ok(SOURCE_ARTIFACT.to_string())
            }
            Err(e) => {
                let _ = std::fs::remove_file(&source);
                Err(e)
            }
        }
    }

    /// Returns the duration of the stored waveform in seconds.
    async fn download_and_store(&self, url: &str, raw: &Path, source: &Path) -> AudioResult<f64> {
        self.fetcher.fetch(url, raw).await?;

        let raw: PathBuf = raw.to_path_buf();
        let source: PathBuf = source.to_path_buf();
        let sample_rate = self.sample_rate;

        tokio::task::spawn_blocking(move || -> AudioResult<f64> {
            let decoded = waveform::load_canonical(&raw, sample_rate)
                .map_err(|e| AudioError::Fetch(format!("downloaded file is not usable audio: {}", e)))?;
            if decoded.is_empty() {
                return Err(AudioError::Fetch("downloaded audio contains no samples".to_string()));
            }
            waveform::write_wav(&source, &decoded)?;
            Ok(decoded.duration_seconds())
        })
        .await
        .map_err(|e| AudioError::Fetch(format!("decoding task failed: {}", e)))?
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::f64::consts::PI;
    use std::fs::File;
    use tempfile::TempDir;

    /// Writes a stereo 44.1 kHz tone instead of downloading anything.
    pub(crate) struct ToneFetcher {
        pub seconds: f64,
    }

    #[async_trait]
    impl AudioFetcher for ToneFetcher {
        async fn fetch(&self, _url: &str, destination: &Path) -> AudioResult<()> {
            let frames = (44100.0 * self.seconds) as usize;
            let samples: Vec<i16> = (0..frames)
                .flat_map(|i| {
                    let s = (0.5 * (2.0 * PI * 440.0 * i as f64 / 44100.0).sin() * 32767.0) as i16;
                    [s, s]
                })
                .collect();
            let header = wav::Header::new(wav::WAV_FORMAT_PCM, 2, 44100, 16);
            let mut file = File::create(destination)?;
            wav::write(header, &wav::BitDepth::Sixteen(samples), &mut file)?;
            Ok(())
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl AudioFetcher for FailingFetcher {
        async fn fetch(&self, url: &str, _destination: &Path) -> AudioResult<()> {
            Err(AudioError::Fetch(format!("unsupported source: {}", url)))
        }
    }

    struct GarbageFetcher;

    #[async_trait]
    impl AudioFetcher for GarbageFetcher {
        async fn fetch(&self, _url: &str, destination: &Path) -> AudioResult<()> {
            std::fs::write(destination, b"<html>not audio</html>")?;
            Ok(())
        }
    }

    fn adapter(fetcher: Arc<dyn AudioFetcher>) -> (TempDir, Arc<SessionRegistry>, AcquisitionAdapter) {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(SessionRegistry::new(dir.path(), Duration::from_secs(1800)).unwrap());
        let adapter = AcquisitionAdapter::new(Arc::clone(&registry), fetcher, 22050);
        (dir, registry, adapter)
    }

    #[tokio::test]
    async fn test_fetch_stores_canonical_source() {
        let (_dir, registry, adapter) = adapter(Arc::new(ToneFetcher { seconds: 1.0 }));
        let id = registry.create();

        let artifact = adapter.fetch("https://example.com/watch?v=tone", &id).await.unwrap();
        assert_eq!(artifact, SOURCE_ARTIFACT);

        let stored = waveform::read_wav(&registry.resolve_path(&id, SOURCE_ARTIFACT)).unwrap();
        assert_eq!(stored.sample_rate(), 22050);
        assert_eq!(stored.len(), 22050);
        assert!(!registry.resolve_path(&id, RAW_DOWNLOAD_ARTIFACT).exists());
    }

    #[tokio::test]
    async fn test_new_download_discards_previous_output() {
        let (_dir, registry, adapter) = adapter(Arc::new(ToneFetcher { seconds: 0.2 }));
        let id = registry.create();
        let processed = registry.resolve_path(&id, PROCESSED_ARTIFACT);
        std::fs::write(&processed, b"stale").unwrap();

        adapter.fetch("https://example.com/a", &id).await.unwrap();
        assert!(!processed.exists());
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_no_artifact() {
        let (_dir, registry, adapter) = adapter(Arc::new(FailingFetcher));
        let id = registry.create();

        let err = adapter.fetch("ftp://nowhere", &id).await.unwrap_err();
        assert!(matches!(err, AudioError::Fetch(_)));
        assert!(!registry.resolve_path(&id, SOURCE_ARTIFACT).exists());
    }

    #[tokio::test]
    async fn test_undecodable_download_is_fetch_error() {
        let (_dir, registry, adapter) = adapter(Arc::new(GarbageFetcher));
        let id = registry.create();

        let err = adapter.fetch("https://example.com/page", &id).await.unwrap_err();
        assert!(matches!(err, AudioError::Fetch(_)));
        assert!(!registry.resolve_path(&id, SOURCE_ARTIFACT).exists());
        assert!(!registry.resolve_path(&id, RAW_DOWNLOAD_ARTIFACT).exists());
    }

    #[tokio::test]
    async fn test_empty_url_is_rejected() {
        let (_dir, registry, adapter) = adapter(Arc::new(ToneFetcher { seconds: 0.1 }));
        let id = registry.create();
        assert!(matches!(adapter.fetch("   ", &id).await, Err(AudioError::Fetch(_))));
    }

    #[test]
    fn test_ytdlp_command_line() {
        let fetcher = YtDlpFetcher::new(crate::config::AppConfig::default().downloader);
        let cmd = fetcher.command("https://youtu.be/abc", Path::new("/tmp/sid_download.wav"));
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(cmd.as_std().get_program(), "yt-dlp");
        assert!(args.windows(2).any(|w| w[0] == "--output" && w[1] == "/tmp/sid_download.%(ext)s"));
        assert!(args.windows(2).any(|w| w[0] == "--audio-format" && w[1] == "wav"));
        assert!(args.contains(&"youtube:player_client=android,web".to_string()));
        assert!(args.contains(&"--no-check-certificate".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/abc"));
    }

    #[tokio::test]
    async fn test_missing_downloader_is_fetch_error() {
        let mut settings = crate::config::AppConfig::default().downloader;
        settings.program = "definitely-not-an-installed-downloader".to_string();
        let fetcher = YtDlpFetcher::new(settings);

        let dir = TempDir::new().unwrap();
        let err = fetcher
            .fetch("https://youtu.be/abc", &dir.path().join("x_download.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, AudioError::Fetch(_)));
    }
}
