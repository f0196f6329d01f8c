//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Key Rust Concepts Used:
//! - **Serde**: Serialization/deserialization library for converting between Rust structs and data formats
//! - **derive macros**: Automatically generate code for common traits (Debug, Clone, Serialize, Deserialize)
//! - **impl blocks**: Add methods to structs
//! - **Result<T, E>**: Error handling that forces you to handle potential failures
//!
//! ## Configuration Priority (highest to lowest):
//! 1. `HOST` / `PORT` environment variables (deployment platforms set these)
//! 2. Environment variables (APP_STORAGE__TEMP_DIR, APP_AUDIO__SAMPLE_RATE, etc.)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)

use anyhow::Result;              // Better error handling with context
use serde::{Deserialize, Serialize};  // For converting to/from TOML, JSON, etc.
use std::env;                    // For reading environment variables
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration that contains all settings.
///
/// ## Why separate config structs:
/// Breaking configuration into logical groups (server, storage, audio, downloader)
/// mirrors the components that consume them: the HTTP server, the session registry,
/// the signal pipeline and the acquisition adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub audio: AudioConfig,
    pub downloader: DownloaderConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,  // u16 = unsigned 16-bit integer (0-65535), perfect for port numbers
}

/// Temporary artifact storage and session expiry.
///
/// ## Fields:
/// - `temp_dir`: Flat directory shared by every session; files are prefixed with the session id
/// - `cleanup_interval_secs`: How often the background sweep runs (default 5 minutes)
/// - `max_age_secs`: Idle time after which sessions and files are removed (default 30 minutes)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub temp_dir: String,
    pub cleanup_interval_secs: u64,
    pub max_age_secs: u64,
}

impl StorageConfig {
    pub fn temp_dir(&self) -> PathBuf {
        PathBuf::from(&self.temp_dir)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

/// Signal processing settings.
///
/// Only the canonical sample rate is configurable. The filter order and echo shape are
/// fixed properties of the filters (`audio::filters`, `audio::effects`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Rate every loaded waveform is resampled to
    pub sample_rate: u32,
}

/// Settings for the external `yt-dlp` download tool.
///
/// ## Fields:
/// - `program`: Executable name or path
/// - `user_agent`: Browser user agent sent to the remote site
/// - `player_clients`: YouTube player clients tried by the extractor, in order
/// - `timeout_secs`: Upper bound on a single download
/// - `skip_certificate_check`: Passes `--no-check-certificate`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloaderConfig {
    pub program: String,
    pub user_agent: String,
    pub player_clients: Vec<String>,
    pub timeout_secs: u64,
    pub skip_certificate_check: bool,
}

/// Provides default configuration values.
///
/// ## Why defaults matter:
/// Default values ensure the application can start even if no configuration file exists.
/// They also serve as documentation of reasonable starting values.
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),  // Localhost only (safe for development)
                port: 8000,
            },
            storage: StorageConfig {
                temp_dir: "temp".to_string(),
                cleanup_interval_secs: 300,   // 5 minutes
                max_age_secs: 1800,           // 30 minutes
            },
            audio: AudioConfig {
                sample_rate: 22050,
            },
            downloader: DownloaderConfig {
                program: "yt-dlp".to_string(),
                user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                             (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                    .to_string(),
                player_clients: vec!["android".to_string(), "web".to_string()],
                timeout_secs: 300,
                skip_certificate_check: true,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    /// 4. Handle special cases for HOST and PORT environment variables
    ///
    /// ## Environment Variable Examples:
    /// - `APP_STORAGE__TEMP_DIR=/var/tmp/audio`: Override storage directory
    /// - `APP_STORAGE__MAX_AGE_SECS=600`: Expire idle sessions after 10 minutes
    /// - `APP_DOWNLOADER__PROGRAM=/usr/local/bin/yt-dlp`: Custom downloader path
    /// - `PORT=3000`: Special case for deployment platforms
    ///
    /// Nested keys are separated by a double underscore because several keys
    /// contain single underscores themselves.
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            // 1. Start with defaults - converts our Default impl to config format
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // 2. Load from config.toml file (if it exists) - required(false) means "don't error if missing"
            .add_source(config::File::with_name("config").required(false))
            // 3. Load from environment variables with APP_ prefix
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        // Handle special environment variables used by deployment platforms
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        // Build the final configuration and convert it back to our AppConfig struct
        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## Why validate:
    /// Catching configuration errors early prevents runtime failures (a zero sweep
    /// interval would spin, a zero sample rate would divide by zero in every filter).
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.storage.temp_dir.trim().is_empty() {
            return Err(anyhow::anyhow!("Storage temp_dir cannot be empty"));
        }

        if self.storage.cleanup_interval_secs == 0 {
            return Err(anyhow::anyhow!("Cleanup interval must be greater than 0"));
        }

        if self.storage.max_age_secs == 0 {
            return Err(anyhow::anyhow!("Max age must be greater than 0"));
        }

        if self.storage.cleanup_interval_secs > self.storage.max_age_secs {
            return Err(anyhow::anyhow!(
                "Cleanup interval ({}s) cannot exceed max age ({}s)",
                self.storage.cleanup_interval_secs,
                self.storage.max_age_secs
            ));
        }

        if self.audio.sample_rate < 1000 {
            return Err(anyhow::anyhow!("Sample rate must be at least 1000 Hz"));
        }

        if self.downloader.program.trim().is_empty() {
            return Err(anyhow::anyhow!("Downloader program cannot be empty"));
        }

        if self.downloader.timeout_secs == 0 {
            return Err(anyhow::anyhow!("Downloader timeout must be greater than 0"));
        }

        Ok(())  // All validation passed
    }

    /// Update configuration from a JSON string (used for runtime config updates).
    ///
    /// ## Partial updates:
    /// Only the fields present in the JSON are changed. For example,
    /// `{"storage": {"max_age_secs": 600}}` shortens session expiry and leaves
    /// everything else alone. Server host/port and the sweep interval are accepted but
    /// only take effect after a restart. The `audio` section is rejected: the sample rate
    /// is fixed for the lifetime of the process.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        // Parse the JSON string into a generic value
        let partial_config: serde_json::Value = serde_json::from_str(json_str)?;

        if partial_config.get("audio").is_some() {
            return Err(anyhow::anyhow!("Audio settings cannot be changed at runtime"));
        }

        if let Some(server) = partial_config.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port = u16::try_from(port)
                    .map_err(|_| anyhow::anyhow!("Port {} is out of range", port))?;
            }
        }

        if let Some(storage) = partial_config.get("storage") {
            if let Some(interval) = storage.get("cleanup_interval_secs").and_then(|v| v.as_u64()) {
                self.storage.cleanup_interval_secs = interval;
            }
            if let Some(max_age) = storage.get("max_age_secs").and_then(|v| v.as_u64()) {
                self.storage.max_age_secs = max_age;
            }
        }


        // Validate the updated configuration to ensure it's still valid
        self.validate()?;
        Ok(())
    }
}
