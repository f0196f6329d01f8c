//! # Application State Management
//!
//! This module manages shared state that needs to be accessed by multiple HTTP request handlers
//! simultaneously.
//!
//! ## Key Rust Concepts:
//!
//! ### Arc (Atomically Reference Counted)
//! - **Purpose**: Allows multiple parts of the program to safely share ownership of data
//! - **Why needed**: Multiple HTTP requests run simultaneously and all need access to the same
//!   session registry, pipeline and acquisition adapter
//! - **Thread safety**: Safe to share between threads
//!
//! ### RwLock (Reader-Writer Lock)
//! - **Purpose**: Allows multiple readers OR one writer at a time (but not both)
//! - **Why needed**: Multiple requests can read config simultaneously, but only one can update it
//!
//! ## What lives here:
//! - **config / metrics / start_time**: runtime configuration and request statistics
//! - **sessions**: the one `SessionRegistry`, constructed explicitly and handed to every
//!   component that builds artifact paths
//! - **pipeline / acquisition**: the audio operations, sharing that same registry
//!
//! The audio components carry no per-session state of their own; a session's audio only
//! exists as files in the registry's storage directory.

use crate::audio::{AcquisitionAdapter, AudioFetcher, AudioPipeline};
use crate::config::AppConfig;
use crate::error::AudioResult;
use crate::session::SessionRegistry;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

/// The main application state that's shared across all HTTP request handlers.
///
/// ## Thread Safety Pattern:
/// Mutable data sits behind `Arc<RwLock<T>>`; the audio components are shared through
/// `Arc` and do their own locking internally.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (can be updated at runtime)
    pub config: Arc<RwLock<AppConfig>>,

    /// Request and operation counters (updated by middleware and handlers)
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started (never changes, so no Arc<RwLock> needed)
    pub start_time: Instant,

    /// Live sessions and the naming of their artifacts
    pub sessions: Arc<SessionRegistry>,

    /// Filter / visualize / describe operations
    pub pipeline: Arc<AudioPipeline>,

    /// Remote audio download into a session
    pub acquisition: Arc<AcquisitionAdapter>,
}

/// Metrics collected across all HTTP requests.
///
/// ## Why these metrics matter:
/// - **request_count / error_count**: load and reliability monitoring
/// - **audio operation counters**: what the service is actually being used for
/// - **endpoint_metrics**: per-route latency and error rate
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of errors encountered since server start
    pub error_count: u64,

    /// Successful downloads
    pub downloads: u64,

    /// Successful filter applications
    pub filters_applied: u64,

    /// Successfully rendered plots
    pub visualizations_rendered: u64,

    /// Detailed metrics for each API endpoint
    /// Key: route pattern (e.g., "POST /api/v1/sessions/{session_id}/filter")
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Kinds of audio operations counted in `AppMetrics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioOperation {
    Download,
    Filter,
    Visualization,
}

/// Detailed performance metrics for a specific API endpoint.
///
/// ## Performance calculations:
/// - **Average response time**: total_duration_ms / request_count
/// - **Error rate**: error_count / request_count
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    /// Number of requests to this specific endpoint
    pub request_count: u64,

    /// Total time spent processing all requests to this endpoint (milliseconds)
    pub total_duration_ms: u64,

    /// Number of errors that occurred for this endpoint
    pub error_count: u64,
}

impl AppState {
    /// Build the application state from configuration.
    ///
    /// ## What this does:
    /// 1. Creates the session registry (and its storage directory)
    /// 2. Builds the pipeline and acquisition adapter on top of that registry
    /// 3. Wraps config and empty metrics for thread-safe sharing
    ///
    /// The fetcher is injected so tests can replace the external downloader.
    pub fn new(config: AppConfig, fetcher: Arc<dyn AudioFetcher>) -> AudioResult<Self> {
        let sessions = Arc::new(SessionRegistry::new(
            config.storage.temp_dir(),
            config.storage.max_age(),
        )?);
        let pipeline = Arc::new(AudioPipeline::new(Arc::clone(&sessions), config.audio.sample_rate));
        let acquisition = Arc::new(AcquisitionAdapter::new(
            Arc::clone(&sessions),
            fetcher,
            config.audio.sample_rate,
        ));

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
            sessions,
            pipeline,
            acquisition,
        })
    }

    /// Get a copy of the current configuration.
    ///
    /// ## Why clone:
    /// Cloning releases the lock immediately, so other threads aren't blocked.
    pub fn get_config(&self) -> AppConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Validate and apply a new configuration.
    ///
    /// The session max age takes effect for the next sweep. The sample rate, storage
    /// directory, sweep interval, downloader and server address are read once at startup
    /// and need a restart.
    pub fn update_config(&self, new_config: AppConfig) -> Result<(), String> {
        new_config.validate().map_err(|e| e.to_string())?;

        self.sessions.set_max_age(new_config.storage.max_age());
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = new_config;
        Ok(())
    }

    /// Increment the total request counter (called by middleware for every request).
    pub fn increment_request_count(&self) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        metrics.request_count += 1;
    }

    /// Increment the total error counter (called when any request fails).
    pub fn increment_error_count(&self) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        metrics.error_count += 1;
    }

    /// Count a successful audio operation.
    pub fn record_operation(&self, operation: AudioOperation) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        match operation {
            AudioOperation::Download => metrics.downloads += 1,
            AudioOperation::Filter => metrics.filters_applied += 1,
            AudioOperation::Visualization => metrics.visualizations_rendered += 1,
        }
    }

    /// Record detailed metrics for a specific endpoint.
    ///
    /// ## Parameters:
    /// - **endpoint**: Method plus route pattern (e.g., "GET /api/v1/health")
    /// - **duration_ms**: How long the request took to process (in milliseconds)
    /// - **is_error**: Whether this request resulted in an error
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);

        // Get or create metrics for this specific endpoint
        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Number of sessions currently registered.
    pub fn active_sessions(&self) -> usize {
        self.sessions.session_count()
    }

    /// Get a snapshot of current metrics (used for the /metrics endpoint).
    ///
    /// Clones the data so we don't hold the lock while sending the HTTP response.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Get server uptime in seconds.
    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    /// Average response time for this endpoint.
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0  // No requests yet, so no average to calculate
        }
    }

    /// Error rate for this endpoint as a fraction (0.0 to 1.0).
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0  // No requests yet, so no errors possible
        }
    }
}
