//! # Error Handling
//!
//! Two layers of errors live here:
//!
//! - **`AudioError`**: the typed taxonomy surfaced by the audio core (session registry,
//!   acquisition, signal pipeline). Callers match on variants instead of parsing messages.
//! - **`AppError`**: the HTTP-facing error. Every `AudioError` converts into it, and it
//!   knows how to turn itself into a JSON response with the right status code.
//!
//! ## Key Rust Concepts for Error Handling:
//!
//! ### Result<T, E> Type
//! - **T**: The success type (an artifact name, a waveform, ...)
//! - **E**: The error type (what you get when something goes wrong)
//! - **No exceptions**: every fallible core operation returns `Result<_, AudioError>`
//!
//! ### Traits for Error Conversion
//! - **From trait**: Lets `?` convert `AudioError`, `anyhow::Error`, etc. into `AppError`
//! - **ResponseError trait**: Converts errors to HTTP responses
//! - **thiserror**: Derives `Display` and `std::error::Error` for the core error enum

use actix_web::{HttpResponse, ResponseError};  // Web framework error handling
use serde_json::json;                          // For creating JSON error responses
use std::fmt;                                  // For implementing Display trait
use thiserror::Error;

/// Errors produced by the audio core.
///
/// ## Error Categories:
/// - **Fetch**: the external source was unreachable, unsupported, or extraction failed
/// - **NoAudioLoaded**: the operation needs a stored waveform the session doesn't have
/// - **UnsupportedFilterType / UnsupportedVisualizationType**: unrecognized tag
/// - **InvalidFilterParameters**: a cutoff outside the valid normalized range
/// - **InvalidSession**: unknown, expired or malformed session id
/// - **Io / Decode / Resample / Render**: plumbing failures while reading or writing artifacts
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to fetch audio: {0}")]
    Fetch(String),

    #[error("no audio loaded for this session")]
    NoAudioLoaded,

    #[error("unsupported filter type: {0}")]
    UnsupportedFilterType(String),

    #[error("unsupported visualization type: {0}")]
    UnsupportedVisualizationType(String),

    #[error("invalid filter parameters: {0}")]
    InvalidFilterParameters(String),

    #[error("invalid or expired session: {0}")]
    InvalidSession(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not decode audio: {0}")]
    Decode(String),

    #[error("resampling failed: {0}")]
    Resample(String),

    #[error("rendering failed: {0}")]
    Render(String),
}

impl AudioError {
    /// Machine-readable kind used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            AudioError::Fetch(_) => "fetch_error",
            AudioError::NoAudioLoaded => "no_audio_loaded",
            AudioError::UnsupportedFilterType(_) => "unsupported_filter_type",
            AudioError::UnsupportedVisualizationType(_) => "unsupported_visualization_type",
            AudioError::InvalidFilterParameters(_) => "invalid_filter_parameters",
            AudioError::InvalidSession(_) => "invalid_session",
            AudioError::Io(_) => "io_error",
            AudioError::Decode(_) => "decode_error",
            AudioError::Resample(_) => "resample_error",
            AudioError::Render(_) => "render_error",
        }
    }
}

impl From<rubato::ResamplerConstructionError> for AudioError {
    fn from(e: rubato::ResamplerConstructionError) -> Self {
        AudioError::Resample(e.to_string())
    }
}

impl From<rubato::ResampleError> for AudioError {
    fn from(e: rubato::ResampleError) -> Self {
        AudioError::Resample(e.to_string())
    }
}

impl From<image::ImageError> for AudioError {
    fn from(e: image::ImageError) -> Self {
        AudioError::Render(e.to_string())
    }
}

/// Result type for audio core operations
pub type AudioResult<T> = Result<T, AudioError>;

/// Custom error types for the HTTP layer.
///
/// ## Error Categories:
/// - **Internal**: Server-side problems (500 errors)
/// - **BadRequest**: Client sent invalid data (400 errors)
/// - **NotFound**: Requested resource doesn't exist (404 errors)
/// - **ValidationError**: Data validation failed (400 errors)
/// - **Audio**: Anything the audio core reported, mapped per kind
///
/// ## Usage Example:
/// ```rust
/// return Err(AppError::NotFound("Artifact not found".to_string()));
/// ```
#[derive(Debug)]
pub enum AppError {
    /// Internal server errors (blocking pool failures, etc.)
    Internal(String),

    /// Client sent invalid or malformed data
    BadRequest(String),

    /// Requested resource was not found
    NotFound(String),

    /// User input failed validation rules
    ValidationError(String),

    /// Typed failure from the audio core
    Audio(AudioError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::Audio(err) => write!(f, "{}", err),
        }
    }
}

/// Implementation of the ResponseError trait for AppError.
///
/// ## HTTP Status Code Mapping:
/// - Internal → 500 (Internal Server Error)
/// - BadRequest/ValidationError → 400 (Bad Request)
/// - NotFound → 404 (Not Found)
/// - Audio: `InvalidSession` → 404, `Fetch` → 502, plumbing kinds → 500, everything else → 400
///
/// ## JSON Response Format:
/// All errors return JSON with a consistent structure:
/// ```json
/// {
///   "error": {
///     "type": "no_audio_loaded",
///     "message": "no audio loaded for this session",
///     "timestamp": "2025-01-01T12:00:00Z"
///   }
/// }
/// ```
impl ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;

        match self {
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Audio(err) => match err {
                AudioError::InvalidSession(_) => StatusCode::NOT_FOUND,
                AudioError::Fetch(_) => StatusCode::BAD_GATEWAY,
                AudioError::Io(_)
                | AudioError::Decode(_)
                | AudioError::Resample(_)
                | AudioError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
                AudioError::NoAudioLoaded
                | AudioError::UnsupportedFilterType(_)
                | AudioError::UnsupportedVisualizationType(_)
                | AudioError::InvalidFilterParameters(_) => StatusCode::BAD_REQUEST,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Map each error type to a machine-readable type and a human-readable message
        let (error_type, message) = match self {
            AppError::Internal(msg) => ("internal_error", msg.clone()),
            AppError::BadRequest(msg) => ("bad_request", msg.clone()),
            AppError::NotFound(msg) => ("not_found", msg.clone()),
            AppError::ValidationError(msg) => ("validation_error", msg.clone()),
            AppError::Audio(err) => (err.kind(), err.to_string()),
        };

        HttpResponse::build(self.status_code()).json(json!({
            "error": {
                "type": error_type,           // Machine-readable error type
                "message": message,           // Human-readable error message
                "timestamp": chrono::Utc::now().to_rfc3339()  // When the error occurred
            }
        }))
    }
}

/// Every core failure becomes an `AppError::Audio`, keeping its kind for the status mapping.
impl From<AudioError> for AppError {
    fn from(err: AudioError) -> Self {
        AppError::Audio(err)
    }
}

/// A panicked or cancelled blocking DSP job.
impl From<actix_web::error::BlockingError> for AppError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        AppError::Internal(format!("Background job failed: {}", err))
    }
}

/// Type alias for Results that use our custom error type.
///
/// ## Rust Concepts:
/// - **type alias**: Creates a new name for an existing type
/// - **Generic type**: `T` can be any type (String, HttpResponse, etc.)
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_audio_error_status_mapping() {
        let cases = vec![
            (AudioError::InvalidSession("x".into()), StatusCode::NOT_FOUND),
            (AudioError::NoAudioLoaded, StatusCode::BAD_REQUEST),
            (AudioError::UnsupportedFilterType("wah".into()), StatusCode::BAD_REQUEST),
            (AudioError::UnsupportedVisualizationType("3d".into()), StatusCode::BAD_REQUEST),
            (AudioError::InvalidFilterParameters("cutoff".into()), StatusCode::BAD_REQUEST),
            (AudioError::Fetch("network".into()), StatusCode::BAD_GATEWAY),
            (AudioError::Decode("bad header".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            let app_err: AppError = err.into();
            assert_eq!(app_err.status_code(), expected, "wrong status for {}", app_err);
        }
    }

    #[test]
    fn test_app_error_body() {
        let resp = AppError::ValidationError("Max age must be greater than 0".into()).error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = AppError::Internal("Background job failed".into()).error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_audio_error_kind_is_stable() {
        assert_eq!(AudioError::NoAudioLoaded.kind(), "no_audio_loaded");
        assert_eq!(
            AudioError::UnsupportedFilterType("x".into()).kind(),
            "unsupported_filter_type"
        );
    }
}
