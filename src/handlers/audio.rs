//! # Audio REST API Handlers
//!
//! Thin translation from HTTP requests to the acquisition adapter and the audio pipeline.
//! Every route resolves its session first, so an unknown id fails before any file is touched.
//!
//! ## Available Endpoints:
//! - `POST /sessions/{session_id}/download` - Fetch remote audio into the session
//! - `POST /sessions/{session_id}/filter` - Apply a named filter to the session's audio
//! - `GET /sessions/{session_id}/visualize/{kind}` - Render a plot, returned as PNG
//! - `GET /sessions/{session_id}/audio/{filename}` - Serve a stored artifact
//!
//! DSP work runs on actix's blocking pool (`web::block`) so a long filter never stalls
//! the async workers.

use super::sessions::require_session;
use crate::error::{AppError, AudioError};
use crate::state::{AppState, AudioOperation};
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Request body for downloading audio.
#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    /// Page or media URL understood by the downloader
    pub url: String,
}

/// Request body for applying a filter.
#[derive(Debug, Deserialize)]
pub struct FilterRequest {
    /// One of low_pass, high_pass, band_pass_bass, band_pass_mids, band_pass_treble, echo
    pub filter_type: String,
    /// Cutoff in Hz (only used by low_pass / high_pass)
    #[serde(default = "default_cutoff")]
    pub cutoff_freq: f64,
    /// Wet/dry mix in [0, 1]
    #[serde(default = "default_intensity")]
    pub intensity: f64,
}

fn default_cutoff() -> f64 {
    1000.0
}

fn default_intensity() -> f64 {
    1.0
}

/// Response structure for operations that produce an artifact.
#[derive(Debug, Serialize)]
pub struct ArtifactResponse {
    pub success: bool,
    pub message: String,
    pub filename: String,
}

/// Download audio from a URL into the session.
///
/// ## Endpoint: `POST /api/v1/sessions/{session_id}/download`
///
/// ## Request Body:
/// ```json
/// { "url": "https://www.youtube.com/watch?v=..." }
/// ```
pub async fn download_audio(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<DownloadRequest>,
) -> Result<HttpResponse, AppError> {
    let id = require_session(&state, &path.into_inner())?;

    let filename = state.acquisition.fetch(&body.url, &id).await?;
    state.record_operation(AudioOperation::Download);

    Ok(HttpResponse::Ok().json(ArtifactResponse {
        success: true,
        message: "Audio downloaded successfully".to_string(),
        filename,
    }))
}

/// Apply a filter to the session's downloaded audio.
///
/// ## Endpoint: `POST /api/v1/sessions/{session_id}/filter`
///
/// ## Request Body:
/// ```json
/// { "filter_type": "low_pass", "cutoff_freq": 800, "intensity": 0.7 }
/// ```
///
/// ## Errors:
/// - 400 `no_audio_loaded` before a successful download
/// - 400 `unsupported_filter_type` / `invalid_filter_parameters`
pub async fn apply_filter(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<FilterRequest>,
) -> Result<HttpResponse, AppError> {
    let id = require_session(&state, &path.into_inner())?;
    let FilterRequest { filter_type, cutoff_freq, intensity } = body.into_inner();

    let pipeline = state.pipeline.clone();
    let message = format!("{} filter applied", filter_type);
    let filename = web::block(move || pipeline.apply_filter(&id, &filter_type, cutoff_freq, intensity))
        .await??;
    state.record_operation(AudioOperation::Filter);

    Ok(HttpResponse::Ok().json(ArtifactResponse {
        success: true,
        message,
        filename,
    }))
}

/// Render a visualization of the session's current audio.
///
/// ## Endpoint: `GET /api/v1/sessions/{session_id}/visualize/{kind}`
///
/// `kind` is one of `waveform`, `spectrogram`, `spectrum`. The plot is written to the
/// session's storage and returned directly as `image/png`.
pub async fn visualize(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (raw_id, kind) = path.into_inner();
    let id = require_session(&state, &raw_id)?;

    let pipeline = state.pipeline.clone();
    let sessions = state.sessions.clone();
    let png = web::block(move || -> Result<Vec<u8>, AppError> {
        let artifact = pipeline.render_visualization(&id, &kind)?;
        let bytes = std::fs::read(sessions.resolve_path(&id, &artifact))
            .map_err(AudioError::from)?;
        Ok(bytes)
    })
    .await??;
    state.record_operation(AudioOperation::Visualization);

    Ok(HttpResponse::Ok().content_type("image/png").body(png))
}

/// Serve a stored artifact of the session.
///
/// ## Endpoint: `GET /api/v1/sessions/{session_id}/audio/{filename}`
///
/// `filename` is the artifact name returned by download or filter (e.g. `filtered_echo.wav`).
/// Names containing path separators or `..` are rejected before any path is built.
pub async fn serve_audio(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (raw_id, filename) = path.into_inner();
    let id = require_session(&state, &raw_id)?;
    validate_artifact_name(&filename)?;

    let file_path = state.sessions.resolve_path(&id, &filename);
    let bytes = match tokio::fs::read(&file_path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound(format!("Artifact {} not found", filename)));
        }
        Err(e) => return Err(AudioError::from(e).into()),
    };

    info!(session_id = %id, filename = %filename, bytes = bytes.len(), "Serving artifact");
    Ok(HttpResponse::Ok().content_type(content_type_for(&filename)).body(bytes))
}

fn validate_artifact_name(filename: &str) -> Result<(), AppError> {
    if filename.is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
    {
        return Err(AppError::BadRequest(format!("Invalid artifact name: {}", filename)));
    }
    Ok(())
}

fn content_type_for(filename: &str) -> &'static str {
    if filename.ends_with(".png") {
        "image/png"
    } else if filename.ends_with(".wav") {
        "audio/wav"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::acquisition::tests::ToneFetcher;
    use crate::config::AppConfig;
    use actix_web::{http::StatusCode, test as actix_test, App};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn app_state() -> (TempDir, AppState) {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.storage.temp_dir = dir.path().to_string_lossy().into_owned();
        let state = AppState::new(config, Arc::new(ToneFetcher { seconds: 0.5 })).unwrap();
        (dir, state)
    }

    #[test]
    fn test_validate_artifact_name() {
        assert!(validate_artifact_name("filtered_echo.wav").is_ok());
        assert!(validate_artifact_name("../secret.wav").is_err());
        assert!(validate_artifact_name("a/b.wav").is_err());
        assert!(validate_artifact_name("a\\b.wav").is_err());
        assert!(validate_artifact_name("").is_err());
    }

    #[actix_web::test]
    async fn test_download_filter_visualize_serve() {
        let (_dir, state) = app_state();
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(crate::handlers::configure),
        )
        .await;

        let req = actix_test::TestRequest::post().uri("/api/v1/sessions").to_request();
        let created: Value = actix_test::call_and_read_body_json(&app, req).await;
        let id = created["session_id"].as_str().unwrap().to_string();

        // Nothing to filter yet
        let req = actix_test::TestRequest::post()
            .uri(&format!("/api/v1/sessions/{}/filter", id))
            .set_json(json!({ "filter_type": "echo" }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = actix_test::TestRequest::post()
            .uri(&format!("/api/v1/sessions/{}/download", id))
            .set_json(json!({ "url": "https://example.com/tone" }))
            .to_request();
        let downloaded: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(downloaded["success"], true);
        assert_eq!(downloaded["filename"], "downloaded_audio.wav");

        let req = actix_test::TestRequest::post()
            .uri(&format!("/api/v1/sessions/{}/filter", id))
            .set_json(json!({ "filter_type": "low_pass", "cutoff_freq": 800.0, "intensity": 0.5 }))
            .to_request();
        let filtered: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(filtered["filename"], "filtered_low_pass.wav");

        for band in ["band_pass_bass", "band_pass_mids", "band_pass_treble"] {
            let req = actix_test::TestRequest::post()
                .uri(&format!("/api/v1/sessions/{}/filter", id))
                .set_json(json!({ "filter_type": band }))
                .to_request();
            let filtered: Value = actix_test::call_and_read_body_json(&app, req).await;
            assert_eq!(filtered["filename"], format!("filtered_{}.wav", band));
        }

        // The last filter applied is the one described and served
        let req = actix_test::TestRequest::post()
            .uri(&format!("/api/v1/sessions/{}/filter", id))
            .set_json(json!({ "filter_type": "low_pass", "cutoff_freq": 800.0, "intensity": 0.5 }))
            .to_request();
        assert!(actix_test::call_service(&app, req).await.status().is_success());

        let req = actix_test::TestRequest::get()
            .uri(&format!("/api/v1/sessions/{}", id))
            .to_request();
        let status: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(status["has_audio"], true);
        assert_eq!(status["sample_rate"], 22050);
        assert_eq!(status["samples"], 11025);
        assert_eq!(status["channels"], 1);

        let req = actix_test::TestRequest::get()
            .uri(&format!("/api/v1/sessions/{}/visualize/spectrum", id))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("content-type").unwrap(), "image/png");
        let body = actix_test::read_body(resp).await;
        assert_eq!(&body[..4], b"\x89PNG");

        let req = actix_test::TestRequest::get()
            .uri(&format!("/api/v1/sessions/{}/audio/filtered_low_pass.wav", id))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = actix_test::read_body(resp).await;
        assert_eq!(&body[..4], b"RIFF");

        let metrics = state.get_metrics_snapshot();
        assert_eq!(metrics.downloads, 1);
        assert_eq!(metrics.filters_applied, 5);
        assert_eq!(metrics.visualizations_rendered, 1);
    }

    #[actix_web::test]
    async fn test_error_statuses() {
        let (_dir, state) = app_state();
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(crate::handlers::configure),
        )
        .await;
        let id = state.sessions.create().to_string();

        // Well-formed but unknown, then malformed
        for unknown in ["6a2f41a3-c54c-4b19-9cd5-2c1c1f1f7c3e", "not-a-session"] {
            let req = actix_test::TestRequest::get()
                .uri(&format!("/api/v1/sessions/{}", unknown))
                .to_request();
            let resp = actix_test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        }

        let req = actix_test::TestRequest::get()
            .uri(&format!("/api/v1/sessions/{}/visualize/waveform", id))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["error"]["type"], "no_audio_loaded");

        let req = actix_test::TestRequest::post()
            .uri(&format!("/api/v1/sessions/{}/download", id))
            .set_json(json!({ "url": "https://example.com/tone" }))
            .to_request();
        assert!(actix_test::call_service(&app, req).await.status().is_success());

        let req = actix_test::TestRequest::get()
            .uri(&format!("/api/v1/sessions/{}/visualize/histogram", id))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["error"]["type"], "unsupported_visualization_type");

        let req = actix_test::TestRequest::post()
            .uri(&format!("/api/v1/sessions/{}/filter", id))
            .set_json(json!({ "filter_type": "reverb" }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = actix_test::TestRequest::get()
            .uri(&format!("/api/v1/sessions/{}/audio/filtered_echo.wav", id))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = actix_test::TestRequest::delete()
            .uri(&format!("/api/v1/sessions/{}", id))
            .to_request();
        let evicted: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(evicted["files_removed"], 1);
        assert_eq!(state.active_sessions(), 0);
    }
}
