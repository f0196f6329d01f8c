//! # Session REST API Handlers
//!
//! Lifecycle endpoints for the opaque session ids that scope every stored artifact.
//!
//! ## Available Endpoints:
//! - `POST /sessions` - Create a session
//! - `GET /sessions/{session_id}` - Session status and a summary of its current audio
//! - `DELETE /sessions/{session_id}` - Evict a session and delete its files

use crate::{error::AppError, session::SessionId, state::AppState};
use actix_web::{web, HttpResponse};
use serde::Serialize;
use serde_json::json;

/// Response structure for the session status endpoint.
#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub session_id: String,
    pub exists: bool,
    pub has_audio: bool,
    pub sample_rate: Option<u32>,
    pub duration: Option<f64>,
    pub samples: Option<usize>,
    pub channels: Option<u16>,
    pub last_access: Option<String>,
}

/// Parse a path segment into a session id that the registry currently knows.
///
/// Malformed, unknown and expired ids all fail with `InvalidSession` (404).
pub fn require_session(state: &AppState, raw: &str) -> Result<SessionId, AppError> {
    let id = SessionId::parse(raw)?;
    state.sessions.require(&id)?;
    Ok(id)
}

/// Create a new session.
///
/// ## Endpoint: `POST /api/v1/sessions`
///
/// ## Response:
/// ```json
/// { "session_id": "6a2f41a3-c54c-4b19-9cd5-2c1c1f1f7c3e" }
/// ```
pub async fn create_session(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let id = state.sessions.create();
    Ok(HttpResponse::Created().json(json!({ "session_id": id.to_string() })))
}

/// Report whether the session has audio and describe it.
///
/// ## Endpoint: `GET /api/v1/sessions/{session_id}`
///
/// Describes the latest filter output when there is one, otherwise the downloaded source.
pub async fn get_session(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = require_session(&state, &path.into_inner())?;

    let pipeline = state.pipeline.clone();
    let info = web::block(move || pipeline.describe(&id)).await??;

    Ok(HttpResponse::Ok().json(SessionStatusResponse {
        session_id: id.to_string(),
        exists: true,
        has_audio: info.is_some(),
        sample_rate: info.as_ref().map(|i| i.sample_rate),
        duration: info.as_ref().map(|i| i.duration_seconds),
        samples: info.as_ref().map(|i| i.sample_count),
        channels: info.as_ref().map(|i| i.channel_count),
        last_access: state.sessions.last_access(&id).map(|t| t.to_rfc3339()),
    }))
}

/// Evict a session and every file it owns.
///
/// ## Endpoint: `DELETE /api/v1/sessions/{session_id}`
pub async fn delete_session(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = require_session(&state, &path.into_inner())?;

    let sessions = state.sessions.clone();
    let files_removed = web::block(move || sessions.evict(&id)).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "session_id": id.to_string(),
        "files_removed": files_removed
    })))
}
