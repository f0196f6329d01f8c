//! # HTTP Handlers
//!
//! Everything under `/api/v1`. Handlers only parse requests, resolve the session and
//! hand off to `AppState`; all audio semantics live in `crate::audio`.

pub mod audio;
pub mod config;
pub mod sessions;

pub use audio::*;
pub use config::*;
pub use sessions::*;

use crate::health;
use actix_web::web;

/// Register the `/api/v1` routes.
///
/// Shared by `main` and the handler tests so both serve the same route table.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health::health_check))
            .route("/metrics", web::get().to(health::detailed_metrics))
            .route("/config", web::get().to(get_config))
            .route("/config", web::put().to(update_config))
            .route("/sessions", web::post().to(create_session))
            .route("/sessions/{session_id}", web::get().to(get_session))
            .route("/sessions/{session_id}", web::delete().to(delete_session))
            .route("/sessions/{session_id}/download", web::post().to(download_audio))
            .route("/sessions/{session_id}/filter", web::post().to(apply_filter))
            .route("/sessions/{session_id}/visualize/{kind}", web::get().to(visualize))
            .route("/sessions/{session_id}/audio/{filename}", web::get().to(serve_audio)),
    );
}
