use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": config
    })))
}

/// Apply a partial configuration update.
///
/// `storage.max_age_secs` applies to the next sweep; server and sweep interval changes
/// are stored but only read at startup. Audio settings are fixed and rejected with 400,
/// as is a body that is not JSON.
pub async fn update_config(
    state: web::Data<AppState>,
    body: String,
) -> Result<HttpResponse, AppError> {
    let mut current_config = state.get_config();
    current_config
        .update_from_json(&body)
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    state.update_config(current_config.clone())
        .map_err(AppError::ValidationError)?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Configuration updated successfully",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "updated_config": current_config
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::acquisition::tests::ToneFetcher;
    use crate::config::AppConfig;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    #[actix_web::test]
    async fn test_config_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.storage.temp_dir = dir.path().to_string_lossy().into_owned();
        let state = AppState::new(config, Arc::new(ToneFetcher { seconds: 0.1 })).unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(crate::handlers::configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/config").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["config"]["audio"]["sample_rate"], 22050);

        let req = test::TestRequest::put()
            .uri("/api/v1/config")
            .set_json(json!({ "storage": { "max_age_secs": 900 } }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "success");
        assert_eq!(state.sessions.max_age(), Duration::from_secs(900));

        let req = test::TestRequest::put()
            .uri("/api/v1/config")
            .set_json(json!({ "audio": { "filter_order": 2, "echo_delay_seconds": 1.5, "echo_decay_factor": 1.0 } }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["type"], "validation_error");
        assert_eq!(state.get_config().audio.sample_rate, 22050);

        let req = test::TestRequest::put()
            .uri("/api/v1/config")
            .set_payload("{ storage: ")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.sessions.max_age(), Duration::from_secs(900));
    }
}
