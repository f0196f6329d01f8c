use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures_util::future::LocalBoxFuture;
use std::{
    future::{ready, Ready},
    time::Instant,
};
use tracing::{info, error};

use crate::session::SessionId;

/// Logs the start and outcome of every request, tagged with the session id when the
/// path carries one.
pub struct RequestLogging;

impl<S, B> Transform<S, ServiceRequest> for RequestLogging
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLoggingMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggingMiddleware { service }))
    }
}

pub struct RequestLoggingMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestLoggingMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let method = req.method().to_string();
        let uri = req.uri().to_string();
        let remote_addr = req.connection_info().realip_remote_addr().unwrap_or("unknown").to_string();
        let session_id = session_id_from_path(req.path()).unwrap_or_default();

        info!(
            method = %method,
            uri = %uri,
            remote_addr = %remote_addr,
            session_id = %session_id,
            "Request started"
        );

        let fut = self.service.call(req);

        Box::pin(async move {
            let result = fut.await;
            let duration = start_time.elapsed();

            match &result {
                Ok(response) => {
                    let status = response.status();
                    info!(
                        method = %method,
                        uri = %uri,
                        remote_addr = %remote_addr,
                        session_id = %session_id,
                        status = %status.as_u16(),
                        duration_ms = %duration.as_millis(),
                        "Request completed"
                    );
                }
                Err(err) => {
                    error!(
                        method = %method,
                        uri = %uri,
                        remote_addr = %remote_addr,
                        session_id = %session_id,
                        duration_ms = %duration.as_millis(),
                        error = %err,
                        "Request failed"
                    );
                }
            }

            result
        })
    }
}

/// The segment following `/sessions/`, if it is a well-formed session id.
///
/// Routing has not happened yet when app-level middleware runs, so the id is read from
/// the raw path instead of the match info.
fn session_id_from_path(path: &str) -> Option<String> {
    let mut segments = path.split('/');
    segments.find(|segment| *segment == "sessions")?;
    let candidate = segments.next()?;
    SessionId::parse(candidate).ok().map(|id| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_from_path() {
        let id = "6a2f41a3-c54c-4b19-9cd5-2c1c1f1f7c3e";
        assert_eq!(
            session_id_from_path(&format!("/api/v1/sessions/{}/filter", id)).as_deref(),
            Some(id)
        );
        assert_eq!(session_id_from_path("/api/v1/sessions"), None);
        assert_eq!(session_id_from_path("/api/v1/sessions/not-a-session/filter"), None);
        assert_eq!(session_id_from_path("/api/v1/health"), None);
    }
}
