//! Service-secret gate and request logging

use crate::error::SfuError;
use crate::server::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tracing::{info, warn};

/// Header carrying the relay nodes' pre-shared secret
pub const SERVICE_SECRET_HEADER: &str = "x-sfu-secret";

/// Rejects internal requests without the configured service secret
pub async fn require_service_secret(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.service_secret.as_ref() else {
        return SfuError::Unavailable("service secret is not configured".to_string())
            .into_response();
    };

    let presented = request
        .headers()
        .get(SERVICE_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());

    match presented {
        Some(secret) if expected.matches(secret) => next.run(request).await,
        Some(_) => {
            warn!(path = %request.uri().path(), "Invalid service secret");
            SfuError::Forbidden("invalid service secret".to_string()).into_response()
        }
        None => SfuError::Forbidden("service secret required".to_string()).into_response(),
    }
}

pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let elapsed = start.elapsed();

    if status.is_client_error() || status.is_server_error() {
        warn!(%method, %path, status = status.as_u16(), ?elapsed, "Request");
    } else {
        info!(%method, %path, status = status.as_u16(), ?elapsed, "Request");
    }

    response
}
