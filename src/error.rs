//! Error taxonomy shared by every operation

use crate::storage::StorageError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Clone, Error)]
pub enum SfuError {
    /// Malformed or missing required input
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or wrong service secret on an internal endpoint
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// No end-user session behind a mint request
    #[error("not authenticated")]
    Unauthenticated,

    /// Token rejected (signature, time window, claims, replay)
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A required secret is not configured
    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SfuError {
    pub fn status(&self) -> StatusCode {
        match self {
            SfuError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            // Relay nodes treat a bad service secret like any other credential failure
            SfuError::Forbidden(_) => StatusCode::UNAUTHORIZED,
            SfuError::Unauthenticated => StatusCode::FORBIDDEN,
            SfuError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            SfuError::NotFound(_) => StatusCode::NOT_FOUND,
            SfuError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            SfuError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable, caller-facing reason
    pub fn reason(&self) -> String {
        match self {
            SfuError::InvalidRequest(r)
            | SfuError::Forbidden(r)
            | SfuError::Unauthorized(r)
            | SfuError::NotFound(r)
            | SfuError::Unavailable(r) => r.clone(),
            SfuError::Unauthenticated => "not authenticated".to_string(),
            // Store details stay in the logs
            SfuError::Internal(_) => "internal error".to_string(),
        }
    }
}

impl From<StorageError> for SfuError {
    fn from(e: StorageError) -> Self {
        SfuError::Internal(e.to_string())
    }
}

impl From<JsonRejection> for SfuError {
    fn from(rejection: JsonRejection) -> Self {
        SfuError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for SfuError {
    fn from(rejection: QueryRejection) -> Self {
        SfuError::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for SfuError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            warn!(status = status.as_u16(), reason = %self.reason(), "Request rejected");
        }

        (status, Json(json!({ "detail": self.reason() }))).into_response()
    }
}
