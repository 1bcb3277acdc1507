use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::vincere::auth::AuthError;
use crate::vincere::UpstreamError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad content type, unreadable body, missing envelope section, bad archive.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication with Vincere failed: {0}")]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Upstream(#[from] UpstreamError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True for failures caused by Vincere rather than by the inbound payload.
    pub fn is_downstream(&self) -> bool {
        matches!(self, AppError::Auth(_) | AppError::Upstream(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream(e) if e.status_code().is_some_and(|s| (400..500).contains(&s)) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Auth(_) | AppError::Upstream(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Auth(_) => "AUTH_ERROR",
            AppError::Upstream(_) => "UPSTREAM_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// JSON body shared by the error response and the acknowledged-failure response.
    pub fn to_body(&self) -> Value {
        let mut error = json!({
            "code": self.code(),
            "message": self.to_string(),
        });
        if let AppError::Upstream(e) = self {
            if let Some(details) = e.details() {
                error["details"] = Value::String(details);
            }
        }
        json!({ "error": error })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            AppError::Validation(msg) => tracing::warn!("Rejected webhook: {msg}"),
            AppError::Auth(e) => tracing::error!("Vincere auth error: {e}"),
            AppError::Upstream(e) => tracing::error!("Vincere upstream error: {e}"),
            AppError::Internal(e) => tracing::error!("Internal error: {e:?}"),
        }

        (status, Json(self.to_body())).into_response()
    }
}
