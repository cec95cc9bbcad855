//! Application error type mapping to HTTP status codes and the error envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use kfbridge_types::error::{CacheError, CallbackError};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Signature or bearer token rejected.
    Unauthorized(String),
    /// Malformed request or undecodable payload.
    Validation(String),
    NotFound(String),
    Internal(String),
}

impl From<CallbackError> for AppError {
    fn from(e: CallbackError) -> Self {
        match e {
            CallbackError::Auth(msg) => AppError::Unauthorized(msg),
            CallbackError::Decode(e) => AppError::Validation(e.to_string()),
            CallbackError::Parse(msg) => AppError::Validation(msg),
        }
    }
}

impl From<CacheError> for AppError {
    fn from(e: CacheError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status.is_server_error() {
            tracing::error!(%status, %message, "request failed");
        } else {
            tracing::warn!(%status, %message, "request rejected");
        }

        let body = json!({
            "success": false,
            "error": { "message": message },
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
