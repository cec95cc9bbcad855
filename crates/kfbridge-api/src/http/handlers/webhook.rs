//! Chat platform webhook.
//!
//! `GET` answers the URL verification handshake; `POST` carries encrypted
//! callbacks. Only verification failures are reported back to the platform:
//! anything that decrypts is acknowledged so it is not redelivered.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

use kfbridge_core::callback::CallbackDecryptor;
use kfbridge_types::callback::{CallbackEnvelope, UrlChallenge};

use crate::http::error::AppError;
use crate::state::AppState;

/// GET /webhook/wechat - URL verification handshake.
///
/// Echoes the decrypted `echostr` as plain text, or 403 on any failure.
pub async fn verify_url(
    State(state): State<AppState>,
    Query(challenge): Query<UrlChallenge>,
) -> Response {
    match state.dispatcher.decryptor().verify_url_challenge(&challenge) {
        Some(echo) => {
            tracing::info!("webhook URL verified");
            (StatusCode::OK, echo).into_response()
        }
        None => {
            tracing::warn!("webhook URL verification failed");
            (StatusCode::FORBIDDEN, "Verification failed").into_response()
        }
    }
}

/// POST /webhook/wechat - Receive one encrypted callback.
pub async fn receive_callback(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let envelope: CallbackEnvelope = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Invalid callback body: {e}")))?;

    let outcome = state.dispatcher.handle_callback(&envelope).await?;
    tracing::debug!(?outcome, "callback handled");

    Ok(Json(json!({ "code": 0, "message": "success" })))
}
