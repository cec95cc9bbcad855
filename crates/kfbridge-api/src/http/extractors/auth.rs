//! Admin bearer token extractor.
//!
//! Accepts `Authorization: Bearer <token>` and compares it against the
//! configured admin token in constant time.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use secrecy::ExposeSecret;

use kfbridge_infra::crypto::signature::constant_time_eq;

use crate::http::error::AppError;
use crate::state::AppState;

/// Authenticated admin request marker. Extracting this validates the token.
pub struct AdminAuth;

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.admin_token.as_ref() else {
            return Err(AppError::Unauthorized("Admin API is disabled".to_string()));
        };

        let provided = extract_bearer(parts)?;
        if constant_time_eq(provided.as_bytes(), expected.expose_secret().as_bytes()) {
            Ok(AdminAuth)
        } else {
            Err(AppError::Unauthorized("Invalid admin token".to_string()))
        }
    }
}

fn extract_bearer(parts: &Parts) -> Result<String, AppError> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| {
            AppError::Unauthorized(
                "Missing admin token. Provide via 'Authorization: Bearer <token>' header.".to_string(),
            )
        })?;
    let value = header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header encoding".to_string()))?;
    value
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .ok_or_else(|| AppError::Unauthorized("Authorization header must use the Bearer scheme".to_string()))
}
