//! Admin routes over the context cache. Mounted only when an admin token is set.

use axum::Json;
use axum::extract::{Path, State};
use serde_json::{Value, json};

use crate::http::error::AppError;
use crate::http::extractors::auth::AdminAuth;
use crate::state::AppState;

/// GET /admin/contexts - All live contexts, most recently used first.
pub async fn list_contexts(
    _auth: AdminAuth,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let contexts = state.contexts().list_active().await?;
    Ok(Json(json!({
        "success": true,
        "data": { "count": contexts.len(), "contexts": contexts },
    })))
}

/// GET /admin/contexts/{user}
pub async fn get_context(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Json<Value>, AppError> {
    let context = state
        .contexts()
        .get_context_info(&user)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No context for user '{user}'")))?;
    Ok(Json(json!({ "success": true, "data": context })))
}

/// DELETE /admin/contexts/{user}
pub async fn delete_context(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Json<Value>, AppError> {
    let deleted = state.contexts().delete_context(&user).await?;
    tracing::info!(external_user_id = %user, deleted, "context deleted via admin API");
    Ok(Json(json!({ "success": true, "data": { "deleted": deleted } })))
}

/// POST /admin/contexts/{user}/refresh - Reset the context TTL.
pub async fn refresh_context(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Json<Value>, AppError> {
    if !state.contexts().refresh_ttl(&user).await? {
        return Err(AppError::NotFound(format!("No context for user '{user}'")));
    }
    Ok(Json(json!({
        "success": true,
        "data": { "ttl_secs": state.contexts().ttl().as_secs() },
    })))
}
