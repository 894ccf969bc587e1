//! User personalization and GDPR endpoints

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::info;

use crate::api::{ApiError, AppState};

/// GET /v1/users/{user_id}/profile
pub async fn profile(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    match state.graph.get_user_profile(&user_id).await? {
        Some(profile) => Ok(Json(profile)),
        None => Err(ApiError::NotFound("User profile not found".to_string())),
    }
}

#[derive(Deserialize)]
pub struct PreferenceParams {
    #[serde(default)]
    pub category: Option<String>,
}

/// GET /v1/users/{user_id}/preferences
pub async fn preferences(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<PreferenceParams>,
) -> Result<Json<Vec<JsonValue>>, ApiError> {
    let preferences = state
        .graph
        .get_user_preferences(&user_id, params.category.as_deref())
        .await?;
    Ok(Json(preferences))
}

/// GET /v1/users/{user_id}/skills
pub async fn skills(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<JsonValue>>, ApiError> {
    Ok(Json(state.graph.get_user_skills(&user_id).await?))
}

/// GET /v1/users/{user_id}/patterns
pub async fn patterns(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<JsonValue>>, ApiError> {
    Ok(Json(state.graph.get_user_patterns(&user_id).await?))
}

/// GET /v1/users/{user_id}/interests
pub async fn interests(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<JsonValue>>, ApiError> {
    Ok(Json(state.graph.get_user_interests(&user_id).await?))
}

/// GET /v1/users/{user_id}/data-export — everything stored about a
/// user.
pub async fn data_export(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    let data = state.graph.export_user_data(&user_id).await?;
    info!(user_id = %user_id, "user data exported");
    Ok(Json(data))
}

/// DELETE /v1/users/{user_id} — cascade erasure of the personalization
/// subgraph; the user entity survives as `REDACTED`.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    let deleted_count = state.graph.delete_user_data(&user_id).await?;
    info!(user_id = %user_id, deleted_count = deleted_count, "user data erased");
    Ok(Json(json!({
        "deleted_count": deleted_count,
        "status": "erased",
    })))
}
