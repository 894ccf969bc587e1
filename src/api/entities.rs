//! Entity lookup endpoint

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde_json::Value as JsonValue;

use crate::api::{ApiError, AppState};

/// GET /v1/entities/{entity_id} — an entity and its connected events.
pub async fn entity(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    match state.graph.get_entity(&entity_id).await? {
        Some(result) => Ok(Json(result)),
        None => Err(ApiError::NotFound("Entity not found".to_string())),
    }
}
