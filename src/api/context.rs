//! Session context endpoint

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::api::{ApiError, AppState};
use crate::domain::AtlasResponse;

#[derive(Deserialize)]
pub struct ContextParams {
    #[serde(default = "default_max_nodes")]
    pub max_nodes: i64,
    #[serde(default = "default_max_depth")]
    pub max_depth: i64,
    #[serde(default)]
    pub query: Option<String>,
}

fn default_max_nodes() -> i64 {
    100
}

fn default_max_depth() -> i64 {
    3
}

/// GET /v1/context/{session_id} — working-memory context for a
/// session, ranked by decay score.
pub async fn session_context(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(params): Query<ContextParams>,
) -> Result<Json<AtlasResponse>, ApiError> {
    let response = state
        .graph
        .get_context(&session_id, params.max_nodes, &state.config.decay)
        .await?;
    Ok(Json(response))
}
