//! Subgraph query endpoint

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::api::{ApiError, AppState};
use crate::domain::{AtlasResponse, SubgraphQuery};

/// POST /v1/query/subgraph — intent-aware subgraph retrieval.
///
/// Intent and seed nodes are inferred from the query text unless the
/// caller overrides them.
pub async fn subgraph(
    State(state): State<Arc<AppState>>,
    Json(query): Json<SubgraphQuery>,
) -> Result<Json<AtlasResponse>, ApiError> {
    if query.query.is_empty() {
        return Err(ApiError::validation("query", "query text must not be empty"));
    }
    if query.session_id.is_empty() {
        return Err(ApiError::validation("session_id", "session_id must not be empty"));
    }

    let response = state
        .graph
        .get_subgraph(&query, &state.intent_weights, &state.config.decay)
        .await?;
    Ok(Json(response))
}
