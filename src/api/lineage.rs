//! Lineage traversal endpoint

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::api::{ApiError, AppState};
use crate::domain::{AtlasResponse, IntentKind, LineageQuery};

#[derive(Deserialize)]
pub struct LineageParams {
    #[serde(default = "default_max_depth")]
    pub max_depth: i64,
    #[serde(default = "default_max_nodes")]
    pub max_nodes: i64,
    #[serde(default)]
    pub intent: Option<String>,
}

fn default_max_depth() -> i64 {
    3
}

fn default_max_nodes() -> i64 {
    100
}

/// GET /v1/nodes/{node_id}/lineage — CAUSED_BY chains outward from a
/// node, bounded by depth and node count.
pub async fn lineage(
    State(state): State<Arc<AppState>>,
    Path(node_id): Path<String>,
    Query(params): Query<LineageParams>,
) -> Result<Json<AtlasResponse>, ApiError> {
    let intent = match params.intent.as_deref() {
        Some(raw) => Some(
            IntentKind::parse(raw)
                .ok_or_else(|| ApiError::validation("intent", format!("unknown intent '{raw}'")))?,
        ),
        None => None,
    };

    let query = LineageQuery {
        node_id,
        max_depth: params.max_depth,
        max_nodes: params.max_nodes,
        intent,
    };
    let response = state.graph.get_lineage(&query, &state.config.decay).await?;
    Ok(Json(response))
}
