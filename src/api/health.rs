//! Health check endpoint

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value as JsonValue};

use crate::api::AppState;
use crate::VERSION;

/// GET /v1/health — healthy when both stores respond, degraded when
/// one does, unhealthy when neither.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<JsonValue> {
    let redis_ok = state.ledger.ping().await;
    let neo4j_ok = state.graph.ping().await;

    let status = match (redis_ok, neo4j_ok) {
        (true, true) => "healthy",
        (false, false) => "unhealthy",
        _ => "degraded",
    };

    Json(json!({
        "status": status,
        "redis": redis_ok,
        "neo4j": neo4j_ok,
        "version": VERSION,
    }))
}
