//! Admin endpoints: reconsolidation, stats, pruning, detailed health

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::info;

use crate::api::{ApiError, AppState};
use crate::domain::consolidation::{group_into_episodes, should_reconsolidate, summary_from_events};
use crate::domain::forgetting::pruning_actions;
use crate::VERSION;

#[derive(Deserialize, Default)]
pub struct ReconsolidateBody {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// POST /v1/admin/reconsolidate — consolidate one session, or every
/// session past the reflection threshold.
///
/// An explicitly named session is processed regardless of its count.
pub async fn reconsolidate(
    State(state): State<Arc<AppState>>,
    raw_body: String,
) -> Result<Json<JsonValue>, ApiError> {
    let body: ReconsolidateBody = if raw_body.trim().is_empty() {
        ReconsolidateBody::default()
    } else {
        serde_json::from_str(&raw_body)
            .map_err(|e| ApiError::validation("body", e.to_string()))?
    };
    let threshold = state.config.decay.reflection_threshold;
    let gap_minutes = state.config.worker.episode_gap_minutes;

    let counts = state.graph.session_event_counts().await?;
    let sessions: Vec<(String, u64)> = match &body.session_id {
        Some(session_id) => vec![(
            session_id.clone(),
            counts.get(session_id).copied().unwrap_or(0),
        )],
        None => counts
            .into_iter()
            .filter(|(_, count)| should_reconsolidate(*count, threshold))
            .collect(),
    };

    let mut sessions_processed = 0_u64;
    let mut summaries_created = 0_u64;
    let mut events_processed = 0_u64;
    let now = Utc::now();

    for (session_id, count) in sessions {
        let events = state
            .graph
            .session_episode_events(&session_id, count.max(1000) as i64)
            .await?;
        if events.is_empty() {
            continue;
        }
        events_processed += events.len() as u64;

        let episodes = group_into_episodes(events.clone(), gap_minutes);
        for (idx, episode) in episodes.iter().enumerate() {
            let scope_id = format!("{session_id}-ep{idx}");
            if let Some(summary) = summary_from_events(episode, "episode", &scope_id, now) {
                let event_ids: Vec<String> =
                    episode.iter().map(|e| e.event_id.clone()).collect();
                state.graph.write_summary_with_edges(&summary, &event_ids).await?;
                summaries_created += 1;
            }
        }

        if let Some(summary) = summary_from_events(&events, "session", &session_id, now) {
            let event_ids: Vec<String> = events.iter().map(|e| e.event_id.clone()).collect();
            state.graph.write_summary_with_edges(&summary, &event_ids).await?;
            summaries_created += 1;
        }
        sessions_processed += 1;
    }

    info!(
        sessions_processed = sessions_processed,
        summaries_created = summaries_created,
        events_processed = events_processed,
        "reconsolidation complete"
    );

    Ok(Json(json!({
        "sessions_processed": sessions_processed,
        "summaries_created": summaries_created,
        "events_processed": events_processed,
    })))
}

/// GET /v1/admin/stats — graph node/edge counts and ledger stream
/// length.
pub async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<JsonValue>, ApiError> {
    let graph_stats = state.graph.graph_stats().await?;
    let stream_length = state.ledger.stream_len().await.unwrap_or(0);
    let total_nodes = graph_stats.total_nodes();
    let total_edges = graph_stats.total_edges();

    Ok(Json(json!({
        "nodes": graph_stats.nodes,
        "edges": graph_stats.edges,
        "total_nodes": total_nodes,
        "total_edges": total_edges,
        "redis": {"stream_length": stream_length},
    })))
}

#[derive(Deserialize)]
pub struct PruneBody {
    pub tier: String,
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
}

fn default_dry_run() -> bool {
    true
}

/// POST /v1/admin/prune — retention-based pruning for the warm or cold
/// tier. Dry runs report what would be pruned without deleting.
pub async fn prune(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PruneBody>,
) -> Result<Json<JsonValue>, ApiError> {
    if body.tier != "warm" && body.tier != "cold" {
        return Err(ApiError::validation("tier", "tier must be 'warm' or 'cold'"));
    }

    let retention = &state.config.retention;
    let now = Utc::now();
    let events = state.graph.prunable_events().await?;
    let actions = pruning_actions(&events, retention, now);

    let mut pruned_edges = 0_i64;
    let mut pruned_nodes = 0_i64;
    let mut details: Vec<JsonValue> = Vec::new();

    if body.tier == "warm" {
        pruned_edges = actions.delete_edges.len() as i64;
        if !actions.delete_edges.is_empty() {
            details.push(json!({
                "action": "delete_similar_edges",
                "event_ids": actions.delete_edges,
            }));
        }
        if !body.dry_run && pruned_edges > 0 {
            pruned_edges = state
                .graph
                .prune_similar_edges(retention.warm_min_similarity, retention.hot_hours, now)
                .await?;
        }
    } else {
        let node_ids: Vec<String> = actions
            .delete_nodes
            .iter()
            .chain(&actions.archive_event_ids)
            .cloned()
            .collect();
        pruned_nodes = node_ids.len() as i64;
        if !node_ids.is_empty() {
            details.push(json!({
                "action": "delete_cold_events",
                "event_ids": node_ids,
            }));
        }
        if !body.dry_run && pruned_nodes > 0 {
            let deleted_cold = state
                .graph
                .prune_cold_events(
                    retention.warm_hours,
                    retention.cold_min_importance,
                    retention.cold_min_access_count,
                    now,
                )
                .await?;
            let deleted_archive = state
                .graph
                .delete_events_by_ids(&actions.archive_event_ids)
                .await?;
            pruned_nodes = deleted_cold + deleted_archive;
        }
    }

    info!(
        tier = %body.tier,
        dry_run = body.dry_run,
        pruned_edges = pruned_edges,
        pruned_nodes = pruned_nodes,
        "prune complete"
    );

    Ok(Json(json!({
        "pruned_edges": pruned_edges,
        "pruned_nodes": pruned_nodes,
        "dry_run": body.dry_run,
        "details": details,
    })))
}

/// GET /v1/admin/health/detailed — extended health with graph stats
/// and stream length.
pub async fn health_detailed(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JsonValue>, ApiError> {
    let redis_ok = state.ledger.ping().await;
    let stream_length = if redis_ok {
        state.ledger.stream_len().await.unwrap_or(0)
    } else {
        0
    };

    let (neo4j_ok, graph_stats) = match state.graph.graph_stats().await {
        Ok(stats) => (true, stats),
        Err(_) => (false, Default::default()),
    };

    let status = match (redis_ok, neo4j_ok) {
        (true, true) => "healthy",
        (false, false) => "unhealthy",
        _ => "degraded",
    };

    Ok(Json(json!({
        "status": status,
        "redis": {"connected": redis_ok, "stream_length": stream_length},
        "neo4j": {
            "connected": neo4j_ok,
            "nodes": graph_stats.nodes,
            "edges": graph_stats.edges,
        },
        "version": VERSION,
    })))
}
