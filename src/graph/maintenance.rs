//! Graph maintenance for the consolidation cycle
//!
//! Summary writes, centrality-driven importance refresh, retention-tier
//! pruning, and the counting queries that drive them. Deletion here
//! never touches the ledger; the two stores age independently.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use neo4rs::Query;
use tracing::info;

use crate::domain::consolidation::EpisodeEvent;
use crate::domain::forgetting::PrunableEvent;
use crate::domain::resolution::KnownEntity;
use crate::domain::SummaryNode;
use crate::errors::GraphResult;
use crate::graph::queries;
use crate::graph::store::{iso_ms, parse_iso, GraphStore};

/// Node and edge counts by type
#[derive(Debug, Clone, Default)]
pub struct GraphStats {
    pub nodes: HashMap<String, i64>,
    pub edges: HashMap<String, i64>,
}

impl GraphStats {
    pub fn total_nodes(&self) -> i64 {
        self.nodes.values().sum()
    }

    pub fn total_edges(&self) -> i64 {
        self.edges.values().sum()
    }
}

impl GraphStore {
    /// Event counts per session
    pub async fn session_event_counts(&self) -> GraphResult<HashMap<String, u64>> {
        let mut stream = self
            .graph()
            .execute(Query::new(queries::GET_SESSION_EVENT_COUNTS.to_string()))
            .await?;
        let mut counts = HashMap::new();
        while let Some(row) = stream.next().await? {
            let session_id: String = row.get("session_id").unwrap_or_default();
            let event_count: i64 = row.get("event_count").unwrap_or_default();
            if !session_id.is_empty() {
                counts.insert(session_id, event_count.max(0) as u64);
            }
        }
        Ok(counts)
    }

    /// Agent id owning a session (sessions are single-agent)
    pub async fn session_agent(&self, session_id: &str) -> GraphResult<Option<String>> {
        let mut stream = self
            .graph()
            .execute(
                Query::new(queries::GET_SESSION_AGENT.to_string())
                    .param("session_id", session_id),
            )
            .await?;
        if let Some(row) = stream.next().await? {
            return Ok(row.get::<String>("agent_id").ok());
        }
        Ok(None)
    }

    /// Session events as slim consolidation views, oldest first
    pub async fn session_episode_events(
        &self,
        session_id: &str,
        limit: i64,
    ) -> GraphResult<Vec<EpisodeEvent>> {
        let mut stream = self
            .graph()
            .execute(
                Query::new(queries::GET_SESSION_EVENTS.to_string())
                    .param("session_id", session_id)
                    .param("limit", limit),
            )
            .await?;
        let mut events = Vec::new();
        while let Some(row) = stream.next().await? {
            let occurred_at = row
                .get::<String>("occurred_at")
                .ok()
                .and_then(|s| parse_iso(&s));
            let Some(occurred_at) = occurred_at else {
                continue;
            };
            events.push(EpisodeEvent {
                event_id: row.get("event_id").unwrap_or_default(),
                event_type: row.get("event_type").unwrap_or_default(),
                occurred_at,
                tool_name: row.get("tool_name").ok(),
                status: None,
            });
        }
        events.sort_by_key(|e| e.occurred_at);
        Ok(events)
    }

    /// All events with the properties pruning decisions need
    pub async fn prunable_events(&self) -> GraphResult<Vec<PrunableEvent>> {
        let mut stream = self
            .graph()
            .execute(Query::new(queries::GET_PRUNABLE_EVENTS.to_string()))
            .await?;
        let mut events = Vec::new();
        while let Some(row) = stream.next().await? {
            let occurred_at = row
                .get::<String>("occurred_at")
                .ok()
                .and_then(|s| parse_iso(&s));
            let Some(occurred_at) = occurred_at else {
                continue;
            };
            events.push(PrunableEvent {
                event_id: row.get("event_id").unwrap_or_default(),
                occurred_at,
                importance_score: row.get("importance_score").ok(),
                access_count: row.get("access_count").unwrap_or_default(),
                similarity_score: row.get("similarity_score").ok(),
            });
        }
        Ok(events)
    }

    /// Write a summary node and its SUMMARIZES edges in one transaction.
    /// Both writes MERGE, so re-consolidation lands on the same graph.
    pub async fn write_summary_with_edges(
        &self,
        summary: &SummaryNode,
        event_ids: &[String],
    ) -> GraphResult<()> {
        self.merge_summary_node(summary).await?;

        if event_ids.is_empty() || summary.time_range.len() < 2 {
            return Ok(());
        }
        let query = Query::new(queries::MERGE_SUMMARIZES_EDGES.to_string())
            .param("summary_id", summary.summary_id.clone())
            .param("event_ids", event_ids.to_vec())
            .param("range_start", iso_ms(summary.time_range[0]))
            .param("range_end", iso_ms(summary.time_range[1]))
            .param("created_at", iso_ms(summary.created_at));
        self.graph().run(query).await?;

        info!(
            summary_id = %summary.summary_id,
            event_count = summary.event_count,
            "summary written"
        );
        Ok(())
    }

    /// Refresh importance scores from in-degree centrality.
    pub async fn update_importance_from_centrality(&self) -> GraphResult<i64> {
        let mut stream = self
            .graph()
            .execute(Query::new(queries::UPDATE_IMPORTANCE_FROM_CENTRALITY.to_string()))
            .await?;
        let updated = match stream.next().await? {
            Some(row) => row.get("updated_count").unwrap_or_default(),
            None => 0,
        };
        info!(updated = updated, "importance refreshed from centrality");
        Ok(updated)
    }

    /// Warm tier: delete SIMILAR_TO edges below the similarity floor on
    /// events older than the hot boundary. Returns deleted edge count.
    pub async fn prune_similar_edges(
        &self,
        min_score: f64,
        older_than_hours: i64,
        now: DateTime<Utc>,
    ) -> GraphResult<i64> {
        let cutoff = iso_ms(now - Duration::hours(older_than_hours));
        let mut stream = self
            .graph()
            .execute(
                Query::new(queries::DELETE_SIMILAR_EDGES_BELOW_SCORE.to_string())
                    .param("min_score", min_score)
                    .param("cutoff_iso", cutoff),
            )
            .await?;
        let deleted = match stream.next().await? {
            Some(row) => row.get("deleted_count").unwrap_or_default(),
            None => 0,
        };
        info!(deleted = deleted, min_score = min_score, "similar edges pruned");
        Ok(deleted)
    }

    /// Cold tier: delete events older than the warm boundary that fail
    /// both the importance and access thresholds.
    pub async fn prune_cold_events(
        &self,
        older_than_hours: i64,
        min_importance: i64,
        min_access_count: i64,
        now: DateTime<Utc>,
    ) -> GraphResult<i64> {
        let cutoff = iso_ms(now - Duration::hours(older_than_hours));
        let mut stream = self
            .graph()
            .execute(
                Query::new(queries::DELETE_COLD_EVENTS.to_string())
                    .param("cutoff_iso", cutoff)
                    .param("min_importance", min_importance)
                    .param("min_access_count", min_access_count),
            )
            .await?;
        let deleted = match stream.next().await? {
            Some(row) => row.get("deleted_count").unwrap_or_default(),
            None => 0,
        };
        info!(deleted = deleted, "cold events pruned");
        Ok(deleted)
    }

    /// Archive tier: ids of events past the retention ceiling
    pub async fn archive_event_ids(
        &self,
        older_than_hours: i64,
        now: DateTime<Utc>,
    ) -> GraphResult<Vec<String>> {
        let cutoff = iso_ms(now - Duration::hours(older_than_hours));
        let mut stream = self
            .graph()
            .execute(
                Query::new(queries::GET_ARCHIVE_EVENT_IDS.to_string())
                    .param("cutoff_iso", cutoff),
            )
            .await?;
        let mut ids = Vec::new();
        while let Some(row) = stream.next().await? {
            let event_id: String = row.get("event_id").unwrap_or_default();
            if !event_id.is_empty() {
                ids.push(event_id);
            }
        }
        Ok(ids)
    }

    /// Delete events (and their edges) by id.
    pub async fn delete_events_by_ids(&self, event_ids: &[String]) -> GraphResult<i64> {
        if event_ids.is_empty() {
            return Ok(0);
        }
        let mut stream = self
            .graph()
            .execute(
                Query::new(queries::DELETE_EVENTS_BY_IDS.to_string())
                    .param("event_ids", event_ids.to_vec()),
            )
            .await?;
        let deleted = match stream.next().await? {
            Some(row) => row.get("deleted_count").unwrap_or_default(),
            None => 0,
        };
        info!(requested = event_ids.len(), deleted = deleted, "events deleted");
        Ok(deleted)
    }

    /// Node and edge counts by type for stats and detailed health
    pub async fn graph_stats(&self) -> GraphResult<GraphStats> {
        let mut stats = GraphStats::default();

        let mut stream = self
            .graph()
            .execute(Query::new(queries::GET_NODE_COUNTS.to_string()))
            .await?;
        while let Some(row) = stream.next().await? {
            let label: String = row.get("label").unwrap_or_default();
            let cnt: i64 = row.get("cnt").unwrap_or_default();
            stats.nodes.insert(label, cnt);
        }

        let mut stream = self
            .graph()
            .execute(Query::new(queries::GET_EDGE_COUNTS.to_string()))
            .await?;
        while let Some(row) = stream.next().await? {
            let rel_type: String = row.get("rel_type").unwrap_or_default();
            let cnt: i64 = row.get("cnt").unwrap_or_default();
            stats.edges.insert(rel_type, cnt);
        }

        Ok(stats)
    }

    /// Existing entities for the resolver to compare against
    pub async fn known_entities(&self, limit: i64) -> GraphResult<Vec<KnownEntity>> {
        let query = Query::new(
            "MATCH (n:Entity) \
             RETURN n.entity_id AS entity_id, n.name AS name, \
                    n.entity_type AS entity_type \
             LIMIT $limit"
                .to_string(),
        )
        .param("limit", limit);
        let mut stream = self.graph().execute(query).await?;
        let mut entities = Vec::new();
        while let Some(row) = stream.next().await? {
            entities.push(KnownEntity {
                entity_id: row.get("entity_id").unwrap_or_default(),
                name: row.get("name").unwrap_or_default(),
                entity_type: row.get("entity_type").unwrap_or_default(),
            });
        }
        Ok(entities)
    }

    /// Update a node's enrichment outputs (keywords, importance).
    pub async fn update_event_enrichment(
        &self,
        event_id: &str,
        keywords: &[String],
        importance_score: i64,
    ) -> GraphResult<()> {
        let query = Query::new(queries::UPDATE_EVENT_ENRICHMENT.to_string())
            .param("event_id", event_id)
            .param("keywords", serde_json::to_string(keywords)?)
            .param("importance_score", importance_score);
        self.graph().run(query).await?;
        Ok(())
    }
}
