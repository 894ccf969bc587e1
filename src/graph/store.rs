//! Neo4j graph store: connection, schema, and MERGE-idempotent writes

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use neo4rs::{Graph, Query};
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::config::Neo4jConfig;
use crate::domain::{Edge, EdgeKind, EntityNode, EventNode, SummaryNode};
use crate::errors::{GraphError, GraphResult};
use crate::graph::queries;

/// Fixed-width ISO-8601 rendering (UTC, millisecond precision) so that
/// lexicographic comparison in Cypher matches chronological order.
pub(crate) fn iso_ms(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a timestamp stored by [`iso_ms`]; other RFC 3339 spellings are
/// accepted for data written by hand.
pub(crate) fn parse_iso(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Graph store over a pooled Neo4j connection
#[derive(Clone)]
pub struct GraphStore {
    graph: Arc<Graph>,
    config: Neo4jConfig,
}

impl GraphStore {
    /// Connect to Neo4j.
    pub async fn connect(config: Neo4jConfig) -> GraphResult<Self> {
        let neo_config = neo4rs::ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.username)
            .password(&config.password)
            .db(config.database.as_str())
            .max_connections(config.max_connection_pool_size)
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;
        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;
        info!(uri = %config.uri, database = %config.database, "connected to graph store");
        Ok(Self {
            graph: Arc::new(graph),
            config,
        })
    }

    /// The underlying driver handle
    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    pub fn config(&self) -> &Neo4jConfig {
        &self.config
    }

    /// Liveness probe
    pub async fn ping(&self) -> bool {
        self.graph.run(Query::new("RETURN 1".to_string())).await.is_ok()
    }

    /// Create uniqueness constraints on the id fields. NOT NULL is
    /// enforced at the application layer by the event validator; the
    /// server tier in use has no existence constraints.
    pub async fn ensure_constraints(&self) -> GraphResult<()> {
        for constraint in queries::ALL_CONSTRAINTS {
            self.graph.run(Query::new(constraint.to_string())).await?;
        }
        info!(count = queries::ALL_CONSTRAINTS.len(), "graph constraints ensured");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Node writes
    // ------------------------------------------------------------------

    /// MERGE an event node. Idempotent; re-projection updates
    /// properties in place without resetting access counters.
    pub async fn merge_event_node(&self, node: &EventNode) -> GraphResult<()> {
        let keywords = serde_json::to_string(&node.keywords)?;
        let embedding = serde_json::to_string(&node.embedding)?;
        let query = Query::new(queries::MERGE_EVENT_NODE.to_string())
            .param("event_id", node.event_id.clone())
            .param("event_type", node.event_type.clone())
            .param("occurred_at", iso_ms(node.occurred_at))
            .param("session_id", node.session_id.clone())
            .param("agent_id", node.agent_id.clone())
            .param("trace_id", node.trace_id.clone())
            .param("tool_name", node.tool_name.clone().unwrap_or_default())
            .param("global_position", node.global_position.clone())
            .param("keywords", keywords)
            .param("summary", node.summary.clone().unwrap_or_default())
            .param("embedding", embedding)
            .param("importance_score", node.importance_score.unwrap_or(0))
            .param("access_count", node.access_count)
            .param(
                "last_accessed_at",
                node.last_accessed_at.map(iso_ms).unwrap_or_default(),
            );
        self.graph.run(query).await?;
        debug!(event_id = %node.event_id, "event node merged");
        Ok(())
    }

    /// MERGE an entity node; repeat merges bump the mention count and
    /// advance `last_seen`.
    pub async fn merge_entity_node(&self, node: &EntityNode) -> GraphResult<()> {
        let query = Query::new(queries::MERGE_ENTITY_NODE.to_string())
            .param("entity_id", node.entity_id.clone())
            .param("name", node.name.clone())
            .param("entity_type", node.entity_type.as_str())
            .param("first_seen", iso_ms(node.first_seen))
            .param("last_seen", iso_ms(node.last_seen))
            .param("mention_count", node.mention_count);
        self.graph.run(query).await?;
        debug!(entity_id = %node.entity_id, "entity node merged");
        Ok(())
    }

    /// MERGE a summary node, idempotent by summary_id.
    pub async fn merge_summary_node(&self, node: &SummaryNode) -> GraphResult<()> {
        let (range_start, range_end) = match (node.time_range.first(), node.time_range.last()) {
            (Some(first), Some(last)) => (iso_ms(*first), iso_ms(*last)),
            _ => (String::new(), String::new()),
        };
        let query = Query::new(queries::MERGE_SUMMARY_NODE.to_string())
            .param("summary_id", node.summary_id.clone())
            .param("scope", node.scope.clone())
            .param("scope_id", node.scope_id.clone())
            .param("content", node.content.clone())
            .param("created_at", iso_ms(node.created_at))
            .param("event_count", node.event_count as i64)
            .param("time_range_start", range_start)
            .param("time_range_end", range_end);
        self.graph.run(query).await?;
        debug!(summary_id = %node.summary_id, "summary node merged");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Edge writes
    // ------------------------------------------------------------------

    /// Create or update a single edge.
    pub async fn create_edge(&self, edge: &Edge) -> GraphResult<()> {
        let query = build_edge_query(edge)?;
        self.graph.run(query).await?;
        debug!(
            edge_type = edge.kind.type_name(),
            source = %edge.source,
            target = %edge.target,
            "edge merged"
        );
        Ok(())
    }

    /// Create or update edges in batch, grouped by type.
    ///
    /// FOLLOWS and CAUSED_BY use a single UNWIND upsert per group; rare
    /// types fall back to per-edge MERGE. Everything runs inside one
    /// transaction.
    pub async fn create_edges_batch(&self, edges: &[Edge]) -> GraphResult<()> {
        if edges.is_empty() {
            return Ok(());
        }

        let mut follows: Vec<&Edge> = Vec::new();
        let mut caused_by: Vec<&Edge> = Vec::new();
        let mut rest: Vec<&Edge> = Vec::new();
        for edge in edges {
            match edge.kind {
                EdgeKind::Follows => follows.push(edge),
                EdgeKind::CausedBy => caused_by.push(edge),
                _ => rest.push(edge),
            }
        }

        let mut txn = self.graph.start_txn().await?;

        if !follows.is_empty() {
            let sources: Vec<String> = follows.iter().map(|e| e.source.clone()).collect();
            let targets: Vec<String> = follows.iter().map(|e| e.target.clone()).collect();
            let session_ids: Vec<String> = follows
                .iter()
                .map(|e| {
                    e.properties
                        .get("session_id")
                        .and_then(JsonValue::as_str)
                        .unwrap_or_default()
                        .to_string()
                })
                .collect();
            let delta_ms: Vec<i64> = follows
                .iter()
                .map(|e| e.properties.get("delta_ms").and_then(JsonValue::as_i64).unwrap_or(0))
                .collect();
            let query = Query::new(queries::BATCH_MERGE_FOLLOWS.to_string())
                .param("sources", sources)
                .param("targets", targets)
                .param("session_ids", session_ids)
                .param("delta_ms", delta_ms);
            txn.run(query).await?;
        }

        if !caused_by.is_empty() {
            let sources: Vec<String> = caused_by.iter().map(|e| e.source.clone()).collect();
            let targets: Vec<String> = caused_by.iter().map(|e| e.target.clone()).collect();
            let mechanisms: Vec<String> = caused_by
                .iter()
                .map(|e| {
                    e.properties
                        .get("mechanism")
                        .and_then(JsonValue::as_str)
                        .unwrap_or("direct")
                        .to_string()
                })
                .collect();
            let query = Query::new(queries::BATCH_MERGE_CAUSED_BY.to_string())
                .param("sources", sources)
                .param("targets", targets)
                .param("mechanisms", mechanisms);
            txn.run(query).await?;
        }

        for edge in rest {
            txn.run(build_edge_query(edge)?).await?;
        }

        txn.commit().await?;
        debug!(count = edges.len(), "edge batch merged");
        Ok(())
    }
}

/// Build the MERGE query for one edge: the per-type skeleton plus a SET
/// clause for its typed properties.
fn build_edge_query(edge: &Edge) -> GraphResult<Query> {
    let template = queries::edge_merge_template(edge.kind);

    let mut set_parts: Vec<String> = Vec::new();
    let mut params: Vec<(String, JsonValue)> = Vec::new();
    let mut keys: Vec<&String> = edge.properties.keys().collect();
    keys.sort();
    for key in keys {
        set_parts.push(format!("r.{key} = $p_{key}"));
        params.push((format!("p_{key}"), edge.properties[key].clone()));
    }

    let text = if set_parts.is_empty() {
        template.to_string()
    } else {
        format!("{}SET {}", template, set_parts.join(", "))
    };

    let mut query = Query::new(text)
        .param("source_id", edge.source.clone())
        .param("target_id", edge.target.clone());
    for (name, value) in params {
        query = add_json_param(query, &name, value)?;
    }
    Ok(query)
}

/// Attach a JSON property value to a query as a typed parameter.
fn add_json_param(query: Query, name: &str, value: JsonValue) -> GraphResult<Query> {
    Ok(match value {
        JsonValue::Bool(b) => query.param(name, b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.param(name, i)
            } else {
                query.param(name, n.as_f64().unwrap_or(0.0))
            }
        }
        JsonValue::String(s) => query.param(name, s),
        JsonValue::Null => query.param(name, ""),
        other => query.param(name, serde_json::to_string(&other)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn iso_ms_is_fixed_width_utc() {
        let dt = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(iso_ms(dt), "2026-01-02T03:04:05.000Z");
    }

    #[test]
    fn iso_ms_orders_lexicographically() {
        let early = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let late = early + chrono::Duration::milliseconds(1);
        assert!(iso_ms(early) < iso_ms(late));
    }

    #[test]
    fn parse_iso_round_trips() {
        let dt = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(parse_iso(&iso_ms(dt)), Some(dt));
        assert!(parse_iso("not a timestamp").is_none());
    }
}
