//! Retrieval: session context, causal lineage, intent-aware subgraph
//!
//! All three assemble the same Atlas envelope, score nodes with the
//! decay engine, and bump access counters on every returned event node
//! in one batched write.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use chrono::{DateTime, Utc};
use neo4rs::{Query, Row};
use serde_json::{json, Map, Value as JsonValue};
use tracing::debug;

use crate::config::{DecayConfig, IntentWeightMatrix};
use crate::domain::scoring::{score_node, ScorableNode};
use crate::domain::traversal::clamp_bounds;
use crate::domain::{
    intent, AtlasEdge, AtlasNode, AtlasResponse, EdgeKind, IntentKind, LineageQuery, NodeKind,
    NodeScores, Pagination, Provenance, QueryCapacity, QueryMeta, SubgraphQuery,
};
use crate::errors::GraphResult;
use crate::graph::queries;
use crate::graph::store::{iso_ms, parse_iso, GraphStore};

/// Event node columns shared by the retrieval queries
#[derive(Debug, Clone, Default)]
struct EventRow {
    event_id: String,
    event_type: String,
    occurred_at: Option<DateTime<Utc>>,
    session_id: String,
    agent_id: String,
    trace_id: String,
    tool_name: Option<String>,
    global_position: String,
    keywords: Vec<String>,
    summary: Option<String>,
    embedding: Vec<f64>,
    importance_score: Option<i64>,
    access_count: i64,
    last_accessed_at: Option<DateTime<Utc>>,
    in_degree: i64,
}

impl EventRow {
    fn from_row(row: &Row) -> Self {
        let keywords = row
            .get::<String>("keywords")
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        let embedding = row
            .get::<String>("embedding")
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        Self {
            event_id: row.get("event_id").unwrap_or_default(),
            event_type: row.get("event_type").unwrap_or_default(),
            occurred_at: row.get::<String>("occurred_at").ok().and_then(|s| parse_iso(&s)),
            session_id: row.get("session_id").unwrap_or_default(),
            agent_id: row.get("agent_id").unwrap_or_default(),
            trace_id: row.get("trace_id").unwrap_or_default(),
            tool_name: row.get("tool_name").ok(),
            global_position: row.get("global_position").unwrap_or_default(),
            keywords,
            summary: row.get("summary").ok(),
            embedding,
            importance_score: row.get("importance_score").ok(),
            access_count: row.get("access_count").unwrap_or_default(),
            last_accessed_at: row
                .get::<String>("last_accessed_at")
                .ok()
                .and_then(|s| parse_iso(&s)),
            in_degree: row.get("in_degree").unwrap_or_default(),
        }
    }

    fn scorable(&self) -> ScorableNode {
        ScorableNode {
            occurred_at: self.occurred_at,
            last_accessed_at: self.last_accessed_at,
            access_count: self.access_count,
            importance_hint: self.importance_score,
            embedding: self.embedding.clone(),
            in_degree: self.in_degree,
            user_affinity: 0.0,
        }
    }

    fn atlas_node(&self, scores: NodeScores, retrieval_reason: &str) -> AtlasNode {
        let mut attributes = Map::new();
        attributes.insert("event_type".to_string(), json!(self.event_type));
        if let Some(occurred_at) = self.occurred_at {
            attributes.insert("occurred_at".to_string(), json!(iso_ms(occurred_at)));
        }
        if let Some(tool_name) = &self.tool_name {
            attributes.insert("tool_name".to_string(), json!(tool_name));
        }
        if !self.keywords.is_empty() {
            attributes.insert("keywords".to_string(), json!(self.keywords));
        }
        if let Some(summary) = &self.summary {
            attributes.insert("summary".to_string(), json!(summary));
        }
        if let Some(importance) = self.importance_score {
            attributes.insert("importance_score".to_string(), json!(importance));
        }
        attributes.insert("access_count".to_string(), json!(self.access_count));
        if let Some(last_accessed) = self.last_accessed_at {
            attributes.insert("last_accessed_at".to_string(), json!(iso_ms(last_accessed)));
        }

        let provenance = Provenance {
            event_id: self.event_id.clone(),
            global_position: self.global_position.clone(),
            source: "redis".to_string(),
            occurred_at: self.occurred_at.unwrap_or_else(Utc::now),
            session_id: self.session_id.clone(),
            agent_id: self.agent_id.clone(),
            trace_id: self.trace_id.clone(),
        };

        AtlasNode {
            node_id: self.event_id.clone(),
            node_type: NodeKind::Event.label().to_string(),
            attributes,
            provenance: Some(provenance),
            scores,
            retrieval_reason: retrieval_reason.to_string(),
            proactive_signal: None,
        }
    }
}

/// Proactive signal implied by the edge type that surfaced a neighbor
fn proactive_signal(kind: Option<EdgeKind>) -> &'static str {
    match kind {
        Some(EdgeKind::References) => "entity_context",
        Some(EdgeKind::SimilarTo) => "recurring_pattern",
        Some(EdgeKind::CausedBy) => "causal_chain",
        Some(EdgeKind::Follows) => "temporal_sequence",
        Some(EdgeKind::Summarizes) => "summary_context",
        _ => "related_context",
    }
}

impl GraphStore {
    async fn collect_rows(&self, query: Query) -> GraphResult<Vec<Row>> {
        let mut stream = self.graph().execute(query).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Increment access counters on a batch of event nodes and stamp
    /// `last_accessed_at`. Counters only ever move forward.
    pub async fn bump_access_counts(&self, event_ids: &[String]) -> GraphResult<()> {
        if event_ids.is_empty() {
            return Ok(());
        }
        let query = Query::new(queries::BATCH_UPDATE_ACCESS_COUNT.to_string())
            .param("event_ids", event_ids.to_vec())
            .param("now", iso_ms(Utc::now()));
        self.graph().run(query).await?;
        Ok(())
    }

    /// Assemble working-memory context for a session, ranked by decay
    /// score descending.
    pub async fn get_context(
        &self,
        session_id: &str,
        max_nodes: i64,
        decay: &DecayConfig,
    ) -> GraphResult<AtlasResponse> {
        let started = Instant::now();
        let bounds = clamp_bounds(1, max_nodes, 5000);
        let now = Utc::now();

        let rows = self
            .collect_rows(
                Query::new(queries::GET_SESSION_EVENTS.to_string())
                    .param("session_id", session_id)
                    .param("limit", bounds.max_nodes),
            )
            .await?;
        let raw_count = rows.len();

        let mut scored: Vec<(EventRow, NodeScores)> = rows
            .iter()
            .map(|row| {
                let event = EventRow::from_row(row);
                let scores = score_node(&event.scorable(), None, decay, now);
                (event, scores)
            })
            .collect();
        scored.sort_by(|a, b| {
            b.1.decay_score
                .partial_cmp(&a.1.decay_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(bounds.max_nodes as usize);

        let mut nodes = HashMap::new();
        let mut event_ids = Vec::new();
        for (event, scores) in &scored {
            event_ids.push(event.event_id.clone());
            nodes.insert(event.event_id.clone(), event.atlas_node(*scores, "direct"));
        }

        self.bump_access_counts(&event_ids).await?;

        let meta = QueryMeta {
            query_ms: started.elapsed().as_millis() as u64,
            nodes_returned: nodes.len(),
            truncated: raw_count >= bounds.max_nodes as usize,
            capacity: Some(QueryCapacity {
                max_nodes: bounds.max_nodes,
                used_nodes: nodes.len() as i64,
                max_depth: 1,
            }),
            ..QueryMeta::default()
        };

        Ok(AtlasResponse {
            nodes,
            edges: Vec::new(),
            pagination: Pagination::default(),
            meta,
        })
    }

    /// Traverse CAUSED_BY chains outward from a node, bounded by depth
    /// and node count.
    pub async fn get_lineage(
        &self,
        query: &LineageQuery,
        decay: &DecayConfig,
    ) -> GraphResult<AtlasResponse> {
        let started = Instant::now();
        let bounds = clamp_bounds(query.max_depth, query.max_nodes, 5000);
        let now = Utc::now();

        let node_rows = self
            .collect_rows(
                Query::new(queries::GET_LINEAGE_NODES.to_string())
                    .param("node_id", query.node_id.clone())
                    .param("max_depth", bounds.max_depth)
                    .param("max_nodes", bounds.max_nodes),
            )
            .await?;

        let mut nodes: HashMap<String, AtlasNode> = HashMap::new();
        for row in &node_rows {
            let event = EventRow::from_row(row);
            if event.event_id.is_empty() || nodes.contains_key(&event.event_id) {
                continue;
            }
            let scores = score_node(&event.scorable(), None, decay, now);
            let mut node = event.atlas_node(scores, "direct");
            if let Ok(depth) = row.get::<i64>("depth") {
                node.attributes.insert("depth".to_string(), json!(depth));
            }
            nodes.insert(event.event_id.clone(), node);
        }

        let edge_rows = self
            .collect_rows(
                Query::new(queries::GET_LINEAGE_EDGES.to_string())
                    .param("node_id", query.node_id.clone())
                    .param("max_depth", bounds.max_depth),
            )
            .await?;

        let mut edges = Vec::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();
        for row in &edge_rows {
            let source: String = row.get("source").unwrap_or_default();
            let target: String = row.get("target").unwrap_or_default();
            if source.is_empty() || target.is_empty() {
                continue;
            }
            if !seen.insert((source.clone(), target.clone())) {
                continue;
            }
            let mut properties = Map::new();
            if let Ok(mechanism) = row.get::<String>("mechanism") {
                properties.insert("mechanism".to_string(), json!(mechanism));
            }
            edges.push(AtlasEdge {
                source,
                target,
                edge_type: EdgeKind::CausedBy.type_name().to_string(),
                properties,
            });
        }

        let event_ids: Vec<String> = nodes.keys().cloned().collect();
        self.bump_access_counts(&event_ids).await?;

        let meta = QueryMeta {
            query_ms: started.elapsed().as_millis() as u64,
            nodes_returned: nodes.len(),
            truncated: nodes.len() >= bounds.max_nodes as usize,
            capacity: Some(QueryCapacity {
                max_nodes: bounds.max_nodes,
                used_nodes: nodes.len() as i64,
                max_depth: bounds.max_depth,
            }),
            ..QueryMeta::default()
        };

        Ok(AtlasResponse {
            nodes,
            edges,
            pagination: Pagination::default(),
            meta,
        })
    }

    /// Intent-aware subgraph expansion from session seeds.
    pub async fn get_subgraph(
        &self,
        query: &SubgraphQuery,
        matrix: &IntentWeightMatrix,
        decay: &DecayConfig,
    ) -> GraphResult<AtlasResponse> {
        let started = Instant::now();
        let bounds = clamp_bounds(query.max_depth, query.max_nodes, query.timeout_ms);
        let now = Utc::now();

        // 1. Intent classification, with explicit override
        let intents: HashMap<IntentKind, f64> = match query.intent {
            Some(intent) => HashMap::from([(intent, 1.0)]),
            None => intent::classify_intent(&query.query),
        };
        let weights = intent::edge_weights(&intents, matrix);

        // 2. Seeds: explicit list, or the session's most recent events
        let mut nodes: HashMap<String, AtlasNode> = HashMap::new();
        let mut event_node_ids: HashSet<String> = HashSet::new();
        let mut seed_ids: Vec<String> = Vec::new();

        if let Some(seeds) = &query.seed_nodes {
            for seed_id in seeds {
                seed_ids.push(seed_id.clone());
                let rows = self
                    .collect_rows(
                        Query::new(queries::GET_EVENT_BY_ID.to_string())
                            .param("event_id", seed_id.clone()),
                    )
                    .await?;
                if let Some(row) = rows.first() {
                    let event = EventRow::from_row(row);
                    let scores = score_node(&event.scorable(), None, decay, now);
                    event_node_ids.insert(event.event_id.clone());
                    nodes.insert(event.event_id.clone(), event.atlas_node(scores, "direct"));
                }
            }
        } else {
            let seed_limit = bounds.max_nodes.min(10);
            let rows = self
                .collect_rows(
                    Query::new(queries::GET_SUBGRAPH_SEED_EVENTS.to_string())
                        .param("session_id", query.session_id.clone())
                        .param("seed_limit", seed_limit),
                )
                .await?;
            for row in &rows {
                let event = EventRow::from_row(row);
                if event.event_id.is_empty() {
                    continue;
                }
                seed_ids.push(event.event_id.clone());
                let scores = score_node(&event.scorable(), None, decay, now);
                event_node_ids.insert(event.event_id.clone());
                nodes.insert(event.event_id.clone(), event.atlas_node(scores, "direct"));
            }
        }

        // 3. Expand one hop from every seed over all edge types
        let mut edges: Vec<AtlasEdge> = Vec::new();
        let mut seen_edges: HashSet<(String, String, String)> = HashSet::new();

        for seed_id in &seed_ids {
            let rows = self
                .collect_rows(
                    Query::new(queries::GET_EVENT_NEIGHBORS.to_string())
                        .param("event_id", seed_id.clone()),
                )
                .await?;

            for row in &rows {
                let rel_type: String = row.get("rel_type").unwrap_or_default();
                if rel_type.is_empty() {
                    continue;
                }
                let edge_kind = EdgeKind::parse(&rel_type);
                let neighbor_event: Option<String> = row.get("neighbor_event_id").ok();
                let neighbor_entity: Option<String> = row.get("neighbor_entity_id").ok();
                let neighbor_summary: Option<String> = row.get("neighbor_summary_id").ok();
                let neighbor_id = neighbor_event
                    .clone()
                    .or(neighbor_entity)
                    .or(neighbor_summary)
                    .unwrap_or_default();
                if neighbor_id.is_empty() {
                    continue;
                }

                let weight = edge_kind.and_then(|k| weights.get(&k)).copied().unwrap_or(1.0);

                if let Some(event_id) = neighbor_event {
                    if !nodes.contains_key(&event_id) {
                        let event = EventRow::from_row(row);
                        let base = score_node(&event.scorable(), None, decay, now);
                        let boosted = NodeScores {
                            decay_score: ((base.decay_score * (1.0 + weight * 0.1)).min(1.0)
                                * 1_000_000.0)
                                .round()
                                / 1_000_000.0,
                            ..base
                        };
                        let mut node = event.atlas_node(boosted, "proactive");
                        node.proactive_signal = Some(proactive_signal(edge_kind).to_string());
                        event_node_ids.insert(event_id.clone());
                        nodes.insert(event_id.clone(), node);
                    }
                }

                let edge_key = (seed_id.clone(), neighbor_id.clone(), rel_type.clone());
                if seen_edges.insert(edge_key) {
                    let mut properties = Map::new();
                    if let Ok(session_id) = row.get::<String>("rel_session_id") {
                        properties.insert("session_id".to_string(), json!(session_id));
                    }
                    if let Ok(delta_ms) = row.get::<i64>("rel_delta_ms") {
                        properties.insert("delta_ms".to_string(), json!(delta_ms));
                    }
                    if let Ok(mechanism) = row.get::<String>("rel_mechanism") {
                        properties.insert("mechanism".to_string(), json!(mechanism));
                    }
                    if let Ok(similarity) = row.get::<f64>("rel_similarity_score") {
                        properties.insert("similarity_score".to_string(), json!(similarity));
                    }
                    if let Ok(role) = row.get::<String>("rel_role") {
                        properties.insert("role".to_string(), json!(role));
                    }
                    edges.push(AtlasEdge {
                        source: seed_id.clone(),
                        target: neighbor_id,
                        edge_type: rel_type,
                        properties,
                    });
                }
            }
        }

        // 4. Truncate by boosted decay score
        let total_candidates = nodes.len();
        if total_candidates > bounds.max_nodes as usize {
            let mut ranked: Vec<(String, f64)> = nodes
                .iter()
                .map(|(id, node)| (id.clone(), node.scores.decay_score))
                .collect();
            ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            let keep: HashSet<String> = ranked
                .into_iter()
                .take(bounds.max_nodes as usize)
                .map(|(id, _)| id)
                .collect();
            nodes.retain(|id, _| keep.contains(id));
        }

        // 5. Bump access on event nodes only
        let event_ids: Vec<String> = nodes
            .keys()
            .filter(|id| event_node_ids.contains(*id))
            .cloned()
            .collect();
        self.bump_access_counts(&event_ids).await?;

        let proactive_count = nodes
            .values()
            .filter(|node| node.retrieval_reason == "proactive")
            .count();
        let inferred: HashMap<String, f64> = intents
            .iter()
            .map(|(intent, confidence)| (intent.as_str().to_string(), *confidence))
            .collect();

        debug!(
            session_id = %query.session_id,
            seeds = seed_ids.len(),
            nodes = nodes.len(),
            proactive = proactive_count,
            "subgraph assembled"
        );

        let meta = QueryMeta {
            query_ms: started.elapsed().as_millis() as u64,
            nodes_returned: nodes.len(),
            truncated: total_candidates > bounds.max_nodes as usize,
            inferred_intents: inferred,
            intent_override: query.intent.map(|i| i.as_str().to_string()),
            seed_nodes: seed_ids,
            proactive_nodes_count: proactive_count,
            capacity: Some(QueryCapacity {
                max_nodes: bounds.max_nodes,
                used_nodes: nodes.len() as i64,
                max_depth: bounds.max_depth,
            }),
            ..QueryMeta::default()
        };

        Ok(AtlasResponse {
            nodes,
            edges,
            pagination: Pagination::default(),
            meta,
        })
    }

    /// An entity plus its connected events, or `None` when absent.
    pub async fn get_entity(&self, entity_id: &str) -> GraphResult<Option<JsonValue>> {
        let rows = self
            .collect_rows(
                Query::new(queries::GET_ENTITY_WITH_EVENTS.to_string())
                    .param("entity_id", entity_id)
                    .param("limit", 100_i64),
            )
            .await?;

        let Some(first) = rows.first() else {
            return Ok(None);
        };

        let entity = json!({
            "entity_id": first.get::<String>("entity_id").unwrap_or_default(),
            "name": first.get::<String>("name").unwrap_or_default(),
            "entity_type": first.get::<String>("entity_type").unwrap_or_default(),
            "first_seen": first.get::<String>("first_seen").unwrap_or_default(),
            "last_seen": first.get::<String>("last_seen").unwrap_or_default(),
            "mention_count": first.get::<i64>("mention_count").unwrap_or_default(),
        });

        let mut connected = Vec::new();
        for row in &rows {
            let Ok(event_id) = row.get::<String>("event_id") else {
                continue;
            };
            if event_id.is_empty() {
                continue;
            }
            connected.push(json!({
                "event_id": event_id,
                "event_type": row.get::<String>("event_type").unwrap_or_default(),
                "occurred_at": row.get::<String>("occurred_at").unwrap_or_default(),
                "session_id": row.get::<String>("session_id").unwrap_or_default(),
                "role": row.get::<String>("ref_role").ok(),
            }));
        }

        Ok(Some(json!({
            "entity": entity,
            "connected_events": connected,
        })))
    }
}
