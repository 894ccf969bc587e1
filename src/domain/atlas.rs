//! Atlas response envelope
//!
//! Every retrieval (context, lineage, subgraph) returns the same shape:
//! a keyed map of nodes, a list of edges, pagination, and metadata about
//! how the result was assembled.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Provenance pointer back into the ledger for a graph node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub event_id: String,
    pub global_position: String,
    pub source: String,
    pub occurred_at: DateTime<Utc>,
    pub session_id: String,
    pub agent_id: String,
    pub trace_id: String,
}

/// Decay, relevance, and importance scores for a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeScores {
    pub decay_score: f64,
    pub relevance_score: f64,
    /// Integer importance on the 1-10 scale
    pub importance_score: i64,
}

/// A node in an Atlas response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtlasNode {
    pub node_id: String,
    pub node_type: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    #[serde(default)]
    pub scores: NodeScores,
    /// "direct" | "proactive"
    pub retrieval_reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proactive_signal: Option<String>,
}

/// An edge in an Atlas response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtlasEdge {
    pub source: String,
    pub target: String,
    pub edge_type: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// Query bounds used and available
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryCapacity {
    pub max_nodes: i64,
    pub used_nodes: i64,
    pub max_depth: i64,
}

/// Response metadata with retrieval reasoning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMeta {
    pub query_ms: u64,
    pub nodes_returned: usize,
    pub truncated: bool,
    #[serde(default)]
    pub inferred_intents: HashMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_override: Option<String>,
    #[serde(default)]
    pub seed_nodes: Vec<String>,
    pub proactive_nodes_count: usize,
    #[serde(default = "default_scoring_weights")]
    pub scoring_weights: HashMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<QueryCapacity>,
}

fn default_scoring_weights() -> HashMap<String, f64> {
    HashMap::from([
        ("recency".to_string(), 1.0),
        ("importance".to_string(), 1.0),
        ("relevance".to_string(), 1.0),
    ])
}

impl Default for QueryMeta {
    fn default() -> Self {
        Self {
            query_ms: 0,
            nodes_returned: 0,
            truncated: false,
            inferred_intents: HashMap::new(),
            intent_override: None,
            seed_nodes: Vec::new(),
            proactive_nodes_count: 0,
            scoring_weights: default_scoring_weights(),
            capacity: None,
        }
    }
}

/// Cursor-based pagination
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

/// The standard retrieval response shape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AtlasResponse {
    #[serde(default)]
    pub nodes: HashMap<String, AtlasNode>,
    #[serde(default)]
    pub edges: Vec<AtlasEdge>,
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(default)]
    pub meta: QueryMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_meta_has_core_scoring_weights() {
        let meta = QueryMeta::default();
        assert_eq!(meta.scoring_weights.get("recency"), Some(&1.0));
        assert_eq!(meta.scoring_weights.get("importance"), Some(&1.0));
        assert_eq!(meta.scoring_weights.get("relevance"), Some(&1.0));
    }

    #[test]
    fn empty_response_serializes() {
        let response = AtlasResponse::default();
        let json = serde_json::to_value(&response).unwrap();
        assert!(json["nodes"].as_object().unwrap().is_empty());
        assert_eq!(json["meta"]["truncated"], false);
    }
}
