//! Bounded traversal parameters
//!
//! Retrieval queries carry caller-supplied depth/node/timeout bounds;
//! everything is clamped server-side before touching the graph.

use serde::{Deserialize, Serialize};

use crate::domain::IntentKind;

/// Hard ceilings for traversal bounds
pub const MAX_DEPTH: i64 = 10;
pub const MAX_NODES: i64 = 500;
pub const MIN_TIMEOUT_MS: i64 = 100;
pub const MAX_TIMEOUT_MS: i64 = 30_000;

/// Clamped traversal bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalBounds {
    pub max_depth: i64,
    pub max_nodes: i64,
    pub timeout_ms: i64,
}

/// Clamp traversal parameters to their allowed ranges:
/// depth in [1, 10], nodes in [1, 500], timeout in [100, 30000] ms.
pub fn clamp_bounds(max_depth: i64, max_nodes: i64, timeout_ms: i64) -> TraversalBounds {
    TraversalBounds {
        max_depth: max_depth.clamp(1, MAX_DEPTH),
        max_nodes: max_nodes.clamp(1, MAX_NODES),
        timeout_ms: timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS),
    }
}

/// Parameters for intent-aware subgraph retrieval.
///
/// Intent and seed nodes are inferred from `query` when not provided.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubgraphQuery {
    pub query: String,
    pub session_id: String,
    pub agent_id: String,
    #[serde(default = "default_max_nodes")]
    pub max_nodes: i64,
    #[serde(default = "default_max_depth")]
    pub max_depth: i64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: i64,
    #[serde(default)]
    pub intent: Option<IntentKind>,
    #[serde(default)]
    pub seed_nodes: Option<Vec<String>>,
}

/// Parameters for causal lineage traversal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageQuery {
    pub node_id: String,
    #[serde(default = "default_max_depth")]
    pub max_depth: i64,
    #[serde(default = "default_max_nodes")]
    pub max_nodes: i64,
    #[serde(default)]
    pub intent: Option<IntentKind>,
}

fn default_max_nodes() -> i64 {
    100
}

fn default_max_depth() -> i64 {
    3
}

fn default_timeout_ms() -> i64 {
    5000
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, 0, 0, 1, 1, 100; "below minimums")]
    #[test_case(3, 100, 5000, 3, 100, 5000; "in range passes through")]
    #[test_case(99, 9999, 99999, 10, 500, 30000; "above maximums")]
    fn bounds_are_clamped(
        depth: i64,
        nodes: i64,
        timeout: i64,
        want_depth: i64,
        want_nodes: i64,
        want_timeout: i64,
    ) {
        let bounds = clamp_bounds(depth, nodes, timeout);
        assert_eq!(bounds.max_depth, want_depth);
        assert_eq!(bounds.max_nodes, want_nodes);
        assert_eq!(bounds.timeout_ms, want_timeout);
    }

    #[test]
    fn subgraph_query_defaults() {
        let query: SubgraphQuery = serde_json::from_str(
            r#"{"query": "why did it fail", "session_id": "s", "agent_id": "a"}"#,
        )
        .unwrap();
        assert_eq!(query.max_nodes, 100);
        assert_eq!(query.max_depth, 3);
        assert_eq!(query.timeout_ms, 5000);
        assert!(query.intent.is_none());
        assert!(query.seed_nodes.is_none());
    }
}
