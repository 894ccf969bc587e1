//! Event-to-graph projection
//!
//! Pure transformation of a single ledger event into an event node plus
//! FOLLOWS / CAUSED_BY edges, given the previous event observed in the
//! same session. No I/O here; the projection worker owns the stores.

use crate::domain::{CausalMechanism, Edge, EdgeKind, Event, EventNode};

/// Result of projecting a single event into graph primitives
#[derive(Debug, Clone)]
pub struct ProjectionResult {
    pub node: EventNode,
    pub edges: Vec<Edge>,
}

/// Transform an event into an event node.
///
/// The event must already carry its ledger-assigned `global_position`;
/// the node's importance is seeded from the producer's hint.
pub fn event_to_node(event: &Event) -> Option<EventNode> {
    let global_position = event.global_position.clone()?;
    Some(EventNode {
        event_id: event.event_id.to_string(),
        event_type: event.event_type.clone(),
        occurred_at: event.occurred_at,
        session_id: event.session_id.clone(),
        agent_id: event.agent_id.clone(),
        trace_id: event.trace_id.clone(),
        tool_name: event.tool_name.clone(),
        global_position,
        keywords: Vec::new(),
        summary: None,
        embedding: Vec::new(),
        importance_score: event.importance_hint,
        access_count: 0,
        last_accessed_at: None,
    })
}

/// FOLLOWS edge from the current event back to its in-session
/// predecessor. `delta_ms` is clamped to >= 0 so out-of-order arrival
/// never produces a negative gap.
pub fn follows_edge(prev: &Event, curr: &Event) -> Edge {
    let delta_ms = (curr.occurred_at - prev.occurred_at).num_milliseconds().max(0);
    Edge::new(curr.event_id.to_string(), prev.event_id.to_string(), EdgeKind::Follows)
        .with_property("session_id", curr.session_id.clone())
        .with_property("delta_ms", delta_ms)
}

/// CAUSED_BY edge (child -> declared parent), when a parent is declared
pub fn caused_by_edge(event: &Event) -> Option<Edge> {
    let parent = event.parent_event_id?;
    Some(
        Edge::new(event.event_id.to_string(), parent.to_string(), EdgeKind::CausedBy)
            .with_property("mechanism", CausalMechanism::Direct.as_str()),
    )
}

/// Full projection for one event.
///
/// A FOLLOWS edge is emitted only when `prev` exists and shares the
/// session; a CAUSED_BY edge only when a causal parent is declared.
/// Returns `None` when the event has no `global_position` yet.
pub fn project_event(event: &Event, prev: Option<&Event>) -> Option<ProjectionResult> {
    let node = event_to_node(event)?;
    let mut edges = Vec::new();

    if let Some(prev) = prev {
        if prev.session_id == event.session_id {
            edges.push(follows_edge(prev, event));
        }
    }

    if let Some(edge) = caused_by_edge(event) {
        edges.push(edge);
    }

    Some(ProjectionResult { node, edges })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn event_at(session: &str, offset_secs: i64) -> Event {
        Event {
            event_id: Uuid::now_v7(),
            event_type: "tool.execute".to_string(),
            occurred_at: Utc::now() + Duration::seconds(offset_secs),
            session_id: session.to_string(),
            agent_id: "a1".to_string(),
            trace_id: "t1".to_string(),
            payload_ref: "ref://p".to_string(),
            global_position: Some("1700000000000-0".to_string()),
            tool_name: None,
            parent_event_id: None,
            ended_at: None,
            status: None,
            schema_version: 1,
            importance_hint: Some(6),
        }
    }

    #[test]
    fn node_carries_required_fields_and_hint() {
        let event = event_at("s1", 0);
        let node = event_to_node(&event).unwrap();
        assert_eq!(node.event_id, event.event_id.to_string());
        assert_eq!(node.importance_score, Some(6));
        assert_eq!(node.access_count, 0);
        assert!(node.last_accessed_at.is_none());
    }

    #[test]
    fn missing_position_yields_none() {
        let mut event = event_at("s1", 0);
        event.global_position = None;
        assert!(event_to_node(&event).is_none());
        assert!(project_event(&event, None).is_none());
    }

    #[test]
    fn follows_edge_within_session() {
        let prev = event_at("s1", 0);
        let curr = event_at("s1", 1);
        let result = project_event(&curr, Some(&prev)).unwrap();
        assert_eq!(result.edges.len(), 1);
        let edge = &result.edges[0];
        assert_eq!(edge.kind, EdgeKind::Follows);
        assert_eq!(edge.source, curr.event_id.to_string());
        assert_eq!(edge.target, prev.event_id.to_string());
        assert_eq!(edge.properties["delta_ms"].as_i64(), Some(1000));
        assert_eq!(edge.properties["session_id"].as_str(), Some("s1"));
    }

    #[test]
    fn no_follows_edge_across_sessions() {
        let prev = event_at("s1", 0);
        let curr = event_at("s2", 1);
        let result = project_event(&curr, Some(&prev)).unwrap();
        assert!(result.edges.is_empty());
    }

    #[test]
    fn negative_delta_is_clamped() {
        let prev = event_at("s1", 10);
        let curr = event_at("s1", 0);
        let edge = follows_edge(&prev, &curr);
        assert_eq!(edge.properties["delta_ms"].as_i64(), Some(0));
    }

    #[test]
    fn caused_by_edge_points_child_to_parent() {
        let parent = event_at("s1", 0);
        let mut child = event_at("s1", 1);
        child.parent_event_id = Some(parent.event_id);
        let result = project_event(&child, Some(&parent)).unwrap();
        assert_eq!(result.edges.len(), 2);
        let caused = result
            .edges
            .iter()
            .find(|e| e.kind == EdgeKind::CausedBy)
            .unwrap();
        assert_eq!(caused.source, child.event_id.to_string());
        assert_eq!(caused.target, parent.event_id.to_string());
        assert_eq!(caused.properties["mechanism"].as_str(), Some("direct"));
    }
}
