//! Consumer 1: graph projection
//!
//! For every ledger entry: fetch the event document, run the pure
//! projection, MERGE the node and its edges into the graph, and record
//! the event as the session's latest for the next FOLLOWS link. The
//! per-session map is bounded and local to this instance; after a
//! restart it refills as events flow, and MERGE reconciles any link
//! missed around the boundary.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::domain::projection::project_event;
use crate::domain::Event;
use crate::errors::WorkerResult;
use crate::graph::GraphStore;
use crate::ledger::RedisLedger;
use crate::worker::consumer::{field, StreamConsumer};

/// Bounded per-session last-event map with least-recently-used
/// eviction by session inactivity.
pub struct SessionLru {
    capacity: usize,
    entries: HashMap<String, (Event, u64)>,
    order: BTreeMap<u64, String>,
    clock: u64,
}

impl SessionLru {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: BTreeMap::new(),
            clock: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a session's last event and mark the session active.
    pub fn get(&mut self, session_id: &str) -> Option<Event> {
        self.clock += 1;
        let clock = self.clock;
        let (event, tick) = self.entries.get_mut(session_id)?;
        self.order.remove(tick);
        *tick = clock;
        self.order.insert(clock, session_id.to_string());
        Some(event.clone())
    }

    /// Record a session's latest event, evicting the least recently
    /// active session when over capacity.
    pub fn insert(&mut self, session_id: String, event: Event) {
        self.clock += 1;
        if let Some((_, old_tick)) = self.entries.remove(&session_id) {
            self.order.remove(&old_tick);
        }
        self.entries.insert(session_id.clone(), (event, self.clock));
        self.order.insert(self.clock, session_id);

        if self.entries.len() > self.capacity {
            if let Some((_, stale_session)) = self.order.pop_first() {
                self.entries.remove(&stale_session);
            }
        }
    }
}

/// Projection consumer
pub struct ProjectionConsumer {
    ledger: RedisLedger,
    graph: GraphStore,
    group_name: String,
    session_last_event: SessionLru,
}

impl ProjectionConsumer {
    pub fn new(ledger: RedisLedger, graph: GraphStore, config: &Config) -> Self {
        Self {
            ledger,
            graph,
            group_name: config.redis.group_projection.clone(),
            session_last_event: SessionLru::new(config.worker.session_map_capacity),
        }
    }
}

#[async_trait]
impl StreamConsumer for ProjectionConsumer {
    fn group_name(&self) -> &str {
        &self.group_name
    }

    fn consumer_name(&self) -> &str {
        "projection-1"
    }

    async fn process_entry(
        &mut self,
        entry_id: &str,
        fields: &HashMap<String, String>,
    ) -> WorkerResult<()> {
        let Some(event_id) = field(fields, "event_id", entry_id) else {
            return Ok(());
        };

        let Some(mut event) = self.ledger.get_by_id(event_id).await? else {
            warn!(event_id = event_id, entry_id = entry_id, "event document not found");
            return Ok(());
        };

        // The stream entry id IS the global position
        if event.global_position.is_none() {
            event.global_position = Some(entry_id.to_string());
        }

        let prev = self.session_last_event.get(&event.session_id);
        let Some(result) = project_event(&event, prev.as_ref()) else {
            warn!(event_id = event_id, "event has no global position, skipping");
            return Ok(());
        };

        self.graph.merge_event_node(&result.node).await?;
        if !result.edges.is_empty() {
            self.graph.create_edges_batch(&result.edges).await?;
        }

        debug!(
            event_id = event_id,
            entry_id = entry_id,
            session_id = %event.session_id,
            edge_count = result.edges.len(),
            "event projected"
        );

        self.session_last_event.insert(event.session_id.clone(), event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn event(session: &str) -> Event {
        Event {
            event_id: Uuid::now_v7(),
            event_type: "tool.execute".to_string(),
            occurred_at: Utc::now(),
            session_id: session.to_string(),
            agent_id: "a1".to_string(),
            trace_id: "t1".to_string(),
            payload_ref: "ref://p".to_string(),
            global_position: Some("1-0".to_string()),
            tool_name: None,
            parent_event_id: None,
            ended_at: None,
            status: None,
            schema_version: 1,
            importance_hint: None,
        }
    }

    #[test]
    fn lru_returns_last_event_per_session() {
        let mut lru = SessionLru::new(4);
        let first = event("s1");
        let second = event("s1");
        lru.insert("s1".to_string(), first);
        lru.insert("s1".to_string(), second.clone());
        assert_eq!(lru.len(), 1);
        assert_eq!(lru.get("s1").unwrap().event_id, second.event_id);
        assert!(lru.get("s2").is_none());
    }

    #[test]
    fn lru_evicts_least_recently_active_session() {
        let mut lru = SessionLru::new(2);
        lru.insert("s1".to_string(), event("s1"));
        lru.insert("s2".to_string(), event("s2"));
        // Touch s1 so s2 becomes the eviction candidate
        lru.get("s1");
        lru.insert("s3".to_string(), event("s3"));
        assert_eq!(lru.len(), 2);
        assert!(lru.get("s1").is_some());
        assert!(lru.get("s2").is_none());
        assert!(lru.get("s3").is_some());
    }
}
