//! Event envelope — the shared contract of the ledger
//!
//! An [`Event`] is an immutable record produced by agents, tools, and LLM
//! calls. The ledger assigns `global_position` on append; everything else
//! is supplied by the producer and never mutated afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event outcome status, aligned with action lifecycles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Timeout,
}

impl EventStatus {
    /// Canonical string form
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Running => "running",
            EventStatus::Completed => "completed",
            EventStatus::Failed => "failed",
            EventStatus::Timeout => "timeout",
        }
    }
}

/// Immutable event record: 8 required + 6 optional fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    // Required fields
    pub event_id: Uuid,
    /// Dot-namespaced type, e.g. `tool.execute`
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub session_id: String,
    pub agent_id: String,
    pub trace_id: String,
    /// Opaque URI pointing at the full payload
    pub payload_ref: String,
    /// Stream entry id `<epoch_ms>-<seq>`, assigned on ingestion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_position: Option<String>,

    // Optional fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_event_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance_hint: Option<i64>,
}

fn default_schema_version() -> u32 {
    1
}

impl Event {
    /// The event's occurred_at as milliseconds since the Unix epoch
    pub fn occurred_at_epoch_ms(&self) -> i64 {
        self.occurred_at.timestamp_millis()
    }
}

/// Filtered search over the ledger's secondary index.
///
/// All filters are conjunctive; results come back ordered by
/// `occurred_at` ascending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventQuery {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub after: Option<DateTime<Utc>>,
    #[serde(default)]
    pub before: Option<DateTime<Utc>>,
    #[serde(default = "default_query_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

fn default_query_limit() -> u64 {
    100
}

impl EventQuery {
    /// Clamp limit to [1, 1000]; offset is already non-negative by type.
    pub fn clamped_limit(&self) -> u64 {
        self.limit.clamp(1, 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_event() -> Event {
        Event {
            event_id: Uuid::now_v7(),
            event_type: "tool.execute".to_string(),
            occurred_at: Utc::now(),
            session_id: "sess-1".to_string(),
            agent_id: "agent-1".to_string(),
            trace_id: "trace-1".to_string(),
            payload_ref: "s3://payloads/1".to_string(),
            global_position: None,
            tool_name: Some("grep".to_string()),
            parent_event_id: None,
            ended_at: None,
            status: Some(EventStatus::Completed),
            schema_version: 1,
            importance_hint: Some(7),
        }
    }

    #[test]
    fn serde_round_trip_preserves_fields() {
        let event = sample_event();
        let json = serde_json::to_string(&event).unwrap();
        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event, parsed);
    }

    #[test]
    fn schema_version_defaults_to_one() {
        let json = r#"{
            "event_id": "0190a1b2-0000-7000-8000-000000000001",
            "event_type": "agent.invoke",
            "occurred_at": "2026-01-01T00:00:00Z",
            "session_id": "s",
            "agent_id": "a",
            "trace_id": "t",
            "payload_ref": "ref"
        }"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.schema_version, 1);
        assert!(event.status.is_none());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&EventStatus::Timeout).unwrap(),
            "\"timeout\""
        );
    }

    #[test]
    fn query_limit_is_clamped() {
        let query = EventQuery {
            limit: 5000,
            ..EventQuery::default()
        };
        assert_eq!(query.clamped_limit(), 1000);
        let query = EventQuery {
            limit: 0,
            ..EventQuery::default()
        };
        assert_eq!(query.clamped_limit(), 1);
    }
}
