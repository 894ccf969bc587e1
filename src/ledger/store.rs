//! Redis-backed event ledger
//!
//! The write path goes through a server-side Lua script so the four
//! writes (global stream entry, JSON document, per-session view, dedup
//! index) succeed or fail as a unit, and duplicate event_ids return the
//! originally assigned position. Reads are point lookups on the JSON
//! store or filtered FT.SEARCH queries over the secondary index.

use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::{Script, Value};
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::config::RedisConfig;
use crate::domain::{Event, EventQuery};
use crate::errors::{LedgerError, LedgerResult};
use crate::ledger::index::{ensure_event_index, escape_tag_value};

const INGEST_LUA: &str = include_str!("ingest.lua");

/// Event ledger over Redis Stack (Streams + JSON + Search)
#[derive(Clone)]
pub struct RedisLedger {
    manager: ConnectionManager,
    config: RedisConfig,
    ingest_script: Arc<Script>,
}

impl RedisLedger {
    /// Connect and register the ingestion script.
    pub async fn connect(config: RedisConfig) -> LedgerResult<Self> {
        let client = redis::Client::open(config.url())?;
        let manager = ConnectionManager::new(client).await?;
        info!(host = %config.host, port = config.port, "connected to ledger backend");
        Ok(Self {
            manager,
            config,
            ingest_script: Arc::new(Script::new(INGEST_LUA)),
        })
    }

    /// Settings this ledger was built with
    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// A fresh handle on the shared connection
    pub fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    /// Create the secondary search index if missing.
    pub async fn ensure_index(&self) -> LedgerResult<()> {
        ensure_event_index(
            &self.manager,
            &self.config.event_index,
            &self.config.event_key_prefix,
        )
        .await
    }

    /// Liveness probe
    pub async fn ping(&self) -> bool {
        let mut con = self.manager.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut con)
            .await
            .is_ok()
    }

    /// Length of the global stream
    pub async fn stream_len(&self) -> LedgerResult<u64> {
        let mut con = self.manager.clone();
        let len: u64 = redis::cmd("XLEN")
            .arg(&self.config.global_stream)
            .query_async(&mut con)
            .await?;
        Ok(len)
    }

    // -- write operations ---------------------------------------------------

    /// Append a single event; returns its global position.
    ///
    /// Idempotent: a duplicate event_id returns the position assigned on
    /// first ingestion, and no key is touched. The Lua script is
    /// re-registered transparently after a NOSCRIPT.
    pub async fn append(&self, event: &Event) -> LedgerResult<String> {
        let event_id = event.event_id.to_string();
        let epoch_ms = event.occurred_at_epoch_ms();

        let mut doc = serde_json::to_value(event)?;
        if let JsonValue::Object(map) = &mut doc {
            map.insert("occurred_at_epoch_ms".to_string(), JsonValue::from(epoch_ms));
        }
        let event_json = serde_json::to_string(&doc)?;

        let mut con = self.manager.clone();
        let position: String = self
            .ingest_script
            .key(&self.config.global_stream)
            .key(self.config.event_key(&event_id))
            .key(&self.config.dedup_set)
            .key(self.config.session_stream_key(&event.session_id))
            .key(&self.config.position_hash)
            .arg(&event_id)
            .arg(event_json)
            .arg(epoch_ms)
            .arg(&event.event_type)
            .arg(&event.session_id)
            .arg(&event.agent_id)
            .invoke_async(&mut con)
            .await?;

        if self.config.replica_wait {
            let _: i64 = redis::cmd("WAIT").arg(1).arg(100).query_async(&mut con).await?;
        }

        debug!(event_id = %event_id, position = %position, "event appended");
        Ok(position)
    }

    /// Append a batch of events, each individually atomic and
    /// idempotent; output order matches input order.
    pub async fn append_batch(&self, events: &[Event]) -> LedgerResult<Vec<String>> {
        let mut positions = Vec::with_capacity(events.len());
        for event in events {
            positions.push(self.append(event).await?);
        }
        Ok(positions)
    }

    /// Remove dedup entries older than the retention window.
    ///
    /// Defaults to the JSON retention ceiling, so the dedup index stays
    /// bounded by the same horizon as the documents it protects.
    /// Returns the number of removed entries.
    pub async fn cleanup_dedup(&self, retention_ms: Option<i64>, now_ms: i64) -> LedgerResult<u64> {
        let retention_ms =
            retention_ms.unwrap_or(self.config.retention_ceiling_days * 86_400_000);
        let cutoff_ms = now_ms - retention_ms;
        let mut con = self.manager.clone();

        let expired: Vec<String> = redis::cmd("ZRANGEBYSCORE")
            .arg(&self.config.dedup_set)
            .arg("-inf")
            .arg(cutoff_ms)
            .query_async(&mut con)
            .await?;

        if expired.is_empty() {
            return Ok(0);
        }

        let removed: u64 = redis::cmd("ZREMRANGEBYSCORE")
            .arg(&self.config.dedup_set)
            .arg("-inf")
            .arg(cutoff_ms)
            .query_async(&mut con)
            .await?;

        // Drop the matching position entries so a re-ingested id gets a
        // fresh position instead of a stale one.
        let mut hdel = redis::cmd("HDEL");
        hdel.arg(&self.config.position_hash);
        for event_id in &expired {
            hdel.arg(event_id);
        }
        let _: u64 = hdel.query_async(&mut con).await?;

        info!(removed = removed, cutoff_ms = cutoff_ms, "dedup index cleaned");
        Ok(removed)
    }

    // -- read operations ----------------------------------------------------

    /// Fetch one event by id from the JSON store.
    pub async fn get_by_id(&self, event_id: &str) -> LedgerResult<Option<Event>> {
        let mut con = self.manager.clone();
        let raw: Option<String> = redis::cmd("JSON.GET")
            .arg(self.config.event_key(event_id))
            .arg("$")
            .query_async(&mut con)
            .await?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        Ok(Some(parse_event_doc(&raw)?))
    }

    /// Events for a session ordered by `occurred_at` ascending.
    /// `cursor` is a numeric offset into the result set.
    pub async fn get_by_session(
        &self,
        session_id: &str,
        limit: u64,
        cursor: u64,
    ) -> LedgerResult<Vec<Event>> {
        let filter = format!("@session_id:{{{}}}", escape_tag_value(session_id));
        self.ft_search(&filter, limit.clamp(1, 1000), cursor).await
    }

    /// Filtered search over the secondary index, ordered by
    /// `occurred_at` ascending.
    pub async fn search(&self, query: &EventQuery) -> LedgerResult<Vec<Event>> {
        let mut filters: Vec<String> = Vec::new();

        if let Some(session_id) = &query.session_id {
            filters.push(format!("@session_id:{{{}}}", escape_tag_value(session_id)));
        }
        if let Some(agent_id) = &query.agent_id {
            filters.push(format!("@agent_id:{{{}}}", escape_tag_value(agent_id)));
        }
        if let Some(trace_id) = &query.trace_id {
            filters.push(format!("@trace_id:{{{}}}", escape_tag_value(trace_id)));
        }
        if let Some(event_type) = &query.event_type {
            filters.push(format!("@event_type:{{{}}}", escape_tag_value(event_type)));
        }
        if let Some(tool_name) = &query.tool_name {
            filters.push(format!("@tool_name:{{{}}}", escape_tag_value(tool_name)));
        }
        if query.after.is_some() || query.before.is_some() {
            let after = query
                .after
                .map(|ts| ts.timestamp_millis().to_string())
                .unwrap_or_else(|| "-inf".to_string());
            let before = query
                .before
                .map(|ts| ts.timestamp_millis().to_string())
                .unwrap_or_else(|| "+inf".to_string());
            filters.push(format!("@occurred_at_epoch_ms:[{after} {before}]"));
        }

        let filter = if filters.is_empty() {
            "*".to_string()
        } else {
            filters.join(" ")
        };
        self.ft_search(&filter, query.clamped_limit(), query.offset).await
    }

    async fn ft_search(&self, filter: &str, limit: u64, offset: u64) -> LedgerResult<Vec<Event>> {
        let mut con = self.manager.clone();
        let reply: Value = redis::cmd("FT.SEARCH")
            .arg(&self.config.event_index)
            .arg(filter)
            .arg("SORTBY")
            .arg("occurred_at_epoch_ms")
            .arg("ASC")
            .arg("LIMIT")
            .arg(offset)
            .arg(limit)
            .query_async(&mut con)
            .await?;

        parse_search_reply(reply)
    }
}

/// Parse a `JSON.GET key $` reply into an Event, stripping the
/// ledger-only epoch field.
fn parse_event_doc(raw: &str) -> LedgerResult<Event> {
    let parsed: JsonValue = serde_json::from_str(raw)?;
    let mut doc = match parsed {
        JsonValue::Array(mut items) if !items.is_empty() => items.remove(0),
        other => other,
    };
    if let JsonValue::Object(map) = &mut doc {
        map.remove("occurred_at_epoch_ms");
    }
    Ok(serde_json::from_value(doc)?)
}

/// Decode an FT.SEARCH reply: `[total, key1, fields1, key2, fields2, ...]`
/// where each fields array holds the JSON document under the `$` field.
fn parse_search_reply(reply: Value) -> LedgerResult<Vec<Event>> {
    let Value::Bulk(items) = reply else {
        return Ok(Vec::new());
    };
    let mut events = Vec::new();

    let mut idx = 1;
    while idx + 1 < items.len() {
        let fields = &items[idx + 1];
        idx += 2;

        let Value::Bulk(pairs) = fields else {
            continue;
        };
        let mut field_idx = 0;
        while field_idx + 1 < pairs.len() {
            let name: String = redis::from_redis_value(&pairs[field_idx]).unwrap_or_default();
            if name == "$" {
                let doc: String = redis::from_redis_value(&pairs[field_idx + 1])
                    .map_err(LedgerError::Backend)?;
                events.push(parse_event_doc(&doc)?);
                break;
            }
            field_idx += 2;
        }
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn event_doc_round_trip_strips_epoch_field() {
        let raw = r#"[{
            "event_id": "0190a1b2-0000-7000-8000-000000000001",
            "event_type": "tool.execute",
            "occurred_at": "2026-01-01T00:00:00Z",
            "session_id": "s1",
            "agent_id": "a1",
            "trace_id": "t1",
            "payload_ref": "ref://p",
            "global_position": "1700000000000-0",
            "schema_version": 1,
            "occurred_at_epoch_ms": 1767225600000
        }]"#;
        let event = parse_event_doc(raw).unwrap();
        assert_eq!(event.event_type, "tool.execute");
        assert_eq!(event.global_position.as_deref(), Some("1700000000000-0"));
    }

    #[test]
    fn bare_object_doc_also_parses() {
        let raw = r#"{
            "event_id": "0190a1b2-0000-7000-8000-000000000002",
            "event_type": "agent.invoke",
            "occurred_at": "2026-01-01T00:00:00Z",
            "session_id": "s1",
            "agent_id": "a1",
            "trace_id": "t1",
            "payload_ref": "ref://p"
        }"#;
        let event = parse_event_doc(raw).unwrap();
        assert_eq!(event.schema_version, 1);
    }

    #[test]
    fn empty_search_reply_yields_no_events() {
        let reply = Value::Bulk(vec![Value::Int(0)]);
        assert!(parse_search_reply(reply).unwrap().is_empty());
    }

    #[test]
    fn search_reply_extracts_json_docs() {
        let doc = r#"[{
            "event_id": "0190a1b2-0000-7000-8000-000000000003",
            "event_type": "llm.chat",
            "occurred_at": "2026-01-01T00:00:00Z",
            "session_id": "s1",
            "agent_id": "a1",
            "trace_id": "t1",
            "payload_ref": "ref://p"
        }]"#;
        let reply = Value::Bulk(vec![
            Value::Int(1),
            Value::Data(b"evt:0190a1b2-0000-7000-8000-000000000003".to_vec()),
            Value::Bulk(vec![
                Value::Data(b"$".to_vec()),
                Value::Data(doc.as_bytes().to_vec()),
            ]),
        ]);
        let events = parse_search_reply(reply).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "llm.chat");
    }
}
