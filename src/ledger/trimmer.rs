//! Hot-tier trimming for the ledger
//!
//! Two independent horizons: stream entries past the hot window are
//! trimmed with XTRIM MINID, and JSON documents past the retention
//! ceiling are deleted by scanning the document prefix. Trimming one
//! never touches the other, so secondary-index search keeps working
//! against the documents until they expire.

use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use serde_json::Value as JsonValue;
use tracing::info;

use crate::errors::LedgerResult;

const SCAN_BATCH: usize = 100;

/// Trim stream entries older than `max_age_days`.
///
/// Stream entry ids are `<epoch_ms>-<seq>`, so a MINID cutoff built
/// from the wall clock removes everything older. Returns the number of
/// trimmed entries.
pub async fn trim_stream(
    manager: &ConnectionManager,
    stream_key: &str,
    max_age_days: i64,
    now: DateTime<Utc>,
) -> LedgerResult<u64> {
    let cutoff_ms = now.timestamp_millis() - max_age_days * 86_400_000;
    let min_id = format!("{cutoff_ms}-0");
    let mut con = manager.clone();

    let len_before: u64 = redis::cmd("XLEN").arg(stream_key).query_async(&mut con).await?;

    let trimmed: u64 = redis::cmd("XTRIM")
        .arg(stream_key)
        .arg("MINID")
        .arg(&min_id)
        .query_async(&mut con)
        .await?;

    let len_after: u64 = redis::cmd("XLEN").arg(stream_key).query_async(&mut con).await?;

    info!(
        stream = stream_key,
        min_id = %min_id,
        trimmed = trimmed,
        len_before = len_before,
        len_after = len_after,
        "stream trimmed"
    );
    Ok(trimmed)
}

/// Delete JSON event documents older than `max_age_days`.
///
/// Scans `{prefix}*`, reads each document's `occurred_at_epoch_ms`,
/// and deletes the expired ones. Returns the number of deleted docs.
pub async fn delete_expired_docs(
    manager: &ConnectionManager,
    key_prefix: &str,
    max_age_days: i64,
    now: DateTime<Utc>,
) -> LedgerResult<u64> {
    let cutoff_ms = now.timestamp_millis() - max_age_days * 86_400_000;
    let pattern = format!("{key_prefix}*");
    let mut con = manager.clone();

    let mut deleted: u64 = 0;
    let mut cursor: u64 = 0;

    loop {
        let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(&pattern)
            .arg("COUNT")
            .arg(SCAN_BATCH)
            .query_async(&mut con)
            .await?;

        let mut expired: Vec<String> = Vec::new();
        for key in keys {
            let raw: Option<String> = redis::cmd("JSON.GET")
                .arg(&key)
                .arg("$.occurred_at_epoch_ms")
                .query_async(&mut con)
                .await?;
            let Some(raw) = raw else { continue };
            let Ok(parsed) = serde_json::from_str::<JsonValue>(&raw) else {
                continue;
            };
            let epoch_ms = match &parsed {
                JsonValue::Array(items) => items.first().and_then(JsonValue::as_i64),
                other => other.as_i64(),
            };
            if matches!(epoch_ms, Some(ms) if ms < cutoff_ms) {
                expired.push(key);
            }
        }

        if !expired.is_empty() {
            let mut del = redis::cmd("DEL");
            for key in &expired {
                del.arg(key);
            }
            let removed: u64 = del.query_async(&mut con).await?;
            deleted += removed;
        }

        cursor = next_cursor;
        if cursor == 0 {
            break;
        }
    }

    info!(
        prefix = key_prefix,
        max_age_days = max_age_days,
        deleted = deleted,
        "expired event documents deleted"
    );
    Ok(deleted)
}
