//! Secondary index over the event JSON documents
//!
//! A RediSearch index on the `evt:*` prefix backs filtered search and
//! time-sorted retrieval. Creation is idempotent.

use redis::aio::ConnectionManager;
use tracing::info;

use crate::errors::LedgerResult;

/// Create the events search index if it does not already exist.
pub async fn ensure_event_index(
    manager: &ConnectionManager,
    index_name: &str,
    prefix: &str,
) -> LedgerResult<()> {
    let mut con = manager.clone();

    let info: Result<redis::Value, _> = redis::cmd("FT.INFO")
        .arg(index_name)
        .query_async(&mut con)
        .await;
    if info.is_ok() {
        info!(index = index_name, "search index exists");
        return Ok(());
    }

    redis::cmd("FT.CREATE")
        .arg(index_name)
        .arg("ON")
        .arg("JSON")
        .arg("PREFIX")
        .arg(1)
        .arg(prefix)
        .arg("SCHEMA")
        .arg("$.session_id")
        .arg("AS")
        .arg("session_id")
        .arg("TAG")
        .arg("$.agent_id")
        .arg("AS")
        .arg("agent_id")
        .arg("TAG")
        .arg("$.trace_id")
        .arg("AS")
        .arg("trace_id")
        .arg("TAG")
        .arg("$.event_type")
        .arg("AS")
        .arg("event_type")
        .arg("TAG")
        .arg("$.tool_name")
        .arg("AS")
        .arg("tool_name")
        .arg("TAG")
        .arg("$.occurred_at_epoch_ms")
        .arg("AS")
        .arg("occurred_at_epoch_ms")
        .arg("NUMERIC")
        .arg("SORTABLE")
        .arg("$.importance_hint")
        .arg("AS")
        .arg("importance_hint")
        .arg("NUMERIC")
        .arg("SORTABLE")
        .query_async::<_, ()>(&mut con)
        .await?;

    info!(index = index_name, prefix = prefix, "search index created");
    Ok(())
}

/// Escape punctuation in a RediSearch TAG value so it matches literally.
pub fn escape_tag_value(value: &str) -> String {
    const SPECIAL: &str = r#".,<>{}[]"':;!@#$%^&*()-+=~/ "#;
    let mut escaped = String::with_capacity(value.len() * 2);
    for ch in value.chars() {
        if SPECIAL.contains(ch) || ch == '\\' {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_values_pass_through() {
        assert_eq!(escape_tag_value("session123"), "session123");
    }

    #[test]
    fn punctuation_is_escaped() {
        assert_eq!(escape_tag_value("sess-1.a"), "sess\\-1\\.a");
        assert_eq!(escape_tag_value("a b"), "a\\ b");
    }
}
