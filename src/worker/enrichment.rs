//! Consumer 3: enrichment
//!
//! Derives keywords from the event type and tool name and seeds the
//! importance score, writing both onto the projected node. Embedding
//! computation and SIMILAR_TO edge creation belong to the pluggable
//! embedding capability and land through the same update path.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use crate::config::Config;
use crate::errors::WorkerResult;
use crate::graph::GraphStore;
use crate::ledger::RedisLedger;
use crate::worker::consumer::{field, StreamConsumer};

const DEFAULT_IMPORTANCE: i64 = 5;

/// Keywords from the dot-namespaced event type plus the tool name
pub fn extract_keywords(event_type: &str, tool_name: Option<&str>) -> Vec<String> {
    let mut keywords: Vec<String> = event_type
        .split('.')
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect();
    if let Some(tool) = tool_name {
        if !tool.is_empty() && !keywords.iter().any(|k| k == tool) {
            keywords.push(tool.to_string());
        }
    }
    keywords
}

/// Enrichment consumer
pub struct EnrichmentConsumer {
    ledger: RedisLedger,
    graph: GraphStore,
    group_name: String,
}

impl EnrichmentConsumer {
    pub fn new(ledger: RedisLedger, graph: GraphStore, config: &Config) -> Self {
        Self {
            ledger,
            graph,
            group_name: config.redis.group_enrichment.clone(),
        }
    }
}

#[async_trait]
impl StreamConsumer for EnrichmentConsumer {
    fn group_name(&self) -> &str {
        &self.group_name
    }

    fn consumer_name(&self) -> &str {
        "enrichment-1"
    }

    async fn process_entry(
        &mut self,
        entry_id: &str,
        fields: &HashMap<String, String>,
    ) -> WorkerResult<()> {
        let Some(event_id) = field(fields, "event_id", entry_id) else {
            return Ok(());
        };
        let Some(event) = self.ledger.get_by_id(event_id).await? else {
            return Ok(());
        };

        let keywords = extract_keywords(&event.event_type, event.tool_name.as_deref());
        let importance = event.importance_hint.unwrap_or(DEFAULT_IMPORTANCE);

        self.graph
            .update_event_enrichment(event_id, &keywords, importance)
            .await?;

        debug!(
            event_id = event_id,
            keyword_count = keywords.len(),
            importance = importance,
            "event enriched"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn keywords_split_on_dots() {
        assert_eq!(
            extract_keywords("tool.execute", None),
            vec!["tool".to_string(), "execute".to_string()]
        );
    }

    #[test]
    fn tool_name_appended_once() {
        assert_eq!(
            extract_keywords("tool.execute", Some("grep")),
            vec!["tool".to_string(), "execute".to_string(), "grep".to_string()]
        );
        // Already present as a segment
        assert_eq!(
            extract_keywords("tool.grep", Some("grep")),
            vec!["tool".to_string(), "grep".to_string()]
        );
    }
}
