//! Consumer 4: consolidation and forgetting
//!
//! Trigger-driven: a `consolidation_trigger` message on the stream runs
//! one full cycle. Regular event entries are acknowledged and skipped.
//!
//! A cycle: find sessions past the reflection threshold, write episode
//! plus session plus agent summaries with SUMMARIZES edges, refresh
//! importance from centrality, enforce the retention tiers on the
//! graph, and trim the ledger's hot window. Graph pruning and ledger
//! trimming are independent of one another.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::config::Config;
use crate::domain::consolidation::{group_into_episodes, should_reconsolidate, summary_from_events};
use crate::errors::WorkerResult;
use crate::graph::GraphStore;
use crate::ledger::trimmer::{delete_expired_docs, trim_stream};
use crate::ledger::RedisLedger;
use crate::worker::consumer::StreamConsumer;

pub const CONSOLIDATION_TRIGGER: &str = "consolidation_trigger";

/// Consolidation consumer
pub struct ConsolidationConsumer {
    ledger: RedisLedger,
    graph: GraphStore,
    config: Config,
}

impl ConsolidationConsumer {
    pub fn new(ledger: RedisLedger, graph: GraphStore, config: Config) -> Self {
        Self {
            ledger,
            graph,
            config,
        }
    }

    /// Run one full consolidation cycle.
    pub async fn run_cycle(&self) -> WorkerResult<()> {
        let threshold = self.config.decay.reflection_threshold;
        let session_counts = self.graph.session_event_counts().await?;

        let qualifying: HashMap<String, u64> = session_counts
            .into_iter()
            .filter(|(_, count)| should_reconsolidate(*count, threshold))
            .collect();

        if !qualifying.is_empty() {
            info!(
                sessions = qualifying.len(),
                threshold = threshold,
                "sessions qualify for consolidation"
            );
        }

        for (session_id, event_count) in &qualifying {
            self.consolidate_session(session_id, *event_count).await?;
        }

        self.consolidate_agents(&qualifying).await?;
        self.graph.update_importance_from_centrality().await?;
        self.run_forgetting().await?;
        self.trim_ledger().await?;

        Ok(())
    }

    /// Episode and session summaries for one session.
    async fn consolidate_session(&self, session_id: &str, event_count: u64) -> WorkerResult<()> {
        let events = self
            .graph
            .session_episode_events(session_id, event_count.max(1) as i64)
            .await?;
        if events.is_empty() {
            return Ok(());
        }
        let now = Utc::now();

        let episodes =
            group_into_episodes(events.clone(), self.config.worker.episode_gap_minutes);
        info!(
            session_id = session_id,
            episodes = episodes.len(),
            "episodes grouped"
        );

        for (idx, episode) in episodes.iter().enumerate() {
            let scope_id = format!("{session_id}-ep{idx}");
            if let Some(summary) = summary_from_events(episode, "episode", &scope_id, now) {
                let event_ids: Vec<String> =
                    episode.iter().map(|e| e.event_id.clone()).collect();
                self.graph.write_summary_with_edges(&summary, &event_ids).await?;
            }
        }

        if let Some(summary) = summary_from_events(&events, "session", session_id, now) {
            let event_ids: Vec<String> = events.iter().map(|e| e.event_id.clone()).collect();
            self.graph.write_summary_with_edges(&summary, &event_ids).await?;
        }

        Ok(())
    }

    /// Agent-scoped summaries across all qualifying sessions that share
    /// an agent.
    async fn consolidate_agents(&self, qualifying: &HashMap<String, u64>) -> WorkerResult<()> {
        let mut agent_sessions: HashMap<String, Vec<String>> = HashMap::new();
        for session_id in qualifying.keys() {
            if let Some(agent_id) = self.graph.session_agent(session_id).await? {
                agent_sessions.entry(agent_id).or_default().push(session_id.clone());
            }
        }

        let now = Utc::now();
        for (agent_id, session_ids) in agent_sessions {
            let mut all_events = Vec::new();
            for session_id in &session_ids {
                let events = self.graph.session_episode_events(session_id, 1000).await?;
                all_events.extend(events);
            }
            if let Some(summary) = summary_from_events(&all_events, "agent", &agent_id, now) {
                let event_ids: Vec<String> =
                    all_events.iter().map(|e| e.event_id.clone()).collect();
                self.graph.write_summary_with_edges(&summary, &event_ids).await?;
                info!(agent_id = %agent_id, sessions = session_ids.len(), "agent summary created");
            }
        }
        Ok(())
    }

    /// Retention tier enforcement on the graph.
    async fn run_forgetting(&self) -> WorkerResult<()> {
        let retention = &self.config.retention;
        let now = Utc::now();

        let deleted_edges = self
            .graph
            .prune_similar_edges(retention.warm_min_similarity, retention.hot_hours, now)
            .await?;

        let deleted_cold = self
            .graph
            .prune_cold_events(
                retention.warm_hours,
                retention.cold_min_importance,
                retention.cold_min_access_count,
                now,
            )
            .await?;

        let archive_ids = self.graph.archive_event_ids(retention.cold_hours, now).await?;
        let deleted_archive = self.graph.delete_events_by_ids(&archive_ids).await?;

        info!(
            deleted_edges = deleted_edges,
            deleted_cold = deleted_cold,
            deleted_archive = deleted_archive,
            "forgetting completed"
        );
        Ok(())
    }

    /// Hot-window trim plus document and dedup expiry on the ledger.
    async fn trim_ledger(&self) -> WorkerResult<()> {
        let redis_config = self.ledger.config().clone();
        let now = Utc::now();
        let connection = self.ledger.connection();

        let trimmed = trim_stream(
            &connection,
            &redis_config.global_stream,
            redis_config.hot_window_days,
            now,
        )
        .await?;

        let deleted = delete_expired_docs(
            &connection,
            &redis_config.event_key_prefix,
            redis_config.retention_ceiling_days,
            now,
        )
        .await?;

        let dedup_removed = self
            .ledger
            .cleanup_dedup(None, now.timestamp_millis())
            .await?;

        info!(
            stream_entries_trimmed = trimmed,
            expired_docs_deleted = deleted,
            dedup_removed = dedup_removed,
            "ledger trimmed"
        );
        Ok(())
    }
}

#[async_trait]
impl StreamConsumer for ConsolidationConsumer {
    fn group_name(&self) -> &str {
        &self.config.redis.group_consolidation
    }

    fn consumer_name(&self) -> &str {
        "consolidation-1"
    }

    async fn process_entry(
        &mut self,
        entry_id: &str,
        fields: &HashMap<String, String>,
    ) -> WorkerResult<()> {
        let message_type = fields.get("message_type").map(String::as_str).unwrap_or("");
        if message_type != CONSOLIDATION_TRIGGER {
            return Ok(());
        }

        info!(entry_id = entry_id, "consolidation cycle started");
        self.run_cycle().await?;
        info!(entry_id = entry_id, "consolidation cycle completed");
        Ok(())
    }
}
