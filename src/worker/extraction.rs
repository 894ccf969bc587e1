//! Consumer 2: session knowledge extraction
//!
//! Triggers on `system.session_end`. Collects the ended session's
//! events from the ledger, runs the pluggable extraction service,
//! validates the output against the reconstructed conversation, and
//! writes entities (through the resolver), preferences, skills, and
//! interests into the graph.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use crate::config::Config;
use crate::domain::extraction::{
    conversation_text, validate_extraction, ExtractionService, SessionExtraction,
};
use crate::domain::resolution::{normalize_name, resolve_alias, resolve_entity, ResolutionAction};
use crate::domain::{Edge, EdgeKind, EntityKind, EntityNode, ReferenceRole};
use crate::errors::{WorkerError, WorkerResult};
use crate::graph::GraphStore;
use crate::ledger::RedisLedger;
use crate::worker::consumer::{field, StreamConsumer};

const SESSION_END_EVENT_TYPE: &str = "system.session_end";
const SESSION_FETCH_LIMIT: u64 = 1000;
const KNOWN_ENTITY_LIMIT: i64 = 1000;

/// Extraction consumer
pub struct ExtractionConsumer {
    ledger: RedisLedger,
    graph: GraphStore,
    service: Arc<dyn ExtractionService>,
    group_name: String,
}

impl ExtractionConsumer {
    pub fn new(
        ledger: RedisLedger,
        graph: GraphStore,
        service: Arc<dyn ExtractionService>,
        config: &Config,
    ) -> Self {
        Self {
            ledger,
            graph,
            service,
            group_name: config.redis.group_extraction.clone(),
        }
    }

    async fn write_results(
        &self,
        session_id: &str,
        agent_id: &str,
        extraction: &SessionExtraction,
        source_event_ids: &[String],
    ) -> WorkerResult<()> {
        let user_entity_id = format!("user:{agent_id}");
        let now = Utc::now();

        let known = self.graph.known_entities(KNOWN_ENTITY_LIMIT).await?;
        let latest_event_id = source_event_ids.last().cloned();

        for extracted in &extraction.entities {
            let outcome = resolve_entity(&extracted.name, &extracted.entity_type, &known);
            let entity_kind =
                EntityKind::parse(&extracted.entity_type).unwrap_or(EntityKind::Concept);
            let find_existing = || {
                known.iter().find(|k| {
                    normalize_name(&k.name) == outcome.canonical_name
                        || resolve_alias(&k.name) == outcome.canonical_name
                })
            };

            let entity_id = match outcome.action {
                ResolutionAction::Merge => {
                    // Reinforce the existing entity
                    let Some(existing) = find_existing() else {
                        continue;
                    };
                    self.graph
                        .merge_entity_node(&EntityNode {
                            entity_id: existing.entity_id.clone(),
                            name: existing.name.clone(),
                            entity_type: EntityKind::parse(&existing.entity_type)
                                .unwrap_or(entity_kind),
                            first_seen: now,
                            last_seen: now,
                            mention_count: 1,
                        })
                        .await?;
                    existing.entity_id.clone()
                }
                ResolutionAction::SameAs | ResolutionAction::RelatedTo => {
                    let new_id = entity_id_for(&extracted.name);
                    self.graph
                        .merge_entity_node(&EntityNode {
                            entity_id: new_id.clone(),
                            name: extracted.name.clone(),
                            entity_type: entity_kind,
                            first_seen: now,
                            last_seen: now,
                            mention_count: 1,
                        })
                        .await?;
                    if let Some(existing) = find_existing() {
                        let kind = if outcome.action == ResolutionAction::SameAs {
                            EdgeKind::SameAs
                        } else {
                            EdgeKind::RelatedTo
                        };
                        let edge = Edge::new(new_id.clone(), existing.entity_id.clone(), kind)
                            .with_property("confidence", outcome.confidence);
                        self.graph.create_edge(&edge).await?;
                    }
                    new_id
                }
                ResolutionAction::Create => {
                    let new_id = entity_id_for(&extracted.name);
                    self.graph
                        .merge_entity_node(&EntityNode {
                            entity_id: new_id.clone(),
                            name: extracted.name.clone(),
                            entity_type: entity_kind,
                            first_seen: now,
                            last_seen: now,
                            mention_count: 1,
                        })
                        .await?;
                    new_id
                }
            };

            // Tie the mention back into the event graph
            if let Some(event_id) = &latest_event_id {
                let edge = Edge::new(event_id.clone(), entity_id, EdgeKind::References)
                    .with_property("role", ReferenceRole::Participant.as_str())
                    .with_property("confidence", extracted.confidence);
                self.graph.create_edge(&edge).await?;
            }
        }

        for preference in &extraction.preferences {
            self.graph
                .write_preference(&user_entity_id, preference, session_id, source_event_ids)
                .await?;
        }
        for skill in &extraction.skills {
            self.graph.write_skill(&user_entity_id, skill).await?;
        }
        for interest in &extraction.interests {
            self.graph.write_interest(&user_entity_id, interest).await?;
        }

        info!(
            session_id = session_id,
            user_entity_id = %user_entity_id,
            entities = extraction.entities.len(),
            preferences = extraction.preferences.len(),
            skills = extraction.skills.len(),
            interests = extraction.interests.len(),
            "extraction results written"
        );
        Ok(())
    }
}

fn entity_id_for(name: &str) -> String {
    format!("ent:{}", normalize_name(name).replace(' ', "-"))
}

#[async_trait]
impl StreamConsumer for ExtractionConsumer {
    fn group_name(&self) -> &str {
        &self.group_name
    }

    fn consumer_name(&self) -> &str {
        "extraction-1"
    }

    async fn process_entry(
        &mut self,
        entry_id: &str,
        fields: &HashMap<String, String>,
    ) -> WorkerResult<()> {
        let event_type = fields.get("event_type").map(String::as_str).unwrap_or("");
        if event_type != SESSION_END_EVENT_TYPE {
            return Ok(());
        }

        let Some(session_id) = field(fields, "session_id", entry_id) else {
            return Ok(());
        };
        let agent_id = fields.get("agent_id").map(String::as_str).unwrap_or("unknown");

        let events = self
            .ledger
            .get_by_session(session_id, SESSION_FETCH_LIMIT, 0)
            .await?;
        if events.is_empty() {
            debug!(session_id = session_id, "no events to extract from");
            return Ok(());
        }

        let raw = self
            .service
            .extract_from_session(&events, session_id, agent_id)
            .await
            .map_err(WorkerError::Extraction)?;

        let conversation = conversation_text(&events);
        let validated = validate_extraction(raw, &conversation);

        let source_event_ids: Vec<String> =
            events.iter().map(|e| e.event_id.to_string()).collect();
        self.write_results(session_id, agent_id, &validated, &source_event_ids)
            .await
    }
}
