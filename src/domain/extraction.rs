//! Session knowledge extraction contracts
//!
//! The extraction service itself is pluggable (an LLM lives behind the
//! [`ExtractionService`] trait); the core owns the output contracts,
//! the confidence priors by source type, and the source-quote grounding
//! check that rejects hallucinated extractions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{resolution::name_similarity, Event};

/// Fuzzy-match floor for source quotes against the reconstructed
/// conversation
pub const SOURCE_QUOTE_MATCH_THRESHOLD: f64 = 0.85;

/// Confidence ceiling for a given extraction source type. Unknown
/// source types pass through unmodified.
pub fn confidence_ceiling(source: &str) -> Option<f64> {
    match source {
        "explicit" => Some(0.95),
        "implicit_intentional" => Some(0.7),
        "implicit_unintentional" => Some(0.5),
        "observed" => Some(0.85),
        "declared" => Some(0.95),
        "inferred" => Some(0.6),
        "implicit" => Some(0.7),
        _ => None,
    }
}

/// Apply the source-type ceiling: min(confidence, ceiling)
pub fn apply_confidence_prior(confidence: f64, source: &str) -> f64 {
    match confidence_ceiling(source) {
        Some(ceiling) => confidence.min(ceiling),
        None => confidence,
    }
}

/// An entity extracted from a conversation session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub name: String,
    pub entity_type: String,
    pub confidence: f64,
    pub source_quote: String,
}

/// A user preference extracted from a conversation session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedPreference {
    pub category: String,
    pub key: String,
    pub polarity: String,
    pub strength: f64,
    pub confidence: f64,
    pub source: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub about_entity: Option<String>,
    pub source_quote: String,
}

/// A user skill extracted from a conversation session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedSkill {
    pub name: String,
    pub category: String,
    pub proficiency: f64,
    pub confidence: f64,
    pub source: String,
    pub source_quote: String,
}

/// A user interest extracted from a conversation session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedInterest {
    pub entity_name: String,
    pub entity_type: String,
    pub weight: f64,
    pub source: String,
    pub source_quote: String,
}

/// Aggregated extraction output for one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionExtraction {
    pub session_id: String,
    pub agent_id: String,
    #[serde(default)]
    pub entities: Vec<ExtractedEntity>,
    #[serde(default)]
    pub preferences: Vec<ExtractedPreference>,
    #[serde(default)]
    pub skills: Vec<ExtractedSkill>,
    #[serde(default)]
    pub interests: Vec<ExtractedInterest>,
}

/// Pluggable extraction capability. The core calls this once per ended
/// session and post-validates whatever comes back.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn extract_from_session(
        &self,
        events: &[Event],
        session_id: &str,
        agent_id: &str,
    ) -> Result<SessionExtraction, String>;
}

/// Offline extraction client: returns empty results. Keeps the
/// extraction consumer runnable without a model wired in.
#[derive(Debug, Default, Clone)]
pub struct NoopExtractionService;

#[async_trait]
impl ExtractionService for NoopExtractionService {
    async fn extract_from_session(
        &self,
        _events: &[Event],
        session_id: &str,
        agent_id: &str,
    ) -> Result<SessionExtraction, String> {
        Ok(SessionExtraction {
            session_id: session_id.to_string(),
            agent_id: agent_id.to_string(),
            ..SessionExtraction::default()
        })
    }
}

/// Reconstruct a turn-by-turn transcript from session events, used both
/// for the extraction prompt and for source-quote validation.
pub fn conversation_text(events: &[Event]) -> String {
    let mut lines = Vec::new();
    for (idx, event) in events.iter().enumerate() {
        let mut header = format!(
            "[Turn {}] [{}] {}",
            idx,
            event.occurred_at.to_rfc3339(),
            event.event_type
        );
        if let Some(tool) = &event.tool_name {
            header.push_str(&format!(" tool={tool}"));
        }
        header.push_str(&format!(" agent={}", event.agent_id));
        lines.push(header);
        lines.push(format!("  payload_ref: {}", event.payload_ref));
        if let Some(status) = &event.status {
            lines.push(format!("  status: {}", status.as_str()));
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

fn collapse_whitespace(text: &str) -> String {
    text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Does `quote` appear (approximately) in `conversation`?
///
/// Exact substring is the fast path; otherwise a sliding window of the
/// quote's length is fuzzy-compared, accepting any window at or above
/// [`SOURCE_QUOTE_MATCH_THRESHOLD`].
pub fn validate_source_quote(quote: &str, conversation: &str) -> bool {
    if quote.is_empty() || conversation.is_empty() {
        return false;
    }
    let quote_norm = collapse_whitespace(quote);
    let text_norm = collapse_whitespace(conversation);

    if text_norm.contains(&quote_norm) {
        return true;
    }

    let quote_chars: Vec<char> = quote_norm.chars().collect();
    let text_chars: Vec<char> = text_norm.chars().collect();
    let window = quote_chars.len();

    if window > text_chars.len() {
        return name_similarity(&quote_norm, &text_norm) >= SOURCE_QUOTE_MATCH_THRESHOLD;
    }

    let step = (window / 4).max(1);
    let mut start = 0;
    while start + window <= text_chars.len() {
        let slice: String = text_chars[start..start + window].iter().collect();
        if name_similarity(&quote_norm, &slice) >= SOURCE_QUOTE_MATCH_THRESHOLD {
            return true;
        }
        start += step;
    }
    false
}

/// Post-validate an extraction: drop anything whose source quote is not
/// grounded in the conversation, and apply confidence ceilings.
pub fn validate_extraction(
    mut extraction: SessionExtraction,
    conversation: &str,
) -> SessionExtraction {
    extraction
        .entities
        .retain(|e| validate_source_quote(&e.source_quote, conversation));

    extraction
        .preferences
        .retain(|p| validate_source_quote(&p.source_quote, conversation));
    for preference in &mut extraction.preferences {
        preference.confidence = apply_confidence_prior(preference.confidence, &preference.source);
    }

    extraction
        .skills
        .retain(|s| validate_source_quote(&s.source_quote, conversation));
    for skill in &mut extraction.skills {
        skill.confidence = apply_confidence_prior(skill.confidence, &skill.source);
    }

    extraction
        .interests
        .retain(|i| validate_source_quote(&i.source_quote, conversation));
    for interest in &mut extraction.interests {
        interest.weight = apply_confidence_prior(interest.weight, &interest.source);
    }

    extraction
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use test_case::test_case;
    use uuid::Uuid;

    #[test_case("explicit", 0.95)]
    #[test_case("implicit_intentional", 0.7)]
    #[test_case("implicit_unintentional", 0.5)]
    #[test_case("observed", 0.85)]
    #[test_case("declared", 0.95)]
    #[test_case("inferred", 0.6)]
    fn ceilings_by_source(source: &str, ceiling: f64) {
        assert_eq!(confidence_ceiling(source), Some(ceiling));
        assert_eq!(apply_confidence_prior(0.99, source), ceiling);
        assert_eq!(apply_confidence_prior(0.1, source), 0.1);
    }

    #[test]
    fn unknown_source_passes_through() {
        assert_eq!(apply_confidence_prior(0.99, "telepathy"), 0.99);
    }

    #[test]
    fn exact_quote_validates() {
        assert!(validate_source_quote("payload_ref: ref://a", "  payload_ref: ref://a\n"));
    }

    #[test]
    fn near_quote_validates_fuzzily() {
        let conversation = "the user said they strongly prefer dark mode in all editors";
        assert!(validate_source_quote("strongly prefers dark mode", conversation));
    }

    #[test]
    fn unrelated_quote_is_rejected() {
        assert!(!validate_source_quote("completely fabricated claim", "short transcript"));
        assert!(!validate_source_quote("", "text"));
        assert!(!validate_source_quote("quote", ""));
    }

    fn session_event(payload: &str) -> Event {
        Event {
            event_id: Uuid::now_v7(),
            event_type: "observation.input".to_string(),
            occurred_at: Utc::now(),
            session_id: "s1".to_string(),
            agent_id: "a1".to_string(),
            trace_id: "t1".to_string(),
            payload_ref: payload.to_string(),
            global_position: None,
            tool_name: Some("editor".to_string()),
            parent_event_id: None,
            ended_at: None,
            status: None,
            schema_version: 1,
            importance_hint: None,
        }
    }

    #[test]
    fn transcript_contains_turns_and_tools() {
        let text = conversation_text(&[session_event("ref://p1"), session_event("ref://p2")]);
        assert!(text.contains("[Turn 0]"));
        assert!(text.contains("[Turn 1]"));
        assert!(text.contains("tool=editor"));
        assert!(text.contains("payload_ref: ref://p1"));
    }

    #[test]
    fn validation_drops_ungrounded_and_caps_confidence() {
        let conversation = "user prefers ripgrep for searching";
        let extraction = SessionExtraction {
            session_id: "s1".to_string(),
            agent_id: "a1".to_string(),
            entities: vec![ExtractedEntity {
                name: "ripgrep".to_string(),
                entity_type: "tool".to_string(),
                confidence: 0.9,
                source_quote: "prefers ripgrep".to_string(),
            }],
            preferences: vec![
                ExtractedPreference {
                    category: "tool".to_string(),
                    key: "search_tool".to_string(),
                    polarity: "positive".to_string(),
                    strength: 0.9,
                    confidence: 0.99,
                    source: "implicit_intentional".to_string(),
                    context: None,
                    about_entity: Some("ripgrep".to_string()),
                    source_quote: "user prefers ripgrep".to_string(),
                },
                ExtractedPreference {
                    category: "style".to_string(),
                    key: "made_up".to_string(),
                    polarity: "negative".to_string(),
                    strength: 0.5,
                    confidence: 0.5,
                    source: "explicit".to_string(),
                    context: None,
                    about_entity: None,
                    source_quote: "never said anything of the sort".to_string(),
                },
            ],
            skills: vec![],
            interests: vec![],
        };

        let validated = validate_extraction(extraction, conversation);
        assert_eq!(validated.entities.len(), 1);
        assert_eq!(validated.preferences.len(), 1);
        // implicit_intentional ceiling
        assert_eq!(validated.preferences[0].confidence, 0.7);
    }

    #[tokio::test]
    async fn noop_service_returns_empty_extraction() {
        let service = NoopExtractionService;
        let result = service.extract_from_session(&[], "s1", "a1").await.unwrap();
        assert_eq!(result.session_id, "s1");
        assert!(result.entities.is_empty());
    }
}
