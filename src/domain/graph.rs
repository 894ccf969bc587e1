//! Graph data model: node types, edge taxonomy, and projection targets
//!
//! The graph side of the dual-store architecture. Events are projected
//! into `Event` nodes; extraction produces `Entity` and personalization
//! nodes; consolidation produces `Summary` nodes. Edges are typed and
//! unique per (source, target, type).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Node labels in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Event,
    Entity,
    Summary,
    UserProfile,
    Preference,
    Skill,
    Workflow,
    BehavioralPattern,
}

impl NodeKind {
    /// Graph label for this node kind
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Event => "Event",
            NodeKind::Entity => "Entity",
            NodeKind::Summary => "Summary",
            NodeKind::UserProfile => "UserProfile",
            NodeKind::Preference => "Preference",
            NodeKind::Skill => "Skill",
            NodeKind::Workflow => "Workflow",
            NodeKind::BehavioralPattern => "BehavioralPattern",
        }
    }
}

/// Entity type hierarchy: agent-like (agent, user, service) and
/// entity-like (tool, resource, concept)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Agent,
    User,
    Service,
    Tool,
    Resource,
    Concept,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Agent => "agent",
            EntityKind::User => "user",
            EntityKind::Service => "service",
            EntityKind::Tool => "tool",
            EntityKind::Resource => "resource",
            EntityKind::Concept => "concept",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "agent" => Some(EntityKind::Agent),
            "user" => Some(EntityKind::User),
            "service" => Some(EntityKind::Service),
            "tool" => Some(EntityKind::Tool),
            "resource" => Some(EntityKind::Resource),
            "concept" => Some(EntityKind::Concept),
            _ => None,
        }
    }
}

/// Typed, directed edge taxonomy.
///
/// Core edges connect events to events, entities, and summaries; the
/// remaining kinds form the user personalization subgraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    // Core
    Follows,
    CausedBy,
    SimilarTo,
    References,
    Summarizes,
    // Entity resolution
    SameAs,
    RelatedTo,
    // User personalization
    HasProfile,
    HasPreference,
    HasSkill,
    DerivedFrom,
    ExhibitsPattern,
    InterestedIn,
    About,
    AbstractedFrom,
    ParentSkill,
}

impl EdgeKind {
    /// Canonical relationship type name
    pub fn type_name(&self) -> &'static str {
        match self {
            EdgeKind::Follows => "FOLLOWS",
            EdgeKind::CausedBy => "CAUSED_BY",
            EdgeKind::SimilarTo => "SIMILAR_TO",
            EdgeKind::References => "REFERENCES",
            EdgeKind::Summarizes => "SUMMARIZES",
            EdgeKind::SameAs => "SAME_AS",
            EdgeKind::RelatedTo => "RELATED_TO",
            EdgeKind::HasProfile => "HAS_PROFILE",
            EdgeKind::HasPreference => "HAS_PREFERENCE",
            EdgeKind::HasSkill => "HAS_SKILL",
            EdgeKind::DerivedFrom => "DERIVED_FROM",
            EdgeKind::ExhibitsPattern => "EXHIBITS_PATTERN",
            EdgeKind::InterestedIn => "INTERESTED_IN",
            EdgeKind::About => "ABOUT",
            EdgeKind::AbstractedFrom => "ABSTRACTED_FROM",
            EdgeKind::ParentSkill => "PARENT_SKILL",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "FOLLOWS" => Some(EdgeKind::Follows),
            "CAUSED_BY" => Some(EdgeKind::CausedBy),
            "SIMILAR_TO" => Some(EdgeKind::SimilarTo),
            "REFERENCES" => Some(EdgeKind::References),
            "SUMMARIZES" => Some(EdgeKind::Summarizes),
            "SAME_AS" => Some(EdgeKind::SameAs),
            "RELATED_TO" => Some(EdgeKind::RelatedTo),
            "HAS_PROFILE" => Some(EdgeKind::HasProfile),
            "HAS_PREFERENCE" => Some(EdgeKind::HasPreference),
            "HAS_SKILL" => Some(EdgeKind::HasSkill),
            "DERIVED_FROM" => Some(EdgeKind::DerivedFrom),
            "EXHIBITS_PATTERN" => Some(EdgeKind::ExhibitsPattern),
            "INTERESTED_IN" => Some(EdgeKind::InterestedIn),
            "ABOUT" => Some(EdgeKind::About),
            "ABSTRACTED_FROM" => Some(EdgeKind::AbstractedFrom),
            "PARENT_SKILL" => Some(EdgeKind::ParentSkill),
            _ => None,
        }
    }
}

/// Query intent classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Why,
    When,
    What,
    Related,
    General,
    WhoIs,
    HowDoes,
    Personalize,
}

impl IntentKind {
    pub const ALL: [IntentKind; 8] = [
        IntentKind::Why,
        IntentKind::When,
        IntentKind::What,
        IntentKind::Related,
        IntentKind::General,
        IntentKind::WhoIs,
        IntentKind::HowDoes,
        IntentKind::Personalize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::Why => "why",
            IntentKind::When => "when",
            IntentKind::What => "what",
            IntentKind::Related => "related",
            IntentKind::General => "general",
            IntentKind::WhoIs => "who_is",
            IntentKind::HowDoes => "how_does",
            IntentKind::Personalize => "personalize",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "why" => Some(IntentKind::Why),
            "when" => Some(IntentKind::When),
            "what" => Some(IntentKind::What),
            "related" => Some(IntentKind::Related),
            "general" => Some(IntentKind::General),
            "who_is" => Some(IntentKind::WhoIs),
            "how_does" => Some(IntentKind::HowDoes),
            "personalize" => Some(IntentKind::Personalize),
            _ => None,
        }
    }
}

/// Retention tiers derived from event age
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionTier {
    Hot,
    Warm,
    Cold,
    Archive,
}

/// CAUSED_BY edge mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CausalMechanism {
    Direct,
    Inferred,
}

impl CausalMechanism {
    pub fn as_str(&self) -> &'static str {
        match self {
            CausalMechanism::Direct => "direct",
            CausalMechanism::Inferred => "inferred",
        }
    }
}

/// REFERENCES edge role values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceRole {
    Agent,
    Instrument,
    Object,
    Result,
    Participant,
}

impl ReferenceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceRole::Agent => "agent",
            ReferenceRole::Instrument => "instrument",
            ReferenceRole::Object => "object",
            ReferenceRole::Result => "result",
            ReferenceRole::Participant => "participant",
        }
    }
}

/// Event node in the graph projection.
///
/// Carries the event's required fields plus derived attributes populated
/// by enrichment and retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventNode {
    pub event_id: String,
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub session_id: String,
    pub agent_id: String,
    pub trace_id: String,
    pub tool_name: Option<String>,
    pub global_position: String,

    // Derived attributes
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub embedding: Vec<f64>,
    #[serde(default)]
    pub importance_score: Option<i64>,
    #[serde(default)]
    pub access_count: i64,
    #[serde(default)]
    pub last_accessed_at: Option<DateTime<Utc>>,
}

/// Entity node created by extraction and merged by the resolver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityNode {
    pub entity_id: String,
    pub name: String,
    pub entity_type: EntityKind,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub mention_count: i64,
}

/// Summary node created by consolidation, idempotent by id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryNode {
    pub summary_id: String,
    /// "episode" | "session" | "agent"
    pub scope: String,
    pub scope_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub event_count: usize,
    /// [first, last] covered timestamps
    pub time_range: Vec<DateTime<Utc>>,
}

/// Generic typed edge with free-form properties.
///
/// Properties stay a JSON map only at this boundary; each edge kind has a
/// fixed vocabulary of keys written by the constructors below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            properties: Map::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(EdgeKind::Follows, "FOLLOWS")]
    #[test_case(EdgeKind::CausedBy, "CAUSED_BY")]
    #[test_case(EdgeKind::SimilarTo, "SIMILAR_TO")]
    #[test_case(EdgeKind::References, "REFERENCES")]
    #[test_case(EdgeKind::Summarizes, "SUMMARIZES")]
    #[test_case(EdgeKind::SameAs, "SAME_AS")]
    #[test_case(EdgeKind::RelatedTo, "RELATED_TO")]
    #[test_case(EdgeKind::HasPreference, "HAS_PREFERENCE")]
    #[test_case(EdgeKind::ExhibitsPattern, "EXHIBITS_PATTERN")]
    #[test_case(EdgeKind::ParentSkill, "PARENT_SKILL")]
    fn edge_kind_round_trips(kind: EdgeKind, name: &str) {
        assert_eq!(kind.type_name(), name);
        assert_eq!(EdgeKind::parse(name), Some(kind));
    }

    #[test]
    fn unknown_edge_kind_is_none() {
        assert_eq!(EdgeKind::parse("BEFRIENDS"), None);
    }

    #[test]
    fn intent_kind_round_trips() {
        for intent in IntentKind::ALL {
            assert_eq!(IntentKind::parse(intent.as_str()), Some(intent));
        }
    }

    #[test]
    fn edge_builder_sets_properties() {
        let edge = Edge::new("a", "b", EdgeKind::SimilarTo).with_property("similarity_score", 0.93);
        assert_eq!(edge.kind.type_name(), "SIMILAR_TO");
        assert_eq!(
            edge.properties.get("similarity_score").and_then(|v| v.as_f64()),
            Some(0.93)
        );
    }

    #[test]
    fn entity_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&EntityKind::Concept).unwrap(),
            "\"concept\""
        );
    }
}
