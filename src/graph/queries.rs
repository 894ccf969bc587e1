//! Cypher query templates for the graph store
//!
//! All writes use MERGE for idempotence. Relationship types are spelled
//! out per template because the community edition has no dynamic
//! relationship creation. Timestamps are stored as fixed-width ISO-8601
//! strings so lexicographic comparison matches chronological order.

use crate::domain::EdgeKind;

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

pub const CONSTRAINT_EVENT_PK: &str =
    "CREATE CONSTRAINT event_pk IF NOT EXISTS FOR (e:Event) REQUIRE e.event_id IS UNIQUE";

pub const CONSTRAINT_ENTITY_PK: &str =
    "CREATE CONSTRAINT entity_pk IF NOT EXISTS FOR (n:Entity) REQUIRE n.entity_id IS UNIQUE";

pub const CONSTRAINT_SUMMARY_PK: &str =
    "CREATE CONSTRAINT summary_pk IF NOT EXISTS FOR (s:Summary) REQUIRE s.summary_id IS UNIQUE";

pub const ALL_CONSTRAINTS: [&str; 3] =
    [CONSTRAINT_EVENT_PK, CONSTRAINT_ENTITY_PK, CONSTRAINT_SUMMARY_PK];

// ---------------------------------------------------------------------------
// Node MERGE queries
// ---------------------------------------------------------------------------

/// Re-projection updates properties in place, but never winds an access
/// counter back or clobbers a recorded access time with an empty one.
pub const MERGE_EVENT_NODE: &str = r#"
MERGE (e:Event {event_id: $event_id})
SET e.event_type = $event_type,
    e.occurred_at = $occurred_at,
    e.session_id = $session_id,
    e.agent_id = $agent_id,
    e.trace_id = $trace_id,
    e.tool_name = CASE WHEN $tool_name = '' THEN null ELSE $tool_name END,
    e.global_position = $global_position,
    e.keywords = $keywords,
    e.summary = CASE WHEN $summary = '' THEN null ELSE $summary END,
    e.embedding = $embedding,
    e.importance_score = CASE WHEN $importance_score < 1 THEN null ELSE $importance_score END,
    e.access_count = coalesce(e.access_count, $access_count),
    e.last_accessed_at = CASE WHEN $last_accessed_at = '' THEN e.last_accessed_at ELSE $last_accessed_at END
"#;

pub const MERGE_ENTITY_NODE: &str = r#"
MERGE (n:Entity {entity_id: $entity_id})
ON CREATE SET n.name = $name,
              n.entity_type = $entity_type,
              n.first_seen = $first_seen,
              n.mention_count = $mention_count
ON MATCH SET n.mention_count = n.mention_count + 1
SET n.last_seen = $last_seen
"#;

pub const MERGE_SUMMARY_NODE: &str = r#"
MERGE (s:Summary {summary_id: $summary_id})
SET s.scope = $scope,
    s.scope_id = $scope_id,
    s.content = $content,
    s.created_at = $created_at,
    s.event_count = $event_count,
    s.time_range_start = $time_range_start,
    s.time_range_end = $time_range_end
"#;

// ---------------------------------------------------------------------------
// Edge MERGE skeletons, one per edge type
// ---------------------------------------------------------------------------

// Each skeleton matches source and target by label + id field and
// merges the relationship; the store appends a SET clause for the
// edge's typed properties.

const MERGE_FOLLOWS: &str = r#"
MATCH (a:Event {event_id: $source_id})
MATCH (b:Event {event_id: $target_id})
MERGE (a)-[r:FOLLOWS]->(b)
"#;

const MERGE_CAUSED_BY: &str = r#"
MATCH (a:Event {event_id: $source_id})
MATCH (b:Event {event_id: $target_id})
MERGE (a)-[r:CAUSED_BY]->(b)
"#;

const MERGE_SIMILAR_TO: &str = r#"
MATCH (a:Event {event_id: $source_id})
MATCH (b:Event {event_id: $target_id})
MERGE (a)-[r:SIMILAR_TO]->(b)
"#;

const MERGE_REFERENCES: &str = r#"
MATCH (a:Event {event_id: $source_id})
MATCH (b:Entity {entity_id: $target_id})
MERGE (a)-[r:REFERENCES]->(b)
"#;

const MERGE_SUMMARIZES: &str = r#"
MATCH (a:Summary {summary_id: $source_id})
MATCH (b:Event {event_id: $target_id})
MERGE (a)-[r:SUMMARIZES]->(b)
"#;

const MERGE_SAME_AS: &str = r#"
MATCH (a:Entity {entity_id: $source_id})
MATCH (b:Entity {entity_id: $target_id})
MERGE (a)-[r:SAME_AS]->(b)
"#;

const MERGE_RELATED_TO: &str = r#"
MATCH (a:Entity {entity_id: $source_id})
MATCH (b:Entity {entity_id: $target_id})
MERGE (a)-[r:RELATED_TO]->(b)
"#;

const MERGE_HAS_PROFILE: &str = r#"
MATCH (a:Entity {entity_id: $source_id})
MATCH (b:UserProfile {profile_id: $target_id})
MERGE (a)-[r:HAS_PROFILE]->(b)
"#;

const MERGE_HAS_PREFERENCE: &str = r#"
MATCH (a:Entity {entity_id: $source_id})
MATCH (b:Preference {preference_id: $target_id})
MERGE (a)-[r:HAS_PREFERENCE]->(b)
"#;

const MERGE_HAS_SKILL: &str = r#"
MATCH (a:Entity {entity_id: $source_id})
MATCH (b:Skill {skill_id: $target_id})
MERGE (a)-[r:HAS_SKILL]->(b)
"#;

const MERGE_DERIVED_FROM: &str = r#"
MATCH (a:Preference {preference_id: $source_id})
MATCH (b:Event {event_id: $target_id})
MERGE (a)-[r:DERIVED_FROM]->(b)
"#;

const MERGE_EXHIBITS_PATTERN: &str = r#"
MATCH (a:Entity {entity_id: $source_id})
MATCH (b:BehavioralPattern {pattern_id: $target_id})
MERGE (a)-[r:EXHIBITS_PATTERN]->(b)
"#;

const MERGE_INTERESTED_IN: &str = r#"
MATCH (a:Entity {entity_id: $source_id})
MATCH (b:Entity {entity_id: $target_id})
MERGE (a)-[r:INTERESTED_IN]->(b)
"#;

const MERGE_ABOUT: &str = r#"
MATCH (a:Preference {preference_id: $source_id})
MATCH (b:Entity {entity_id: $target_id})
MERGE (a)-[r:ABOUT]->(b)
"#;

const MERGE_ABSTRACTED_FROM: &str = r#"
MATCH (a:Workflow {workflow_id: $source_id})
MATCH (b:Workflow {workflow_id: $target_id})
MERGE (a)-[r:ABSTRACTED_FROM]->(b)
"#;

const MERGE_PARENT_SKILL: &str = r#"
MATCH (a:Skill {skill_id: $source_id})
MATCH (b:Skill {skill_id: $target_id})
MERGE (a)-[r:PARENT_SKILL]->(b)
"#;

/// MERGE skeleton for an edge kind
pub fn edge_merge_template(kind: EdgeKind) -> &'static str {
    match kind {
        EdgeKind::Follows => MERGE_FOLLOWS,
        EdgeKind::CausedBy => MERGE_CAUSED_BY,
        EdgeKind::SimilarTo => MERGE_SIMILAR_TO,
        EdgeKind::References => MERGE_REFERENCES,
        EdgeKind::Summarizes => MERGE_SUMMARIZES,
        EdgeKind::SameAs => MERGE_SAME_AS,
        EdgeKind::RelatedTo => MERGE_RELATED_TO,
        EdgeKind::HasProfile => MERGE_HAS_PROFILE,
        EdgeKind::HasPreference => MERGE_HAS_PREFERENCE,
        EdgeKind::HasSkill => MERGE_HAS_SKILL,
        EdgeKind::DerivedFrom => MERGE_DERIVED_FROM,
        EdgeKind::ExhibitsPattern => MERGE_EXHIBITS_PATTERN,
        EdgeKind::InterestedIn => MERGE_INTERESTED_IN,
        EdgeKind::About => MERGE_ABOUT,
        EdgeKind::AbstractedFrom => MERGE_ABSTRACTED_FROM,
        EdgeKind::ParentSkill => MERGE_PARENT_SKILL,
    }
}

// ---------------------------------------------------------------------------
// Batch edge creation for high-volume edge types
// ---------------------------------------------------------------------------

/// Batched FOLLOWS upsert over parallel parameter lists
pub const BATCH_MERGE_FOLLOWS: &str = r#"
UNWIND range(0, size($sources) - 1) AS i
MATCH (a:Event {event_id: $sources[i]})
MATCH (b:Event {event_id: $targets[i]})
MERGE (a)-[r:FOLLOWS]->(b)
SET r.session_id = $session_ids[i],
    r.delta_ms = $delta_ms[i]
"#;

/// Batched CAUSED_BY upsert over parallel parameter lists
pub const BATCH_MERGE_CAUSED_BY: &str = r#"
UNWIND range(0, size($sources) - 1) AS i
MATCH (a:Event {event_id: $sources[i]})
MATCH (b:Event {event_id: $targets[i]})
MERGE (a)-[r:CAUSED_BY]->(b)
SET r.mechanism = $mechanisms[i]
"#;

// ---------------------------------------------------------------------------
// Retrieval
// ---------------------------------------------------------------------------

pub const GET_SESSION_EVENTS: &str = r#"
MATCH (e:Event {session_id: $session_id})
RETURN e.event_id AS event_id, e.event_type AS event_type,
       e.occurred_at AS occurred_at, e.session_id AS session_id,
       e.agent_id AS agent_id, e.trace_id AS trace_id,
       e.tool_name AS tool_name, e.global_position AS global_position,
       e.keywords AS keywords, e.summary AS summary,
       e.embedding AS embedding, e.importance_score AS importance_score,
       coalesce(e.access_count, 0) AS access_count,
       e.last_accessed_at AS last_accessed_at,
       size([(x)-->(e) | x]) AS in_degree
ORDER BY e.occurred_at DESC
LIMIT $limit
"#;

pub const GET_EVENT_BY_ID: &str = r#"
MATCH (e:Event {event_id: $event_id})
RETURN e.event_id AS event_id, e.event_type AS event_type,
       e.occurred_at AS occurred_at, e.session_id AS session_id,
       e.agent_id AS agent_id, e.trace_id AS trace_id,
       e.tool_name AS tool_name, e.global_position AS global_position,
       e.keywords AS keywords, e.summary AS summary,
       e.embedding AS embedding, e.importance_score AS importance_score,
       coalesce(e.access_count, 0) AS access_count,
       e.last_accessed_at AS last_accessed_at,
       size([(x)-->(e) | x]) AS in_degree
"#;

/// Ancestors reachable over CAUSED_BY chains, with their minimum depth.
/// The variable-length ceiling is the hard bound; the caller's clamped
/// depth filters below it.
pub const GET_LINEAGE_NODES: &str = r#"
MATCH path = (start:Event {event_id: $node_id})-[:CAUSED_BY*1..10]->(ancestor:Event)
WHERE length(path) <= $max_depth
WITH ancestor AS e, min(length(path)) AS depth
RETURN e.event_id AS event_id, e.event_type AS event_type,
       e.occurred_at AS occurred_at, e.session_id AS session_id,
       e.agent_id AS agent_id, e.trace_id AS trace_id,
       e.tool_name AS tool_name, e.global_position AS global_position,
       e.keywords AS keywords, e.summary AS summary,
       e.embedding AS embedding, e.importance_score AS importance_score,
       coalesce(e.access_count, 0) AS access_count,
       e.last_accessed_at AS last_accessed_at,
       size([(x)-->(e) | x]) AS in_degree,
       depth
ORDER BY depth ASC
LIMIT $max_nodes
"#;

pub const GET_LINEAGE_EDGES: &str = r#"
MATCH path = (start:Event {event_id: $node_id})-[:CAUSED_BY*1..10]->(:Event)
WHERE length(path) <= $max_depth
UNWIND relationships(path) AS rel
RETURN DISTINCT startNode(rel).event_id AS source,
       endNode(rel).event_id AS target,
       rel.mechanism AS mechanism
"#;

pub const GET_SUBGRAPH_SEED_EVENTS: &str = r#"
MATCH (e:Event {session_id: $session_id})
RETURN e.event_id AS event_id, e.event_type AS event_type,
       e.occurred_at AS occurred_at, e.session_id AS session_id,
       e.agent_id AS agent_id, e.trace_id AS trace_id,
       e.tool_name AS tool_name, e.global_position AS global_position,
       e.keywords AS keywords, e.summary AS summary,
       e.embedding AS embedding, e.importance_score AS importance_score,
       coalesce(e.access_count, 0) AS access_count,
       e.last_accessed_at AS last_accessed_at,
       size([(x)-->(e) | x]) AS in_degree
ORDER BY e.occurred_at DESC
LIMIT $seed_limit
"#;

/// Outgoing neighbors of a seed over all edge types. Event columns are
/// null for entity and summary neighbors.
pub const GET_EVENT_NEIGHBORS: &str = r#"
MATCH (e:Event {event_id: $event_id})-[r]->(neighbor)
RETURN type(r) AS rel_type,
       r.session_id AS rel_session_id,
       r.delta_ms AS rel_delta_ms,
       r.mechanism AS rel_mechanism,
       r.similarity_score AS rel_similarity_score,
       r.role AS rel_role,
       labels(neighbor)[0] AS neighbor_label,
       neighbor.event_id AS neighbor_event_id,
       neighbor.entity_id AS neighbor_entity_id,
       neighbor.summary_id AS neighbor_summary_id,
       neighbor.name AS neighbor_name,
       neighbor.event_type AS event_type,
       neighbor.occurred_at AS occurred_at,
       neighbor.session_id AS session_id,
       neighbor.agent_id AS agent_id,
       neighbor.trace_id AS trace_id,
       neighbor.tool_name AS tool_name,
       neighbor.global_position AS global_position,
       neighbor.keywords AS keywords,
       neighbor.summary AS summary,
       neighbor.embedding AS embedding,
       neighbor.importance_score AS importance_score,
       coalesce(neighbor.access_count, 0) AS access_count,
       neighbor.last_accessed_at AS last_accessed_at,
       size([(x)-->(neighbor) | x]) AS in_degree
"#;

pub const GET_ENTITY_WITH_EVENTS: &str = r#"
MATCH (ent:Entity {entity_id: $entity_id})
OPTIONAL MATCH (evt:Event)-[r:REFERENCES]->(ent)
RETURN ent.entity_id AS entity_id, ent.name AS name,
       ent.entity_type AS entity_type, ent.first_seen AS first_seen,
       ent.last_seen AS last_seen, ent.mention_count AS mention_count,
       evt.event_id AS event_id, evt.event_type AS event_type,
       evt.occurred_at AS occurred_at, evt.session_id AS session_id,
       r.role AS ref_role
ORDER BY evt.occurred_at DESC
LIMIT $limit
"#;

/// Batch access-counter bump; retrieval calls this once per response.
pub const BATCH_UPDATE_ACCESS_COUNT: &str = r#"
UNWIND $event_ids AS eid
MATCH (e:Event {event_id: eid})
SET e.access_count = coalesce(e.access_count, 0) + 1,
    e.last_accessed_at = $now
"#;

pub const UPDATE_EVENT_ENRICHMENT: &str = r#"
MATCH (e:Event {event_id: $event_id})
SET e.keywords = $keywords,
    e.importance_score = $importance_score
"#;

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

pub const GET_SESSION_EVENT_COUNTS: &str = r#"
MATCH (e:Event)
WHERE e.session_id IS NOT NULL
RETURN e.session_id AS session_id, count(e) AS event_count
ORDER BY event_count DESC
"#;

pub const GET_SESSION_AGENT: &str = r#"
MATCH (e:Event {session_id: $session_id})
RETURN DISTINCT e.agent_id AS agent_id
LIMIT 1
"#;

pub const GET_PRUNABLE_EVENTS: &str = r#"
MATCH (e:Event)
OPTIONAL MATCH (e)-[s:SIMILAR_TO]->(:Event)
RETURN e.event_id AS event_id, e.occurred_at AS occurred_at,
       e.importance_score AS importance_score,
       coalesce(e.access_count, 0) AS access_count,
       min(s.similarity_score) AS similarity_score
ORDER BY e.occurred_at
"#;

pub const DELETE_SIMILAR_EDGES_BELOW_SCORE: &str = r#"
MATCH (a:Event)-[r:SIMILAR_TO]->(:Event)
WHERE r.similarity_score < $min_score
  AND a.occurred_at < $cutoff_iso
DELETE r
RETURN count(r) AS deleted_count
"#;

pub const DELETE_COLD_EVENTS: &str = r#"
MATCH (e:Event)
WHERE e.occurred_at < $cutoff_iso
  AND (e.importance_score IS NULL OR e.importance_score < $min_importance)
  AND coalesce(e.access_count, 0) < $min_access_count
DETACH DELETE e
RETURN count(e) AS deleted_count
"#;

pub const GET_ARCHIVE_EVENT_IDS: &str = r#"
MATCH (e:Event)
WHERE e.occurred_at < $cutoff_iso
RETURN e.event_id AS event_id
"#;

pub const DELETE_EVENTS_BY_IDS: &str = r#"
UNWIND $event_ids AS eid
MATCH (e:Event {event_id: eid})
DETACH DELETE e
RETURN count(e) AS deleted_count
"#;

/// In-degree centrality refresh: heavily referenced events gain
/// importance, everything else keeps its score or defaults to 5.
pub const UPDATE_IMPORTANCE_FROM_CENTRALITY: &str = r#"
MATCH (e:Event)
WITH e, size([(x)-->(e) | x]) AS in_degree
WHERE in_degree > 0
SET e.importance_score = CASE
    WHEN in_degree >= 10 THEN 10
    WHEN in_degree >= 5 THEN 8
    WHEN in_degree >= 3 THEN 6
    ELSE coalesce(e.importance_score, 5)
END
RETURN count(e) AS updated_count
"#;

/// SUMMARIZES edges only attach to events inside the summary's time
/// range.
pub const MERGE_SUMMARIZES_EDGES: &str = r#"
MATCH (s:Summary {summary_id: $summary_id})
UNWIND $event_ids AS eid
MATCH (e:Event {event_id: eid})
WHERE e.occurred_at >= $range_start AND e.occurred_at <= $range_end
MERGE (s)-[r:SUMMARIZES]->(e)
SET r.created_at = $created_at
"#;

pub const GET_NODE_COUNTS: &str = r#"
CALL {
    MATCH (e:Event) RETURN 'Event' AS label, count(e) AS cnt
    UNION ALL
    MATCH (n:Entity) RETURN 'Entity' AS label, count(n) AS cnt
    UNION ALL
    MATCH (s:Summary) RETURN 'Summary' AS label, count(s) AS cnt
    UNION ALL
    MATCH (u:UserProfile) RETURN 'UserProfile' AS label, count(u) AS cnt
    UNION ALL
    MATCH (p:Preference) RETURN 'Preference' AS label, count(p) AS cnt
    UNION ALL
    MATCH (sk:Skill) RETURN 'Skill' AS label, count(sk) AS cnt
    UNION ALL
    MATCH (w:Workflow) RETURN 'Workflow' AS label, count(w) AS cnt
    UNION ALL
    MATCH (b:BehavioralPattern) RETURN 'BehavioralPattern' AS label, count(b) AS cnt
}
RETURN label, cnt
"#;

pub const GET_EDGE_COUNTS: &str = r#"
CALL {
    MATCH ()-[r:FOLLOWS]->() RETURN 'FOLLOWS' AS rel_type, count(r) AS cnt
    UNION ALL
    MATCH ()-[r:CAUSED_BY]->() RETURN 'CAUSED_BY' AS rel_type, count(r) AS cnt
    UNION ALL
    MATCH ()-[r:SIMILAR_TO]->() RETURN 'SIMILAR_TO' AS rel_type, count(r) AS cnt
    UNION ALL
    MATCH ()-[r:REFERENCES]->() RETURN 'REFERENCES' AS rel_type, count(r) AS cnt
    UNION ALL
    MATCH ()-[r:SUMMARIZES]->() RETURN 'SUMMARIZES' AS rel_type, count(r) AS cnt
    UNION ALL
    MATCH ()-[r:SAME_AS]->() RETURN 'SAME_AS' AS rel_type, count(r) AS cnt
    UNION ALL
    MATCH ()-[r:RELATED_TO]->() RETURN 'RELATED_TO' AS rel_type, count(r) AS cnt
}
RETURN rel_type, cnt
"#;
