//! User personalization subgraph: profile, preferences, skills,
//! patterns, interests, and the GDPR export/erasure paths
//!
//! All writes MERGE. Erasure is a single graph operation that removes
//! the personalization subgraph rooted at the user entity and redacts
//! the entity's name, leaving the event history intact.

use chrono::Utc;
use neo4rs::Query;
use serde_json::{json, Value as JsonValue};
use tracing::info;

use crate::domain::extraction::{ExtractedInterest, ExtractedPreference, ExtractedSkill};
use crate::errors::GraphResult;
use crate::graph::store::{iso_ms, GraphStore};

// ---------------------------------------------------------------------------
// Cypher templates
// ---------------------------------------------------------------------------

const GET_USER_PROFILE: &str = r#"
MATCH (e:Entity {entity_id: $user_id})-[:HAS_PROFILE]->(p:UserProfile)
RETURN p.profile_id AS profile_id, p.user_id AS user_id,
       p.display_name AS display_name, p.timezone AS timezone,
       p.language AS language, p.communication_style AS communication_style,
       p.technical_level AS technical_level,
       p.created_at AS created_at, p.updated_at AS updated_at
LIMIT 1
"#;

const GET_USER_PREFERENCES: &str = r#"
MATCH (e:Entity {entity_id: $user_id})-[:HAS_PREFERENCE]->(p:Preference)
RETURN p.preference_id AS preference_id, p.category AS category,
       p.key AS key, p.polarity AS polarity, p.strength AS strength,
       p.confidence AS confidence, p.source AS source, p.context AS context,
       p.scope AS scope, p.observation_count AS observation_count,
       p.first_observed_at AS first_observed_at,
       p.last_confirmed_at AS last_confirmed_at
ORDER BY p.last_confirmed_at DESC
"#;

const GET_USER_SKILLS: &str = r#"
MATCH (e:Entity {entity_id: $user_id})-[r:HAS_SKILL]->(s:Skill)
RETURN s.skill_id AS skill_id, s.name AS name, s.category AS category,
       s.description AS description, s.created_at AS created_at,
       r.proficiency AS proficiency, r.confidence AS confidence,
       r.source AS source
ORDER BY s.name
"#;

const GET_USER_PATTERNS: &str = r#"
MATCH (e:Entity {entity_id: $user_id})-[:EXHIBITS_PATTERN]->(b:BehavioralPattern)
RETURN b.pattern_id AS pattern_id, b.pattern_type AS pattern_type,
       b.description AS description, b.confidence AS confidence,
       b.observation_count AS observation_count,
       b.first_detected_at AS first_detected_at,
       b.last_confirmed_at AS last_confirmed_at
ORDER BY b.last_confirmed_at DESC
"#;

const GET_USER_INTERESTS: &str = r#"
MATCH (e:Entity {entity_id: $user_id})-[r:INTERESTED_IN]->(target:Entity)
RETURN target.entity_id AS entity_id, target.name AS name,
       target.entity_type AS entity_type,
       r.weight AS weight, r.source AS source
ORDER BY r.weight DESC
"#;

const MERGE_PREFERENCE_WITH_EDGE: &str = r#"
MERGE (e:Entity {entity_id: $user_entity_id})
ON CREATE SET e.name = $user_entity_id,
              e.entity_type = 'user',
              e.first_seen = $now,
              e.last_seen = $now,
              e.mention_count = 1
ON MATCH SET e.last_seen = $now
MERGE (p:Preference {preference_id: $preference_id})
ON CREATE SET p.observation_count = 1,
              p.first_observed_at = $now
ON MATCH SET p.observation_count = coalesce(p.observation_count, 0) + 1
SET p.category = $category,
    p.key = $key,
    p.polarity = $polarity,
    p.strength = $strength,
    p.confidence = $confidence,
    p.source = $source,
    p.context = CASE WHEN $context = '' THEN null ELSE $context END,
    p.scope = $scope,
    p.last_confirmed_at = $now
MERGE (e)-[:HAS_PREFERENCE]->(p)
"#;

const MERGE_PREFERENCE_ABOUT: &str = r#"
MATCH (p:Preference {preference_id: $preference_id})
MERGE (target:Entity {entity_id: $target_entity_id})
ON CREATE SET target.name = $target_name,
              target.entity_type = $target_type,
              target.first_seen = $now,
              target.last_seen = $now,
              target.mention_count = 1
ON MATCH SET target.last_seen = $now
MERGE (p)-[:ABOUT]->(target)
"#;

const MERGE_PREFERENCE_DERIVED_FROM: &str = r#"
MATCH (p:Preference {preference_id: $preference_id})
UNWIND $event_ids AS eid
MATCH (e:Event {event_id: eid})
MERGE (p)-[r:DERIVED_FROM]->(e)
SET r.method = $method,
    r.session_id = $session_id,
    r.extracted_at = $now
"#;

const MERGE_SKILL_WITH_EDGE: &str = r#"
MERGE (e:Entity {entity_id: $user_entity_id})
ON CREATE SET e.name = $user_entity_id,
              e.entity_type = 'user',
              e.first_seen = $now,
              e.last_seen = $now,
              e.mention_count = 1
ON MATCH SET e.last_seen = $now
MERGE (s:Skill {skill_id: $skill_id})
ON CREATE SET s.created_at = $now
SET s.name = $name,
    s.category = $category
MERGE (e)-[r:HAS_SKILL]->(s)
SET r.proficiency = $proficiency,
    r.confidence = $confidence,
    r.source = $source,
    r.updated_at = $now
"#;

const MERGE_INTEREST_EDGE: &str = r#"
MERGE (e:Entity {entity_id: $user_entity_id})
ON CREATE SET e.name = $user_entity_id,
              e.entity_type = 'user',
              e.first_seen = $now,
              e.last_seen = $now,
              e.mention_count = 1
ON MATCH SET e.last_seen = $now
MERGE (target:Entity {entity_id: $target_entity_id})
ON CREATE SET target.name = $target_name,
              target.entity_type = $target_type,
              target.first_seen = $now,
              target.last_seen = $now,
              target.mention_count = 1
ON MATCH SET target.last_seen = $now
MERGE (e)-[r:INTERESTED_IN]->(target)
SET r.weight = $weight,
    r.source = $source,
    r.updated_at = $now
"#;

/// One atomic pass: drop the personalization subgraph, then redact the
/// entity so event provenance stays intact without naming the user.
const DELETE_USER_DATA: &str = r#"
MATCH (e:Entity {entity_id: $user_id})
OPTIONAL MATCH (e)-[:HAS_PROFILE]->(p:UserProfile)
DETACH DELETE p
WITH DISTINCT e
OPTIONAL MATCH (e)-[:HAS_PREFERENCE]->(pref:Preference)
DETACH DELETE pref
WITH DISTINCT e
OPTIONAL MATCH (e)-[:EXHIBITS_PATTERN]->(bp:BehavioralPattern)
DETACH DELETE bp
WITH DISTINCT e
OPTIONAL MATCH (e)-[:HAS_SKILL]->(s:Skill)
DETACH DELETE s
WITH DISTINCT e
OPTIONAL MATCH (e)-[i:INTERESTED_IN]->(:Entity)
DELETE i
WITH DISTINCT e
SET e.name = 'REDACTED',
    e.entity_type = 'user'
RETURN count(e) AS affected
"#;

fn rows_to_json(rows: &[neo4rs::Row], columns: &[&str]) -> Vec<JsonValue> {
    rows.iter()
        .map(|row| {
            let mut object = serde_json::Map::new();
            for column in columns {
                let value = row
                    .get::<String>(column)
                    .map(JsonValue::from)
                    .or_else(|_| row.get::<i64>(column).map(JsonValue::from))
                    .or_else(|_| row.get::<f64>(column).map(JsonValue::from))
                    .unwrap_or(JsonValue::Null);
                object.insert((*column).to_string(), value);
            }
            JsonValue::Object(object)
        })
        .collect()
}

impl GraphStore {
    async fn run_rows(&self, query: Query) -> GraphResult<Vec<neo4rs::Row>> {
        let mut stream = self.graph().execute(query).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// A user's profile, or `None` when absent
    pub async fn get_user_profile(&self, user_id: &str) -> GraphResult<Option<JsonValue>> {
        let rows = self
            .run_rows(Query::new(GET_USER_PROFILE.to_string()).param("user_id", user_id))
            .await?;
        Ok(rows_to_json(
            &rows,
            &[
                "profile_id",
                "user_id",
                "display_name",
                "timezone",
                "language",
                "communication_style",
                "technical_level",
                "created_at",
                "updated_at",
            ],
        )
        .into_iter()
        .next())
    }

    /// Preferences, optionally filtered by category
    pub async fn get_user_preferences(
        &self,
        user_id: &str,
        category: Option<&str>,
    ) -> GraphResult<Vec<JsonValue>> {
        let rows = self
            .run_rows(Query::new(GET_USER_PREFERENCES.to_string()).param("user_id", user_id))
            .await?;
        let mut preferences = rows_to_json(
            &rows,
            &[
                "preference_id",
                "category",
                "key",
                "polarity",
                "strength",
                "confidence",
                "source",
                "context",
                "scope",
                "observation_count",
                "first_observed_at",
                "last_confirmed_at",
            ],
        );
        if let Some(category) = category {
            preferences.retain(|p| p["category"].as_str() == Some(category));
        }
        Ok(preferences)
    }

    pub async fn get_user_skills(&self, user_id: &str) -> GraphResult<Vec<JsonValue>> {
        let rows = self
            .run_rows(Query::new(GET_USER_SKILLS.to_string()).param("user_id", user_id))
            .await?;
        Ok(rows_to_json(
            &rows,
            &[
                "skill_id",
                "name",
                "category",
                "description",
                "created_at",
                "proficiency",
                "confidence",
                "source",
            ],
        ))
    }

    pub async fn get_user_patterns(&self, user_id: &str) -> GraphResult<Vec<JsonValue>> {
        let rows = self
            .run_rows(Query::new(GET_USER_PATTERNS.to_string()).param("user_id", user_id))
            .await?;
        Ok(rows_to_json(
            &rows,
            &[
                "pattern_id",
                "pattern_type",
                "description",
                "confidence",
                "observation_count",
                "first_detected_at",
                "last_confirmed_at",
            ],
        ))
    }

    pub async fn get_user_interests(&self, user_id: &str) -> GraphResult<Vec<JsonValue>> {
        let rows = self
            .run_rows(Query::new(GET_USER_INTERESTS.to_string()).param("user_id", user_id))
            .await?;
        Ok(rows_to_json(
            &rows,
            &["entity_id", "name", "entity_type", "weight", "source"],
        ))
    }

    /// MERGE a preference with its HAS_PREFERENCE, ABOUT, and
    /// DERIVED_FROM edges. The preference id is stable per
    /// (user, category, key) so repeat observations reinforce.
    pub async fn write_preference(
        &self,
        user_entity_id: &str,
        preference: &ExtractedPreference,
        session_id: &str,
        source_event_ids: &[String],
    ) -> GraphResult<()> {
        let now = iso_ms(Utc::now());
        let preference_id = format!(
            "pref:{}:{}:{}",
            user_entity_id, preference.category, preference.key
        );

        let query = Query::new(MERGE_PREFERENCE_WITH_EDGE.to_string())
            .param("user_entity_id", user_entity_id)
            .param("preference_id", preference_id.clone())
            .param("category", preference.category.clone())
            .param("key", preference.key.clone())
            .param("polarity", preference.polarity.clone())
            .param("strength", preference.strength)
            .param("confidence", preference.confidence)
            .param("source", preference.source.clone())
            .param("context", preference.context.clone().unwrap_or_default())
            .param("scope", "global")
            .param("now", now.clone());
        self.graph().run(query).await?;

        if let Some(about) = &preference.about_entity {
            let target_id = format!("ent:{}", about.to_lowercase().replace(' ', "-"));
            let query = Query::new(MERGE_PREFERENCE_ABOUT.to_string())
                .param("preference_id", preference_id.clone())
                .param("target_entity_id", target_id)
                .param("target_name", about.clone())
                .param("target_type", "concept")
                .param("now", now.clone());
            self.graph().run(query).await?;
        }

        if !source_event_ids.is_empty() {
            let query = Query::new(MERGE_PREFERENCE_DERIVED_FROM.to_string())
                .param("preference_id", preference_id)
                .param("event_ids", source_event_ids.to_vec())
                .param("method", "llm_extraction")
                .param("session_id", session_id)
                .param("now", now);
            self.graph().run(query).await?;
        }

        Ok(())
    }

    /// MERGE a skill and its HAS_SKILL edge
    pub async fn write_skill(
        &self,
        user_entity_id: &str,
        skill: &ExtractedSkill,
    ) -> GraphResult<()> {
        let now = iso_ms(Utc::now());
        let skill_id = format!(
            "skill:{}",
            skill.name.to_lowercase().replace(' ', "-")
        );
        let query = Query::new(MERGE_SKILL_WITH_EDGE.to_string())
            .param("user_entity_id", user_entity_id)
            .param("skill_id", skill_id)
            .param("name", skill.name.clone())
            .param("category", skill.category.clone())
            .param("proficiency", skill.proficiency)
            .param("confidence", skill.confidence)
            .param("source", skill.source.clone())
            .param("now", now);
        self.graph().run(query).await?;
        Ok(())
    }

    /// MERGE an INTERESTED_IN edge toward a (possibly new) entity
    pub async fn write_interest(
        &self,
        user_entity_id: &str,
        interest: &ExtractedInterest,
    ) -> GraphResult<()> {
        let now = iso_ms(Utc::now());
        let target_id = format!(
            "ent:{}",
            interest.entity_name.to_lowercase().replace(' ', "-")
        );
        let query = Query::new(MERGE_INTEREST_EDGE.to_string())
            .param("user_entity_id", user_entity_id)
            .param("target_entity_id", target_id)
            .param("target_name", interest.entity_name.clone())
            .param("target_type", interest.entity_type.clone())
            .param("weight", interest.weight)
            .param("source", interest.source.clone())
            .param("now", now);
        self.graph().run(query).await?;
        Ok(())
    }

    /// Everything stored about a user, for the data-export endpoint
    pub async fn export_user_data(&self, user_id: &str) -> GraphResult<JsonValue> {
        let profile = self.get_user_profile(user_id).await?;
        let preferences = self.get_user_preferences(user_id, None).await?;
        let skills = self.get_user_skills(user_id).await?;
        let patterns = self.get_user_patterns(user_id).await?;
        let interests = self.get_user_interests(user_id).await?;
        Ok(json!({
            "user_id": user_id,
            "profile": profile,
            "preferences": preferences,
            "skills": skills,
            "patterns": patterns,
            "interests": interests,
        }))
    }

    /// GDPR cascade erasure. Returns the number of affected user
    /// entities (0 when the user is unknown).
    pub async fn delete_user_data(&self, user_id: &str) -> GraphResult<i64> {
        let rows = self
            .run_rows(Query::new(DELETE_USER_DATA.to_string()).param("user_id", user_id))
            .await?;
        let affected = rows
            .first()
            .and_then(|row| row.get::<i64>("affected").ok())
            .unwrap_or(0);
        info!(user_id = user_id, affected = affected, "user data erased");
        Ok(affected)
    }
}
