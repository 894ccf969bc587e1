//! Application configuration
//!
//! All settings are read from environment variables with the `CG_` prefix
//! and fall back to defaults that match a local Redis Stack + Neo4j setup.
//! Centralized here to keep magic numbers out of the rest of the codebase.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use crate::domain::{EdgeKind, IntentKind};

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

/// Redis connection and ledger key layout
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub password: Option<String>,

    /// Global ordered event log
    pub global_stream: String,
    /// Dedup sorted set (member = event_id, score = ingestion epoch-ms)
    pub dedup_set: String,
    /// Hash mapping event_id -> assigned global_position
    pub position_hash: String,
    /// Key prefix for JSON event documents
    pub event_key_prefix: String,
    /// Key prefix for per-session ordered views
    pub session_stream_prefix: String,
    /// RediSearch index name over the JSON documents
    pub event_index: String,

    /// Consumer group names, one group per pipeline consumer
    pub group_projection: String,
    pub group_extraction: String,
    pub group_enrichment: String,
    pub group_consolidation: String,

    /// XREADGROUP block timeout (ms)
    pub block_timeout_ms: u64,
    /// Wait for one replica ack after each append
    pub replica_wait: bool,

    /// Stream entries older than this are trimmed
    pub hot_window_days: i64,
    /// JSON documents older than this are deleted
    pub retention_ceiling_days: i64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            password: None,
            global_stream: "events:__global__".to_string(),
            dedup_set: "dedup:events".to_string(),
            position_hash: "pos:events".to_string(),
            event_key_prefix: "evt:".to_string(),
            session_stream_prefix: "events:session:".to_string(),
            event_index: "idx:events".to_string(),
            group_projection: "graph-projection".to_string(),
            group_extraction: "session-extraction".to_string(),
            group_enrichment: "enrichment".to_string(),
            group_consolidation: "consolidation".to_string(),
            block_timeout_ms: 5000,
            replica_wait: false,
            hot_window_days: 7,
            retention_ceiling_days: 90,
        }
    }
}

impl RedisConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env_or("CG_REDIS_HOST", defaults.host.clone()),
            port: env_or("CG_REDIS_PORT", defaults.port),
            db: env_or("CG_REDIS_DB", defaults.db),
            password: env_opt("CG_REDIS_PASSWORD"),
            block_timeout_ms: env_or("CG_REDIS_BLOCK_TIMEOUT_MS", defaults.block_timeout_ms),
            replica_wait: env_or("CG_REDIS_REPLICA_WAIT", defaults.replica_wait),
            hot_window_days: env_or("CG_REDIS_HOT_WINDOW_DAYS", defaults.hot_window_days),
            retention_ceiling_days: env_or(
                "CG_REDIS_RETENTION_CEILING_DAYS",
                defaults.retention_ceiling_days,
            ),
            ..defaults
        }
    }

    /// Redis connection URL for the client
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => {
                format!("redis://:{}@{}:{}/{}", password, self.host, self.port, self.db)
            }
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }

    /// Per-session stream key for a session id
    pub fn session_stream_key(&self, session_id: &str) -> String {
        format!("{}{}", self.session_stream_prefix, session_id)
    }

    /// JSON document key for an event id
    pub fn event_key(&self, event_id: &str) -> String {
        format!("{}{}", self.event_key_prefix, event_id)
    }
}

/// Neo4j connection configuration
#[derive(Debug, Clone)]
pub struct Neo4jConfig {
    pub uri: String,
    pub username: String,
    pub password: String,
    pub database: String,
    pub max_connection_pool_size: usize,
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            username: "neo4j".to_string(),
            password: "neo4j".to_string(),
            database: "neo4j".to_string(),
            max_connection_pool_size: 50,
        }
    }
}

impl Neo4jConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            uri: env_or("CG_NEO4J_URI", defaults.uri),
            username: env_or("CG_NEO4J_USERNAME", defaults.username),
            password: env_or("CG_NEO4J_PASSWORD", defaults.password),
            database: env_or("CG_NEO4J_DATABASE", defaults.database),
            max_connection_pool_size: env_or(
                "CG_NEO4J_MAX_CONNECTION_POOL_SIZE",
                defaults.max_connection_pool_size,
            ),
        }
    }
}

/// Ebbinghaus decay scoring parameters
#[derive(Debug, Clone)]
pub struct DecayConfig {
    /// Base stability in hours
    pub s_base: f64,
    /// Stability added per access, in hours
    pub s_boost: f64,

    pub weight_recency: f64,
    pub weight_importance: f64,
    pub weight_relevance: f64,
    pub weight_user_affinity: f64,

    /// SIMILAR_TO edges are created at or above this similarity
    pub similarity_threshold: f64,
    /// Session event count that triggers re-consolidation
    pub reflection_threshold: u64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            s_base: 168.0,
            s_boost: 24.0,
            weight_recency: 1.0,
            weight_importance: 1.0,
            weight_relevance: 1.0,
            weight_user_affinity: 0.5,
            similarity_threshold: 0.85,
            reflection_threshold: 150,
        }
    }
}

impl DecayConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            s_base: env_or("CG_DECAY_S_BASE", defaults.s_base),
            s_boost: env_or("CG_DECAY_S_BOOST", defaults.s_boost),
            weight_recency: env_or("CG_DECAY_WEIGHT_RECENCY", defaults.weight_recency),
            weight_importance: env_or("CG_DECAY_WEIGHT_IMPORTANCE", defaults.weight_importance),
            weight_relevance: env_or("CG_DECAY_WEIGHT_RELEVANCE", defaults.weight_relevance),
            weight_user_affinity: env_or(
                "CG_DECAY_WEIGHT_USER_AFFINITY",
                defaults.weight_user_affinity,
            ),
            similarity_threshold: env_or(
                "CG_DECAY_SIMILARITY_THRESHOLD",
                defaults.similarity_threshold,
            ),
            reflection_threshold: env_or(
                "CG_DECAY_REFLECTION_THRESHOLD",
                defaults.reflection_threshold,
            ),
        }
    }
}

/// Graph retention tier boundaries and pruning thresholds
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    pub hot_hours: i64,
    pub warm_hours: i64,
    pub cold_hours: i64,

    /// Warm tier: prune SIMILAR_TO edges below this score
    pub warm_min_similarity: f64,
    /// Cold tier: events below BOTH thresholds are deleted
    pub cold_min_importance: i64,
    pub cold_min_access_count: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            hot_hours: 24,
            warm_hours: 168,
            cold_hours: 720,
            warm_min_similarity: 0.7,
            cold_min_importance: 5,
            cold_min_access_count: 3,
        }
    }
}

impl RetentionConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            hot_hours: env_or("CG_RETENTION_HOT_HOURS", defaults.hot_hours),
            warm_hours: env_or("CG_RETENTION_WARM_HOURS", defaults.warm_hours),
            cold_hours: env_or("CG_RETENTION_COLD_HOURS", defaults.cold_hours),
            warm_min_similarity: env_or(
                "CG_RETENTION_WARM_MIN_SIMILARITY",
                defaults.warm_min_similarity,
            ),
            cold_min_importance: env_or(
                "CG_RETENTION_COLD_MIN_IMPORTANCE",
                defaults.cold_min_importance,
            ),
            cold_min_access_count: env_or(
                "CG_RETENTION_COLD_MIN_ACCESS_COUNT",
                defaults.cold_min_access_count,
            ),
        }
    }
}

/// Bounded query limits
#[derive(Debug, Clone)]
pub struct QueryConfig {
    pub default_max_depth: i64,
    pub max_max_depth: i64,
    pub default_max_nodes: i64,
    pub max_max_nodes: i64,
    pub default_timeout_ms: i64,
    pub max_timeout_ms: i64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_max_depth: 3,
            max_max_depth: 10,
            default_max_nodes: 100,
            max_max_nodes: 500,
            default_timeout_ms: 5000,
            max_timeout_ms: 30000,
        }
    }
}

impl QueryConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_max_depth: env_or("CG_QUERY_DEFAULT_MAX_DEPTH", defaults.default_max_depth),
            max_max_depth: env_or("CG_QUERY_MAX_MAX_DEPTH", defaults.max_max_depth),
            default_max_nodes: env_or("CG_QUERY_DEFAULT_MAX_NODES", defaults.default_max_nodes),
            max_max_nodes: env_or("CG_QUERY_MAX_MAX_NODES", defaults.max_max_nodes),
            default_timeout_ms: env_or("CG_QUERY_DEFAULT_TIMEOUT_MS", defaults.default_timeout_ms),
            max_timeout_ms: env_or("CG_QUERY_MAX_TIMEOUT_MS", defaults.max_timeout_ms),
        }
    }
}

/// Worker tuning knobs
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Messages fetched per XREADGROUP call
    pub batch_size: usize,
    /// Capacity of the projector's per-session last-event map
    pub session_map_capacity: usize,
    /// Episode gap for consolidation, in minutes
    pub episode_gap_minutes: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            session_map_capacity: 10_000,
            episode_gap_minutes: 30,
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            batch_size: env_or("CG_WORKER_BATCH_SIZE", defaults.batch_size),
            session_map_capacity: env_or(
                "CG_WORKER_SESSION_MAP_CAPACITY",
                defaults.session_map_capacity,
            ),
            episode_gap_minutes: env_or(
                "CG_WORKER_EPISODE_GAP_MINUTES",
                defaults.episode_gap_minutes,
            ),
        }
    }
}

/// Root application configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub redis: RedisConfig,
    pub neo4j: Neo4jConfig,
    pub decay: DecayConfig,
    pub retention: RetentionConfig,
    pub query: QueryConfig,
    pub worker: WorkerConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            redis: RedisConfig::from_env(),
            neo4j: Neo4jConfig::from_env(),
            decay: DecayConfig::from_env(),
            retention: RetentionConfig::from_env(),
            query: QueryConfig::from_env(),
            worker: WorkerConfig::from_env(),
        }
    }
}

/// Per-intent traversal weights for each edge type.
///
/// Rows are scaled by intent confidence and summed into a single
/// edge-weight map during subgraph retrieval.
pub type IntentWeightMatrix = HashMap<IntentKind, HashMap<EdgeKind, f64>>;

/// Default intent weight matrix. Deployments can override rows via a
/// custom matrix; the shape is intent -> edge type -> weight.
pub fn default_intent_weights() -> IntentWeightMatrix {
    use EdgeKind::*;
    use IntentKind::*;

    let mut matrix: IntentWeightMatrix = HashMap::new();

    matrix.insert(
        Why,
        HashMap::from([
            (CausedBy, 5.0),
            (Follows, 1.0),
            (SimilarTo, 1.5),
            (References, 2.0),
            (Summarizes, 1.0),
        ]),
    );
    matrix.insert(
        When,
        HashMap::from([
            (CausedBy, 1.0),
            (Follows, 5.0),
            (SimilarTo, 0.5),
            (References, 1.0),
            (Summarizes, 0.5),
        ]),
    );
    matrix.insert(
        What,
        HashMap::from([
            (CausedBy, 2.0),
            (Follows, 1.0),
            (SimilarTo, 2.0),
            (References, 5.0),
            (Summarizes, 2.0),
        ]),
    );
    matrix.insert(
        Related,
        HashMap::from([
            (CausedBy, 1.5),
            (Follows, 0.5),
            (SimilarTo, 5.0),
            (References, 2.0),
            (Summarizes, 1.5),
        ]),
    );
    matrix.insert(
        General,
        HashMap::from([
            (CausedBy, 2.0),
            (Follows, 2.0),
            (SimilarTo, 2.0),
            (References, 2.0),
            (Summarizes, 2.0),
        ]),
    );
    matrix.insert(
        WhoIs,
        HashMap::from([
            (CausedBy, 1.0),
            (Follows, 0.5),
            (SimilarTo, 1.0),
            (References, 3.0),
            (Summarizes, 1.0),
            (HasProfile, 5.0),
            (HasPreference, 5.0),
            (HasSkill, 5.0),
            (ExhibitsPattern, 4.0),
            (InterestedIn, 4.0),
            (About, 3.0),
            (DerivedFrom, 2.0),
            (AbstractedFrom, 1.0),
            (ParentSkill, 2.0),
            (SameAs, 4.0),
            (RelatedTo, 3.0),
        ]),
    );
    matrix.insert(
        HowDoes,
        HashMap::from([
            (CausedBy, 2.0),
            (Follows, 3.0),
            (SimilarTo, 1.0),
            (References, 2.0),
            (Summarizes, 1.0),
            (HasProfile, 1.0),
            (HasPreference, 2.0),
            (HasSkill, 3.0),
            (ExhibitsPattern, 5.0),
            (InterestedIn, 2.0),
            (About, 1.0),
            (DerivedFrom, 1.0),
            (AbstractedFrom, 4.0),
            (ParentSkill, 1.0),
            (SameAs, 1.0),
            (RelatedTo, 2.0),
        ]),
    );
    matrix.insert(
        Personalize,
        HashMap::from([
            (CausedBy, 1.0),
            (Follows, 0.5),
            (SimilarTo, 1.5),
            (References, 2.0),
            (Summarizes, 1.0),
            (HasProfile, 4.0),
            (HasPreference, 5.0),
            (HasSkill, 4.0),
            (ExhibitsPattern, 3.0),
            (InterestedIn, 4.0),
            (About, 3.0),
            (DerivedFrom, 3.0),
            (AbstractedFrom, 1.0),
            (ParentSkill, 2.0),
            (SameAs, 2.0),
            (RelatedTo, 2.0),
        ]),
    );

    matrix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_redis_key_layout() {
        let config = RedisConfig::default();
        assert_eq!(config.global_stream, "events:__global__");
        assert_eq!(config.event_key("abc"), "evt:abc");
        assert_eq!(config.session_stream_key("s1"), "events:session:s1");
    }

    #[test]
    fn redis_url_includes_password() {
        let config = RedisConfig {
            password: Some("secret".to_string()),
            ..RedisConfig::default()
        };
        assert_eq!(config.url(), "redis://:secret@localhost:6379/0");
    }

    #[test]
    fn intent_matrix_covers_all_intents() {
        let matrix = default_intent_weights();
        for intent in IntentKind::ALL {
            assert!(matrix.contains_key(&intent), "missing row for {intent:?}");
        }
    }

    #[test]
    fn why_row_weights_causality_highest() {
        let matrix = default_intent_weights();
        let row = &matrix[&IntentKind::Why];
        assert_eq!(row[&EdgeKind::CausedBy], 5.0);
        assert!(row[&EdgeKind::CausedBy] > row[&EdgeKind::Follows]);
    }
}
