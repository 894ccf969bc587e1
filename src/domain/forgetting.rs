//! Retention tiers and pruning rules
//!
//! The forgetting side of the Ebbinghaus curve: events age through
//! HOT -> WARM -> COLD -> ARCHIVE, and each tier has its own pruning
//! action. Hot events are untouched, warm prunes weak SIMILAR_TO edges,
//! cold deletes unimportant unaccessed nodes, archive deletes
//! unconditionally.

use chrono::{DateTime, Utc};

use crate::config::RetentionConfig;
use crate::domain::RetentionTier;

/// Node-level facts needed for pruning decisions
#[derive(Debug, Clone)]
pub struct PrunableEvent {
    pub event_id: String,
    pub occurred_at: DateTime<Utc>,
    pub importance_score: Option<i64>,
    pub access_count: i64,
    /// Score on the event's SIMILAR_TO edge, when one exists
    pub similarity_score: Option<f64>,
}

/// Aggregated pruning decisions for a batch of events
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PruningActions {
    /// Events whose SIMILAR_TO edges should be removed (warm tier)
    pub delete_edges: Vec<String>,
    /// Events to delete outright (cold tier)
    pub delete_nodes: Vec<String>,
    /// Events past the retention ceiling (archive tier)
    pub archive_event_ids: Vec<String>,
}

/// Classify an event's retention tier from its age at `now`
pub fn classify_tier(
    occurred_at: DateTime<Utc>,
    now: DateTime<Utc>,
    retention: &RetentionConfig,
) -> RetentionTier {
    let age_hours = (now - occurred_at).num_milliseconds() as f64 / 3_600_000.0;
    if age_hours < retention.hot_hours as f64 {
        RetentionTier::Hot
    } else if age_hours < retention.warm_hours as f64 {
        RetentionTier::Warm
    } else if age_hours < retention.cold_hours as f64 {
        RetentionTier::Cold
    } else {
        RetentionTier::Archive
    }
}

/// Warm tier: a SIMILAR_TO edge below the similarity floor is pruned.
/// A missing score means no edge to prune.
pub fn should_prune_warm(similarity_score: Option<f64>, warm_min_similarity: f64) -> bool {
    matches!(similarity_score, Some(score) if score < warm_min_similarity)
}

/// Cold tier: an event failing BOTH thresholds is deleted; meeting
/// either one is enough to survive.
pub fn should_prune_cold(
    importance_score: Option<i64>,
    access_count: i64,
    cold_min_importance: i64,
    cold_min_access_count: i64,
) -> bool {
    importance_score.unwrap_or(0) < cold_min_importance && access_count < cold_min_access_count
}

/// Compute pruning actions for a batch of events
pub fn pruning_actions(
    events: &[PrunableEvent],
    retention: &RetentionConfig,
    now: DateTime<Utc>,
) -> PruningActions {
    let mut actions = PruningActions::default();

    for event in events {
        match classify_tier(event.occurred_at, now, retention) {
            RetentionTier::Hot => {}
            RetentionTier::Warm => {
                if should_prune_warm(event.similarity_score, retention.warm_min_similarity) {
                    actions.delete_edges.push(event.event_id.clone());
                }
            }
            RetentionTier::Cold => {
                if should_prune_cold(
                    event.importance_score,
                    event.access_count,
                    retention.cold_min_importance,
                    retention.cold_min_access_count,
                ) {
                    actions.delete_nodes.push(event.event_id.clone());
                }
            }
            RetentionTier::Archive => {
                actions.archive_event_ids.push(event.event_id.clone());
            }
        }
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use test_case::test_case;

    fn aged(id: &str, hours: i64) -> PrunableEvent {
        PrunableEvent {
            event_id: id.to_string(),
            occurred_at: Utc::now() - Duration::hours(hours),
            importance_score: Some(2),
            access_count: 0,
            similarity_score: Some(0.5),
        }
    }

    #[test_case(1, RetentionTier::Hot)]
    #[test_case(23, RetentionTier::Hot)]
    #[test_case(24, RetentionTier::Warm)]
    #[test_case(48, RetentionTier::Warm)]
    #[test_case(167, RetentionTier::Warm)]
    #[test_case(168, RetentionTier::Cold)]
    #[test_case(200, RetentionTier::Cold)]
    #[test_case(719, RetentionTier::Cold)]
    #[test_case(720, RetentionTier::Archive)]
    #[test_case(800, RetentionTier::Archive)]
    fn tier_boundaries(age_hours: i64, expected: RetentionTier) {
        let now = Utc::now();
        let tier = classify_tier(
            now - Duration::hours(age_hours),
            now,
            &RetentionConfig::default(),
        );
        assert_eq!(tier, expected);
    }

    #[test]
    fn warm_prune_needs_low_similarity() {
        assert!(should_prune_warm(Some(0.69), 0.7));
        assert!(!should_prune_warm(Some(0.7), 0.7));
        assert!(!should_prune_warm(None, 0.7));
    }

    #[test]
    fn cold_prune_requires_both_thresholds() {
        // Below both: pruned
        assert!(should_prune_cold(Some(4), 2, 5, 3));
        assert!(should_prune_cold(None, 0, 5, 3));
        // Importance saves
        assert!(!should_prune_cold(Some(5), 0, 5, 3));
        // Access saves
        assert!(!should_prune_cold(Some(1), 3, 5, 3));
    }

    #[test]
    fn actions_per_tier() {
        let events = vec![aged("hot", 1), aged("warm", 48), aged("cold", 200), aged("old", 800)];
        let actions = pruning_actions(&events, &RetentionConfig::default(), Utc::now());
        assert_eq!(actions.delete_edges, vec!["warm".to_string()]);
        assert_eq!(actions.delete_nodes, vec!["cold".to_string()]);
        assert_eq!(actions.archive_event_ids, vec!["old".to_string()]);
    }

    #[test]
    fn surviving_events_produce_no_actions() {
        let mut warm = aged("warm", 48);
        warm.similarity_score = Some(0.9);
        let mut cold = aged("cold", 200);
        cold.importance_score = Some(8);
        let actions = pruning_actions(&[warm, cold], &RetentionConfig::default(), Utc::now());
        assert_eq!(actions, PruningActions::default());
    }
}
