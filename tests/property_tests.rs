//! Property tests over the pure domain layers

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use context_atlas::config::{DecayConfig, RetentionConfig};
use context_atlas::domain::consolidation::{group_into_episodes, summary_id, EpisodeEvent};
use context_atlas::domain::forgetting::classify_tier;
use context_atlas::domain::intent::classify_intent;
use context_atlas::domain::scoring::{score_node, ScorableNode};
use context_atlas::domain::traversal::clamp_bounds;
use context_atlas::domain::RetentionTier;

fn episode_event(index: usize, minute: i64) -> EpisodeEvent {
    EpisodeEvent {
        event_id: format!("e{index}"),
        event_type: "tool.execute".to_string(),
        occurred_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
            + Duration::minutes(minute),
        tool_name: None,
        status: None,
    }
}

proptest! {
    /// Every event lands in exactly one episode, in timestamp order.
    #[test]
    fn episodes_partition_events(minutes in prop::collection::vec(0i64..100_000, 1..50)) {
        let events: Vec<EpisodeEvent> = minutes
            .iter()
            .enumerate()
            .map(|(i, &m)| episode_event(i, m))
            .collect();
        let episodes = group_into_episodes(events.clone(), 30);

        let total: usize = episodes.iter().map(Vec::len).sum();
        prop_assert_eq!(total, events.len());

        // Within and across episodes, timestamps never decrease
        let flattened: Vec<_> = episodes.iter().flatten().collect();
        for pair in flattened.windows(2) {
            prop_assert!(pair[0].occurred_at <= pair[1].occurred_at);
        }

        // Consecutive events inside one episode never exceed the gap
        for episode in &episodes {
            for pair in episode.windows(2) {
                prop_assert!(pair[1].occurred_at - pair[0].occurred_at <= Duration::minutes(30));
            }
        }
    }

    /// Summary ids ignore event id ordering.
    #[test]
    fn summary_id_is_permutation_invariant(mut ids in prop::collection::vec("[a-z0-9]{8}", 1..20)) {
        let forward = summary_id("scope", &ids);
        ids.reverse();
        let reversed = summary_id("scope", &ids);
        prop_assert_eq!(forward, reversed);
    }

    /// Decay scores stay in [0, 1] across the input space.
    #[test]
    fn decay_score_bounded(
        age_hours in 0i64..100_000,
        access in 0i64..1_000,
        hint in proptest::option::of(1i64..=10),
    ) {
        let now = Utc::now();
        let node = ScorableNode {
            occurred_at: Some(now - Duration::hours(age_hours)),
            last_accessed_at: None,
            access_count: access,
            importance_hint: hint,
            embedding: Vec::new(),
            in_degree: 0,
            user_affinity: 0.0,
        };
        let scores = score_node(&node, None, &DecayConfig::default(), now);
        prop_assert!((0.0..=1.0).contains(&scores.decay_score));
        prop_assert!((1..=10).contains(&scores.importance_score));
    }

    /// Tier classification is total and ordered by age.
    #[test]
    fn older_events_never_get_hotter_tiers(age_a in 0i64..10_000, age_b in 0i64..10_000) {
        let retention = RetentionConfig::default();
        let now = Utc::now();
        let rank = |tier: RetentionTier| match tier {
            RetentionTier::Hot => 0,
            RetentionTier::Warm => 1,
            RetentionTier::Cold => 2,
            RetentionTier::Archive => 3,
        };
        let (younger, older) = if age_a <= age_b { (age_a, age_b) } else { (age_b, age_a) };
        let young_tier = classify_tier(now - Duration::hours(younger), now, &retention);
        let old_tier = classify_tier(now - Duration::hours(older), now, &retention);
        prop_assert!(rank(young_tier) <= rank(old_tier));
    }

    /// Clamped bounds always land inside the allowed ranges.
    #[test]
    fn clamped_bounds_in_range(depth in -100i64..1000, nodes in -100i64..10_000, timeout in -100i64..1_000_000) {
        let bounds = clamp_bounds(depth, nodes, timeout);
        prop_assert!((1..=10).contains(&bounds.max_depth));
        prop_assert!((1..=500).contains(&bounds.max_nodes));
        prop_assert!((100..=30_000).contains(&bounds.timeout_ms));
    }

    /// Intent classification never returns an empty mix and keeps
    /// confidences in (0, 1].
    #[test]
    fn intent_mix_is_normalized(query in ".{0,200}") {
        let intents = classify_intent(&query);
        prop_assert!(!intents.is_empty());
        for confidence in intents.values() {
            prop_assert!(*confidence > 0.0 && *confidence <= 1.0);
        }
        if intents.len() > 1 || !intents.values().any(|c| *c == 0.5) {
            // When keywords matched, the dominant intent is exactly 1.0
            let max = intents.values().fold(0.0f64, |a, &b| a.max(b));
            prop_assert!((max - 1.0).abs() < 1e-9);
        }
    }
}
