//! End-to-end scenarios over the pure pipeline: projection chains,
//! consolidation, retention tiers, and intent-weighted retrieval math.

use chrono::{Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use uuid::Uuid;

use context_atlas::config::{default_intent_weights, DecayConfig, RetentionConfig};
use context_atlas::domain::consolidation::{
    group_into_episodes, summary_from_events, EpisodeEvent,
};
use context_atlas::domain::forgetting::{classify_tier, pruning_actions, PrunableEvent};
use context_atlas::domain::intent::{classify_intent, edge_weights};
use context_atlas::domain::projection::project_event;
use context_atlas::domain::scoring::{score_node, ScorableNode};
use context_atlas::domain::validation::validate_event;
use context_atlas::domain::{EdgeKind, Event, IntentKind, RetentionTier};

fn event_in_session(session: &str, offset_secs: i64) -> Event {
    Event {
        event_id: Uuid::now_v7(),
        event_type: "tool.execute".to_string(),
        occurred_at: Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
            + Duration::seconds(offset_secs),
        session_id: session.to_string(),
        agent_id: "agent-1".to_string(),
        trace_id: "trace-1".to_string(),
        payload_ref: "ref://payload".to_string(),
        global_position: Some(format!("17000000000{offset_secs:02}-0")),
        tool_name: None,
        parent_event_id: None,
        ended_at: None,
        status: None,
        schema_version: 1,
        importance_hint: Some(5),
    }
}

#[test]
fn five_event_session_yields_four_follows_edges() {
    let events: Vec<Event> = (0..5).map(|i| event_in_session("s1", i)).collect();

    let mut follows = Vec::new();
    let mut prev: Option<&Event> = None;
    for event in &events {
        let result = project_event(event, prev).unwrap();
        follows.extend(
            result
                .edges
                .into_iter()
                .filter(|e| e.kind == EdgeKind::Follows),
        );
        prev = Some(event);
    }

    assert_eq!(follows.len(), 4);
    for (i, edge) in follows.iter().enumerate() {
        assert_eq!(edge.source, events[i + 1].event_id.to_string());
        assert_eq!(edge.target, events[i].event_id.to_string());
        assert_eq!(edge.properties["delta_ms"].as_i64(), Some(1000));
        assert_eq!(edge.properties["session_id"].as_str(), Some("s1"));
    }
}

#[test]
fn follows_edges_never_cross_sessions() {
    let a = event_in_session("s1", 0);
    let b = event_in_session("s2", 1);
    let result = project_event(&b, Some(&a)).unwrap();
    assert!(result.edges.is_empty());
}

#[test]
fn causal_chain_produces_one_caused_by_edge_per_link() {
    // A <- B <- C <- D via parent_event_id
    let a = event_in_session("s1", 0);
    let mut b = event_in_session("s1", 1);
    b.parent_event_id = Some(a.event_id);
    let mut c = event_in_session("s1", 2);
    c.parent_event_id = Some(b.event_id);
    let mut d = event_in_session("s1", 3);
    d.parent_event_id = Some(c.event_id);

    let mut caused_by = Vec::new();
    let mut prev: Option<&Event> = None;
    for event in [&a, &b, &c, &d] {
        let result = project_event(event, prev).unwrap();
        caused_by.extend(
            result
                .edges
                .into_iter()
                .filter(|e| e.kind == EdgeKind::CausedBy),
        );
        prev = Some(event);
    }

    assert_eq!(caused_by.len(), 3);
    assert_eq!(caused_by[0].source, b.event_id.to_string());
    assert_eq!(caused_by[0].target, a.event_id.to_string());
    assert_eq!(caused_by[2].source, d.event_id.to_string());
    assert_eq!(caused_by[2].target, c.event_id.to_string());
    for edge in &caused_by {
        assert_eq!(edge.properties["mechanism"].as_str(), Some("direct"));
    }
}

fn episode_event(id: &str, minute: i64) -> EpisodeEvent {
    EpisodeEvent {
        event_id: id.to_string(),
        event_type: "tool.execute".to_string(),
        occurred_at: Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap()
            + Duration::minutes(minute),
        tool_name: None,
        status: None,
    }
}

#[test]
fn consolidation_splits_on_two_hour_gap() {
    // Three events at t, t+5m, t+10m; three at t+2h, t+2h5m, t+2h10m
    let events = vec![
        episode_event("e1", 0),
        episode_event("e2", 5),
        episode_event("e3", 10),
        episode_event("e4", 120),
        episode_event("e5", 125),
        episode_event("e6", 130),
    ];

    let episodes = group_into_episodes(events.clone(), 30);
    assert_eq!(episodes.len(), 2);
    assert_eq!(episodes[0].len(), 3);
    assert_eq!(episodes[1].len(), 3);

    // Episodes partition the session
    let covered: Vec<&str> = episodes
        .iter()
        .flatten()
        .map(|e| e.event_id.as_str())
        .collect();
    assert_eq!(covered, vec!["e1", "e2", "e3", "e4", "e5", "e6"]);

    let now = Utc::now();
    let session_summary = summary_from_events(&events, "session", "sess-1", now).unwrap();
    assert_eq!(session_summary.event_count, 6);

    // Same inputs, same summary ids
    let again = summary_from_events(&events, "session", "sess-1", now).unwrap();
    assert_eq!(session_summary.summary_id, again.summary_id);

    // Episode summaries cover disjoint event sets, so their ids differ
    let ep0 = summary_from_events(&episodes[0], "episode", "sess-1-ep0", now).unwrap();
    let ep1 = summary_from_events(&episodes[1], "episode", "sess-1-ep1", now).unwrap();
    assert_ne!(ep0.summary_id, ep1.summary_id);
}

#[test]
fn retention_tiers_for_aged_events() {
    let retention = RetentionConfig::default();
    let now = Utc::now();

    let ages_and_tiers = [
        (1, RetentionTier::Hot),
        (48, RetentionTier::Warm),
        (200, RetentionTier::Cold),
        (800, RetentionTier::Archive),
    ];
    for (age_hours, expected) in ages_and_tiers {
        let tier = classify_tier(now - Duration::hours(age_hours), now, &retention);
        assert_eq!(tier, expected, "age {age_hours}h");
    }

    // Low importance, zero access, weak similarity edge
    let events: Vec<PrunableEvent> = ages_and_tiers
        .iter()
        .map(|(age_hours, _)| PrunableEvent {
            event_id: format!("evt-{age_hours}"),
            occurred_at: now - Duration::hours(*age_hours),
            importance_score: Some(2),
            access_count: 0,
            similarity_score: Some(0.5),
        })
        .collect();

    let actions = pruning_actions(&events, &retention, now);
    assert_eq!(actions.delete_edges, vec!["evt-48".to_string()]);
    assert_eq!(actions.delete_nodes, vec!["evt-200".to_string()]);
    assert_eq!(actions.archive_event_ids, vec!["evt-800".to_string()]);
}

#[test]
fn why_query_boosts_caused_by_above_all() {
    let intents = classify_intent("why did it fail");
    assert_eq!(intents.get(&IntentKind::Why), Some(&1.0));

    let weights = edge_weights(&intents, &default_intent_weights());
    let caused_by = weights[&EdgeKind::CausedBy];
    for (edge, weight) in &weights {
        if *edge != EdgeKind::CausedBy {
            assert!(
                caused_by > *weight,
                "CAUSED_BY ({caused_by}) should outweigh {edge:?} ({weight})"
            );
        }
    }
}

#[test]
fn classification_is_a_pure_function_of_the_query() {
    for query in ["why did it fail", "what happened before", "", "show related work"] {
        assert_eq!(classify_intent(query), classify_intent(query));
    }
}

#[test]
fn boost_formula_caps_at_one() {
    let decay = DecayConfig::default();
    let node = ScorableNode {
        occurred_at: Some(Utc::now()),
        ..ScorableNode::default()
    };
    let scores = score_node(&node, None, &decay, Utc::now());
    // Weight 5 on a fresh node: decay * 1.5 would exceed 1.0 and must clamp
    let boosted = (scores.decay_score * (1.0 + 5.0 * 0.1)).min(1.0);
    assert!(boosted <= 1.0);
    assert!(boosted >= scores.decay_score);
}

#[test]
fn duplicate_validation_is_stable() {
    let event = event_in_session("s1", 0);
    let now = Utc::now();
    let first = validate_event(&event, now);
    let second = validate_event(&event, now);
    assert_eq!(first.is_valid(), second.is_valid());
    assert!(first.is_valid());
}
