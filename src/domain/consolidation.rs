//! Re-consolidation: episode grouping and summary synthesis
//!
//! Sessions past the reflection threshold are split into temporal
//! episodes, and each episode (plus the whole session, plus each agent's
//! sessions) gets a deterministic summary node. Summary ids are derived
//! from the covered event set, so re-running consolidation MERGEs onto
//! the same nodes.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

use crate::domain::SummaryNode;

/// A slim view of an event used by grouping and summary synthesis;
/// the consolidation worker builds these from graph rows.
#[derive(Debug, Clone)]
pub struct EpisodeEvent {
    pub event_id: String,
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub tool_name: Option<String>,
    pub status: Option<String>,
}

/// A session qualifies for re-consolidation once its event count meets
/// the reflection threshold.
pub fn should_reconsolidate(event_count: u64, threshold: u64) -> bool {
    event_count >= threshold
}

/// Split a session's events into episodes on temporal gaps.
///
/// Events are sorted by `occurred_at`; a gap greater than `gap_minutes`
/// between consecutive events opens a new episode. Every event lands in
/// exactly one episode.
pub fn group_into_episodes(mut events: Vec<EpisodeEvent>, gap_minutes: i64) -> Vec<Vec<EpisodeEvent>> {
    if events.is_empty() {
        return Vec::new();
    }
    events.sort_by_key(|e| e.occurred_at);
    let gap = Duration::minutes(gap_minutes);

    let mut episodes: Vec<Vec<EpisodeEvent>> = Vec::new();
    let mut current: Vec<EpisodeEvent> = Vec::new();

    for event in events {
        match current.last() {
            Some(last) if event.occurred_at - last.occurred_at > gap => {
                episodes.push(std::mem::take(&mut current));
                current.push(event);
            }
            _ => current.push(event),
        }
    }
    episodes.push(current);
    episodes
}

/// Deterministic summary id: scope id plus the first 12 hex chars of the
/// SHA-256 over the sorted, '|'-joined covered event ids.
pub fn summary_id(scope_id: &str, event_ids: &[String]) -> String {
    let mut sorted: Vec<&str> = event_ids.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let digest = Sha256::digest(sorted.join("|").as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("summary-{}-{}", scope_id, &hex[..12])
}

/// Create a deterministic (non-LLM) summary over a set of events.
///
/// Content lists the event count, sorted distinct event types, and the
/// ISO-formatted time range. Returns `None` for an empty event set.
pub fn summary_from_events(
    events: &[EpisodeEvent],
    scope: &str,
    scope_id: &str,
    created_at: DateTime<Utc>,
) -> Option<SummaryNode> {
    if events.is_empty() {
        return None;
    }

    let event_ids: Vec<String> = events.iter().map(|e| e.event_id.clone()).collect();

    let mut event_types: Vec<String> = events.iter().map(|e| e.event_type.clone()).collect();
    event_types.sort_unstable();
    event_types.dedup();

    let mut timestamps: Vec<DateTime<Utc>> = events.iter().map(|e| e.occurred_at).collect();
    timestamps.sort_unstable();
    let first = timestamps[0];
    let last = timestamps[timestamps.len() - 1];

    let content = format!(
        "{} events ({}) from {} to {}",
        events.len(),
        event_types.join(", "),
        first.to_rfc3339(),
        last.to_rfc3339(),
    );

    Some(SummaryNode {
        summary_id: summary_id(scope_id, &event_ids),
        scope: scope.to_string(),
        scope_id: scope_id.to_string(),
        content,
        created_at,
        event_count: events.len(),
        time_range: vec![first, last],
    })
}

/// Prompt for the pluggable LLM summarization path. The deterministic
/// summary above remains the fallback when no model is wired in.
pub fn summary_prompt(events: &[EpisodeEvent]) -> String {
    let mut sorted: Vec<&EpisodeEvent> = events.iter().collect();
    sorted.sort_by_key(|e| e.occurred_at);

    let mut lines = vec![
        "Summarize the following sequence of agent events into a concise \
         episode description. Focus on what actions were taken, what tools \
         were used, and what the outcome was."
            .to_string(),
        String::new(),
        "Events:".to_string(),
    ];

    for event in sorted {
        let tool = event
            .tool_name
            .as_deref()
            .map(|t| format!(" [{t}]"))
            .unwrap_or_default();
        let status = event
            .status
            .as_deref()
            .map(|s| format!(" ({s})"))
            .unwrap_or_default();
        lines.push(format!(
            "- {}: {}{}{}",
            event.occurred_at.to_rfc3339(),
            event.event_type,
            tool,
            status
        ));
    }

    lines.push(String::new());
    lines.push("Episode summary:".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn event_at(id: &str, minute: i64) -> EpisodeEvent {
        EpisodeEvent {
            event_id: id.to_string(),
            event_type: "tool.execute".to_string(),
            occurred_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minute),
            tool_name: None,
            status: None,
        }
    }

    #[test]
    fn reflection_threshold_is_inclusive() {
        assert!(!should_reconsolidate(149, 150));
        assert!(should_reconsolidate(150, 150));
        assert!(should_reconsolidate(151, 150));
    }

    #[test]
    fn empty_input_yields_no_episodes() {
        assert!(group_into_episodes(Vec::new(), 30).is_empty());
    }

    #[test]
    fn gap_splits_episodes() {
        // Three events at t, t+5m, t+10m; three more at t+2h..t+2h10m
        let events = vec![
            event_at("e1", 0),
            event_at("e2", 5),
            event_at("e3", 10),
            event_at("e4", 120),
            event_at("e5", 125),
            event_at("e6", 130),
        ];
        let episodes = group_into_episodes(events, 30);
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].len(), 3);
        assert_eq!(episodes[1].len(), 3);
    }

    #[test]
    fn episodes_partition_the_session() {
        let events: Vec<EpisodeEvent> =
            (0..10).map(|i| event_at(&format!("e{i}"), i * 40)).collect();
        let episodes = group_into_episodes(events.clone(), 30);
        let total: usize = episodes.iter().map(Vec::len).sum();
        assert_eq!(total, events.len());
        // 40-minute spacing with a 30-minute gap: every event is its own episode
        assert_eq!(episodes.len(), 10);
    }

    #[test]
    fn unsorted_input_is_sorted_before_grouping() {
        let events = vec![event_at("e2", 5), event_at("e1", 0), event_at("e3", 10)];
        let episodes = group_into_episodes(events, 30);
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0][0].event_id, "e1");
        assert_eq!(episodes[0][2].event_id, "e3");
    }

    #[test]
    fn summary_id_is_order_independent() {
        let a = summary_id("s1", &["e1".into(), "e2".into(), "e3".into()]);
        let b = summary_id("s1", &["e3".into(), "e1".into(), "e2".into()]);
        assert_eq!(a, b);
        assert!(a.starts_with("summary-s1-"));
        assert_eq!(a.len(), "summary-s1-".len() + 12);
    }

    #[test]
    fn different_event_sets_get_different_ids() {
        let a = summary_id("s1", &["e1".into()]);
        let b = summary_id("s1", &["e2".into()]);
        assert_ne!(a, b);
    }

    #[test]
    fn summary_content_and_time_range() {
        let events = vec![event_at("e1", 0), event_at("e2", 5)];
        let created = Utc::now();
        let summary = summary_from_events(&events, "episode", "s1-ep0", created).unwrap();
        assert_eq!(summary.event_count, 2);
        assert_eq!(summary.time_range.len(), 2);
        assert_eq!(summary.time_range[0], events[0].occurred_at);
        assert_eq!(summary.time_range[1], events[1].occurred_at);
        assert!(summary.content.starts_with("2 events (tool.execute) from"));
        assert_eq!(summary.scope, "episode");
    }

    #[test]
    fn summary_of_empty_set_is_none() {
        assert!(summary_from_events(&[], "session", "s1", Utc::now()).is_none());
    }

    #[test]
    fn rerun_produces_identical_summary_node() {
        let events = vec![event_at("e1", 0), event_at("e2", 5)];
        let created = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let a = summary_from_events(&events, "session", "s1", created).unwrap();
        let b = summary_from_events(&events, "session", "s1", created).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn prompt_lists_events_in_time_order() {
        let mut late = event_at("e2", 5);
        late.tool_name = Some("grep".to_string());
        late.status = Some("completed".to_string());
        let events = vec![late, event_at("e1", 0)];
        let prompt = summary_prompt(&events);
        let e1_pos = prompt.find("2026-01-01T00:00:00").unwrap();
        let e2_pos = prompt.find("2026-01-01T00:05:00").unwrap();
        assert!(e1_pos < e2_pos);
        assert!(prompt.contains("[grep]"));
        assert!(prompt.contains("(completed)"));
    }
}
