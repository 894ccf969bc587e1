//! Event envelope validation
//!
//! Pure rule checks applied at the ingestion boundary, before an event
//! reaches the ledger. Errors are collected per field rather than
//! failing on the first violation.

use chrono::{DateTime, Utc};

use crate::domain::Event;

/// Maximum payload_ref length in characters
pub const MAX_PAYLOAD_REF_LENGTH: usize = 2048;

/// Maximum allowed clock drift into the future for occurred_at
pub const MAX_FUTURE_DRIFT_SECONDS: i64 = 300;

/// Known event type prefixes
pub const KNOWN_PREFIXES: [&str; 6] = ["agent", "tool", "llm", "observation", "system", "user"];

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Accumulated validation outcome for one event
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<FieldError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }
}

/// Check that an event type is dot-namespaced:
/// `^[a-z][a-z0-9]*(\.[a-z][a-z0-9_]*)+$`
pub fn is_valid_event_type(event_type: &str) -> bool {
    let mut segments = event_type.split('.');

    let Some(head) = segments.next() else {
        return false;
    };
    let mut head_chars = head.chars();
    match head_chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    if !head_chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()) {
        return false;
    }

    let mut tail_count = 0;
    for segment in segments {
        tail_count += 1;
        let mut chars = segment.chars();
        match chars.next() {
            Some(c) if c.is_ascii_lowercase() => {}
            _ => return false,
        }
        if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
            return false;
        }
    }
    tail_count >= 1
}

/// Check whether an event type carries a known top-level prefix
pub fn has_known_prefix(event_type: &str) -> bool {
    let prefix = event_type.split('.').next().unwrap_or(event_type);
    KNOWN_PREFIXES.contains(&prefix)
}

/// Validate an event envelope against ingestion rules.
///
/// `now` is injected so the future-drift check is deterministic in tests.
pub fn validate_event(event: &Event, now: DateTime<Utc>) -> ValidationReport {
    let mut report = ValidationReport::default();

    if !is_valid_event_type(&event.event_type) {
        report.add(
            "event_type",
            format!(
                "must be dot-namespaced (e.g. 'agent.invoke'), got '{}'",
                event.event_type
            ),
        );
    }

    let drift = (event.occurred_at - now).num_seconds();
    if drift > MAX_FUTURE_DRIFT_SECONDS {
        report.add(
            "occurred_at",
            format!("timestamp is {drift}s in the future (max {MAX_FUTURE_DRIFT_SECONDS}s)"),
        );
    }

    if let Some(parent) = event.parent_event_id {
        if parent == event.event_id {
            report.add("parent_event_id", "cannot reference own event_id as parent");
        }
    }

    if let Some(ended_at) = event.ended_at {
        if ended_at < event.occurred_at {
            report.add("ended_at", "ended_at must be >= occurred_at");
        }
    }

    if event.payload_ref.is_empty() {
        report.add("payload_ref", "payload_ref must not be empty");
    } else if event.payload_ref.len() > MAX_PAYLOAD_REF_LENGTH {
        report.add(
            "payload_ref",
            format!("payload_ref exceeds max length of {MAX_PAYLOAD_REF_LENGTH}"),
        );
    }

    if event.session_id.is_empty() {
        report.add("session_id", "session_id must not be empty");
    }
    if event.agent_id.is_empty() {
        report.add("agent_id", "agent_id must not be empty");
    }
    if event.trace_id.is_empty() {
        report.add("trace_id", "trace_id must not be empty");
    }

    if let Some(hint) = event.importance_hint {
        if !(1..=10).contains(&hint) {
            report.add("importance_hint", "importance_hint must be in [1, 10]");
        }
    }
    if event.schema_version < 1 {
        report.add("schema_version", "schema_version must be >= 1");
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use test_case::test_case;
    use uuid::Uuid;

    fn base_event() -> Event {
        Event {
            event_id: Uuid::now_v7(),
            event_type: "tool.execute".to_string(),
            occurred_at: Utc::now(),
            session_id: "s1".to_string(),
            agent_id: "a1".to_string(),
            trace_id: "t1".to_string(),
            payload_ref: "ref://payload".to_string(),
            global_position: None,
            tool_name: None,
            parent_event_id: None,
            ended_at: None,
            status: None,
            schema_version: 1,
            importance_hint: None,
        }
    }

    #[test_case("agent.invoke", true)]
    #[test_case("tool.execute", true)]
    #[test_case("llm.chat", true)]
    #[test_case("user.preference.stated", true)]
    #[test_case("system.session_end", true)]
    #[test_case("agent", false; "no dot")]
    #[test_case("Agent.invoke", false; "uppercase head")]
    #[test_case("agent.Invoke", false; "uppercase tail")]
    #[test_case(".invoke", false; "empty head")]
    #[test_case("agent.", false; "empty tail")]
    #[test_case("agent.in-voke", false; "hyphen")]
    #[test_case("9agent.invoke", false; "digit head start")]
    #[test_case("agent.9invoke", false; "digit tail start")]
    fn event_type_pattern(event_type: &str, expected: bool) {
        assert_eq!(is_valid_event_type(event_type), expected);
    }

    #[test]
    fn known_prefixes_accepted() {
        assert!(has_known_prefix("agent.invoke"));
        assert!(has_known_prefix("observation.input"));
        assert!(!has_known_prefix("metric.emit"));
    }

    #[test]
    fn valid_event_passes() {
        let report = validate_event(&base_event(), Utc::now());
        assert!(report.is_valid(), "errors: {:?}", report.errors);
    }

    #[test]
    fn future_drift_rejected() {
        let now = Utc::now();
        let mut event = base_event();
        event.occurred_at = now + Duration::seconds(301);
        let report = validate_event(&event, now);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].field, "occurred_at");

        // Drift at the boundary passes
        event.occurred_at = now + Duration::seconds(300);
        assert!(validate_event(&event, now).is_valid());
    }

    #[test]
    fn self_parent_rejected() {
        let mut event = base_event();
        event.parent_event_id = Some(event.event_id);
        let report = validate_event(&event, Utc::now());
        assert_eq!(report.errors[0].field, "parent_event_id");
    }

    #[test]
    fn ended_before_occurred_rejected() {
        let mut event = base_event();
        event.ended_at = Some(event.occurred_at - Duration::seconds(1));
        let report = validate_event(&event, Utc::now());
        assert_eq!(report.errors[0].field, "ended_at");
    }

    #[test]
    fn oversized_payload_ref_rejected() {
        let mut event = base_event();
        event.payload_ref = "x".repeat(MAX_PAYLOAD_REF_LENGTH + 1);
        let report = validate_event(&event, Utc::now());
        assert_eq!(report.errors[0].field, "payload_ref");
    }

    #[test]
    fn errors_are_collected_not_short_circuited() {
        let mut event = base_event();
        event.event_type = "nodots".to_string();
        event.session_id = String::new();
        event.importance_hint = Some(11);
        let report = validate_event(&event, Utc::now());
        let fields: Vec<&str> = report.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["event_type", "session_id", "importance_hint"]);
    }
}
