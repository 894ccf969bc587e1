//! Rule-based intent classification
//!
//! Deterministic keyword matching over the query text. Confidences feed
//! the intent weight matrix to produce per-edge-type traversal weights,
//! and the dominant intent selects a seed strategy.

use std::collections::HashMap;

use crate::config::IntentWeightMatrix;
use crate::domain::{EdgeKind, IntentKind};

/// Keyword sets per intent. Matching is case-insensitive substring
/// search; the match count drives confidence.
fn intent_keywords() -> Vec<(IntentKind, &'static [&'static str])> {
    vec![
        (
            IntentKind::Why,
            &["why", "because", "caused", "reason", "root cause", "due to"][..],
        ),
        (
            IntentKind::When,
            &["when", "timeline", "before", "after", "sequence", "order", "time"][..],
        ),
        (
            IntentKind::What,
            &["what", "describe", "explain", "definition", "meaning"][..],
        ),
        (
            IntentKind::Related,
            &["similar", "related", "like", "compare", "associated"][..],
        ),
        (
            IntentKind::WhoIs,
            &["who", "person", "user", "team", "member", "author"][..],
        ),
        (
            IntentKind::HowDoes,
            &["how", "process", "method", "approach", "workflow", "steps"][..],
        ),
        (
            IntentKind::Personalize,
            &["prefer", "favorite", "style", "personalize", "customize"][..],
        ),
    ]
}

/// Classify a query into intents with confidence scores.
///
/// Raw score per intent is `min(1.0, matches * 0.4)`. When nothing
/// matches, the result is `{general: 0.5}`; otherwise scores are
/// normalized so the dominant intent has confidence 1.0. Pure function
/// of the input string.
pub fn classify_intent(query: &str) -> HashMap<IntentKind, f64> {
    let query_lower = query.to_lowercase();
    let mut scores: HashMap<IntentKind, f64> = HashMap::new();

    for (intent, keywords) in intent_keywords() {
        let matches = keywords.iter().filter(|kw| query_lower.contains(**kw)).count();
        if matches > 0 {
            scores.insert(intent, (matches as f64 * 0.4).min(1.0));
        }
    }

    if scores.is_empty() {
        return HashMap::from([(IntentKind::General, 0.5)]);
    }

    let max_score = scores.values().fold(0.0_f64, |a, &b| a.max(b));
    if max_score > 0.0 {
        for score in scores.values_mut() {
            *score /= max_score;
        }
    }
    scores
}

/// Combine intent confidences with the weight matrix into a single
/// per-edge-type weight map. Each intent's row is scaled by its
/// confidence and accumulated.
pub fn edge_weights(
    intents: &HashMap<IntentKind, f64>,
    matrix: &IntentWeightMatrix,
) -> HashMap<EdgeKind, f64> {
    let mut weights: HashMap<EdgeKind, f64> = HashMap::new();
    for (intent, confidence) in intents {
        if let Some(row) = matrix.get(intent) {
            for (edge, weight) in row {
                *weights.entry(*edge).or_insert(0.0) += confidence * weight;
            }
        }
    }
    weights
}

/// Seed-node selection strategy for the dominant intent
pub fn seed_strategy(intents: &HashMap<IntentKind, f64>) -> &'static str {
    let dominant = intents
        .iter()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(intent, _)| *intent);
    match dominant {
        Some(IntentKind::Why) => "causal_roots",
        Some(IntentKind::When) => "temporal_anchors",
        Some(IntentKind::What) | Some(IntentKind::WhoIs) => "entity_hubs",
        Some(IntentKind::Related) => "similar_cluster",
        Some(IntentKind::HowDoes) => "workflow_pattern",
        Some(IntentKind::Personalize) => "user_profile",
        _ => "general",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_intent_weights;
    use pretty_assertions::assert_eq;

    #[test]
    fn why_query_ranks_why_dominant() {
        let intents = classify_intent("why did the deploy fail");
        assert_eq!(intents.get(&IntentKind::Why), Some(&1.0));
    }

    #[test]
    fn no_keywords_falls_back_to_general() {
        let intents = classify_intent("zzz qqq");
        assert_eq!(intents, HashMap::from([(IntentKind::General, 0.5)]));
    }

    #[test]
    fn multiple_matches_saturate_at_one() {
        // "why", "because", "caused" -> 3 matches * 0.4 capped at 1.0
        let intents = classify_intent("why did this happen because it was caused by that");
        assert_eq!(intents.get(&IntentKind::Why), Some(&1.0));
    }

    #[test]
    fn scores_normalized_to_dominant() {
        // Two 'related' keywords vs one 'when' keyword
        let intents = classify_intent("show me similar and related items over time");
        let related = intents[&IntentKind::Related];
        let when = intents[&IntentKind::When];
        assert_eq!(related, 1.0);
        assert!(when < related);
    }

    #[test]
    fn classification_is_deterministic() {
        let a = classify_intent("why did it fail after the timeout");
        let b = classify_intent("why did it fail after the timeout");
        assert_eq!(a, b);
    }

    #[test]
    fn edge_weights_scale_rows_by_confidence() {
        let matrix = default_intent_weights();
        let intents = HashMap::from([(IntentKind::Why, 1.0)]);
        let weights = edge_weights(&intents, &matrix);
        assert_eq!(weights[&EdgeKind::CausedBy], 5.0);
        assert_eq!(weights[&EdgeKind::Follows], 1.0);

        let halved = edge_weights(&HashMap::from([(IntentKind::Why, 0.5)]), &matrix);
        assert_eq!(halved[&EdgeKind::CausedBy], 2.5);
    }

    #[test]
    fn edge_weights_accumulate_across_intents() {
        let matrix = default_intent_weights();
        let intents = HashMap::from([(IntentKind::Why, 1.0), (IntentKind::When, 1.0)]);
        let weights = edge_weights(&intents, &matrix);
        // CAUSED_BY: 5.0 (why) + 1.0 (when)
        assert_eq!(weights[&EdgeKind::CausedBy], 6.0);
    }

    #[test]
    fn seed_strategies_by_dominant_intent() {
        assert_eq!(seed_strategy(&HashMap::from([(IntentKind::Why, 1.0)])), "causal_roots");
        assert_eq!(
            seed_strategy(&HashMap::from([(IntentKind::WhoIs, 1.0)])),
            "entity_hubs"
        );
        assert_eq!(seed_strategy(&HashMap::from([(IntentKind::General, 0.5)])), "general");
        assert_eq!(seed_strategy(&HashMap::new()), "general");
    }
}
