//! 4-factor Ebbinghaus decay scoring
//!
//! Recency follows the forgetting curve `R = e^(-t / S)` with a
//! stability term that grows with repeated access. Importance blends the
//! producer hint with access and centrality boosts, relevance is cosine
//! similarity against the query embedding, and user affinity is an
//! optional weighted blend. The composite is a weight-normalized mean.

use chrono::{DateTime, Utc};

use crate::config::DecayConfig;
use crate::domain::NodeScores;

/// Everything the scorer needs to know about a node
#[derive(Debug, Clone, Default)]
pub struct ScorableNode {
    pub occurred_at: Option<DateTime<Utc>>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub access_count: i64,
    pub importance_hint: Option<i64>,
    pub embedding: Vec<f64>,
    pub in_degree: i64,
    pub user_affinity: f64,
}

/// Forgetting-curve recency in [0, 1].
///
/// `t` is hours since the later of `occurred_at` and `last_accessed_at`,
/// clamped to >= 0 so future timestamps score 1.0. Stability
/// `S = s_base + access_count * s_boost`; non-positive stability decays
/// everything to 0.
pub fn recency_score(
    occurred_at: DateTime<Utc>,
    last_accessed_at: Option<DateTime<Utc>>,
    access_count: i64,
    s_base: f64,
    s_boost: f64,
    now: DateTime<Utc>,
) -> f64 {
    let effective = match last_accessed_at {
        Some(accessed) if accessed > occurred_at => accessed,
        _ => occurred_at,
    };
    let t_hours = ((now - effective).num_milliseconds() as f64 / 3_600_000.0).max(0.0);
    let stability = s_base + access_count as f64 * s_boost;
    if stability <= 0.0 {
        return 0.0;
    }
    (-t_hours / stability).exp()
}

/// Importance in [0, 1]: hint/10 (or 0.5 without a hint) plus capped
/// log-scale boosts for access count and in-degree.
pub fn importance_score(importance_hint: Option<i64>, access_count: i64, in_degree: i64) -> f64 {
    let base = match importance_hint {
        Some(hint) => hint as f64 / 10.0,
        None => 0.5,
    };
    let access_boost = ((access_count.max(0) as f64).ln_1p() * 0.05).min(0.2);
    let degree_boost = ((in_degree.max(0) as f64).ln_1p() * 0.05).min(0.2);
    (base + access_boost + degree_boost).min(1.0)
}

/// Cosine similarity clamped to [0, 1]. Returns the neutral prior 0.5
/// when either embedding is empty, dimensions mismatch, or a vector has
/// zero norm.
pub fn relevance_score(query_embedding: &[f64], node_embedding: &[f64]) -> f64 {
    if query_embedding.is_empty()
        || node_embedding.is_empty()
        || query_embedding.len() != node_embedding.len()
    {
        return 0.5;
    }
    let dot: f64 = query_embedding
        .iter()
        .zip(node_embedding)
        .map(|(a, b)| a * b)
        .sum();
    let norm_query = query_embedding.iter().map(|a| a * a).sum::<f64>().sqrt();
    let norm_node = node_embedding.iter().map(|b| b * b).sum::<f64>().sqrt();
    if norm_query == 0.0 || norm_node == 0.0 {
        return 0.5;
    }
    (dot / (norm_query * norm_node)).clamp(0.0, 1.0)
}

/// User affinity: 0.4*proximity + 0.3*recurrence + 0.3*overlap, clamped.
pub fn user_affinity(session_proximity: f64, retrieval_recurrence: f64, entity_overlap: f64) -> f64 {
    (0.4 * session_proximity + 0.3 * retrieval_recurrence + 0.3 * entity_overlap).clamp(0.0, 1.0)
}

/// Weighted composite score, normalized by total weight
pub fn composite_score(
    recency: f64,
    importance: f64,
    relevance: f64,
    affinity: f64,
    config: &DecayConfig,
) -> f64 {
    let total = config.weight_recency
        + config.weight_importance
        + config.weight_relevance
        + config.weight_user_affinity;
    if total == 0.0 {
        return 0.0;
    }
    (config.weight_recency * recency
        + config.weight_importance * importance
        + config.weight_relevance * relevance
        + config.weight_user_affinity * affinity)
        / total
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// Score one node. The returned `importance_score` is the integer hint,
/// or the derived importance mapped back onto the 1-10 scale.
pub fn score_node(
    node: &ScorableNode,
    query_embedding: Option<&[f64]>,
    config: &DecayConfig,
    now: DateTime<Utc>,
) -> NodeScores {
    // Nodes with no timestamp score as brand new
    let occurred_at = node.occurred_at.unwrap_or(now);

    let recency = recency_score(
        occurred_at,
        node.last_accessed_at,
        node.access_count,
        config.s_base,
        config.s_boost,
        now,
    );
    let importance = importance_score(node.importance_hint, node.access_count, node.in_degree);
    let relevance = relevance_score(query_embedding.unwrap_or(&[]), &node.embedding);
    let composite = composite_score(recency, importance, relevance, node.user_affinity, config);

    let importance_int = node
        .importance_hint
        .unwrap_or_else(|| (importance * 10.0).round() as i64);

    NodeScores {
        decay_score: round6(composite),
        relevance_score: round6(relevance),
        importance_score: importance_int,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn hours_ago(hours: i64) -> DateTime<Utc> {
        Utc::now() - Duration::hours(hours)
    }

    #[test]
    fn fresh_event_scores_near_one() {
        let now = Utc::now();
        let score = recency_score(now, None, 0, 168.0, 24.0, now);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn future_event_scores_exactly_one() {
        let now = Utc::now();
        let score = recency_score(now + Duration::hours(5), None, 0, 168.0, 24.0, now);
        assert_eq!(score, 1.0);
    }

    #[test]
    fn one_stability_constant_decays_to_1_over_e() {
        let now = Utc::now();
        let score = recency_score(now - Duration::hours(168), None, 0, 168.0, 24.0, now);
        assert!((score - (-1.0_f64).exp()).abs() < 1e-3);
    }

    #[test]
    fn access_extends_stability() {
        let now = Utc::now();
        let occurred = now - Duration::hours(100);
        let cold = recency_score(occurred, None, 0, 168.0, 24.0, now);
        let warm = recency_score(occurred, None, 5, 168.0, 24.0, now);
        assert!(warm > cold);
    }

    #[test]
    fn last_access_resets_the_clock() {
        let now = Utc::now();
        let occurred = now - Duration::hours(500);
        let stale = recency_score(occurred, None, 0, 168.0, 24.0, now);
        let touched = recency_score(occurred, Some(now - Duration::hours(1)), 0, 168.0, 24.0, now);
        assert!(touched > stale);
    }

    #[test]
    fn zero_stability_scores_zero() {
        let now = Utc::now();
        assert_eq!(recency_score(now, None, 0, 0.0, 0.0, now), 0.0);
    }

    #[test]
    fn importance_defaults_to_half_without_hint() {
        assert_eq!(importance_score(None, 0, 0), 0.5);
        assert_eq!(importance_score(Some(10), 0, 0), 1.0);
    }

    #[test]
    fn importance_boosts_are_capped() {
        let score = importance_score(Some(10), 1_000_000, 1_000_000);
        assert_eq!(score, 1.0);
        // Boost alone maxes out at 0.2 per factor
        let boosted = importance_score(None, 1_000_000, 0);
        assert!((boosted - 0.7).abs() < 1e-9);
    }

    #[test]
    fn relevance_neutral_on_degenerate_inputs() {
        assert_eq!(relevance_score(&[], &[1.0]), 0.5);
        assert_eq!(relevance_score(&[1.0], &[]), 0.5);
        assert_eq!(relevance_score(&[1.0, 2.0], &[1.0]), 0.5);
        assert_eq!(relevance_score(&[0.0, 0.0], &[1.0, 1.0]), 0.5);
    }

    #[test]
    fn relevance_of_identical_vectors_is_one() {
        let v = [0.3, 0.5, 0.8];
        assert!((relevance_score(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn opposed_vectors_clamp_to_zero() {
        assert_eq!(relevance_score(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
    }

    #[test]
    fn affinity_weighted_blend() {
        assert!((user_affinity(1.0, 1.0, 1.0) - 1.0).abs() < 1e-9);
        assert!((user_affinity(1.0, 0.0, 0.0) - 0.4).abs() < 1e-9);
        assert_eq!(user_affinity(0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn score_node_without_hint_derives_integer_importance() {
        let node = ScorableNode {
            occurred_at: Some(hours_ago(1)),
            ..ScorableNode::default()
        };
        let scores = score_node(&node, None, &DecayConfig::default(), Utc::now());
        assert_eq!(scores.importance_score, 5);
        assert_eq!(scores.relevance_score, 0.5);
        assert!(scores.decay_score > 0.0 && scores.decay_score <= 1.0);
    }

    proptest! {
        /// Recency never increases with age, holding access fixed.
        #[test]
        fn recency_monotone_in_age(age_a in 0i64..5000, age_b in 0i64..5000, access in 0i64..50) {
            let now = Utc::now();
            let (younger, older) = if age_a <= age_b { (age_a, age_b) } else { (age_b, age_a) };
            let young = recency_score(now - Duration::hours(younger), None, access, 168.0, 24.0, now);
            let old = recency_score(now - Duration::hours(older), None, access, 168.0, 24.0, now);
            prop_assert!(young >= old);
        }

        /// Recency never decreases with access count, holding age fixed.
        #[test]
        fn recency_monotone_in_access(age in 1i64..5000, access_a in 0i64..50, access_b in 0i64..50) {
            let now = Utc::now();
            let (lo, hi) = if access_a <= access_b { (access_a, access_b) } else { (access_b, access_a) };
            let cold = recency_score(now - Duration::hours(age), None, lo, 168.0, 24.0, now);
            let warm = recency_score(now - Duration::hours(age), None, hi, 168.0, 24.0, now);
            prop_assert!(warm >= cold);
        }

        /// Composite stays in [0, 1] for in-range factors.
        #[test]
        fn composite_bounded(r in 0.0f64..=1.0, i in 0.0f64..=1.0, v in 0.0f64..=1.0, u in 0.0f64..=1.0) {
            let score = composite_score(r, i, v, u, &DecayConfig::default());
            prop_assert!((0.0..=1.0).contains(&score));
        }
    }
}
