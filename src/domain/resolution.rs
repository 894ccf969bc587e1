//! Three-tier entity resolution
//!
//! Extracted entity names are resolved against existing graph entities
//! in order: exact match (after normalization and alias lookup), fuzzy
//! match, create. Exact same-type matches MERGE; everything weaker
//! becomes a SAME_AS or RELATED_TO edge so the graph never auto-merges
//! on a guess.

use std::collections::HashMap;

/// Fuzzy-match floor for tier 2
pub const FUZZY_MATCH_THRESHOLD: f64 = 0.9;

/// Actions the resolution engine can recommend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionAction {
    Merge,
    SameAs,
    RelatedTo,
    Create,
}

impl ResolutionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionAction::Merge => "MERGE",
            ResolutionAction::SameAs => "SAME_AS",
            ResolutionAction::RelatedTo => "RELATED_TO",
            ResolutionAction::Create => "CREATE",
        }
    }
}

/// Outcome of an entity resolution attempt
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionOutcome {
    pub action: ResolutionAction,
    pub canonical_name: String,
    pub entity_type: String,
    pub confidence: f64,
    pub justification: String,
}

/// An existing graph entity the resolver compares against
#[derive(Debug, Clone)]
pub struct KnownEntity {
    pub entity_id: String,
    pub name: String,
    pub entity_type: String,
}

/// Lowercase, trim, collapse internal whitespace
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Domain alias dictionary: canonical name -> known aliases
fn alias_dictionary() -> Vec<(&'static str, &'static [&'static str])> {
    vec![
        ("quickbooks", &["qb", "qbo", "quickbooks online"][..]),
        ("paypal", &["pp", "paypal.com"][..]),
        ("stripe", &["stripe.com", "stripe api"][..]),
        ("github", &["gh", "github.com"][..]),
        ("visual studio code", &["vscode", "vs code"][..]),
        ("javascript", &["js"][..]),
        ("typescript", &["ts"][..]),
        ("python", &["py"][..]),
        ("postgresql", &["postgres", "psql", "pg"][..]),
        ("kubernetes", &["k8s"][..]),
        ("docker", &["docker.io"][..]),
        ("amazon web services", &["aws"][..]),
        ("google cloud platform", &["gcp"][..]),
        ("microsoft azure", &["azure"][..]),
        ("usps", &["us postal service", "united states postal service"][..]),
        ("fedex", &["federal express"][..]),
        ("csv", &["comma separated values", "comma-separated values"][..]),
    ]
}

fn alias_to_canonical() -> HashMap<String, String> {
    let mut reverse = HashMap::new();
    for (canonical, aliases) in alias_dictionary() {
        for alias in aliases {
            reverse.insert(alias.to_string(), canonical.to_string());
        }
    }
    reverse
}

/// Resolve a name through the alias dictionary; unknown names come back
/// normalized but otherwise unchanged.
pub fn resolve_alias(name: &str) -> String {
    let normalized = normalize_name(name);
    alias_to_canonical().get(&normalized).cloned().unwrap_or(normalized)
}

/// Longest common substring of two char slices: (start_a, start_b, len)
fn longest_common_substring(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    // lengths[j] = common suffix length ending at a[i], b[j]
    let mut lengths = vec![0usize; b.len() + 1];
    for i in 0..a.len() {
        let mut prev = 0;
        for j in 0..b.len() {
            let current = lengths[j + 1];
            if a[i] == b[j] {
                lengths[j + 1] = prev + 1;
                if lengths[j + 1] > best.2 {
                    best = (i + 1 - lengths[j + 1], j + 1 - lengths[j + 1], lengths[j + 1]);
                }
            } else {
                lengths[j + 1] = 0;
            }
            prev = current;
        }
    }
    best
}

/// Total matching characters per Ratcliff/Obershelp: the longest common
/// substring plus, recursively, the matches to its left and right.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let (start_a, start_b, len) = longest_common_substring(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..start_a], &b[..start_b])
        + matching_chars(&a[start_a + len..], &b[start_b + len..])
}

/// Ratcliff/Obershelp character-level similarity in [0, 1].
/// Both names are normalized before comparison.
pub fn name_similarity(name_a: &str, name_b: &str) -> f64 {
    let norm_a: Vec<char> = normalize_name(name_a).chars().collect();
    let norm_b: Vec<char> = normalize_name(name_b).chars().collect();
    if norm_a.is_empty() || norm_b.is_empty() {
        return 0.0;
    }
    let matches = matching_chars(&norm_a, &norm_b);
    2.0 * matches as f64 / (norm_a.len() + norm_b.len()) as f64
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Tier 1: exact match after normalization and alias resolution.
///
/// Same type: MERGE with confidence 1.0. Differing type: SAME_AS with
/// confidence 0.9. Returns `None` when no exact match exists.
pub fn resolve_exact(
    name: &str,
    entity_type: &str,
    existing: &[KnownEntity],
) -> Option<ResolutionOutcome> {
    let canonical = resolve_alias(name);

    for entity in existing {
        let existing_name = normalize_name(&entity.name);
        let existing_canonical = resolve_alias(&entity.name);
        if canonical != existing_name && canonical != existing_canonical {
            continue;
        }

        let matched_name = if canonical == existing_name {
            existing_name
        } else {
            existing_canonical
        };

        if entity.entity_type == entity_type {
            return Some(ResolutionOutcome {
                action: ResolutionAction::Merge,
                canonical_name: matched_name,
                entity_type: entity_type.to_string(),
                confidence: 1.0,
                justification: format!("exact match after normalization: '{canonical}'"),
            });
        }
        return Some(ResolutionOutcome {
            action: ResolutionAction::SameAs,
            canonical_name: matched_name,
            entity_type: entity.entity_type.clone(),
            confidence: 0.9,
            justification: format!(
                "exact name match '{}' but type differs ({} vs {})",
                canonical, entity_type, entity.entity_type
            ),
        });
    }
    None
}

/// Tier 2: fuzzy match at or above [`FUZZY_MATCH_THRESHOLD`].
///
/// Same type: SAME_AS. Differing type: RELATED_TO. Confidence is the
/// similarity score. This tier never merges.
pub fn resolve_fuzzy(
    name: &str,
    entity_type: &str,
    existing: &[KnownEntity],
    threshold: f64,
) -> Option<ResolutionOutcome> {
    let canonical = resolve_alias(name);
    let normalized = normalize_name(name);

    let mut best_score = 0.0;
    let mut best: Option<&KnownEntity> = None;

    for entity in existing {
        let existing_raw = normalize_name(&entity.name);
        let existing_canonical = resolve_alias(&entity.name);
        // Compare aliased and raw forms both ways, keep the best
        let score = [
            name_similarity(&canonical, &existing_canonical),
            name_similarity(&normalized, &existing_raw),
            name_similarity(&canonical, &existing_raw),
            name_similarity(&normalized, &existing_canonical),
        ]
        .into_iter()
        .fold(0.0_f64, f64::max);

        if score > best_score {
            best_score = score;
            best = Some(entity);
        }
    }

    let entity = best?;
    if best_score < threshold {
        return None;
    }

    let existing_canonical = resolve_alias(&entity.name);
    let action = if entity.entity_type == entity_type {
        ResolutionAction::SameAs
    } else {
        ResolutionAction::RelatedTo
    };
    Some(ResolutionOutcome {
        action,
        canonical_name: existing_canonical.clone(),
        entity_type: entity.entity_type.clone(),
        confidence: round4(best_score),
        justification: format!(
            "fuzzy match '{canonical}' ~ '{existing_canonical}' (similarity={best_score:.4})"
        ),
    })
}

/// Run the three tiers in order; the fallback is always CREATE.
pub fn resolve_entity(
    name: &str,
    entity_type: &str,
    existing: &[KnownEntity],
) -> ResolutionOutcome {
    if let Some(outcome) = resolve_exact(name, entity_type, existing) {
        return outcome;
    }
    if let Some(outcome) = resolve_fuzzy(name, entity_type, existing, FUZZY_MATCH_THRESHOLD) {
        return outcome;
    }
    ResolutionOutcome {
        action: ResolutionAction::Create,
        canonical_name: resolve_alias(name),
        entity_type: entity_type.to_string(),
        confidence: 1.0,
        justification: "no existing entity matched".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn known(name: &str, entity_type: &str) -> KnownEntity {
        KnownEntity {
            entity_id: format!("ent:{}", normalize_name(name)),
            name: name.to_string(),
            entity_type: entity_type.to_string(),
        }
    }

    #[test]
    fn normalization_collapses_whitespace() {
        assert_eq!(normalize_name("  GitHub   Actions "), "github actions");
    }

    #[test]
    fn alias_resolves_to_canonical() {
        assert_eq!(resolve_alias("K8s"), "kubernetes");
        assert_eq!(resolve_alias("VS Code"), "visual studio code");
        assert_eq!(resolve_alias("unheard-of tool"), "unheard-of tool");
    }

    #[test]
    fn identical_names_have_similarity_one() {
        assert!((name_similarity("stripe", "Stripe") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_names_have_similarity_zero() {
        assert_eq!(name_similarity("abc", "xyz"), 0.0);
    }

    #[test]
    fn similarity_matches_ratcliff_obershelp() {
        // "pythn" vs "python": 5 matching chars over 11 total
        let score = name_similarity("pythn", "python");
        assert!((score - 2.0 * 5.0 / 11.0).abs() < 1e-9);
    }

    #[test]
    fn exact_same_type_merges() {
        let existing = vec![known("GitHub", "tool")];
        let outcome = resolve_exact("gh", "tool", &existing).unwrap();
        assert_eq!(outcome.action, ResolutionAction::Merge);
        assert_eq!(outcome.canonical_name, "github");
        assert_eq!(outcome.confidence, 1.0);
    }

    #[test]
    fn exact_differing_type_becomes_same_as() {
        let existing = vec![known("stripe", "service")];
        let outcome = resolve_exact("Stripe", "tool", &existing).unwrap();
        assert_eq!(outcome.action, ResolutionAction::SameAs);
        assert_eq!(outcome.entity_type, "service");
        assert_eq!(outcome.confidence, 0.9);
    }

    #[test]
    fn fuzzy_same_type_is_same_as_never_merge() {
        let existing = vec![known("postgresql", "tool")];
        let outcome = resolve_fuzzy("postgresq", "tool", &existing, 0.9).unwrap();
        assert_eq!(outcome.action, ResolutionAction::SameAs);
        assert!(outcome.confidence >= 0.9);
        assert_ne!(outcome.action, ResolutionAction::Merge);
    }

    #[test]
    fn fuzzy_differing_type_relates() {
        let existing = vec![known("postgresql", "service")];
        let outcome = resolve_fuzzy("postgresq", "tool", &existing, 0.9).unwrap();
        assert_eq!(outcome.action, ResolutionAction::RelatedTo);
    }

    #[test]
    fn below_threshold_falls_through() {
        let existing = vec![known("redis", "tool")];
        assert!(resolve_fuzzy("memcached", "tool", &existing, 0.9).is_none());
    }

    #[test]
    fn unmatched_name_creates() {
        let outcome = resolve_entity("entirely new thing", "concept", &[]);
        assert_eq!(outcome.action, ResolutionAction::Create);
        assert_eq!(outcome.canonical_name, "entirely new thing");
    }

    #[test]
    fn tiers_run_in_order() {
        let existing = vec![known("github", "tool"), known("githum", "tool")];
        // Exact beats fuzzy even though both would match
        let outcome = resolve_entity("GitHub", "tool", &existing);
        assert_eq!(outcome.action, ResolutionAction::Merge);
    }
}
