// src/matching/scorer.rs

//! Composite similarity scoring for entity name pairs.
//!
//! Four independently weighted, independently testable sub-scores: lexical
//! edit-distance similarity, token-set overlap, synonym-set membership and
//! structural context compatibility. No hidden state; the synonym table is
//! passed in at construction and scoped to one run.

use std::collections::HashSet;

use strsim::normalized_levenshtein;

use crate::error::ConfigurationError;
use crate::matching::synonyms::SynonymTable;
use crate::models::{ScoringContext, SimilarityScore, SimilarityWeights};
use crate::normalize::{normalize_name, tokenize};

/// Archetype compatibility group. Two archetypes are structurally
/// compatible when they fall in the same group.
fn archetype_group(archetype: &str) -> &'static str {
    match normalize_name(archetype).as_str() {
        "financial report" | "financial statement" | "budget" | "forecast"
        | "consolidation" => "finance",
        "data extract" | "data export" | "database extract" => "data",
        "model template" | "template" | "calculation model" => "model",
        "dashboard" | "report" | "analysis" => "reporting",
        _ => "unknown",
    }
}

pub struct Scorer<'a> {
    synonyms: &'a SynonymTable,
}

impl<'a> Scorer<'a> {
    pub fn new(synonyms: &'a SynonymTable) -> Self {
        Scorer { synonyms }
    }

    /// Composite score for a pair of entity names with optional structural
    /// context. Pure; symmetric in the lexical and token-overlap sub-scores.
    pub fn score(
        &self,
        name_a: &str,
        name_b: &str,
        ctx_a: Option<&ScoringContext>,
        ctx_b: Option<&ScoringContext>,
        weights: &SimilarityWeights,
    ) -> Result<SimilarityScore, ConfigurationError> {
        weights.validate()?;

        let norm_a = normalize_name(name_a);
        let norm_b = normalize_name(name_b);

        let lexical = lexical_similarity(&norm_a, &norm_b);
        let token_overlap = token_overlap(&norm_a, &norm_b);
        let synonym = self.synonym_score(&norm_a, &norm_b);
        let structural = structural_compatibility(ctx_a, ctx_b);

        let total = (weights.lexical * lexical
            + weights.token_overlap * token_overlap
            + weights.synonym * synonym
            + weights.structural * structural)
            .clamp(0.0, 1.0);

        Ok(SimilarityScore {
            total,
            lexical,
            token_overlap,
            synonym,
            structural,
        })
    }

    fn synonym_score(&self, norm_a: &str, norm_b: &str) -> f64 {
        if norm_a.is_empty() || norm_b.is_empty() {
            return 0.0;
        }
        if norm_a == norm_b {
            return 1.0;
        }
        if self.synonyms.same_set(norm_a, norm_b) {
            1.0
        } else {
            0.0
        }
    }
}

/// Normalized edit-distance similarity over pre-normalized names:
/// `1 - levenshtein / max(len)`. Two empty strings score 1.0.
pub fn lexical_similarity(norm_a: &str, norm_b: &str) -> f64 {
    normalized_levenshtein(norm_a, norm_b)
}

/// Jaccard index over stopword-filtered token sets. The stopword filter is
/// the guard against generic descriptive phrases over-linking on filler
/// words.
pub fn token_overlap(norm_a: &str, norm_b: &str) -> f64 {
    if norm_a.is_empty() && norm_b.is_empty() {
        return 1.0;
    }
    let tokens_a = tokenize(norm_a);
    let tokens_b = tokenize(norm_b);
    jaccard(&tokens_a, &tokens_b)
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Matching structural signals over signals checkable on both sides:
/// polarity convention, category, archetype compatibility group. With zero
/// checkable signals the score is 1.0 — absent context is not evidence
/// against a link.
pub fn structural_compatibility(
    ctx_a: Option<&ScoringContext>,
    ctx_b: Option<&ScoringContext>,
) -> f64 {
    let (a, b) = match (ctx_a, ctx_b) {
        (Some(a), Some(b)) => (a, b),
        _ => return 1.0,
    };

    let mut checked = 0usize;
    let mut matching = 0usize;

    if let (Some(pa), Some(pb)) = (a.polarity, b.polarity) {
        checked += 1;
        if pa == pb {
            matching += 1;
        }
    }
    if let (Some(ca), Some(cb)) = (a.category.as_deref(), b.category.as_deref()) {
        checked += 1;
        if normalize_name(ca) == normalize_name(cb) {
            matching += 1;
        }
    }
    if let (Some(aa), Some(ab)) = (a.archetype.as_deref(), b.archetype.as_deref()) {
        checked += 1;
        if archetype_group(aa) == archetype_group(ab) {
            matching += 1;
        }
    }

    if checked == 0 {
        1.0
    } else {
        matching as f64 / checked as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Polarity;

    fn scorer(table: &SynonymTable) -> Scorer<'_> {
        Scorer::new(table)
    }

    #[test]
    fn test_lexical_and_token_subscores_are_symmetric() {
        let table = SynonymTable::default();
        let s = scorer(&table);
        let weights = SimilarityWeights::default();
        let xy = s.score("Acme Holdings", "Acme Global", None, None, &weights).unwrap();
        let yx = s.score("Acme Global", "Acme Holdings", None, None, &weights).unwrap();
        assert_eq!(xy.lexical, yx.lexical);
        assert_eq!(xy.token_overlap, yx.token_overlap);
    }

    #[test]
    fn test_two_empty_names_lexically_identical() {
        assert_eq!(lexical_similarity("", ""), 1.0);
        assert_eq!(token_overlap("", ""), 1.0);
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let table = SynonymTable::default();
        let s = scorer(&table);
        let weights = SimilarityWeights {
            lexical: 0.5,
            token_overlap: 0.5,
            synonym: 0.5,
            structural: 0.0,
        };
        let err = s.score("a", "b", None, None, &weights).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidWeights { .. }));
    }

    #[test]
    fn test_synonym_membership() {
        let table = SynonymTable::default();
        let s = scorer(&table);
        let weights = SimilarityWeights::default();
        let score = s.score("Revenue", "Net Sales", None, None, &weights).unwrap();
        assert_eq!(score.synonym, 1.0);
        let score = s.score("Revenue", "Headcount", None, None, &weights).unwrap();
        assert_eq!(score.synonym, 0.0);
    }

    #[test]
    fn test_vendor_name_variants_clear_default_threshold() {
        // "Amazon Web Svcs" / "Amazon Web Services (AWS)" tokenize to
        // overlapping {amazon, web} and share the services/svcs synonym set.
        let table = SynonymTable::default();
        let s = scorer(&table);
        let weights = SimilarityWeights::default();
        let score = s
            .score("Amazon Web Svcs", "Amazon Web Services (AWS)", None, None, &weights)
            .unwrap();
        assert!(score.total >= 0.75, "total was {}", score.total);
    }

    #[test]
    fn test_generic_phrases_score_low_on_token_overlap() {
        // Long descriptive sentences sharing filler words must not overlap
        // like two short names sharing all tokens.
        let sentences = token_overlap(
            &normalize_name("calculates the total value of all regional sales data"),
            &normalize_name("calculates the total value of quarterly tax provisions"),
        );
        let names = token_overlap(&normalize_name("acme freight"), &normalize_name("acme freight"));
        assert!(sentences < 0.5);
        assert_eq!(names, 1.0);
    }

    #[test]
    fn test_structural_signal_counting() {
        let additive = ScoringContext {
            polarity: Some(Polarity::Additive),
            category: Some("revenue".into()),
            archetype: Some("Budget".into()),
        };
        let subtractive = ScoringContext {
            polarity: Some(Polarity::Subtractive),
            category: Some("revenue".into()),
            archetype: Some("Forecast".into()),
        };
        // Polarity differs; category matches; Budget and Forecast share the
        // finance archetype group.
        let score = structural_compatibility(Some(&additive), Some(&subtractive));
        assert!((score - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(structural_compatibility(None, None), 1.0);
        assert_eq!(
            structural_compatibility(Some(&additive), Some(&ScoringContext::default())),
            1.0
        );
    }

    #[test]
    fn test_total_is_weighted_sum() {
        let table = SynonymTable::empty();
        let s = scorer(&table);
        let weights = SimilarityWeights {
            lexical: 1.0,
            token_overlap: 0.0,
            synonym: 0.0,
            structural: 0.0,
        };
        let score = s.score("alpha bravo aaaa", "alpha bravo bbbb", None, None, &weights).unwrap();
        // 4 edits over 16 chars.
        assert_eq!(score.total, 0.75);
    }
}
