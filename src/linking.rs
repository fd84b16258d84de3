// src/linking.rs

//! Cross-file entity linking.
//!
//! Candidate pairs come from a blocking pass (shared token or shared
//! 4-char name prefix, cross-source only); each candidate is scored by the
//! composite scorer, and accepted pairs are merged through the cluster
//! builder. Scoring is side-effect free and runs in parallel; unions are
//! applied by a single sequential pass over candidates in a fixed global
//! order, so cluster assignments and ids reproduce exactly across runs.
//!
//! Blocking is a deliberate recall/runtime trade-off: two records sharing
//! no token and no prefix are never compared, even if a synonym set links
//! their names.

use std::collections::{BTreeSet, HashMap, HashSet};

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;

use crate::clustering::{self, ClusterBuilder, DEFAULT_CLUSTER_CAP};
use crate::error::ConfigurationError;
use crate::matching::{lexical_similarity, Scorer, SynonymTable};
use crate::models::{
    ConflictType, EntityCluster, EntityConflict, EntityMap, EntityMatch, LinkStats, Polarity,
    Record, RecordRef, ScoringContext, SimilarityWeights,
};
use crate::normalize::{blocking_prefix, normalize_name, tokenize};

/// Default minimum composite score for a pair to be linked. The boundary is
/// inclusive: a pair scoring exactly the threshold links.
pub const LINK_THRESHOLD: f64 = 0.75;

const MAX_CANDIDATES_PER_RECORD: usize = 50;
const MAX_TOTAL_CANDIDATE_PAIRS: usize = 100_000;

/// Spreadsheet cell references, collapsed to `REF` so formulas differing
/// only in ranges compare equal.
static CELL_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z]+\d+(?::[A-Z]+\d+)?").expect("cell-ref regex"));

/// Configuration for one linking run. All knobs are explicit parameters;
/// nothing is read from ambient state.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Column holding the entity name.
    pub name_column: String,
    pub weights: SimilarityWeights,
    pub threshold: f64,
    pub cluster_cap: usize,
    /// Column holding a formula/derivation expression, if sources carry one.
    pub formula_column: Option<String>,
    /// Magnitude column used for polarity signals and sign-reversal checks.
    pub amount_column: Option<String>,
    /// Account-type / category column for the structural sub-score.
    pub category_column: Option<String>,
    /// Source-archetype column for the structural sub-score.
    pub archetype_column: Option<String>,
    pub synonyms: SynonymTable,
    /// Blocking guards: candidate list cap per record and overall.
    pub max_candidates_per_record: usize,
    pub max_total_candidate_pairs: usize,
}

impl LinkConfig {
    pub fn new(name_column: impl Into<String>) -> Self {
        LinkConfig {
            name_column: name_column.into(),
            weights: SimilarityWeights::default(),
            threshold: LINK_THRESHOLD,
            cluster_cap: DEFAULT_CLUSTER_CAP,
            formula_column: None,
            amount_column: None,
            category_column: None,
            archetype_column: None,
            synonyms: SynonymTable::default(),
            max_candidates_per_record: MAX_CANDIDATES_PER_RECORD,
            max_total_candidate_pairs: MAX_TOTAL_CANDIDATE_PAIRS,
        }
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        self.weights.validate()?;
        if !(0.0..=1.0).contains(&self.threshold) || self.threshold.is_nan() {
            return Err(ConfigurationError::ThresholdOutOfRange {
                threshold: self.threshold,
            });
        }
        if self.cluster_cap == 0 {
            return Err(ConfigurationError::InvalidClusterCap { cap: 0 });
        }
        Ok(())
    }
}

/// One flattened record slot with everything the scorer and blocker need.
struct LinkEntry {
    source_idx: usize,
    name: String,
    normalized: String,
    tokens: HashSet<String>,
    context: ScoringContext,
}

/// Link records that denote the same entity across two or more collections
/// into disjoint clusters.
pub fn link_entities(
    collections: &[Vec<Record>],
    config: &LinkConfig,
) -> Result<EntityMap, ConfigurationError> {
    config.validate()?;

    let record_count: usize = collections.iter().map(Vec::len).sum();
    info!(
        "linking {} records across {} sources (threshold {})",
        record_count,
        collections.len(),
        config.threshold
    );

    let (entries, records) = flatten(collections, config);
    let mut builder = ClusterBuilder::new(config.cluster_cap)?;
    for _ in 0..entries.len() {
        builder.add();
    }

    let candidates = candidate_pairs(&entries, config);
    debug!("{} candidate pairs after blocking", candidates.len());

    // Score phase: parallel and side-effect free.
    let scorer = Scorer::new(&config.synonyms);
    let scored: Vec<(usize, usize, f64)> = candidates
        .par_iter()
        .map(|&(i, j)| {
            scorer
                .score(
                    &entries[i].name,
                    &entries[j].name,
                    Some(&entries[i].context),
                    Some(&entries[j].context),
                    &config.weights,
                )
                .map(|score| (i, j, score.total))
        })
        .collect::<Result<_, _>>()?;

    // Apply phase: strictly sequential, candidates already in ascending
    // (slot_a, slot_b) order regardless of which worker scored them.
    let mut link_count = 0usize;
    for (i, j, total) in scored {
        if total >= config.threshold {
            builder.union(i, j);
            link_count += 1;
        }
    }

    let partition = builder.partition();
    let overflows = builder.into_overflows();

    let mut clusters = Vec::with_capacity(partition.len());
    let mut largest = 0usize;
    for (cluster_id, slots) in partition {
        let members: Vec<Record> = slots.iter().map(|&s| records[s].clone()).collect();
        largest = largest.max(members.len());
        let representative =
            clustering::representative_name(slots.iter().map(|&s| entries[s].name.as_str()));
        let domain_tag = clustering::infer_domain(&representative);
        let conflicts = detect_conflicts(&members, config);
        clusters.push(EntityCluster {
            cluster_id,
            members,
            representative_name: representative,
            domain_tag,
            conflicts,
        });
    }

    let cluster_count = clusters.len();
    let conflict_count: usize = clusters.iter().map(|c| c.conflicts.len()).sum();
    let stats = LinkStats {
        record_count,
        cluster_count,
        link_count,
        avg_cluster_size: if cluster_count == 0 {
            0.0
        } else {
            record_count as f64 / cluster_count as f64
        },
        largest_cluster_size: largest,
        overflow_count: overflows.len(),
    };

    info!(
        "entity linking complete: {} clusters, {} links, {} conflicts, {} overflow rejections",
        cluster_count,
        link_count,
        conflict_count,
        overflows.len()
    );

    Ok(EntityMap {
        clusters,
        overflows,
        stats,
    })
}

impl EntityMap {
    /// Linear fuzzy search over representative names using the lexical
    /// sub-score only. Returns up to `top_k` clusters, best first; equal
    /// scores rank the smaller cluster id first.
    pub fn find_entity(&self, query: &str, top_k: usize) -> Vec<EntityMatch> {
        let norm_query = normalize_name(query);
        let mut hits: Vec<EntityMatch> = self
            .clusters
            .iter()
            .map(|c| EntityMatch {
                cluster_id: c.cluster_id,
                representative_name: c.representative_name.clone(),
                score: lexical_similarity(&norm_query, &normalize_name(&c.representative_name)),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cluster_id.cmp(&b.cluster_id))
        });
        hits.truncate(top_k);
        hits
    }
}

/// Flatten collections into slot order (collection order, then row order)
/// and precompute per-record scoring inputs.
fn flatten<'a>(
    collections: &'a [Vec<Record>],
    config: &LinkConfig,
) -> (Vec<LinkEntry>, Vec<&'a Record>) {
    let mut entries = Vec::new();
    let mut records = Vec::new();
    for (source_idx, collection) in collections.iter().enumerate() {
        let mut named = 0usize;
        for record in collection {
            let name = display_name(record, &config.name_column);
            if !name.is_empty() {
                named += 1;
            }
            let normalized = normalize_name(&name);
            entries.push(LinkEntry {
                source_idx,
                tokens: tokenize(&normalized),
                context: scoring_context(record, config),
                name,
                normalized,
            });
            records.push(record);
        }
        if named == 0 && !collection.is_empty() {
            warn!(
                "source {} has no values in name column '{}'; its records will stay singletons",
                source_idx, config.name_column
            );
        }
    }
    (entries, records)
}

fn display_name(record: &Record, name_column: &str) -> String {
    match record.raw_field(name_column) {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn scoring_context(record: &Record, config: &LinkConfig) -> ScoringContext {
    let polarity = config.amount_column.as_deref().and_then(|col| {
        record
            .canonical_field(col)
            .parse::<f64>()
            .ok()
            .map(|amount| {
                if amount < 0.0 {
                    Polarity::Subtractive
                } else {
                    Polarity::Additive
                }
            })
    });
    let text_signal = |column: &Option<String>| {
        column.as_deref().and_then(|col| {
            let value = record.canonical_field(col);
            if value.is_empty() {
                None
            } else {
                Some(value)
            }
        })
    };
    ScoringContext {
        polarity,
        category: text_signal(&config.category_column),
        archetype: text_signal(&config.archetype_column),
    }
}

/// Blocking: candidate pairs share at least one token or the same 4-char
/// normalized prefix, and always span two different sources. Per-record
/// candidate lists keep the highest-overlap partners first; both caps are
/// hard limits.
fn candidate_pairs(entries: &[LinkEntry], config: &LinkConfig) -> Vec<(usize, usize)> {
    let mut token_index: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut prefix_index: HashMap<String, Vec<usize>> = HashMap::new();
    for (slot, entry) in entries.iter().enumerate() {
        for token in &entry.tokens {
            token_index.entry(token).or_default().push(slot);
        }
        if let Some(prefix) = blocking_prefix(&entry.normalized) {
            prefix_index.entry(prefix).or_default().push(slot);
        }
    }

    let mut pairs: BTreeSet<(usize, usize)> = BTreeSet::new();
    'outer: for (slot, entry) in entries.iter().enumerate() {
        let mut overlap: HashMap<usize, usize> = HashMap::new();
        for token in &entry.tokens {
            if let Some(slots) = token_index.get(token.as_str()) {
                for &other in slots {
                    if other != slot && entries[other].source_idx != entry.source_idx {
                        *overlap.entry(other).or_insert(0) += 1;
                    }
                }
            }
        }
        if let Some(prefix) = blocking_prefix(&entry.normalized) {
            if let Some(slots) = prefix_index.get(&prefix) {
                for &other in slots {
                    if other != slot && entries[other].source_idx != entry.source_idx {
                        *overlap.entry(other).or_insert(0) += 1;
                    }
                }
            }
        }

        let mut ranked: Vec<(usize, usize)> = overlap.into_iter().collect();
        ranked.sort_by(|(slot_a, count_a), (slot_b, count_b)| {
            count_b.cmp(count_a).then(slot_a.cmp(slot_b))
        });
        for (other, _) in ranked.into_iter().take(config.max_candidates_per_record) {
            let pair = (slot.min(other), slot.max(other));
            pairs.insert(pair);
            if pairs.len() >= config.max_total_candidate_pairs {
                info!(
                    "candidate pair cap {} reached; truncating blocking pass",
                    config.max_total_candidate_pairs
                );
                break 'outer;
            }
        }
    }

    pairs.into_iter().collect()
}

/// Post-clustering conflict detection over each multi-member cluster.
fn detect_conflicts(members: &[Record], config: &LinkConfig) -> Vec<EntityConflict> {
    let mut conflicts = Vec::new();
    if members.len() < 2 {
        return conflicts;
    }

    if let Some(formula_column) = config.formula_column.as_deref() {
        let with_formula: Vec<(&Record, String)> = members
            .iter()
            .filter_map(|m| {
                let formula = display_name(m, formula_column);
                if formula.is_empty() {
                    None
                } else {
                    Some((m, formula))
                }
            })
            .collect();
        let patterns: BTreeSet<String> = with_formula
            .iter()
            .map(|(_, f)| CELL_REF.replace_all(f, "REF").into_owned())
            .collect();
        if patterns.len() > 1 {
            conflicts.push(EntityConflict {
                conflict_type: ConflictType::FormulaMismatch,
                description: format!(
                    "{} distinct formula patterns across members",
                    patterns.len()
                ),
                members: with_formula.iter().map(|(m, _)| RecordRef::of(m)).collect(),
            });
        }
    }

    if let Some(amount_column) = config.amount_column.as_deref() {
        let amounts: Vec<f64> = members
            .iter()
            .filter_map(|m| m.canonical_field(amount_column).parse::<f64>().ok())
            .collect();
        let has_positive = amounts.iter().any(|&a| a > 0.0);
        let has_negative = amounts.iter().any(|&a| a < 0.0);
        if has_positive && has_negative {
            conflicts.push(EntityConflict {
                conflict_type: ConflictType::SignReversal,
                description:
                    "members disagree on polarity: some magnitudes are positive, some negative"
                        .to_string(),
                members: members.iter().map(RecordRef::of).collect(),
            });
        }
    }

    conflicts
}
