// src/models/linking.rs

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::models::core::RecordRef;
use crate::models::Record;

/// Stable cluster identity. Assigned from a monotonic counter at creation
/// and never reused; the surviving root after a union keeps the lower id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ClusterId(pub u64);

impl std::fmt::Display for ClusterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cluster_{}", self.0)
    }
}

/// Weights of the composite similarity sub-scores. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityWeights {
    pub lexical: f64,
    pub token_overlap: f64,
    pub synonym: f64,
    pub structural: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        SimilarityWeights {
            lexical: 0.40,
            token_overlap: 0.25,
            synonym: 0.25,
            structural: 0.10,
        }
    }
}

impl SimilarityWeights {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let sum = self.lexical + self.token_overlap + self.synonym + self.structural;
        if (sum - 1.0).abs() > 1e-9 {
            return Err(ConfigurationError::InvalidWeights { sum });
        }
        Ok(())
    }
}

/// Ephemeral value object: composite total plus the named sub-scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimilarityScore {
    pub total: f64,
    pub lexical: f64,
    pub token_overlap: f64,
    pub synonym: f64,
    pub structural: f64,
}

/// Sign convention of a magnitude attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polarity {
    Additive,
    Subtractive,
}

/// Structural signals surrounding an entity name. All optional; a signal is
/// only checked when both sides carry it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoringContext {
    pub polarity: Option<Polarity>,
    pub category: Option<String>,
    pub archetype: Option<String>,
}

/// Non-fatal diagnostic: a union was rejected because the merged cluster
/// would exceed the configured member cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterOverflow {
    pub cluster_a: ClusterId,
    pub cluster_b: ClusterId,
    pub attempted_size: usize,
    pub cap: usize,
}

/// Business domain inferred from a cluster's representative name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainTag {
    Revenue,
    Expense,
    Balance,
    Margin,
    Tax,
    Intercompany,
    Headcount,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    FormulaMismatch,
    SignReversal,
}

/// A conflict detected among the members of one cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityConflict {
    pub conflict_type: ConflictType,
    pub description: String,
    pub members: Vec<RecordRef>,
}

/// An equivalence class of records judged to denote the same entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityCluster {
    pub cluster_id: ClusterId,
    pub members: Vec<Record>,
    pub representative_name: String,
    pub domain_tag: DomainTag,
    pub conflicts: Vec<EntityConflict>,
}

/// Summary statistics for one linking run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkStats {
    pub record_count: usize,
    pub cluster_count: usize,
    pub link_count: usize,
    pub avg_cluster_size: f64,
    pub largest_cluster_size: usize,
    pub overflow_count: usize,
}

/// Complete output of an entity linking run. Clusters are sorted by id and
/// partition the full input record set (singletons included).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityMap {
    pub clusters: Vec<EntityCluster>,
    pub overflows: Vec<ClusterOverflow>,
    pub stats: LinkStats,
}

impl EntityMap {
    /// Look up a cluster by id.
    pub fn cluster(&self, id: ClusterId) -> Option<&EntityCluster> {
        self.clusters
            .binary_search_by_key(&id, |c| c.cluster_id)
            .ok()
            .map(|i| &self.clusters[i])
    }
}

/// One ranked hit from `EntityMap::find_entity`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityMatch {
    pub cluster_id: ClusterId,
    pub representative_name: String,
    pub score: f64,
}
