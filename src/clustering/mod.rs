// src/clustering/mod.rs

//! Disjoint-set clustering over record slots.
//!
//! An arena union-find (parent/size vectors, iterative path compression,
//! union by size) keeps merges O(1) amortized and avoids cyclic object
//! graphs. Cluster ids come from a monotonic counter at slot registration
//! and never change across merges: the surviving root keeps the lower id,
//! so external references stay stable for the whole run.

use log::warn;

use crate::error::ConfigurationError;
use crate::models::{ClusterId, ClusterOverflow, DomainTag};
use crate::normalize::normalize_name;

/// Default cap on cluster membership. A union that would grow past this is
/// rejected, which stops a generic name from swallowing unrelated entities.
pub const DEFAULT_CLUSTER_CAP: usize = 100;

/// Keyword lists for domain inference over a cluster's representative name.
const DOMAIN_KEYWORDS: [(DomainTag, &[&str]); 7] = [
    (DomainTag::Revenue, &["revenue", "sales", "income", "turnover"]),
    (DomainTag::Expense, &["expense", "cost", "spend", "opex", "cogs", "overhead"]),
    (DomainTag::Balance, &["balance", "asset", "liability", "equity"]),
    (DomainTag::Margin, &["margin", "ebitda", "profit"]),
    (DomainTag::Tax, &["tax", "vat", "gst", "withholding"]),
    (DomainTag::Intercompany, &["interco", "intercompany", "elimination", "consolidation"]),
    (DomainTag::Headcount, &["headcount", "fte", "employee", "personnel", "salary", "wage"]),
];

pub struct ClusterBuilder {
    parent: Vec<usize>,
    size: Vec<usize>,
    // Per-slot cluster id; authoritative only at roots.
    cluster_id: Vec<u64>,
    cap: usize,
    overflows: Vec<ClusterOverflow>,
}

impl ClusterBuilder {
    pub fn new(cap: usize) -> Result<Self, ConfigurationError> {
        if cap == 0 {
            return Err(ConfigurationError::InvalidClusterCap { cap });
        }
        Ok(ClusterBuilder {
            parent: Vec::new(),
            size: Vec::new(),
            cluster_id: Vec::new(),
            cap,
            overflows: Vec::new(),
        })
    }

    /// Register a record slot as its own singleton cluster and return its
    /// id. Ids are assigned in registration order.
    pub fn add(&mut self) -> ClusterId {
        let slot = self.parent.len();
        self.parent.push(slot);
        self.size.push(1);
        self.cluster_id.push(slot as u64);
        ClusterId(slot as u64)
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Current cluster id of a slot.
    pub fn find(&mut self, slot: usize) -> ClusterId {
        let root = self.root(slot);
        ClusterId(self.cluster_id[root])
    }

    /// Merge the clusters of two slots. Idempotent: re-unioning slots that
    /// already share a cluster is a no-op returning the existing id. A merge
    /// that would exceed the member cap is rejected and recorded as a
    /// `ClusterOverflow`; the returned id is then `a`'s current cluster.
    pub fn union(&mut self, a: usize, b: usize) -> ClusterId {
        let root_a = self.root(a);
        let root_b = self.root(b);
        if root_a == root_b {
            return ClusterId(self.cluster_id[root_a]);
        }

        let merged_size = self.size[root_a] + self.size[root_b];
        if merged_size > self.cap {
            let overflow = ClusterOverflow {
                cluster_a: ClusterId(self.cluster_id[root_a]),
                cluster_b: ClusterId(self.cluster_id[root_b]),
                attempted_size: merged_size,
                cap: self.cap,
            };
            warn!(
                "rejected union of {} and {}: {} members would exceed cap {}",
                overflow.cluster_a, overflow.cluster_b, merged_size, self.cap
            );
            self.overflows.push(overflow);
            return ClusterId(self.cluster_id[root_a]);
        }

        // Union by size; equal sizes break toward the earlier-created root
        // so merge outcomes never depend on argument order.
        let (winner, loser) = if self.size[root_a] > self.size[root_b]
            || (self.size[root_a] == self.size[root_b]
                && self.cluster_id[root_a] < self.cluster_id[root_b])
        {
            (root_a, root_b)
        } else {
            (root_b, root_a)
        };

        self.parent[loser] = winner;
        self.size[winner] = merged_size;
        // The surviving cluster keeps the lower-numbered id.
        self.cluster_id[winner] = self.cluster_id[winner].min(self.cluster_id[loser]);
        ClusterId(self.cluster_id[winner])
    }

    /// Full partition: cluster id → member slots in ascending order. Every
    /// registered slot appears exactly once, singletons included.
    pub fn partition(&mut self) -> Vec<(ClusterId, Vec<usize>)> {
        let mut groups: std::collections::BTreeMap<ClusterId, Vec<usize>> =
            std::collections::BTreeMap::new();
        for slot in 0..self.parent.len() {
            let id = self.find(slot);
            groups.entry(id).or_default().push(slot);
        }
        groups.into_iter().collect()
    }

    /// Unions rejected by the member cap, in occurrence order.
    pub fn overflows(&self) -> &[ClusterOverflow] {
        &self.overflows
    }

    pub fn into_overflows(self) -> Vec<ClusterOverflow> {
        self.overflows
    }

    fn root(&mut self, slot: usize) -> usize {
        let mut r = slot;
        while self.parent[r] != r {
            r = self.parent[r];
        }
        // Path compression, second pass.
        let mut cur = slot;
        while self.parent[cur] != r {
            let next = self.parent[cur];
            self.parent[cur] = r;
            cur = next;
        }
        r
    }
}

/// Deterministic representative: the most frequent non-empty name, ties
/// broken by shortest string then lexicographic order.
pub fn representative_name<'a, I>(names: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for name in names {
        if !name.is_empty() {
            *counts.entry(name).or_insert(0) += 1;
        }
    }
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|(name_a, count_a), (name_b, count_b)| {
        count_b
            .cmp(count_a)
            .then(name_a.len().cmp(&name_b.len()))
            .then(name_a.cmp(name_b))
    });
    ranked.first().map(|(name, _)| name.to_string()).unwrap_or_default()
}

/// Infer a business domain from representative-name keyword matches. Ties
/// resolve to the earlier entry in the keyword table; no match is `Unknown`.
pub fn infer_domain(representative: &str) -> DomainTag {
    let text = normalize_name(representative);
    let mut best = DomainTag::Unknown;
    let mut best_hits = 0usize;
    for (tag, keywords) in DOMAIN_KEYWORDS {
        let hits = keywords.iter().filter(|kw| text.contains(*kw)).count();
        if hits > best_hits {
            best = tag;
            best_hits = hits;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_is_idempotent() {
        let mut builder = ClusterBuilder::new(100).unwrap();
        assert!(builder.is_empty());
        let a = builder.add();
        let _b = builder.add();
        assert_eq!(builder.len(), 2);
        let first = builder.union(0, 1);
        let second = builder.union(0, 1);
        assert_eq!(first, second);
        assert_eq!(first, a);
        assert_eq!(builder.partition().len(), 1);
    }

    #[test]
    fn test_surviving_root_keeps_lower_id() {
        let mut builder = ClusterBuilder::new(100).unwrap();
        for _ in 0..4 {
            builder.add();
        }
        // Grow {2,3} first so it wins the size comparison against {0}.
        builder.union(2, 3);
        let id = builder.union(3, 0);
        assert_eq!(id, ClusterId(0));
        assert_eq!(builder.find(2), ClusterId(0));
    }

    #[test]
    fn test_transitive_union() {
        let mut builder = ClusterBuilder::new(100).unwrap();
        for _ in 0..3 {
            builder.add();
        }
        builder.union(0, 1);
        builder.union(1, 2);
        assert_eq!(builder.find(0), builder.find(2));
        assert_eq!(builder.partition().len(), 1);
    }

    #[test]
    fn test_oversized_union_rejected() {
        let mut builder = ClusterBuilder::new(2).unwrap();
        for _ in 0..3 {
            builder.add();
        }
        builder.union(0, 1);
        let id = builder.union(0, 2);
        // Rejected: slot 2 stays a singleton, diagnostic recorded.
        assert_eq!(id, ClusterId(0));
        assert_eq!(builder.find(2), ClusterId(2));
        assert_eq!(builder.overflows().len(), 1);
        assert_eq!(builder.overflows()[0].attempted_size, 3);
        assert_eq!(builder.partition().len(), 2);
    }

    #[test]
    fn test_zero_cap_is_configuration_error() {
        assert!(matches!(
            ClusterBuilder::new(0),
            Err(ConfigurationError::InvalidClusterCap { cap: 0 })
        ));
    }

    #[test]
    fn test_representative_name_tie_breaks() {
        // Frequency first.
        let name = representative_name(["Acme Corp", "Acme Corp", "ACME Corporation"]);
        assert_eq!(name, "Acme Corp");
        // Then shortest, then lexicographic.
        assert_eq!(representative_name(["bbb", "aa", "cc"]), "aa");
        assert_eq!(representative_name(["bb", "aa"]), "aa");
        assert_eq!(representative_name(["", ""]), "");
    }

    #[test]
    fn test_domain_inference() {
        assert_eq!(infer_domain("Net Sales Q3"), DomainTag::Revenue);
        assert_eq!(infer_domain("Payroll headcount FTE"), DomainTag::Headcount);
        assert_eq!(infer_domain("Intercompany elimination"), DomainTag::Intercompany);
        assert_eq!(infer_domain("Amazon Web Services"), DomainTag::Unknown);
    }
}
