// src/models/mod.rs

pub mod core;
pub mod linking;

pub use self::core::{
    columns, DuplicateKeyWarning, FieldConflict, ReconciliationResult, Record, RecordRef,
};
pub use linking::{
    ClusterId, ClusterOverflow, ConflictType, DomainTag, EntityCluster, EntityConflict,
    EntityMap, EntityMatch, LinkStats, Polarity, ScoringContext, SimilarityScore,
    SimilarityWeights,
};
