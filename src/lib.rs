// src/lib.rs

//! Entity resolution and reconciliation over heterogeneous business data
//! files.
//!
//! Two complementary engines share one record model:
//!
//! - [`reconcile::reconcile`] — deterministic key-based comparison of two
//!   record collections into matches, field conflicts and orphans, with
//!   duplicate-key diagnostics and a match-rate summary.
//! - [`linking::link_entities`] — probabilistic cross-file linking: blocked
//!   candidate generation, composite similarity scoring (lexical, token
//!   overlap, synonym, structural) and union-find clustering into an
//!   [`models::EntityMap`] with conflict annotations and fuzzy lookup.
//!
//! Both engines are pure functions of their inputs. Given the same records
//! and configuration they produce byte-identical serialized output; there
//! is no I/O, no clock and no randomness anywhere in the crate.

pub mod clustering;
pub mod error;
pub mod linking;
pub mod matching;
pub mod models;
pub mod normalize;
pub mod reconcile;
pub mod signature;

pub use error::ConfigurationError;
pub use linking::{link_entities, LinkConfig, LINK_THRESHOLD};
pub use matching::{Scorer, SynonymTable};
pub use models::{
    ClusterId, EntityCluster, EntityMap, EntityMatch, Record, ReconciliationResult,
    SimilarityScore, SimilarityWeights,
};
pub use reconcile::reconcile;
