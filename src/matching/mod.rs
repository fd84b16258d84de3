// src/matching/mod.rs

pub mod scorer;
pub mod synonyms;

pub use scorer::{lexical_similarity, structural_compatibility, token_overlap, Scorer};
pub use synonyms::SynonymTable;
