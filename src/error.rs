// src/error.rs

use thiserror::Error;

/// Fatal configuration problems. These fail fast and are never retried;
/// everything else the engine can surface (duplicate keys, rejected unions)
/// travels as a diagnostic inside the result instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("key column list must not be empty")]
    EmptyKeyColumns,

    #[error("column '{column}' not found in source '{source_id}'")]
    MissingColumn { column: String, source_id: String },

    #[error("similarity weights must sum to 1.0, got {sum}")]
    InvalidWeights { sum: f64 },

    #[error("link threshold must be within [0.0, 1.0], got {threshold}")]
    ThresholdOutOfRange { threshold: f64 },

    #[error("cluster member cap must be at least 1, got {cap}")]
    InvalidClusterCap { cap: usize },
}
