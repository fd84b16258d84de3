// src/models/core.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::normalize::canonical_value;
use crate::signature;

/// One normalized row from any source file. Constructed once by the
/// ingestion collaborator, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Identifier of the originating file/table.
    pub source_id: String,
    /// Position within the source, zero-based.
    pub row_index: usize,
    /// Declared key columns in declaration order, values normalized.
    pub key_fields: Vec<(String, String)>,
    /// Every other column, raw values retained for audit.
    pub attributes: BTreeMap<String, Value>,
    /// Content hash of the normalized key fields (or full attributes when
    /// no keys are declared). Pure function of normalized content.
    pub fingerprint: String,
}

impl Record {
    /// Build a record from a parsed row. Columns named in `key_columns` are
    /// split out as normalized key fields; a key column missing from the row
    /// degrades to an empty value rather than failing (one malformed row
    /// must not abort a large reconciliation).
    pub fn new(
        source_id: impl Into<String>,
        row_index: usize,
        key_columns: &[String],
        mut columns: BTreeMap<String, Value>,
    ) -> Self {
        let mut key_fields = Vec::with_capacity(key_columns.len());
        for key in key_columns {
            let value = columns
                .remove(key)
                .map(|v| canonical_value(&v))
                .unwrap_or_default();
            key_fields.push((key.clone(), value));
        }

        let fingerprint = signature::fingerprint(&key_fields, &columns);
        Record {
            source_id: source_id.into(),
            row_index,
            key_fields,
            attributes: columns,
            fingerprint,
        }
    }

    /// Normalized composite key for the given columns, drawn from declared
    /// key fields first, then attributes. Missing columns contribute an
    /// empty segment.
    pub fn composite_key(&self, key_columns: &[String]) -> String {
        key_columns
            .iter()
            .map(|col| {
                if let Some((_, v)) = self.key_fields.iter().find(|(name, _)| name == col) {
                    v.clone()
                } else {
                    self.attributes
                        .get(col)
                        .map(|v| canonical_value(v))
                        .unwrap_or_default()
                }
            })
            .collect::<Vec<_>>()
            .join("|")
    }

    /// Canonical (normalized) text for one column, empty when absent.
    pub fn canonical_field(&self, column: &str) -> String {
        if let Some((_, v)) = self.key_fields.iter().find(|(name, _)| name == column) {
            return v.clone();
        }
        self.attributes
            .get(column)
            .map(|v| canonical_value(v))
            .unwrap_or_default()
    }

    /// Raw attribute value for one column, `Null` when absent.
    pub fn raw_field(&self, column: &str) -> Value {
        if let Some((_, v)) = self.key_fields.iter().find(|(name, _)| name == column) {
            return Value::String(v.clone());
        }
        self.attributes.get(column).cloned().unwrap_or(Value::Null)
    }

    /// True when the column appears among this record's key fields or
    /// attributes.
    pub fn has_column(&self, column: &str) -> bool {
        self.key_fields.iter().any(|(name, _)| name == column)
            || self.attributes.contains_key(column)
    }
}

/// Lightweight record address used in diagnostics and conflict annotations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordRef {
    pub source_id: String,
    pub row_index: usize,
}

impl RecordRef {
    pub fn of(record: &Record) -> Self {
        RecordRef {
            source_id: record.source_id.clone(),
            row_index: record.row_index,
        }
    }
}

/// Key-matched pair whose designated comparison column differs. Raw values
/// are retained for audit; `similarity` ranks how far apart they are.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldConflict {
    pub record_a: Record,
    pub record_b: Record,
    pub field: String,
    pub value_a: Value,
    pub value_b: Value,
    pub similarity: f64,
}

/// Structured diagnostic, not an error: one side carried more than one
/// record under the same composite key. Surplus records past the first
/// pairing become orphans, and this tells callers why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateKeyWarning {
    pub source_id: String,
    pub key: String,
    pub count: usize,
}

/// Output of comparing two record collections. Every input record lands in
/// exactly one of matched / conflicts / orphans — partition, no omission,
/// no double-count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationResult {
    pub matched: Vec<(Record, Record)>,
    pub conflicts: Vec<FieldConflict>,
    pub orphans_a: Vec<Record>,
    pub orphans_b: Vec<Record>,
    pub duplicate_keys: Vec<DuplicateKeyWarning>,
    /// (matched + conflicts) / max(|A|, |B|) * 100, two-decimal rounding.
    /// 100.0 when both sides are empty, 0.0 when exactly one is.
    pub match_rate_percent: f64,
}

impl ReconciliationResult {
    /// Count of A-side records across all buckets; the partition property
    /// says this equals the input size of A.
    pub fn total_a(&self) -> usize {
        self.matched.len() + self.conflicts.len() + self.orphans_a.len()
    }

    /// Count of B-side records across all buckets.
    pub fn total_b(&self) -> usize {
        self.matched.len() + self.conflicts.len() + self.orphans_b.len()
    }
}

/// Helper for ingestion collaborators and tests: build an attribute map
/// from column/value pairs.
pub fn columns(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
