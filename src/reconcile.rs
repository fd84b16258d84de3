// src/reconcile.rs

//! Fingerprint reconciler: deterministic set comparison between two record
//! collections. Records are indexed by a content hash of their normalized
//! key values; key-matched pairs are compared on one designated column and
//! land in `matched` or `conflicts`, everything else becomes an orphan.

use std::collections::{BTreeMap, HashMap};

use log::{debug, info};
use strsim::normalized_levenshtein;

use crate::error::ConfigurationError;
use crate::models::{
    DuplicateKeyWarning, FieldConflict, ReconciliationResult, Record,
};
use crate::normalize::values_equal;
use crate::signature;

/// Compare two record collections by composite key.
///
/// `key_columns` must be non-empty and present in the schema (the union of
/// column names) of each non-empty side, as must `compare_column`. Records
/// sharing a key on one side are paired first-available in input order;
/// surplus records become orphans and raise a `DuplicateKeyWarning`.
///
/// Deterministic: the same two collections in the same order always produce
/// an identical result.
pub fn reconcile(
    records_a: &[Record],
    records_b: &[Record],
    key_columns: &[String],
    compare_column: &str,
) -> Result<ReconciliationResult, ConfigurationError> {
    if key_columns.is_empty() {
        return Err(ConfigurationError::EmptyKeyColumns);
    }
    validate_schema(records_a, key_columns, compare_column)?;
    validate_schema(records_b, key_columns, compare_column)?;

    let (index_a, order_a) = index_by_key(records_a, key_columns);
    let (index_b, order_b) = index_by_key(records_b, key_columns);

    let mut matched = Vec::new();
    let mut conflicts = Vec::new();
    let mut orphans_a = Vec::new();
    let mut orphans_b = Vec::new();
    let mut duplicate_keys = Vec::new();

    // Keys in A-side first-appearance order, then B-only keys in B order.
    for key in &order_a {
        let list_a = &index_a[key];
        let empty = Vec::new();
        let list_b = index_b.get(key).unwrap_or(&empty);

        let paired = list_a.len().min(list_b.len());
        for i in 0..paired {
            let rec_a = &records_a[list_a[i]];
            let rec_b = &records_b[list_b[i]];
            let val_a = rec_a.canonical_field(compare_column);
            let val_b = rec_b.canonical_field(compare_column);
            if values_equal(&val_a, &val_b) {
                matched.push((rec_a.clone(), rec_b.clone()));
            } else {
                conflicts.push(FieldConflict {
                    record_a: rec_a.clone(),
                    record_b: rec_b.clone(),
                    field: compare_column.to_string(),
                    value_a: rec_a.raw_field(compare_column),
                    value_b: rec_b.raw_field(compare_column),
                    similarity: normalized_levenshtein(&val_a, &val_b),
                });
            }
        }
        for &idx in &list_a[paired..] {
            orphans_a.push(records_a[idx].clone());
        }
        for &idx in &list_b[paired..] {
            orphans_b.push(records_b[idx].clone());
        }

        if list_a.len() > 1 {
            duplicate_keys.push(duplicate_warning(records_a, list_a, key_columns));
        }
        if list_b.len() > 1 {
            duplicate_keys.push(duplicate_warning(records_b, list_b, key_columns));
        }
    }

    for key in &order_b {
        if index_a.contains_key(key) {
            continue;
        }
        let list_b = &index_b[key];
        for &idx in list_b {
            orphans_b.push(records_b[idx].clone());
        }
        if list_b.len() > 1 {
            duplicate_keys.push(duplicate_warning(records_b, list_b, key_columns));
        }
    }

    let match_rate_percent =
        match_rate(matched.len() + conflicts.len(), records_a.len(), records_b.len());

    info!(
        "reconcile complete: {} matched, {} conflicts, {}/{} orphans, rate {:.2}%",
        matched.len(),
        conflicts.len(),
        orphans_a.len(),
        orphans_b.len(),
        match_rate_percent
    );
    if !duplicate_keys.is_empty() {
        debug!("{} duplicate-key warnings raised", duplicate_keys.len());
    }

    Ok(ReconciliationResult {
        matched,
        conflicts,
        orphans_a,
        orphans_b,
        duplicate_keys,
        match_rate_percent,
    })
}

/// (matched + conflicts) over max(|A|, |B|), as a two-decimal percentage.
/// Defined as 100 when both sides are empty.
fn match_rate(key_matched: usize, len_a: usize, len_b: usize) -> f64 {
    let denominator = len_a.max(len_b);
    if denominator == 0 {
        return 100.0;
    }
    let rate = key_matched as f64 / denominator as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}

fn validate_schema(
    records: &[Record],
    key_columns: &[String],
    compare_column: &str,
) -> Result<(), ConfigurationError> {
    // An empty side has no schema to validate; it is the documented
    // degenerate case, not a configuration problem.
    if records.is_empty() {
        return Ok(());
    }
    let source_id = records[0].source_id.clone();
    for column in key_columns.iter().map(String::as_str).chain([compare_column]) {
        if !records.iter().any(|r| r.has_column(column)) {
            return Err(ConfigurationError::MissingColumn {
                column: column.to_string(),
                source_id,
            });
        }
    }
    Ok(())
}

/// Content-hash index: fingerprint of the normalized key values → record
/// positions in stable input order. Also returns keys in first-appearance
/// order so output never depends on hash iteration.
fn index_by_key(
    records: &[Record],
    key_columns: &[String],
) -> (HashMap<String, Vec<usize>>, Vec<String>) {
    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    let mut order = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        let key_pairs: Vec<(String, String)> = key_columns
            .iter()
            .map(|col| (col.clone(), record.canonical_field(col)))
            .collect();
        let key = signature::fingerprint(&key_pairs, &BTreeMap::new());
        let slot = index.entry(key.clone()).or_default();
        if slot.is_empty() {
            order.push(key);
        }
        slot.push(idx);
    }
    (index, order)
}

fn duplicate_warning(
    records: &[Record],
    indices: &[usize],
    key_columns: &[String],
) -> DuplicateKeyWarning {
    let first = &records[indices[0]];
    DuplicateKeyWarning {
        source_id: first.source_id.clone(),
        key: first.composite_key(key_columns),
        count: indices.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::columns;
    use serde_json::json;

    fn keyed(source: &str, idx: usize, id: &str, amount: f64) -> Record {
        Record::new(
            source,
            idx,
            &[],
            columns(&[("txn_id", json!(id)), ("amount", json!(amount))]),
        )
    }

    fn key_cols() -> Vec<String> {
        vec!["txn_id".to_string()]
    }

    #[test]
    fn test_partition_property() {
        let a: Vec<Record> = (0..10).map(|i| keyed("a", i, &format!("T{i}"), i as f64)).collect();
        let b: Vec<Record> = (3..12)
            .map(|i| keyed("b", i - 3, &format!("T{i}"), (i as f64) * 2.0))
            .collect();
        let result = reconcile(&a, &b, &key_cols(), "amount").unwrap();
        assert_eq!(result.total_a(), a.len());
        assert_eq!(result.total_b(), b.len());
    }

    #[test]
    fn test_orphans_and_match_rate() {
        // 1200 rows in A, 1195 in B; 1195 keys match with identical amounts.
        let a: Vec<Record> = (0..1200).map(|i| keyed("a", i, &format!("T{i}"), 10.0)).collect();
        let b: Vec<Record> = (0..1195).map(|i| keyed("b", i, &format!("T{i}"), 10.0)).collect();
        let result = reconcile(&a, &b, &key_cols(), "amount").unwrap();
        assert_eq!(result.matched.len(), 1195);
        assert_eq!(result.orphans_a.len(), 5);
        assert!(result.orphans_b.is_empty());
        assert_eq!(result.match_rate_percent, 99.58);
    }

    #[test]
    fn test_conflicts_and_cross_system_orphans() {
        // CRM rows vs ERP rows: 200 CRM rows unbilled (no ERP counterpart),
        // 50 key-matched rows disagree on amount.
        let a: Vec<Record> = (0..1000).map(|i| keyed("crm", i, &format!("D{i}"), 100.0)).collect();
        let b: Vec<Record> = (0..800)
            .map(|i| {
                let amount = if i < 50 { 90.0 } else { 100.0 };
                keyed("erp", i, &format!("D{i}"), amount)
            })
            .collect();
        let result = reconcile(&a, &b, &key_cols(), "amount").unwrap();
        assert_eq!(result.orphans_a.len(), 200);
        assert_eq!(result.conflicts.len(), 50);
        assert_eq!(result.matched.len(), 750);
        assert_eq!(result.total_b(), 800);
    }

    #[test]
    fn test_duplicate_keys_become_flagged_orphans() {
        let a = vec![
            keyed("a", 0, "T1", 10.0),
            keyed("a", 1, "T1", 11.0),
            keyed("a", 2, "T1", 12.0),
        ];
        let b = vec![keyed("b", 0, "T1", 10.0)];
        let result = reconcile(&a, &b, &key_cols(), "amount").unwrap();
        // First-available pairing: row 0 matches, rows 1 and 2 are orphans.
        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.matched[0].0.row_index, 0);
        assert_eq!(result.orphans_a.len(), 2);
        assert_eq!(result.duplicate_keys.len(), 1);
        assert_eq!(result.duplicate_keys[0].count, 3);
        assert_eq!(result.duplicate_keys[0].key, "t1");
    }

    #[test]
    fn test_duplicate_keys_on_both_sides() {
        let a = vec![
            keyed("a", 0, "T1", 10.0),
            keyed("a", 1, "T1", 11.0),
            keyed("a", 2, "T1", 12.0),
        ];
        let b = vec![keyed("b", 0, "T1", 10.0), keyed("b", 1, "T1", 11.0)];
        let result = reconcile(&a, &b, &key_cols(), "amount").unwrap();
        // Rows pair first-available in input order: (a0, b0) and (a1, b1).
        assert_eq!(result.matched.len(), 2);
        assert_eq!(result.orphans_a.len(), 1);
        assert_eq!(result.orphans_a[0].row_index, 2);
        assert!(result.orphans_b.is_empty());
        // Each side raises its own warning for the shared key.
        assert_eq!(result.duplicate_keys.len(), 2);
        assert_eq!(result.duplicate_keys[0].source_id, "a");
        assert_eq!(result.duplicate_keys[0].count, 3);
        assert_eq!(result.duplicate_keys[1].source_id, "b");
        assert_eq!(result.duplicate_keys[1].count, 2);
        assert_eq!(result.total_a(), 3);
        assert_eq!(result.total_b(), 2);
    }

    #[test]
    fn test_numeric_tolerance() {
        let a = vec![keyed("a", 0, "T1", 100.0)];
        let b = vec![keyed("b", 0, "T1", 100.0000001)];
        let result = reconcile(&a, &b, &key_cols(), "amount").unwrap();
        assert_eq!(result.matched.len(), 1);
        assert!(result.conflicts.is_empty());
    }

    #[test]
    fn test_conflict_retains_raw_values() {
        let a = vec![keyed("a", 0, "T1", 100.0)];
        let b = vec![keyed("b", 0, "T1", 250.0)];
        let result = reconcile(&a, &b, &key_cols(), "amount").unwrap();
        assert_eq!(result.conflicts.len(), 1);
        let conflict = &result.conflicts[0];
        assert_eq!(conflict.field, "amount");
        assert_eq!(conflict.value_a, json!(100.0));
        assert_eq!(conflict.value_b, json!(250.0));
        assert!(conflict.similarity < 1.0);
    }

    #[test]
    fn test_missing_key_column_is_configuration_error() {
        let a = vec![keyed("a", 0, "T1", 1.0)];
        let b = vec![keyed("b", 0, "T1", 1.0)];
        let err = reconcile(&a, &b, &[String::from("nope")], "amount").unwrap_err();
        assert!(matches!(
            &err,
            ConfigurationError::MissingColumn { column, source_id }
                if column == "nope" && source_id == "a"
        ));
        assert_eq!(err.to_string(), "column 'nope' not found in source 'a'");
        let err = reconcile(&a, &b, &[], "amount").unwrap_err();
        assert_eq!(err, ConfigurationError::EmptyKeyColumns);
    }

    #[test]
    fn test_empty_side_degenerate_rates() {
        let a = vec![keyed("a", 0, "T1", 1.0)];
        let empty: Vec<Record> = Vec::new();
        let result = reconcile(&a, &empty, &key_cols(), "amount").unwrap();
        assert_eq!(result.match_rate_percent, 0.0);
        assert_eq!(result.orphans_a.len(), 1);

        let result = reconcile(&empty, &empty, &key_cols(), "amount").unwrap();
        assert_eq!(result.match_rate_percent, 100.0);
    }

    #[test]
    fn test_reconcile_is_deterministic() {
        let a: Vec<Record> = (0..50).map(|i| keyed("a", i, &format!("T{}", i % 20), i as f64)).collect();
        let b: Vec<Record> = (0..40).map(|i| keyed("b", i, &format!("T{}", i % 25), i as f64)).collect();
        let first = reconcile(&a, &b, &key_cols(), "amount").unwrap();
        let second = reconcile(&a, &b, &key_cols(), "amount").unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
