// src/signature.rs

//! Content fingerprinting for records.
//!
//! A fingerprint is a pure function of a record's normalized content: the
//! declared key fields when any exist, otherwise the full attribute map.
//! Fields are folded in sorted name order with normalized values, so two
//! rows that differ only in column order, casing, whitespace or numeric
//! formatting hash identically.

use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::normalize::{canonical_value, normalize_value};

/// Hex length the digest is truncated to. 64 bits of collision resistance
/// is plenty for within-run reconciliation and keeps fingerprints readable
/// in audit output.
const FINGERPRINT_LEN: usize = 16;

/// Compute the content fingerprint for a record's normalized fields.
pub fn fingerprint(key_fields: &[(String, String)], attributes: &BTreeMap<String, Value>) -> String {
    let mut components: BTreeMap<String, String> = BTreeMap::new();

    if key_fields.is_empty() {
        for (name, value) in attributes {
            components.insert(normalize_value(name), canonical_value(value));
        }
    } else {
        for (name, value) in key_fields {
            components.insert(normalize_value(name), normalize_value(value));
        }
    }

    let mut hasher = Sha256::new();
    for (name, value) in &components {
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
        hasher.update(b"|");
    }

    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(FINGERPRINT_LEN);
    digest
}
