// src/normalize.rs

use std::collections::HashSet;

use once_cell::sync::Lazy;
use serde_json::Value;

/// Minimum token length kept by `tokenize`.
pub const MIN_TOKEN_LENGTH: usize = 2;

/// Fixed decimal precision for numeric-looking values. Keeps "1", "1.0" and
/// " 1 " on the same canonical form so fingerprints and key comparisons do
/// not split on incidental formatting.
const NUMERIC_PRECISION: usize = 6;

/// Tokens ignored during Jaccard overlap and blocking. Articles and
/// prepositions plus the corporate / descriptive suffixes that appear in
/// almost every vendor or account label and carry no identity signal.
pub static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "the", "and", "or", "of", "for", "in", "on", "to", "by",
        "from", "with", "as", "at", "is", "are", "was", "it", "its", "this",
        "that", "these", "those", "per", "total",
        // Corporate suffixes and generic business words
        "inc", "incorporated", "corp", "corporation", "llc", "ltd", "limited",
        "company", "co", "group", "holdings", "enterprises", "international",
        "service", "services", "svc", "svcs", "solutions", "systems",
        "associates", "partners",
        // Descriptive filler from sentence-derived labels
        "value", "values", "data", "based", "used", "using", "calculate",
        "calculated", "calculation", "compute", "computed", "determine",
        "determined",
    ]
    .into_iter()
    .collect()
});

/// Normalize a key/fingerprint value: trim, case-fold, collapse internal
/// whitespace. Numeric-looking values are rendered at fixed precision.
pub fn normalize_value(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Ok(n) = trimmed.parse::<f64>() {
        if n.is_finite() {
            return format!("{:.*}", NUMERIC_PRECISION, n);
        }
    }
    collapse_whitespace(&trimmed.to_lowercase())
}

/// Canonical text form of a JSON attribute value, used for fingerprints and
/// key comparison. Nulls become the empty string so a missing field and an
/// explicit null compare equal.
pub fn canonical_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.is_finite() => format!("{:.*}", NUMERIC_PRECISION, f),
            _ => n.to_string(),
        },
        Value::String(s) => normalize_value(s),
        Value::Bool(b) => b.to_string(),
        other => normalize_value(&other.to_string()),
    }
}

/// Normalize an entity name for similarity scoring: case-fold, replace
/// punctuation with spaces, collapse whitespace. "Amazon Web Services (AWS)"
/// becomes "amazon web services aws".
pub fn normalize_name(raw: &str) -> String {
    let lowered: String = raw
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    collapse_whitespace(&lowered)
}

/// Tokenize a normalized name for overlap scoring and blocking: drop
/// stopwords and tokens shorter than `MIN_TOKEN_LENGTH`.
pub fn tokenize(normalized_name: &str) -> HashSet<String> {
    normalized_name
        .split_whitespace()
        .filter(|w| w.len() >= MIN_TOKEN_LENGTH && !STOPWORDS.contains(w))
        .map(|w| w.to_string())
        .collect()
}

/// Blocking prefix: the first four alphanumeric characters of the
/// normalized name. Records sharing no token can still land in the same
/// candidate block through this.
pub fn blocking_prefix(normalized_name: &str) -> Option<String> {
    let prefix: String = normalized_name
        .chars()
        .filter(|c| c.is_alphanumeric())
        .take(4)
        .collect();
    if prefix.is_empty() {
        None
    } else {
        Some(prefix)
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Compare two canonical values, applying numeric tolerance when both parse
/// as numbers: 1e-6 absolute or 0.0001% relative, whichever is larger.
pub fn values_equal(a: &str, b: &str) -> bool {
    if let (Ok(x), Ok(y)) = (a.parse::<f64>(), b.parse::<f64>()) {
        // NaN and infinities have no meaningful tolerance; compare as text.
        if x.is_finite() && y.is_finite() {
            let tolerance = f64::max(1e-6, 1e-6 * f64::max(x.abs(), y.abs()));
            return (x - y).abs() <= tolerance;
        }
    }
    a == b
}
