// src/matching/synonyms.rs

//! Static synonym configuration for financial terminology.
//!
//! A `SynonymTable` is supplied by the caller and scoped to one run; the
//! default table carries the GAAP / IFRS / common-usage equivalences plus a
//! handful of business-name abbreviation sets. Lookup is O(1) through an
//! inverted term index built at construction.

use std::collections::HashMap;

use crate::normalize::normalize_name;

/// Semantically equivalent terms, grouped into disjoint sets.
#[derive(Debug, Clone)]
pub struct SynonymTable {
    index: HashMap<String, usize>,
    set_count: usize,
}

impl SynonymTable {
    /// Build a table from groups of equivalent terms. Terms are normalized
    /// on the way in; a term registered in two groups keeps its first
    /// assignment.
    pub fn new<S: AsRef<str>>(groups: &[Vec<S>]) -> Self {
        let mut index = HashMap::new();
        for (set_id, group) in groups.iter().enumerate() {
            for term in group {
                let normalized = normalize_name(term.as_ref());
                if !normalized.is_empty() {
                    index.entry(normalized).or_insert(set_id);
                }
            }
        }
        SynonymTable {
            index,
            set_count: groups.len(),
        }
    }

    /// Empty table: the synonym sub-score is always 0.
    pub fn empty() -> Self {
        SynonymTable {
            index: HashMap::new(),
            set_count: 0,
        }
    }

    /// Set membership of a normalized term, if registered.
    pub fn set_of(&self, normalized_term: &str) -> Option<usize> {
        self.index.get(normalized_term).copied()
    }

    pub fn len(&self) -> usize {
        self.set_count
    }

    pub fn is_empty(&self) -> bool {
        self.set_count == 0
    }

    /// True when both phrases resolve into the same synonym set, checking
    /// whole-phrase membership first and then single-token membership.
    /// Token-level matching is what lets "Amazon Web Svcs" meet
    /// "Amazon Web Services" through the services/svcs set.
    pub fn same_set(&self, normalized_a: &str, normalized_b: &str) -> bool {
        if let (Some(sa), Some(sb)) = (self.set_of(normalized_a), self.set_of(normalized_b)) {
            if sa == sb {
                return true;
            }
        }

        let sets_a: Vec<usize> = normalized_a
            .split_whitespace()
            .filter_map(|t| self.set_of(t))
            .collect();
        if sets_a.is_empty() {
            return false;
        }
        normalized_b
            .split_whitespace()
            .filter_map(|t| self.set_of(t))
            .any(|sb| sets_a.contains(&sb))
    }
}

impl Default for SynonymTable {
    /// Financial terminology equivalences (GAAP / IFRS / common accounting
    /// usage) plus business-name abbreviations.
    fn default() -> Self {
        let groups: Vec<Vec<&str>> = vec![
            // Revenue
            vec![
                "revenue", "net sales", "sales revenue", "turnover", "net revenue",
                "gross revenue", "total revenue",
            ],
            // Expense
            vec!["cost of sales", "cost of goods sold", "cogs", "cost of revenue"],
            vec!["sg&a", "selling general and administrative", "operating expenses", "opex"],
            // Balance sheet, GAAP vs IFRS terminology
            vec!["additional paid-in capital", "apic", "share premium", "capital surplus"],
            vec!["treasury stock", "treasury shares", "own shares held"],
            vec![
                "accounts receivable", "trade receivables", "trade and other receivables",
                "a/r", "ar",
            ],
            vec!["accounts payable", "trade payables", "trade and other payables", "a/p", "ap"],
            vec!["retained earnings", "accumulated profits", "revenue reserves"],
            vec!["inventory", "inventories", "stock", "merchandise"],
            vec!["property plant and equipment", "ppe", "fixed assets", "tangible assets"],
            vec!["intangible assets", "intangibles"],
            vec!["depreciation", "depreciation expense", "depreciation and amortisation", "d&a"],
            vec!["amortization", "amortisation", "amortization expense"],
            // Cash flow
            vec!["cash and cash equivalents", "cash", "cash & equivalents", "liquid assets"],
            vec!["operating cash flow", "cash from operations", "cfo"],
            // Tax
            vec![
                "income tax expense", "tax expense", "provision for income taxes",
                "tax provision",
            ],
            vec!["deferred tax asset", "dta", "deferred tax"],
            vec!["deferred tax liability", "dtl"],
            // Equity
            vec!["common stock", "ordinary shares", "share capital", "capital stock"],
            vec!["preferred stock", "preference shares"],
            // Intercompany
            vec![
                "intercompany receivable", "ic receivable", "due from affiliate",
                "due from related party",
            ],
            vec![
                "intercompany payable", "ic payable", "due to affiliate",
                "due to related party",
            ],
            // Profit metrics
            vec!["net income", "net profit", "profit for the period", "net earnings"],
            vec!["gross profit", "gross margin"],
            vec!["operating income", "operating profit", "ebit"],
            vec!["ebitda", "earnings before interest taxes depreciation amortization"],
            // Business-name abbreviations
            vec!["service", "services", "svc", "svcs"],
            vec!["corporation", "corp"],
            vec!["company", "co"],
            vec!["incorporated", "inc"],
            vec!["limited", "ltd"],
            vec!["international", "intl"],
            vec!["department", "dept"],
        ];
        SynonymTable::new(&groups)
    }
}
