use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// One preprocessed row, keyed by the entity identifier (domain or supply
/// vendor). Values hold every canonical numeric column for the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub entity: String,
    pub values: BTreeMap<String, f64>,
}

impl CanonicalRecord {
    pub fn get(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied()
    }

    pub fn impressions(&self) -> f64 {
        self.get(crate::recipes::mapping::COL_IMPRESSIONS).unwrap_or(0.0)
    }
}

/// Whole-dataset view produced by preprocessing and consumed as an in-memory
/// batch by the rest of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalTable {
    pub entity_column: String,
    pub columns: BTreeSet<String>,
    pub records: Vec<CanonicalRecord>,
}

impl CanonicalTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    /// Column values in row order; rows without the column yield NaN.
    pub fn column(&self, name: &str) -> Vec<f64> {
        self.records
            .iter()
            .map(|r| r.get(name).unwrap_or(f64::NAN))
            .collect()
    }
}

/// Min/max scaling parameters captured per metric, recorded so the same scale
/// can be audited or re-applied later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormStats {
    pub metric: String,
    pub min: f64,
    pub max: f64,
    pub count: usize,
    pub higher_is_better: bool,
}

/// CanonicalTable plus one normalized value (0-100) per available metric per
/// row, row-aligned with `table.records`.
#[derive(Debug, Clone)]
pub struct NormalizedTable {
    pub table: CanonicalTable,
    pub normalized: Vec<BTreeMap<String, f64>>,
    pub stats: Vec<NormStats>,
}

impl NormalizedTable {
    /// Metrics that survived availability filtering for this run.
    pub fn available_metrics(&self) -> Vec<&str> {
        self.stats.iter().map(|s| s.metric.as_str()).collect()
    }
}
