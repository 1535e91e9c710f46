use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Percentile-based quality tier. Boundaries are fixed constants of the
/// scoring engine, not recipe configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityStatus {
    Good,
    Moderate,
    Poor,
}

impl QualityStatus {
    pub fn label(self) -> &'static str {
        match self {
            QualityStatus::Good => "good",
            QualityStatus::Moderate => "moderate",
            QualityStatus::Poor => "poor",
        }
    }
}

/// Per-metric share of the final quality score, kept for explainability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricContribution {
    pub metric: String,
    pub normalized: f64,
    pub weight: f64,
    pub contribution: f64,
}

/// Final per-row result. Immutable once created; a reprocessed run supersedes
/// these records rather than mutating them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub entity: String,
    pub impressions: f64,
    pub raw_metrics: BTreeMap<String, f64>,
    pub normalized_metrics: BTreeMap<String, f64>,
    pub quality_score: f64,
    pub score_breakdown: Vec<MetricContribution>,
    pub percentile_rank: f64,
    pub quality_status: QualityStatus,
    pub is_outlier: bool,
    pub outlier_flags: Vec<String>,
    pub explanation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListType {
    Whitelist,
    Blacklist,
}

impl ListType {
    pub fn label(self) -> &'static str {
        match self {
            ListType::Whitelist => "whitelist",
            ListType::Blacklist => "blacklist",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListCriteria {
    pub min_impressions: f64,
    pub quartile: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListEntry {
    pub entity: String,
    pub quality_score: f64,
    pub impressions: f64,
}

/// Derived, non-persistent view over one run's scored records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationList {
    pub list_type: ListType,
    pub entries: Vec<ListEntry>,
    pub total_impressions: f64,
    pub average_score: f64,
    pub criteria: ListCriteria,
}

impl OptimizationList {
    pub fn entities(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.entity.as_str()).collect()
    }
}
