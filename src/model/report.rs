use serde::{Deserialize, Serialize};

use crate::model::scored::QualityStatus;

/// Informational data-quality flags recorded during preprocessing. These never
/// reject records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityFlags {
    pub negative_values: usize,
    pub rates_out_of_range: usize,
    pub cpm_above_ceiling: usize,
}

/// Structured audit trail of every adjustment preprocessing made, returned
/// alongside the canonical table and persisted with the run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityReport {
    pub input_rows: usize,
    pub output_rows: usize,
    pub aggregate_rows_removed: usize,
    pub unparseable_rows_removed: usize,
    pub below_volume_removed: usize,
    pub entities_merged: usize,
    pub missing_fields: Vec<String>,
    pub excluded_metrics: Vec<String>,
    pub flags: QualityFlags,
}

impl QualityReport {
    pub fn rows_removed(&self) -> usize {
        self.aggregate_rows_removed + self.unparseable_rows_removed + self.below_volume_removed
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    pub good: usize,
    pub moderate: usize,
    pub poor: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DistributionStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub q25: f64,
    pub q75: f64,
}

/// Compact per-entity line used in top/bottom rankings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDigest {
    pub entity: String,
    pub quality_score: f64,
    pub impressions: f64,
    pub status: QualityStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorGuidance {
    pub vendor_count: usize,
    /// How many vendors a buyer would realistically keep in rotation.
    pub benchmark_size: usize,
    pub benchmark: Vec<EntityDigest>,
    pub review: Vec<EntityDigest>,
}

/// Campaign-level rollup of one run's scored records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub rows_scored: usize,
    pub total_impressions: f64,
    pub total_spend: f64,
    pub average_cpm: Option<f64>,
    pub average_ecpm: Option<f64>,
    /// Impression-weighted mean quality score; zero-impression rows carry no
    /// weight.
    pub campaign_score: f64,
    pub status_counts: TierCounts,
    pub score_distribution: DistributionStats,
    pub top_performers: Vec<EntityDigest>,
    pub bottom_performers: Vec<EntityDigest>,
    pub outlier_count: usize,
    pub vendor_guidance: Option<VendorGuidance>,
}
