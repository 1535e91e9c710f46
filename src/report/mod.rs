pub mod explain;
pub mod text;
pub mod write;

use crate::model::recipe::{AnalysisLevel, Platform, ScoringRecipe};
use crate::model::report::{
    CampaignSummary, DistributionStats, EntityDigest, TierCounts, VendorGuidance,
};
use crate::model::scored::{QualityStatus, ScoredRecord};
use crate::model::table::CanonicalTable;
use crate::recipes::mapping::{
    COL_ADVERTISER_COST, COL_CPM, COL_ECPM, COL_SOURCE_ROWS, COL_TOTAL_SPEND,
};

pub const RANKING_SIZE: usize = 5;
/// Vendor guidance is suppressed for tiny vendor sets where a benchmark split
/// would be noise.
pub const VENDOR_GUIDANCE_MIN_ROWS: usize = 10;
/// Vendors aggregated from fewer source rows than this are too thin to
/// benchmark against.
pub const VENDOR_MIN_SOURCE_ROWS: f64 = 5.0;
pub const VENDOR_BENCHMARK_FLOOR: usize = 5;
pub const VENDOR_BENCHMARK_CAP: usize = 7;

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Quantile over an ascending-sorted slice, interpolating linearly between
/// adjacent order statistics.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

pub fn median_sorted(sorted: &[f64]) -> f64 {
    quantile_sorted(sorted, 0.5)
}

/// Pearson correlation. Returns 0.0 when either side is constant or shorter
/// than two points.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let mx = mean(&x[..n]);
    let my = mean(&y[..n]);
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for i in 0..n {
        let dx = x[i] - mx;
        let dy = y[i] - my;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x <= 0.0 || var_y <= 0.0 {
        return 0.0;
    }
    let r = cov / (var_x * var_y).sqrt();
    if r.is_finite() { r.clamp(-1.0, 1.0) } else { 0.0 }
}

/// Campaign-level rollup over one run's scored records. `records` and
/// `table.records` must be row-aligned, which scoring preserves.
pub fn build_summary(
    records: &[ScoredRecord],
    table: &CanonicalTable,
    recipe: &ScoringRecipe,
) -> CampaignSummary {
    let order = ranked(records);
    let mut status_counts = TierCounts::default();
    for record in records {
        match record.quality_status {
            QualityStatus::Good => status_counts.good += 1,
            QualityStatus::Moderate => status_counts.moderate += 1,
            QualityStatus::Poor => status_counts.poor += 1,
        }
    }

    CampaignSummary {
        rows_scored: records.len(),
        total_impressions: records.iter().map(|r| r.impressions).sum(),
        total_spend: spend_total(table, recipe.platform),
        average_cpm: column_mean(table, COL_CPM),
        average_ecpm: column_mean(table, COL_ECPM),
        campaign_score: campaign_score(records),
        status_counts,
        score_distribution: score_distribution(records),
        top_performers: order
            .iter()
            .take(RANKING_SIZE)
            .map(|&i| digest(&records[i]))
            .collect(),
        bottom_performers: order
            .iter()
            .rev()
            .take(RANKING_SIZE)
            .map(|&i| digest(&records[i]))
            .collect(),
        outlier_count: records.iter().filter(|r| r.is_outlier).count(),
        vendor_guidance: vendor_guidance(records, table, recipe, &order),
    }
}

/// Impression-weighted mean quality score. Zero-impression rows carry no
/// weight; if nothing has impressions the plain mean is used instead.
fn campaign_score(records: &[ScoredRecord]) -> f64 {
    let mut weighted = 0.0;
    let mut total = 0.0;
    for record in records {
        if record.impressions > 0.0 {
            weighted += record.quality_score * record.impressions;
            total += record.impressions;
        }
    }
    if total > 0.0 {
        weighted / total
    } else {
        let scores: Vec<f64> = records.iter().map(|r| r.quality_score).collect();
        mean(&scores)
    }
}

/// Spend lives in `advertiser_cost` on TradeDesk exports and `total_spend` on
/// PulsePoint exports; whichever column the table actually has wins.
fn spend_total(table: &CanonicalTable, platform: Platform) -> f64 {
    let (preferred, fallback) = match platform {
        Platform::TradeDesk => (COL_ADVERTISER_COST, COL_TOTAL_SPEND),
        Platform::PulsePoint => (COL_TOTAL_SPEND, COL_ADVERTISER_COST),
    };
    for column in [preferred, fallback] {
        if table.has_column(column) {
            return table
                .records
                .iter()
                .filter_map(|r| r.get(column))
                .filter(|v| v.is_finite())
                .sum();
        }
    }
    0.0
}

fn column_mean(table: &CanonicalTable, name: &str) -> Option<f64> {
    if !table.has_column(name) {
        return None;
    }
    let values: Vec<f64> = table
        .records
        .iter()
        .filter_map(|r| r.get(name))
        .filter(|v| v.is_finite())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(mean(&values))
    }
}

fn score_distribution(records: &[ScoredRecord]) -> DistributionStats {
    let mut scores: Vec<f64> = records.iter().map(|r| r.quality_score).collect();
    scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    if scores.is_empty() {
        return DistributionStats::default();
    }
    DistributionStats {
        min: scores[0],
        max: scores[scores.len() - 1],
        mean: mean(&scores),
        median: median_sorted(&scores),
        q25: quantile_sorted(&scores, 0.25),
        q75: quantile_sorted(&scores, 0.75),
    }
}

/// Record indices sorted best-first: score descending, then entity ascending.
fn ranked(records: &[ScoredRecord]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..records.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = &records[a];
        let rb = &records[b];
        rb.quality_score
            .partial_cmp(&ra.quality_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| ra.entity.cmp(&rb.entity))
    });
    order
}

fn digest(record: &ScoredRecord) -> EntityDigest {
    EntityDigest {
        entity: record.entity.clone(),
        quality_score: record.quality_score,
        impressions: record.impressions,
        status: record.quality_status,
    }
}

fn vendor_guidance(
    records: &[ScoredRecord],
    table: &CanonicalTable,
    recipe: &ScoringRecipe,
    order: &[usize],
) -> Option<VendorGuidance> {
    if recipe.analysis_level != AnalysisLevel::SupplyVendor
        || records.len() <= VENDOR_GUIDANCE_MIN_ROWS
    {
        return None;
    }
    let benchmark_size = (records.len() / 3)
        .max(VENDOR_BENCHMARK_FLOOR)
        .min(VENDOR_BENCHMARK_CAP);
    let eligible: Vec<usize> = order
        .iter()
        .copied()
        .filter(|&i| {
            table
                .records
                .get(i)
                .and_then(|r| r.get(COL_SOURCE_ROWS))
                .is_none_or(|rows| rows >= VENDOR_MIN_SOURCE_ROWS)
        })
        .collect();
    Some(VendorGuidance {
        vendor_count: records.len(),
        benchmark_size,
        benchmark: eligible
            .iter()
            .take(benchmark_size)
            .map(|&i| digest(&records[i]))
            .collect(),
        review: eligible
            .iter()
            .rev()
            .take(benchmark_size)
            .map(|&i| digest(&records[i]))
            .collect(),
    })
}
