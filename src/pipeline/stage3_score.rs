//! Stage 3: weighted scoring, percentile ranks and quality tiers.
//!
//! The quality score is the weight-normalized sum of normalized metrics, so
//! it always lands in [0,100] and per-metric contributions add back up to the
//! score. Weights re-normalize over the metrics actually available this run.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::model::recipe::{MetricSpec, ScoringRecipe};
use crate::model::scored::{MetricContribution, QualityStatus, ScoredRecord};
use crate::model::table::NormalizedTable;
use crate::report::explain::explain_record;

pub const GOOD_PERCENTILE: f64 = 75.0;
pub const POOR_PERCENTILE: f64 = 25.0;

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("none of the recipe metrics are available for scoring")]
    NoUsableMetrics,
}

#[derive(Debug, Clone)]
pub struct Stage3Inputs<'a> {
    pub normalized: &'a NormalizedTable,
    pub recipe: &'a ScoringRecipe,
}

pub fn run_stage3(inputs: &Stage3Inputs<'_>) -> Result<Vec<ScoredRecord>, ScoreError> {
    let normalized = inputs.normalized;
    let available: Vec<&MetricSpec> = inputs
        .recipe
        .metrics
        .iter()
        .filter(|m| normalized.stats.iter().any(|s| s.metric == m.name))
        .collect();
    let weight_sum: f64 = available.iter().map(|m| m.weight).sum();
    if available.is_empty() || weight_sum <= 0.0 {
        return Err(ScoreError::NoUsableMetrics);
    }

    let mut records = Vec::with_capacity(normalized.table.len());
    for (row, record) in normalized.table.records.iter().enumerate() {
        let norms = &normalized.normalized[row];
        let mut breakdown = Vec::with_capacity(available.len());
        let mut score = 0.0;
        for metric in &available {
            let norm = norms.get(&metric.name).copied().unwrap_or(0.0);
            let contribution = norm * metric.weight / weight_sum;
            score += contribution;
            breakdown.push(MetricContribution {
                metric: metric.name.clone(),
                normalized: norm,
                weight: metric.weight,
                contribution,
            });
        }

        let raw_metrics: BTreeMap<String, f64> = inputs
            .recipe
            .metrics
            .iter()
            .filter_map(|m| record.get(&m.name).map(|v| (m.name.clone(), v)))
            .collect();

        records.push(ScoredRecord {
            entity: record.entity.clone(),
            impressions: record.impressions(),
            raw_metrics,
            normalized_metrics: norms.clone(),
            quality_score: score,
            score_breakdown: breakdown,
            percentile_rank: 0.0,
            quality_status: QualityStatus::Moderate,
            is_outlier: false,
            outlier_flags: Vec::new(),
            explanation: String::new(),
        });
    }

    let scores: Vec<f64> = records.iter().map(|r| r.quality_score).collect();
    let percentiles = percentile_ranks(&scores);
    for (record, pct) in records.iter_mut().zip(percentiles) {
        record.percentile_rank = pct;
        record.quality_status = status_for(pct);
        record.explanation = explain_record(&*record, inputs.recipe);
    }

    debug!(
        rows = records.len(),
        metrics = available.len(),
        "scoring complete"
    );
    Ok(records)
}

/// Percentile rank anchored to the endpoints: the best row lands at 100, the
/// worst at 0, ties share the average of their ranks. A single row ranks 100.
pub fn percentile_ranks(scores: &[f64]) -> Vec<f64> {
    let n = scores.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![100.0];
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0f64; n];
    let mut i = 0usize;
    while i < n {
        let mut j = i;
        while j + 1 < n && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // 1-based ranks i+1..=j+1 averaged over the tie run
        let avg = (i + j + 2) as f64 / 2.0;
        for k in i..=j {
            ranks[order[k]] = avg;
        }
        i = j + 1;
    }

    ranks
        .iter()
        .map(|r| (r - 1.0) / (n as f64 - 1.0) * 100.0)
        .collect()
}

pub fn status_for(percentile: f64) -> QualityStatus {
    if percentile >= GOOD_PERCENTILE {
        QualityStatus::Good
    } else if percentile >= POOR_PERCENTILE {
        QualityStatus::Moderate
    } else {
        QualityStatus::Poor
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage3_score.rs"]
mod tests;
