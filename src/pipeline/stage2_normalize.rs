//! Stage 2: direction-aware min-max normalization.
//!
//! Each available recipe metric is scaled to [0,100] over its finite values.
//! Lower-is-better metrics are inverted so 100 is always the best observed
//! value. The raw table rides along untouched for reporting.

use std::collections::BTreeMap;

use tracing::debug;

use crate::model::recipe::ScoringRecipe;
use crate::model::table::{CanonicalTable, NormStats, NormalizedTable};

/// Score assigned when every row holds the same value and the scale has no
/// spread to work with.
pub const CONSTANT_COLUMN_SCORE: f64 = 50.0;

pub fn run_stage2(table: CanonicalTable, recipe: &ScoringRecipe) -> NormalizedTable {
    let mut normalized: Vec<BTreeMap<String, f64>> = vec![BTreeMap::new(); table.len()];
    let mut stats: Vec<NormStats> = Vec::new();

    for metric in &recipe.metrics {
        if !table.has_column(&metric.name) {
            continue;
        }
        let raw = table.column(&metric.name);
        let finite_count = raw.iter().filter(|v| v.is_finite()).count();
        if finite_count == 0 {
            continue;
        }
        let min = raw
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(f64::INFINITY, f64::min);
        let max = raw
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(f64::NEG_INFINITY, f64::max);
        let span = max - min;

        for (row, value) in raw.iter().enumerate() {
            let scaled = if !value.is_finite() {
                0.0
            } else if span == 0.0 {
                CONSTANT_COLUMN_SCORE
            } else if metric.higher_is_better {
                (value - min) / span * 100.0
            } else {
                (max - value) / span * 100.0
            };
            normalized[row].insert(metric.name.clone(), scaled.clamp(0.0, 100.0));
        }

        stats.push(NormStats {
            metric: metric.name.clone(),
            min,
            max,
            count: finite_count,
            higher_is_better: metric.higher_is_better,
        });
    }

    debug!(
        metrics = stats.len(),
        rows = table.len(),
        "normalization complete"
    );

    NormalizedTable {
        table,
        normalized,
        stats,
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage2_normalize.rs"]
mod tests;
