//! Stage 4: whitelist and blacklist construction.
//!
//! Rows above the volume floor are ranked by score; the top quartile becomes
//! the whitelist, the bottom quartile the blacklist. The two never share an
//! entity, even for tiny inputs where the quartiles would collide.

use std::cmp::Ordering;

use tracing::debug;

use crate::model::scored::{ListCriteria, ListEntry, ListType, OptimizationList, ScoredRecord};

pub const DEFAULT_LIST_MIN_IMPRESSIONS: f64 = 250.0;
pub const LIST_QUARTILE: f64 = 0.25;

#[derive(Debug, Clone)]
pub struct Stage4Inputs<'a> {
    pub records: &'a [ScoredRecord],
    pub min_impressions: f64,
}

#[derive(Debug)]
pub struct Stage4Output {
    pub whitelist: OptimizationList,
    pub blacklist: OptimizationList,
}

pub fn run_stage4(inputs: &Stage4Inputs<'_>) -> Stage4Output {
    let mut eligible: Vec<&ScoredRecord> = inputs
        .records
        .iter()
        .filter(|r| r.impressions >= inputs.min_impressions)
        .collect();
    // Stable order: score descending, entity ascending on ties.
    eligible.sort_by(|a, b| {
        b.quality_score
            .partial_cmp(&a.quality_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.entity.cmp(&b.entity))
    });

    let n = eligible.len();
    let count = if n == 0 { 0 } else { (n / 4).max(1) };

    let whitelist_rows: Vec<&ScoredRecord> = eligible[..count.min(n)].to_vec();
    // The blacklist starts past the whitelist so the lists stay disjoint when
    // count*2 exceeds n.
    let blacklist_start = count.max(n.saturating_sub(count));
    let mut blacklist_rows: Vec<&ScoredRecord> = eligible[blacklist_start.min(n)..].to_vec();
    blacklist_rows.reverse();

    debug!(
        eligible = n,
        quartile_count = count,
        "optimization lists built"
    );

    Stage4Output {
        whitelist: build_list(ListType::Whitelist, &whitelist_rows, inputs.min_impressions),
        blacklist: build_list(ListType::Blacklist, &blacklist_rows, inputs.min_impressions),
    }
}

fn build_list(
    list_type: ListType,
    rows: &[&ScoredRecord],
    min_impressions: f64,
) -> OptimizationList {
    let entries: Vec<ListEntry> = rows
        .iter()
        .map(|r| ListEntry {
            entity: r.entity.clone(),
            quality_score: r.quality_score,
            impressions: r.impressions,
        })
        .collect();
    let total_impressions: f64 = entries.iter().map(|e| e.impressions).sum();
    let average_score = if entries.is_empty() {
        0.0
    } else {
        entries.iter().map(|e| e.quality_score).sum::<f64>() / entries.len() as f64
    };
    OptimizationList {
        list_type,
        entries,
        total_impressions,
        average_score,
        criteria: ListCriteria {
            min_impressions,
            quartile: LIST_QUARTILE,
        },
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage4_lists.rs"]
mod tests;
