//! Stage 1: raw export to canonical table.
//!
//! Eight passes run in a fixed order: header cleanup, canonical rename with
//! required-column validation, aggregate-row removal, numeric coercion,
//! derived metrics, entity aggregation, volume filtering, quality flags.
//! Every adjustment is counted in the quality report.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use thiserror::Error;
use tracing::debug;

use crate::input::RawTable;
use crate::model::recipe::{AnalysisLevel, Platform, ScoringRecipe};
use crate::model::report::{QualityFlags, QualityReport};
use crate::model::table::{CanonicalRecord, CanonicalTable};
use crate::recipes::mapping::{self as col, canonicalize_header};

pub const CPM_SANITY_CEILING: f64 = 1000.0;
pub const TTD_MIN_IMPRESSIONS: f64 = 250.0;
pub const TTD_APP_MIN_IMPRESSIONS: f64 = 10.0;
pub const PP_MIN_IMPRESSION_SHARE: f64 = 0.0005;

/// Identity-cell labels marking platform-inserted total rows.
const AGGREGATE_ROW_LABELS: &[&str] = &["row labels", "grand total", "tail aggregate", "summary"];

/// Derivable metric -> numerator, denominator, scale. Spend-per-mille rates
/// scale by 1000, everything else is a plain ratio.
const DERIVATIONS: &[(&str, &str, &str, f64)] = &[
    (col::COL_CPM, col::COL_ADVERTISER_COST, col::COL_IMPRESSIONS, 1000.0),
    (col::COL_ECPM, col::COL_TOTAL_SPEND, col::COL_IMPRESSIONS, 1000.0),
    (col::COL_CTR, col::COL_CLICKS, col::COL_IMPRESSIONS, 1.0),
    (
        col::COL_CONVERSION_RATE,
        col::COL_CONVERSIONS,
        col::COL_IMPRESSIONS,
        1.0,
    ),
    (
        col::COL_AD_LOAD_RATE,
        col::COL_AD_LOAD_IMPS,
        col::COL_IMPRESSIONS,
        1.0,
    ),
    (
        col::COL_AD_REFRESH_RATE,
        col::COL_AD_REFRESH_IMPS,
        col::COL_IMPRESSIONS,
        1.0,
    ),
    (
        col::COL_TVQI_RATIO,
        col::COL_TVQI_RAW,
        col::COL_TVQI_MEASURED,
        1.0,
    ),
    (
        col::COL_UNIQUE_ID_RATIO,
        col::COL_UNIQUE_IDS,
        col::COL_IMPRESSIONS,
        1.0,
    ),
];

/// Columns summed during aggregation; the rest take impression-weighted means
/// and rates are re-derived from the sums afterwards.
const SUM_COLUMNS: &[&str] = &[
    col::COL_IMPRESSIONS,
    col::COL_CLICKS,
    col::COL_CONVERSIONS,
    col::COL_TOTAL_SPEND,
    col::COL_ADVERTISER_COST,
    col::COL_AD_LOAD_IMPS,
    col::COL_AD_REFRESH_IMPS,
    col::COL_UNIQUE_IDS,
    col::COL_SOURCE_ROWS,
];

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("entity column {0} not found in input")]
    MissingEntityColumn(String),
    #[error("impressions column not found in input")]
    MissingImpressions,
    #[error("required metric {0} cannot be read or derived from the input")]
    MissingRequiredMetric(String),
    #[error("no scoreable rows left after cleaning")]
    EmptyAfterCleaning,
}

#[derive(Debug, Clone)]
pub struct Stage1Inputs<'a> {
    pub table: &'a RawTable,
    pub recipe: &'a ScoringRecipe,
    /// Overrides the platform volume floor when set.
    pub min_impressions: Option<f64>,
}

#[derive(Debug)]
pub struct Stage1Output {
    pub table: CanonicalTable,
    pub report: QualityReport,
}

pub fn run_stage1(inputs: &Stage1Inputs<'_>) -> Result<Stage1Output, PreprocessError> {
    let mut report = QualityReport {
        input_rows: inputs.table.len(),
        ..Default::default()
    };

    let headers: Vec<String> = inputs
        .table
        .headers
        .iter()
        .map(|h| canonicalize_header(h))
        .collect();
    validate_columns(&headers, inputs.recipe, &mut report)?;

    let entity_column = inputs.recipe.entity_column();
    let entity_idx = headers
        .iter()
        .position(|h| h == entity_column)
        .ok_or_else(|| PreprocessError::MissingEntityColumn(entity_column.to_string()))?;

    let mut records = coerce_rows(inputs.table, &headers, entity_idx, entity_column, &mut report);
    scale_percent_form_ctr(&mut records);

    for record in &mut records {
        derive_row(&mut record.values);
    }

    if should_aggregate(inputs.recipe) {
        records = aggregate_by_entity(records, &mut report);
    }

    let floor = volume_floor(inputs, &headers, &records);
    let before = records.len();
    records.retain(|r| r.impressions() >= floor);
    report.below_volume_removed = before - records.len();

    if records.is_empty() {
        return Err(PreprocessError::EmptyAfterCleaning);
    }

    report.flags = collect_flags(&records);
    report.output_rows = records.len();

    let mut columns: BTreeSet<String> = BTreeSet::new();
    for record in &records {
        columns.extend(record.values.keys().cloned());
    }
    for metric in &inputs.recipe.metrics {
        if !columns.contains(&metric.name) {
            report.excluded_metrics.push(metric.name.clone());
        }
    }

    debug!(
        input_rows = report.input_rows,
        output_rows = report.output_rows,
        removed = report.rows_removed(),
        merged = report.entities_merged,
        "preprocessing complete"
    );

    Ok(Stage1Output {
        table: CanonicalTable {
            entity_column: entity_column.to_string(),
            columns,
            records,
        },
        report,
    })
}

fn validate_columns(
    headers: &[String],
    recipe: &ScoringRecipe,
    report: &mut QualityReport,
) -> Result<(), PreprocessError> {
    let present = |name: &str| headers.iter().any(|h| h == name);

    let entity_column = recipe.entity_column();
    if !present(entity_column) {
        return Err(PreprocessError::MissingEntityColumn(
            entity_column.to_string(),
        ));
    }
    if !present(col::COL_IMPRESSIONS) {
        return Err(PreprocessError::MissingImpressions);
    }

    for metric in &recipe.metrics {
        if !metric_available(&metric.name, headers) && metric.required {
            return Err(PreprocessError::MissingRequiredMetric(metric.name.clone()));
        }
    }

    for field in &recipe.required_raw_fields {
        if !present(field) {
            report.missing_fields.push(field.clone());
        }
    }
    Ok(())
}

/// A metric backs a column directly or through its derivation inputs.
fn metric_available(name: &str, headers: &[String]) -> bool {
    if headers.iter().any(|h| h == name) {
        return true;
    }
    DERIVATIONS
        .iter()
        .any(|(out, num, den, _)| {
            *out == name && headers.iter().any(|h| h == num) && headers.iter().any(|h| h == den)
        })
}

fn coerce_rows(
    table: &RawTable,
    headers: &[String],
    entity_idx: usize,
    entity_column: &str,
    report: &mut QualityReport,
) -> Vec<CanonicalRecord> {
    let mut records = Vec::with_capacity(table.len());
    for row in &table.rows {
        let entity_raw = row.get(entity_idx).map(|s| s.trim()).unwrap_or("");
        if entity_raw.is_empty() {
            report.unparseable_rows_removed += 1;
            continue;
        }
        if is_aggregate_label(entity_raw) {
            report.aggregate_rows_removed += 1;
            continue;
        }

        let mut values: BTreeMap<String, f64> = BTreeMap::new();
        for (idx, name) in headers.iter().enumerate() {
            if idx == entity_idx || name == entity_column {
                continue;
            }
            if let Some(v) = row.get(idx).and_then(|cell| parse_numeric(cell)) {
                values.entry(name.clone()).or_insert(v);
            }
        }
        if !values.contains_key(col::COL_IMPRESSIONS) {
            report.unparseable_rows_removed += 1;
            continue;
        }
        records.push(CanonicalRecord {
            entity: entity_raw.to_string(),
            values,
        });
    }
    records
}

fn is_aggregate_label(entity: &str) -> bool {
    let lowered = entity.to_lowercase();
    AGGREGATE_ROW_LABELS.iter().any(|label| *label == lowered)
}

/// Accepts "1,234.56", "$12.34", "85.5%" and plain numbers. A trailing percent
/// divides by 100 so rate columns land in [0,1].
fn parse_numeric(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty()
        || trimmed == "-"
        || trimmed.eq_ignore_ascii_case("n/a")
        || trimmed.eq_ignore_ascii_case("na")
    {
        return None;
    }
    let mut cleaned = String::with_capacity(trimmed.len());
    let mut percent = false;
    for ch in trimmed.chars() {
        match ch {
            ',' | '$' | ' ' => {}
            '%' => percent = true,
            _ => cleaned.push(ch),
        }
    }
    let value: f64 = cleaned.parse().ok()?;
    Some(if percent { value / 100.0 } else { value })
}

/// Exports disagree on CTR units; a column whose max exceeds 1 is percent
/// form and is rescaled once.
fn scale_percent_form_ctr(records: &mut [CanonicalRecord]) {
    let max = records
        .iter()
        .filter_map(|r| r.get(col::COL_CTR))
        .fold(f64::NEG_INFINITY, f64::max);
    if max.is_finite() && max > 1.0 {
        for record in records {
            if let Some(v) = record.values.get_mut(col::COL_CTR) {
                *v /= 100.0;
            }
        }
    }
}

fn derive_row(values: &mut BTreeMap<String, f64>) {
    for (out, num, den, scale) in DERIVATIONS {
        if values.contains_key(*out) {
            continue;
        }
        let (Some(n), Some(d)) = (values.get(*num).copied(), values.get(*den).copied()) else {
            continue;
        };
        let v = if d == 0.0 { 0.0 } else { n / d * scale };
        values.insert(out.to_string(), v);
    }
}

/// PulsePoint exports repeat domains across placements; supply-vendor runs
/// repeat vendors across sites. Both collapse to one record per entity.
fn should_aggregate(recipe: &ScoringRecipe) -> bool {
    recipe.platform == Platform::PulsePoint || recipe.analysis_level == AnalysisLevel::SupplyVendor
}

fn aggregate_by_entity(
    records: Vec<CanonicalRecord>,
    report: &mut QualityReport,
) -> Vec<CanonicalRecord> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<CanonicalRecord>> = HashMap::new();
    for record in records {
        if !groups.contains_key(&record.entity) {
            order.push(record.entity.clone());
        }
        groups.entry(record.entity.clone()).or_default().push(record);
    }

    let mut out = Vec::with_capacity(order.len());
    for entity in order {
        let Some(members) = groups.remove(&entity) else {
            continue;
        };
        report.entities_merged += members.len().saturating_sub(1);
        out.push(merge_group(entity, members));
    }
    out
}

fn merge_group(entity: String, mut members: Vec<CanonicalRecord>) -> CanonicalRecord {
    if members.len() == 1 {
        let mut record = members.remove(0);
        record
            .values
            .entry(col::COL_SOURCE_ROWS.to_string())
            .or_insert(1.0);
        rederive_rates(&mut record.values);
        return record;
    }
    let source_rows = members.len() as f64;

    let mut names: BTreeSet<String> = BTreeSet::new();
    for member in &members {
        names.extend(member.values.keys().cloned());
    }

    let mut values: BTreeMap<String, f64> = BTreeMap::new();
    for name in names {
        if SUM_COLUMNS.contains(&name.as_str()) {
            let sum: f64 = members.iter().filter_map(|m| m.get(&name)).sum();
            values.insert(name, sum);
            continue;
        }
        let mut weighted = 0.0;
        let mut weight = 0.0;
        let mut plain = 0.0;
        let mut count = 0usize;
        for member in &members {
            if let Some(v) = member.get(&name) {
                let w = member.impressions().max(0.0);
                weighted += v * w;
                weight += w;
                plain += v;
                count += 1;
            }
        }
        if count == 0 {
            continue;
        }
        let mean = if weight > 0.0 {
            weighted / weight
        } else {
            plain / count as f64
        };
        values.insert(name, mean);
    }

    values
        .entry(col::COL_SOURCE_ROWS.to_string())
        .or_insert(source_rows);
    rederive_rates(&mut values);
    CanonicalRecord { entity, values }
}

/// After summing counts, per-row rates are stale; recompute them from the
/// merged components.
fn rederive_rates(values: &mut BTreeMap<String, f64>) {
    for (out, num, den, scale) in DERIVATIONS {
        let (Some(n), Some(d)) = (values.get(*num).copied(), values.get(*den).copied()) else {
            continue;
        };
        values.insert(out.to_string(), if d == 0.0 { 0.0 } else { n / d * scale });
    }
}

fn volume_floor(
    inputs: &Stage1Inputs<'_>,
    headers: &[String],
    records: &[CanonicalRecord],
) -> f64 {
    if let Some(min) = inputs.min_impressions {
        return min;
    }
    match inputs.recipe.platform {
        Platform::TradeDesk => {
            // App exports spread volume across many placements, so the floor
            // drops.
            if headers.iter().any(|h| h == col::COL_APP_NAME) {
                TTD_APP_MIN_IMPRESSIONS
            } else {
                TTD_MIN_IMPRESSIONS
            }
        }
        Platform::PulsePoint => {
            let total: f64 = records.iter().map(|r| r.impressions()).sum();
            total * PP_MIN_IMPRESSION_SHARE
        }
    }
}

fn collect_flags(records: &[CanonicalRecord]) -> QualityFlags {
    let mut flags = QualityFlags::default();
    for record in records {
        for name in col::COUNT_COLUMNS {
            if record.get(name).is_some_and(|v| v < 0.0) {
                flags.negative_values += 1;
            }
        }
        for name in col::RATE_COLUMNS {
            if record.get(name).is_some_and(|v| !(0.0..=1.0).contains(&v)) {
                flags.rates_out_of_range += 1;
            }
        }
        for name in [col::COL_CPM, col::COL_ECPM] {
            if record.get(name).is_some_and(|v| v > CPM_SANITY_CEILING) {
                flags.cpm_above_ceiling += 1;
            }
        }
    }
    flags
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage1_preprocess.rs"]
mod tests;
