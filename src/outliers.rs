//! Outlier detection and remediation over canonical metric columns.
//!
//! Detection never mutates the table; it reports flagged row indices per
//! column plus their union. Remediation is a separate, explicit step chosen
//! by the caller: drop rows, cap columns, or winsorize.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::scored::ScoredRecord;
use crate::model::table::CanonicalTable;
use crate::recipes::mapping as col;
use crate::report::{mean, median_sorted, quantile_sorted, std_dev};

pub const ZSCORE_THRESHOLD: f64 = 3.0;
pub const MODIFIED_ZSCORE_THRESHOLD: f64 = 3.5;
pub const IQR_MULTIPLIER: f64 = 1.5;
pub const DEFAULT_CONTAMINATION: f64 = 0.05;

/// Consistency factor turning a median absolute deviation into a sigma
/// estimate.
const MAD_SIGMA_SCALE: f64 = 1.4826;

/// Extreme-row sweep is deliberately conservative: wider bounds, a minimum
/// sample size, and a per-column sanity cap on how much it may flag.
pub const EXTREME_IQR_MULTIPLIER: f64 = 3.0;
pub const EXTREME_ZSCORE_THRESHOLD: f64 = 4.0;
pub const EXTREME_MODIFIED_ZSCORE_THRESHOLD: f64 = 4.5;
const EXTREME_MIN_POINTS: usize = 10;
const EXTREME_MAX_COLUMN_SHARE: f64 = 0.2;

pub const DEFAULT_WINSOR_LIMITS: &[(&str, f64, f64)] = &[
    (col::COL_CPM, 0.01, 0.99),
    (col::COL_CTR, 0.005, 0.995),
    (col::COL_CONVERSION_RATE, 0.005, 0.995),
    (col::COL_TOTAL_SPEND, 0.02, 0.98),
    (col::COL_IMPRESSIONS, 0.02, 0.98),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OutlierMethod {
    ZScore,
    ModifiedZScore,
    Iqr,
    Ensemble { contamination: f64 },
    Combined,
}

impl OutlierMethod {
    pub fn label(self) -> &'static str {
        match self {
            OutlierMethod::ZScore => "zscore",
            OutlierMethod::ModifiedZScore => "modified",
            OutlierMethod::Iqr => "iqr",
            OutlierMethod::Ensemble { .. } => "ensemble",
            OutlierMethod::Combined => "combined",
        }
    }
}

/// Detection result: flagged row indices per column and their sorted union.
/// Ensemble flags rows, not columns, so its hits appear only in the union.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutlierReport {
    pub by_column: BTreeMap<String, Vec<usize>>,
    pub flagged_rows: Vec<usize>,
}

impl OutlierReport {
    pub fn is_empty(&self) -> bool {
        self.flagged_rows.is_empty()
    }
}

pub fn detect_outliers(
    table: &CanonicalTable,
    columns: &[String],
    method: OutlierMethod,
) -> OutlierReport {
    let report = match method {
        OutlierMethod::ZScore => per_column_report(table, columns, zscore_flags),
        OutlierMethod::ModifiedZScore => per_column_report(table, columns, modified_z_flags),
        OutlierMethod::Iqr => per_column_report(table, columns, iqr_flags),
        OutlierMethod::Ensemble { contamination } => {
            ensemble_report(table, columns, contamination)
        }
        OutlierMethod::Combined => {
            let mut merged = per_column_report(table, columns, zscore_flags);
            merge_reports(&mut merged, per_column_report(table, columns, iqr_flags));
            merge_reports(
                &mut merged,
                ensemble_report(table, columns, DEFAULT_CONTAMINATION),
            );
            merged
        }
    };
    debug!(
        method = method.label(),
        flagged = report.flagged_rows.len(),
        columns = columns.len(),
        "outlier detection complete"
    );
    report
}

/// Marks scored records flagged by a detection report. Records keep the names
/// of the columns that tripped, or the method label when no column is
/// attributable.
pub fn annotate_records(records: &mut [ScoredRecord], report: &OutlierReport, method: OutlierMethod) {
    for (column, rows) in &report.by_column {
        for &row in rows {
            if let Some(record) = records.get_mut(row) {
                record.outlier_flags.push(column.clone());
            }
        }
    }
    for &row in &report.flagged_rows {
        if let Some(record) = records.get_mut(row) {
            record.is_outlier = true;
            if record.outlier_flags.is_empty() {
                record.outlier_flags.push(method.label().to_string());
            }
        }
    }
    for record in records {
        record.outlier_flags.sort();
        record.outlier_flags.dedup();
    }
}

pub fn drop_rows(table: &mut CanonicalTable, rows: &[usize]) {
    let drop: BTreeSet<usize> = rows.iter().copied().collect();
    let mut idx = 0usize;
    table.records.retain(|_| {
        let keep = !drop.contains(&idx);
        idx += 1;
        keep
    });
}

/// Clamps each listed column to its [p_lo, p_hi] quantile bounds.
pub fn cap_columns(table: &mut CanonicalTable, columns: &[String], p_lo: f64, p_hi: f64) {
    for name in columns {
        clamp_column(table, name, p_lo, p_hi);
    }
}

/// Winsorizes the volatile columns with per-metric quantile limits tuned to
/// how heavy each metric's tails run in practice.
pub fn winsorize(table: &mut CanonicalTable) {
    for (name, p_lo, p_hi) in DEFAULT_WINSOR_LIMITS {
        clamp_column(table, name, *p_lo, *p_hi);
    }
}

/// Rows so far out on any column that they would distort normalization for
/// everyone else. Columns with few points are skipped, and a column that
/// would flag more than a fifth of the rows is treated as untrustworthy and
/// skipped too.
pub fn extreme_outlier_rows(table: &CanonicalTable, columns: &[String]) -> Vec<usize> {
    let n = table.len();
    let mut flagged: BTreeSet<usize> = BTreeSet::new();
    for name in columns {
        let values = table.column(name);
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.len() < EXTREME_MIN_POINTS {
            continue;
        }

        let mut column_hits: BTreeSet<usize> = BTreeSet::new();
        column_hits.extend(iqr_flags_with(&values, EXTREME_IQR_MULTIPLIER));
        column_hits.extend(zscore_flags_with(&values, EXTREME_ZSCORE_THRESHOLD));
        column_hits.extend(modified_z_flags_with(
            &values,
            EXTREME_MODIFIED_ZSCORE_THRESHOLD,
        ));

        if column_hits.len() as f64 > n as f64 * EXTREME_MAX_COLUMN_SHARE {
            continue;
        }
        flagged.extend(column_hits);
    }
    flagged.into_iter().collect()
}

fn per_column_report(
    table: &CanonicalTable,
    columns: &[String],
    flags: fn(&[f64]) -> Vec<usize>,
) -> OutlierReport {
    let mut by_column = BTreeMap::new();
    let mut union: BTreeSet<usize> = BTreeSet::new();
    for name in columns {
        if !table.has_column(name) {
            continue;
        }
        let hits = flags(&table.column(name));
        if hits.is_empty() {
            continue;
        }
        union.extend(hits.iter().copied());
        by_column.insert(name.clone(), hits);
    }
    OutlierReport {
        by_column,
        flagged_rows: union.into_iter().collect(),
    }
}

fn ensemble_report(table: &CanonicalTable, columns: &[String], contamination: f64) -> OutlierReport {
    let n = table.len();
    if n == 0 || contamination <= 0.0 {
        return OutlierReport::default();
    }

    let mut deviation = vec![0.0f64; n];
    let mut used_columns = 0usize;
    for name in columns {
        if !table.has_column(name) {
            continue;
        }
        let values = table.column(name);
        let Some(scores) = modified_z_values(&values) else {
            continue;
        };
        for (row, z) in scores.iter().enumerate() {
            deviation[row] += z.abs();
        }
        used_columns += 1;
    }
    if used_columns == 0 {
        return OutlierReport::default();
    }
    for d in &mut deviation {
        *d /= used_columns as f64;
    }

    let k = ((n as f64 * contamination).ceil() as usize).min(n);
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        deviation[b]
            .partial_cmp(&deviation[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.cmp(&b))
    });
    let flagged_rows: Vec<usize> = order
        .into_iter()
        .take(k)
        .filter(|&row| deviation[row] > 0.0)
        .collect::<BTreeSet<usize>>()
        .into_iter()
        .collect();

    OutlierReport {
        by_column: BTreeMap::new(),
        flagged_rows,
    }
}

fn merge_reports(into: &mut OutlierReport, other: OutlierReport) {
    for (column, rows) in other.by_column {
        let entry = into.by_column.entry(column).or_default();
        entry.extend(rows);
        entry.sort_unstable();
        entry.dedup();
    }
    let mut union: BTreeSet<usize> = into.flagged_rows.iter().copied().collect();
    union.extend(other.flagged_rows);
    into.flagged_rows = union.into_iter().collect();
}

fn zscore_flags(values: &[f64]) -> Vec<usize> {
    zscore_flags_with(values, ZSCORE_THRESHOLD)
}

fn zscore_flags_with(values: &[f64], threshold: f64) -> Vec<usize> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < 2 {
        return Vec::new();
    }
    let m = mean(&finite);
    let sd = std_dev(&finite);
    if sd == 0.0 {
        return Vec::new();
    }
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite() && ((**v - m) / sd).abs() > threshold)
        .map(|(row, _)| row)
        .collect()
}

fn modified_z_flags(values: &[f64]) -> Vec<usize> {
    modified_z_flags_with(values, MODIFIED_ZSCORE_THRESHOLD)
}

fn modified_z_flags_with(values: &[f64], threshold: f64) -> Vec<usize> {
    let Some(scores) = modified_z_values(values) else {
        return Vec::new();
    };
    scores
        .iter()
        .enumerate()
        .filter(|(row, z)| values[*row].is_finite() && z.abs() > threshold)
        .map(|(row, _)| row)
        .collect()
}

/// Modified z per row, 0 for missing values. `None` when the column has no
/// spread at all.
fn modified_z_values(values: &[f64]) -> Option<Vec<f64>> {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < 2 {
        return None;
    }
    finite.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let med = median_sorted(&finite);

    let mut abs_dev: Vec<f64> = finite.iter().map(|v| (v - med).abs()).collect();
    abs_dev.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mad = median_sorted(&abs_dev);
    // MAD collapses to zero when more than half the values tie; fall back to
    // the mean absolute deviation.
    let spread = if mad > 0.0 { mad } else { mean(&abs_dev) };
    let sigma = MAD_SIGMA_SCALE * spread;
    if sigma == 0.0 {
        return None;
    }

    Some(
        values
            .iter()
            .map(|v| if v.is_finite() { (v - med) / sigma } else { 0.0 })
            .collect(),
    )
}

fn iqr_flags(values: &[f64]) -> Vec<usize> {
    iqr_flags_with(values, IQR_MULTIPLIER)
}

fn iqr_flags_with(values: &[f64], multiplier: f64) -> Vec<usize> {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < 4 {
        return Vec::new();
    }
    finite.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let q1 = quantile_sorted(&finite, 0.25);
    let q3 = quantile_sorted(&finite, 0.75);
    let iqr = q3 - q1;
    let lo = q1 - multiplier * iqr;
    let hi = q3 + multiplier * iqr;
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite() && (**v < lo || **v > hi))
        .map(|(row, _)| row)
        .collect()
}

fn clamp_column(table: &mut CanonicalTable, name: &str, p_lo: f64, p_hi: f64) {
    if !table.has_column(name) {
        return;
    }
    let mut finite: Vec<f64> = table
        .column(name)
        .into_iter()
        .filter(|v| v.is_finite())
        .collect();
    if finite.is_empty() {
        return;
    }
    finite.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let lo = quantile_sorted(&finite, p_lo);
    let hi = quantile_sorted(&finite, p_hi);
    for record in &mut table.records {
        if let Some(v) = record.values.get_mut(name) {
            *v = v.clamp(lo, hi);
        }
    }
}

#[cfg(test)]
#[path = "../tests/src_inline/outliers.rs"]
mod tests;
