use super::*;

use crate::model::scored::QualityStatus;
use crate::model::table::CanonicalRecord;

fn table(columns: &[(&str, &[f64])]) -> CanonicalTable {
    let rows = columns.first().map(|(_, vals)| vals.len()).unwrap_or(0);
    let records = (0..rows)
        .map(|row| {
            let values: BTreeMap<String, f64> = columns
                .iter()
                .map(|(name, vals)| (name.to_string(), vals[row]))
                .collect();
            CanonicalRecord {
                entity: format!("d{row}.com"),
                values,
            }
        })
        .collect();
    CanonicalTable {
        entity_column: "domain".to_string(),
        columns: columns.iter().map(|(name, _)| name.to_string()).collect(),
        records,
    }
}

fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn blank_records(n: usize) -> Vec<ScoredRecord> {
    (0..n)
        .map(|i| ScoredRecord {
            entity: format!("d{i}.com"),
            impressions: 0.0,
            raw_metrics: BTreeMap::new(),
            normalized_metrics: BTreeMap::new(),
            quality_score: 0.0,
            score_breakdown: Vec::new(),
            percentile_rank: 0.0,
            quality_status: QualityStatus::Moderate,
            is_outlier: false,
            outlier_flags: Vec::new(),
            explanation: String::new(),
        })
        .collect()
}

#[test]
fn test_zscore_flags_the_extreme_row() {
    let mut values = vec![10.0; 11];
    values.push(1000.0);
    assert_eq!(zscore_flags(&values), vec![11]);
    // A constant column has no spread to measure against.
    assert!(zscore_flags(&values[..11]).is_empty());
}

#[test]
fn test_modified_zscore_flags_via_mad() {
    assert_eq!(modified_z_flags(&[1.0, 2.0, 3.0, 4.0, 5.0, 100.0]), vec![5]);
}

#[test]
fn test_modified_zscore_falls_back_to_mean_deviation() {
    // More than half the values tie, so the MAD is zero.
    assert_eq!(modified_z_flags(&[5.0, 5.0, 5.0, 5.0, 5.0, 50.0]), vec![5]);
    assert!(modified_z_flags(&[5.0; 6]).is_empty());
}

#[test]
fn test_iqr_flags_and_small_sample_guard() {
    assert_eq!(iqr_flags(&[1.0, 2.0, 3.0, 100.0]), vec![3]);
    assert!(iqr_flags(&[1.0, 2.0, 100.0]).is_empty());
}

#[test]
fn test_ensemble_takes_the_top_share() {
    let table = table(&[("ctr", &[1.0, 2.0, 3.0, 100.0])]);
    let report = detect_outliers(
        &table,
        &names(&["ctr"]),
        OutlierMethod::Ensemble { contamination: 0.5 },
    );
    assert_eq!(report.flagged_rows, vec![0, 3]);
    assert!(report.by_column.is_empty());

    let silent = detect_outliers(
        &table,
        &names(&["ctr"]),
        OutlierMethod::Ensemble { contamination: 0.0 },
    );
    assert!(silent.is_empty());
}

#[test]
fn test_combined_unions_all_methods() {
    let mut ctr = vec![10.0; 11];
    ctr.push(1000.0);
    let table = table(&[("ctr", &ctr)]);
    let report = detect_outliers(&table, &names(&["ctr"]), OutlierMethod::Combined);
    assert_eq!(report.flagged_rows, vec![11]);
    assert_eq!(report.by_column.get("ctr"), Some(&vec![11]));
}

#[test]
fn test_missing_columns_are_ignored() {
    let table = table(&[("ctr", &[1.0, 2.0, 3.0, 100.0])]);
    let report = detect_outliers(&table, &names(&["ctr", "cpm"]), OutlierMethod::Iqr);
    assert_eq!(report.flagged_rows, vec![3]);
    assert_eq!(report.by_column.len(), 1);
}

#[test]
fn test_annotate_marks_columns_and_method() {
    let mut records = blank_records(3);
    let mut by_column = BTreeMap::new();
    by_column.insert("ctr".to_string(), vec![0]);
    by_column.insert("cpm".to_string(), vec![0]);
    let report = OutlierReport {
        by_column,
        flagged_rows: vec![0, 2],
    };

    annotate_records(&mut records, &report, OutlierMethod::Iqr);

    assert!(records[0].is_outlier);
    assert_eq!(
        records[0].outlier_flags,
        vec!["cpm".to_string(), "ctr".to_string()]
    );
    assert!(!records[1].is_outlier);
    assert!(records[1].outlier_flags.is_empty());
    assert!(records[2].is_outlier);
    // No column attribution, so the method label stands in.
    assert_eq!(records[2].outlier_flags, vec!["iqr".to_string()]);
}

#[test]
fn test_drop_rows_removes_by_index() {
    let mut table = table(&[("ctr", &[1.0, 2.0, 3.0, 4.0])]);
    drop_rows(&mut table, &[1, 3]);
    assert_eq!(table.len(), 2);
    assert_eq!(table.records[0].entity, "d0.com");
    assert_eq!(table.records[1].entity, "d2.com");
}

#[test]
fn test_cap_columns_clamps_the_tails() {
    let values: Vec<f64> = (0..=10).map(|v| v as f64).collect();
    let mut table = table(&[("cpm", &values)]);
    cap_columns(&mut table, &names(&["cpm"]), 0.0, 0.5);
    assert_eq!(table.records[0].get("cpm"), Some(0.0));
    assert_eq!(table.records[5].get("cpm"), Some(5.0));
    assert_eq!(table.records[10].get("cpm"), Some(5.0));
}

#[test]
fn test_winsorize_touches_only_the_volatile_columns() {
    let cpm: Vec<f64> = (0..=100).map(|v| v as f64).collect();
    let viewability: Vec<f64> = (0..=100).map(|v| v as f64 * 10.0).collect();
    let mut table = table(&[("cpm", &cpm), ("sampled_in_view", &viewability)]);
    winsorize(&mut table);
    assert_eq!(table.records[0].get("cpm"), Some(1.0));
    assert_eq!(table.records[100].get("cpm"), Some(99.0));
    assert_eq!(table.records[100].get("sampled_in_view"), Some(1000.0));
}

#[test]
fn test_extreme_rows_need_enough_points() {
    let small = table(&[("ctr", &[1.0, 2.0, 3.0, 100.0, 2.0])]);
    assert!(extreme_outlier_rows(&small, &names(&["ctr"])).is_empty());

    let mut ctr = vec![10.0; 11];
    ctr.push(1000.0);
    let big = table(&[("ctr", &ctr)]);
    assert_eq!(extreme_outlier_rows(&big, &names(&["ctr"])), vec![11]);
}
