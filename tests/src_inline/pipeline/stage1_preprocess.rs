use super::*;

use crate::model::recipe::{Channel, Goal, MetricSpec};

fn raw(headers: &[&str], rows: &[&[&str]]) -> RawTable {
    RawTable {
        headers: headers.iter().map(|h| h.to_string()).collect(),
        rows: rows
            .iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect(),
    }
}

fn recipe(platform: Platform, metrics: &[(&str, f64, bool, bool)]) -> ScoringRecipe {
    ScoringRecipe {
        platform,
        goal: Goal::Awareness,
        channel: Channel::Display,
        ctr_sensitivity: false,
        analysis_level: AnalysisLevel::Domain,
        metrics: metrics
            .iter()
            .map(|(name, weight, higher_is_better, required)| MetricSpec {
                name: name.to_string(),
                weight: *weight,
                higher_is_better: *higher_is_better,
                required: *required,
            })
            .collect(),
        required_raw_fields: Vec::new(),
    }
}

fn ctr_recipe(platform: Platform) -> ScoringRecipe {
    recipe(platform, &[("ctr", 1.0, true, true)])
}

fn preprocess(
    table: &RawTable,
    recipe: &ScoringRecipe,
    min_impressions: Option<f64>,
) -> Result<Stage1Output, PreprocessError> {
    run_stage1(&Stage1Inputs {
        table,
        recipe,
        min_impressions,
    })
}

#[test]
fn test_missing_entity_column_is_rejected() {
    let table = raw(&["Imps", "CTR"], &[&["1000", "0.05"]]);
    let err = preprocess(&table, &ctr_recipe(Platform::TradeDesk), None).unwrap_err();
    assert!(matches!(err, PreprocessError::MissingEntityColumn(c) if c == "domain"));
}

#[test]
fn test_missing_impressions_column_is_rejected() {
    let table = raw(&["Domain", "CTR"], &[&["a.com", "0.05"]]);
    let err = preprocess(&table, &ctr_recipe(Platform::TradeDesk), None).unwrap_err();
    assert!(matches!(err, PreprocessError::MissingImpressions));
}

#[test]
fn test_missing_required_metric_is_rejected() {
    // No ctr column and no clicks to derive it from.
    let table = raw(&["Domain", "Imps"], &[&["a.com", "1000"]]);
    let err = preprocess(&table, &ctr_recipe(Platform::TradeDesk), None).unwrap_err();
    assert!(matches!(err, PreprocessError::MissingRequiredMetric(m) if m == "ctr"));
}

#[test]
fn test_optional_metric_absence_is_reported_not_fatal() {
    let table = raw(&["Domain", "Imps", "CTR"], &[&["a.com", "1000", "0.05"]]);
    let mut recipe = recipe(
        Platform::TradeDesk,
        &[
            ("ctr", 0.6, true, true),
            ("ias_display_fully_in_view_1s", 0.4, true, false),
        ],
    );
    recipe.required_raw_fields = vec![
        "domain".to_string(),
        "impressions".to_string(),
        "sampled_in_view".to_string(),
    ];

    let out = preprocess(&table, &recipe, None).unwrap();
    assert_eq!(out.table.len(), 1);
    assert_eq!(
        out.report.excluded_metrics,
        vec!["ias_display_fully_in_view_1s".to_string()]
    );
    assert_eq!(out.report.missing_fields, vec!["sampled_in_view".to_string()]);
}

#[test]
fn test_aggregate_and_unparseable_rows_are_removed() {
    let table = raw(
        &["Domain", "Imps", "CTR"],
        &[
            &["a.com", "1000", "0.05"],
            &["Grand Total", "50000", "0.04"],
            &["Row Labels", "", ""],
            &["", "100", "0.01"],
            &["b.com", "n/a", "0.02"],
        ],
    );
    let out = preprocess(&table, &ctr_recipe(Platform::TradeDesk), None).unwrap();
    assert_eq!(out.report.input_rows, 5);
    assert_eq!(out.report.aggregate_rows_removed, 2);
    assert_eq!(out.report.unparseable_rows_removed, 2);
    assert_eq!(out.report.below_volume_removed, 0);
    assert_eq!(out.report.rows_removed(), 4);
    assert_eq!(out.table.len(), 1);
    assert_eq!(out.table.records[0].entity, "a.com");
}

#[test]
fn test_parse_numeric_accepts_export_formats() {
    assert_eq!(parse_numeric("1,234.56"), Some(1234.56));
    assert_eq!(parse_numeric("$12.34"), Some(12.34));
    assert_eq!(parse_numeric("85.5%"), Some(0.855));
    assert_eq!(parse_numeric(" 42 "), Some(42.0));
    assert_eq!(parse_numeric("-5"), Some(-5.0));
    assert_eq!(parse_numeric("-"), None);
    assert_eq!(parse_numeric("n/a"), None);
    assert_eq!(parse_numeric("NA"), None);
    assert_eq!(parse_numeric(""), None);
}

#[test]
fn test_percent_form_ctr_is_rescaled_once() {
    // Column max above 1 marks the whole column as percent form.
    let table = raw(
        &["Domain", "Imps", "CTR"],
        &[&["a.com", "1000", "2.5"], &["b.com", "1000", "0.5"]],
    );
    let out = preprocess(&table, &ctr_recipe(Platform::TradeDesk), None).unwrap();
    let a = out.table.records[0].get("ctr").unwrap();
    let b = out.table.records[1].get("ctr").unwrap();
    assert!((a - 0.025).abs() < 1e-12);
    assert!((b - 0.005).abs() < 1e-12);
}

#[test]
fn test_rate_form_ctr_is_left_alone() {
    let table = raw(
        &["Domain", "Imps", "CTR"],
        &[&["a.com", "1000", "0.05"], &["b.com", "1000", "0.01"]],
    );
    let out = preprocess(&table, &ctr_recipe(Platform::TradeDesk), None).unwrap();
    assert!((out.table.records[0].get("ctr").unwrap() - 0.05).abs() < 1e-12);
}

#[test]
fn test_rates_derive_from_counts() {
    let table = raw(
        &["Domain", "Imps", "Advertiser Cost", "Clicks"],
        &[&["a.com", "1000", "$5.00", "50"]],
    );
    let recipe = recipe(
        Platform::TradeDesk,
        &[("cpm", 0.4, false, true), ("ctr", 0.6, true, true)],
    );
    let out = preprocess(&table, &recipe, None).unwrap();
    let record = &out.table.records[0];
    assert!((record.get("cpm").unwrap() - 5.0).abs() < 1e-12);
    assert!((record.get("ctr").unwrap() - 0.05).abs() < 1e-12);
}

#[test]
fn test_provided_rates_are_not_overwritten() {
    // The export's own CTR wins over the clicks/impressions derivation.
    let table = raw(
        &["Domain", "Imps", "Clicks", "CTR"],
        &[&["a.com", "1000", "50", "2%"]],
    );
    let out = preprocess(&table, &ctr_recipe(Platform::TradeDesk), None).unwrap();
    assert!((out.table.records[0].get("ctr").unwrap() - 0.02).abs() < 1e-12);
}

#[test]
fn test_pulsepoint_rows_collapse_per_domain() {
    let table = raw(
        &["Domain", "Imps", "Clicks", "Spend"],
        &[
            &["a.com", "1000", "10", "$5.00"],
            &["a.com", "3000", "30", "$15.00"],
            &["b.com", "2000", "40", "$10.00"],
        ],
    );
    let recipe = recipe(
        Platform::PulsePoint,
        &[("ecpm", 0.5, false, false), ("ctr", 0.5, true, true)],
    );
    let out = preprocess(&table, &recipe, Some(0.0)).unwrap();

    assert_eq!(out.table.len(), 2);
    assert_eq!(out.report.entities_merged, 1);
    assert_eq!(out.report.output_rows, 2);

    let a = &out.table.records[0];
    assert_eq!(a.entity, "a.com");
    assert_eq!(a.get("impressions"), Some(4000.0));
    assert_eq!(a.get("clicks"), Some(40.0));
    assert_eq!(a.get("total_spend"), Some(20.0));
    assert_eq!(a.get("source_rows"), Some(2.0));
    assert!((a.get("ctr").unwrap() - 0.01).abs() < 1e-12);
    assert!((a.get("ecpm").unwrap() - 5.0).abs() < 1e-12);

    let b = &out.table.records[1];
    assert_eq!(b.entity, "b.com");
    assert_eq!(b.get("source_rows"), Some(1.0));
    assert!((b.get("ctr").unwrap() - 0.02).abs() < 1e-12);
}

#[test]
fn test_tradedesk_volume_floor_defaults() {
    let table = raw(
        &["Domain", "Imps", "CTR"],
        &[&["small.com", "100", "0.05"], &["big.com", "10000", "0.01"]],
    );
    let out = preprocess(&table, &ctr_recipe(Platform::TradeDesk), None).unwrap();
    assert_eq!(out.report.below_volume_removed, 1);
    assert_eq!(out.table.len(), 1);
    assert_eq!(out.table.records[0].entity, "big.com");
}

#[test]
fn test_app_exports_lower_the_floor() {
    let table = raw(
        &["Domain", "App", "Imps", "CTR"],
        &[
            &["a.com", "game one", "50", "0.05"],
            &["b.com", "game two", "5", "0.01"],
        ],
    );
    let out = preprocess(&table, &ctr_recipe(Platform::TradeDesk), None).unwrap();
    assert_eq!(out.report.below_volume_removed, 1);
    assert_eq!(out.table.records[0].entity, "a.com");
}

#[test]
fn test_pulsepoint_floor_scales_with_share() {
    // Total volume 10000 puts the floor at 5 impressions.
    let table = raw(
        &["Domain", "Imps", "Clicks"],
        &[&["a.com", "9996", "100"], &["b.com", "4", "1"]],
    );
    let out = preprocess(&table, &ctr_recipe(Platform::PulsePoint), None).unwrap();
    assert_eq!(out.report.below_volume_removed, 1);
    assert_eq!(out.table.len(), 1);
    assert_eq!(out.table.records[0].entity, "a.com");
}

#[test]
fn test_min_impressions_overrides_the_floor() {
    let table = raw(
        &["Domain", "Imps", "CTR"],
        &[&["small.com", "100", "0.05"], &["big.com", "10000", "0.01"]],
    );
    let out = preprocess(&table, &ctr_recipe(Platform::TradeDesk), Some(50.0)).unwrap();
    assert_eq!(out.report.below_volume_removed, 0);
    assert_eq!(out.table.len(), 2);
}

#[test]
fn test_quality_flags_count_suspicious_values() {
    let table = raw(
        &["Domain", "Imps", "Conversions", "Conversion Rate", "CPM"],
        &[&["a.com", "1000", "-5", "1.5", "1500"]],
    );
    let recipe = recipe(
        Platform::TradeDesk,
        &[("cpm", 0.5, false, true), ("conversion_rate", 0.5, true, false)],
    );
    let out = preprocess(&table, &recipe, None).unwrap();
    assert_eq!(
        out.report.flags,
        QualityFlags {
            negative_values: 1,
            rates_out_of_range: 1,
            cpm_above_ceiling: 1,
        }
    );
}

#[test]
fn test_all_rows_removed_is_an_error() {
    let table = raw(&["Domain", "Imps", "CTR"], &[&["Grand Total", "100", "0.1"]]);
    let err = preprocess(&table, &ctr_recipe(Platform::TradeDesk), None).unwrap_err();
    assert!(matches!(err, PreprocessError::EmptyAfterCleaning));
}

#[test]
fn test_second_pass_over_canonical_output_drops_nothing() {
    let table = raw(
        &["Site", "Impressions", "CPM", "CTR"],
        &[&["a.com", "1000", "$5.00", "2%"], &["b.com", "2,000", "4", "0.03"]],
    );
    let recipe = recipe(
        Platform::TradeDesk,
        &[("cpm", 0.5, false, true), ("ctr", 0.5, true, true)],
    );
    let first = preprocess(&table, &recipe, None).unwrap();
    assert_eq!(first.table.len(), 2);

    // Feed the canonical table straight back in as if it were a fresh upload.
    let mut headers = vec![first.table.entity_column.clone()];
    headers.extend(first.table.columns.iter().cloned());
    let rows: Vec<Vec<String>> = first
        .table
        .records
        .iter()
        .map(|record| {
            let mut row = vec![record.entity.clone()];
            row.extend(
                first
                    .table
                    .columns
                    .iter()
                    .map(|c| record.get(c).map(|v| v.to_string()).unwrap_or_default()),
            );
            row
        })
        .collect();
    let again = preprocess(&RawTable { headers, rows }, &recipe, None).unwrap();

    assert_eq!(again.report.rows_removed(), 0);
    assert_eq!(again.report.flags, QualityFlags::default());
    assert_eq!(again.table.records, first.table.records);
}
