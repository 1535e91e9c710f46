use super::*;

use crate::model::recipe::{AnalysisLevel, Channel, Goal, MetricSpec, Platform};
use crate::model::table::CanonicalRecord;

fn recipe(metrics: &[(&str, bool)]) -> ScoringRecipe {
    let weight = 1.0 / metrics.len() as f64;
    ScoringRecipe {
        platform: Platform::TradeDesk,
        goal: Goal::Awareness,
        channel: Channel::Display,
        ctr_sensitivity: false,
        analysis_level: AnalysisLevel::Domain,
        metrics: metrics
            .iter()
            .map(|(name, higher_is_better)| MetricSpec {
                name: name.to_string(),
                weight,
                higher_is_better: *higher_is_better,
                required: false,
            })
            .collect(),
        required_raw_fields: Vec::new(),
    }
}

fn table(columns: &[(&str, &[Option<f64>])]) -> CanonicalTable {
    let rows = columns.first().map(|(_, vals)| vals.len()).unwrap_or(0);
    let records = (0..rows)
        .map(|row| {
            let mut values = BTreeMap::new();
            for (name, vals) in columns {
                if let Some(v) = vals[row] {
                    values.insert(name.to_string(), v);
                }
            }
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

#[test]
fn test_higher_is_better_scales_to_the_observed_range() {
    let table = table(&[("ctr", &[Some(10.0), Some(20.0), Some(30.0)])]);
    let out = run_stage2(table, &recipe(&[("ctr", true)]));
    assert_eq!(out.normalized[0].get("ctr"), Some(&0.0));
    assert_eq!(out.normalized[1].get("ctr"), Some(&50.0));
    assert_eq!(out.normalized[2].get("ctr"), Some(&100.0));
}

#[test]
fn test_lower_is_better_inverts_the_scale() {
    let table = table(&[("cpm", &[Some(2.0), Some(4.0)])]);
    let out = run_stage2(table, &recipe(&[("cpm", false)]));
    assert_eq!(out.normalized[0].get("cpm"), Some(&100.0));
    assert_eq!(out.normalized[1].get("cpm"), Some(&0.0));
}

#[test]
fn test_constant_column_scores_the_midpoint() {
    let table = table(&[("ctr", &[Some(5.0), Some(5.0), Some(5.0)])]);
    let out = run_stage2(table, &recipe(&[("ctr", true)]));
    for norms in &out.normalized {
        assert_eq!(norms.get("ctr"), Some(&CONSTANT_COLUMN_SCORE));
    }
    assert_eq!(out.stats[0].min, 5.0);
    assert_eq!(out.stats[0].max, 5.0);
}

#[test]
fn test_missing_values_score_zero() {
    let table = table(&[("ctr", &[Some(10.0), Some(30.0), None])]);
    let out = run_stage2(table, &recipe(&[("ctr", true)]));
    assert_eq!(out.normalized[0].get("ctr"), Some(&0.0));
    assert_eq!(out.normalized[1].get("ctr"), Some(&100.0));
    assert_eq!(out.normalized[2].get("ctr"), Some(&0.0));
    assert_eq!(out.stats[0].count, 2);
}

#[test]
fn test_absent_metrics_are_skipped() {
    let table = table(&[("ctr", &[Some(1.0), Some(2.0)])]);
    let out = run_stage2(table, &recipe(&[("ctr", true), ("cpm", false)]));
    assert_eq!(out.available_metrics(), vec!["ctr"]);
    assert!(out.normalized[0].get("cpm").is_none());
}

#[test]
fn test_stats_capture_the_scale_parameters() {
    let table = table(&[("cpm", &[Some(2.0), Some(8.0), Some(4.0)])]);
    let out = run_stage2(table, &recipe(&[("cpm", false)]));
    let stats = &out.stats[0];
    assert_eq!(stats.metric, "cpm");
    assert_eq!(stats.min, 2.0);
    assert_eq!(stats.max, 8.0);
    assert_eq!(stats.count, 3);
    assert!(!stats.higher_is_better);
}
