use super::*;

use std::collections::BTreeSet;

use crate::model::recipe::{AnalysisLevel, Channel, Goal, Platform};
use crate::model::table::{CanonicalRecord, CanonicalTable};
use crate::pipeline::stage2_normalize::run_stage2;

fn recipe(metrics: &[(&str, f64, bool)]) -> ScoringRecipe {
    ScoringRecipe {
        platform: Platform::TradeDesk,
        goal: Goal::Awareness,
        channel: Channel::Display,
        ctr_sensitivity: false,
        analysis_level: AnalysisLevel::Domain,
        metrics: metrics
            .iter()
            .map(|(name, weight, higher_is_better)| MetricSpec {
                name: name.to_string(),
                weight: *weight,
                higher_is_better: *higher_is_better,
                required: false,
            })
            .collect(),
        required_raw_fields: Vec::new(),
    }
}

fn record(entity: &str, values: &[(&str, f64)]) -> CanonicalRecord {
    CanonicalRecord {
        entity: entity.to_string(),
        values: values.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
    }
}

fn normalized_over(records: Vec<CanonicalRecord>, recipe: &ScoringRecipe) -> NormalizedTable {
    let mut columns = BTreeSet::new();
    for record in &records {
        columns.extend(record.values.keys().cloned());
    }
    run_stage2(
        CanonicalTable {
            entity_column: "domain".to_string(),
            columns,
            records,
        },
        recipe,
    )
}

fn score(records: Vec<CanonicalRecord>, recipe: &ScoringRecipe) -> Vec<ScoredRecord> {
    let normalized = normalized_over(records, recipe);
    run_stage3(&Stage3Inputs {
        normalized: &normalized,
        recipe,
    })
    .unwrap()
}

#[test]
fn test_two_domain_table_hits_both_endpoints() {
    let recipe = recipe(&[("ctr", 0.6, true), ("cpm", 0.4, false)]);
    let records = score(
        vec![
            record("a.com", &[("impressions", 1000.0), ("ctr", 0.05), ("cpm", 5.0)]),
            record("b.com", &[("impressions", 1000.0), ("ctr", 0.01), ("cpm", 10.0)]),
        ],
        &recipe,
    );

    let a = &records[0];
    let b = &records[1];
    assert!((a.quality_score - 100.0).abs() < 1e-9);
    assert!(b.quality_score.abs() < 1e-9);
    assert_eq!(a.percentile_rank, 100.0);
    assert_eq!(b.percentile_rank, 0.0);
    assert_eq!(a.quality_status, QualityStatus::Good);
    assert_eq!(b.quality_status, QualityStatus::Poor);
    assert_eq!(a.impressions, 1000.0);
    assert_eq!(a.raw_metrics.get("ctr"), Some(&0.05));
    assert!(a.explanation.contains("a.com"));
}

#[test]
fn test_weights_renormalize_over_available_metrics() {
    // sampled_in_view never shows up, so ctr carries its full weight.
    let recipe = recipe(&[("ctr", 0.25, true), ("sampled_in_view", 0.75, true)]);
    let records = score(
        vec![
            record("a.com", &[("ctr", 0.01)]),
            record("b.com", &[("ctr", 0.05)]),
        ],
        &recipe,
    );

    let best = &records[1];
    assert!((best.quality_score - 100.0).abs() < 1e-9);
    assert_eq!(best.score_breakdown.len(), 1);
    assert_eq!(best.score_breakdown[0].metric, "ctr");
    assert!((best.score_breakdown[0].contribution - 100.0).abs() < 1e-9);
}

#[test]
fn test_contributions_sum_to_the_score() {
    let recipe = recipe(&[
        ("ctr", 0.5, true),
        ("cpm", 0.3, false),
        ("conversion_rate", 0.2, true),
    ]);
    let records = score(
        vec![
            record("a.com", &[("ctr", 0.02), ("cpm", 4.0), ("conversion_rate", 0.001)]),
            record("b.com", &[("ctr", 0.05), ("cpm", 2.0), ("conversion_rate", 0.003)]),
            record("c.com", &[("ctr", 0.01), ("cpm", 9.0), ("conversion_rate", 0.002)]),
        ],
        &recipe,
    );

    for record in &records {
        let sum: f64 = record.score_breakdown.iter().map(|c| c.contribution).sum();
        assert!((sum - record.quality_score).abs() < 1e-9, "{}", record.entity);
        assert!((0.0..=100.0).contains(&record.quality_score));
    }
}

#[test]
fn test_no_usable_metrics_is_an_error() {
    let recipe = recipe(&[("ctr", 1.0, true)]);
    let normalized = normalized_over(vec![record("a.com", &[("cpm", 5.0)])], &recipe);
    let err = run_stage3(&Stage3Inputs {
        normalized: &normalized,
        recipe: &recipe,
    })
    .unwrap_err();
    assert!(matches!(err, ScoreError::NoUsableMetrics));
}

#[test]
fn test_percentile_ranks_average_ties() {
    assert_eq!(
        percentile_ranks(&[10.0, 20.0, 20.0, 40.0]),
        vec![0.0, 50.0, 50.0, 100.0]
    );
    assert_eq!(percentile_ranks(&[5.0, 5.0]), vec![50.0, 50.0]);
}

#[test]
fn test_percentile_rank_edge_sizes() {
    assert!(percentile_ranks(&[]).is_empty());
    assert_eq!(percentile_ranks(&[42.0]), vec![100.0]);
}

#[test]
fn test_status_boundaries() {
    assert_eq!(status_for(100.0), QualityStatus::Good);
    assert_eq!(status_for(GOOD_PERCENTILE), QualityStatus::Good);
    assert_eq!(status_for(GOOD_PERCENTILE - 0.01), QualityStatus::Moderate);
    assert_eq!(status_for(POOR_PERCENTILE), QualityStatus::Moderate);
    assert_eq!(status_for(POOR_PERCENTILE - 0.01), QualityStatus::Poor);
    assert_eq!(status_for(0.0), QualityStatus::Poor);
}

#[test]
fn test_status_never_improves_down_the_ranking() {
    let records = (0..8)
        .map(|i| record(&format!("d{i}.com"), &[("ctr", i as f64 / 100.0)]))
        .collect();
    let mut scored = score(records, &recipe(&[("ctr", 1.0, true)]));
    scored.sort_by(|a, b| b.quality_score.partial_cmp(&a.quality_score).unwrap());

    let tier = |status: QualityStatus| match status {
        QualityStatus::Good => 0,
        QualityStatus::Moderate => 1,
        QualityStatus::Poor => 2,
    };
    let mut seen = [false; 3];
    let mut worst = 0;
    for row in &scored {
        let rank = tier(row.quality_status);
        assert!(rank >= worst, "{} jumped back up a tier", row.entity);
        worst = rank;
        seen[rank] = true;
    }
    assert_eq!(seen, [true; 3]);
}
