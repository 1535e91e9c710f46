use super::*;

use std::collections::BTreeMap;

use crate::model::scored::QualityStatus;

fn scored(entity: &str, score: f64, impressions: f64) -> ScoredRecord {
    ScoredRecord {
        entity: entity.to_string(),
        impressions,
        raw_metrics: BTreeMap::new(),
        normalized_metrics: BTreeMap::new(),
        quality_score: score,
        score_breakdown: Vec::new(),
        percentile_rank: 0.0,
        quality_status: QualityStatus::Moderate,
        is_outlier: false,
        outlier_flags: Vec::new(),
        explanation: String::new(),
    }
}

fn lists(records: &[ScoredRecord], min_impressions: f64) -> Stage4Output {
    run_stage4(&Stage4Inputs {
        records,
        min_impressions,
    })
}

#[test]
fn test_quartiles_split_the_ranking() {
    let records: Vec<ScoredRecord> = [
        ("top1.com", 80.0),
        ("top2.com", 70.0),
        ("mid1.com", 60.0),
        ("mid2.com", 50.0),
        ("mid3.com", 40.0),
        ("mid4.com", 30.0),
        ("low1.com", 20.0),
        ("low2.com", 10.0),
    ]
    .iter()
    .map(|(entity, score)| scored(entity, *score, 1000.0))
    .collect();

    let out = lists(&records, 250.0);
    assert_eq!(out.whitelist.entities(), vec!["top1.com", "top2.com"]);
    // Worst first, so a buyer reads the most harmful entries at the top.
    assert_eq!(out.blacklist.entities(), vec!["low2.com", "low1.com"]);
    assert_eq!(out.whitelist.total_impressions, 2000.0);
    assert!((out.whitelist.average_score - 75.0).abs() < 1e-9);
}

#[test]
fn test_single_entity_goes_to_the_whitelist_only() {
    let records = vec![scored("only.com", 55.0, 1000.0)];
    let out = lists(&records, 250.0);
    assert_eq!(out.whitelist.entities(), vec!["only.com"]);
    assert!(out.blacklist.entries.is_empty());
    assert_eq!(out.blacklist.average_score, 0.0);
}

#[test]
fn test_lists_stay_disjoint_when_quartiles_collide() {
    let records = vec![scored("good.com", 90.0, 1000.0), scored("bad.com", 10.0, 1000.0)];
    let out = lists(&records, 250.0);
    assert_eq!(out.whitelist.entities(), vec!["good.com"]);
    assert_eq!(out.blacklist.entities(), vec!["bad.com"]);

    let records = vec![
        scored("good.com", 90.0, 1000.0),
        scored("mid.com", 50.0, 1000.0),
        scored("bad.com", 10.0, 1000.0),
    ];
    let out = lists(&records, 250.0);
    assert_eq!(out.whitelist.entities(), vec!["good.com"]);
    assert_eq!(out.blacklist.entities(), vec!["bad.com"]);
}

#[test]
fn test_volume_floor_gates_eligibility() {
    let records = vec![
        scored("thin.com", 99.0, 100.0),
        scored("a.com", 80.0, 1000.0),
        scored("b.com", 60.0, 1000.0),
        scored("c.com", 40.0, 1000.0),
        scored("d.com", 20.0, 1000.0),
    ];
    let out = lists(&records, 250.0);
    assert_eq!(out.whitelist.entities(), vec!["a.com"]);
    assert_eq!(out.blacklist.entities(), vec!["d.com"]);
}

#[test]
fn test_ties_rank_alphabetically() {
    let records = vec![
        scored("delta.com", 50.0, 1000.0),
        scored("alpha.com", 50.0, 1000.0),
        scored("charlie.com", 50.0, 1000.0),
        scored("bravo.com", 50.0, 1000.0),
    ];
    let out = lists(&records, 250.0);
    assert_eq!(out.whitelist.entities(), vec!["alpha.com"]);
    assert_eq!(out.blacklist.entities(), vec!["delta.com"]);
}

#[test]
fn test_criteria_echo_the_inputs() {
    let records = vec![scored("only.com", 55.0, 1000.0)];
    let out = lists(&records, 500.0);
    assert_eq!(out.whitelist.list_type, ListType::Whitelist);
    assert_eq!(out.blacklist.list_type, ListType::Blacklist);
    assert_eq!(out.whitelist.criteria.min_impressions, 500.0);
    assert_eq!(out.whitelist.criteria.quartile, LIST_QUARTILE);
}
