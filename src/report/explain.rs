use crate::model::recipe::ScoringRecipe;
use crate::model::scored::{QualityStatus, ScoredRecord};
use crate::recipes::mapping::{
    COL_AD_LOAD_RATE, COL_AD_REFRESH_RATE, COL_COMPLETION_RATE, COL_CONVERSION_RATE, COL_CPM,
    COL_CTR, COL_ECPM, COL_IAS_VIEWABILITY, COL_PLAYER_COMPLETION, COL_PLAYER_ERRORS,
    COL_PLAYER_MUTE, COL_SAMPLED_IN_VIEW, COL_TVQI_RATIO, COL_UNIQUE_ID_RATIO, RATE_COLUMNS,
};

/// One-sentence explanation built from the record's tier and the
/// highest-weight recipe metric. Deterministic: the same inputs always
/// produce the same sentence.
pub fn explain_record(record: &ScoredRecord, recipe: &ScoringRecipe) -> String {
    let percentile = format!("{} percentile", ordinal(record.percentile_rank.round() as i64));
    let Some(primary) = recipe.primary_metric() else {
        return format!("{}: {} ({})", record.entity, tier_phrase(record.quality_status), percentile);
    };
    match record.raw_metrics.get(&primary.name) {
        Some(&value) => format!(
            "{}: {} at the {} with {} {}",
            record.entity,
            tier_phrase(record.quality_status),
            percentile,
            metric_label(&primary.name),
            format_metric(&primary.name, value),
        ),
        None => format!(
            "{}: {} at the {}; {} was not reported",
            record.entity,
            tier_phrase(record.quality_status),
            percentile,
            metric_label(&primary.name),
        ),
    }
}

fn ordinal(n: i64) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

fn tier_phrase(status: QualityStatus) -> &'static str {
    match status {
        QualityStatus::Good => "top-tier inventory",
        QualityStatus::Moderate => "mid-tier inventory",
        QualityStatus::Poor => "bottom-tier inventory",
    }
}

fn metric_label(name: &str) -> String {
    let label = match name {
        n if n == COL_CTR => "click-through rate",
        n if n == COL_CONVERSION_RATE => "conversion rate",
        n if n == COL_COMPLETION_RATE => "completion rate",
        n if n == COL_PLAYER_COMPLETION => "player completion",
        n if n == COL_SAMPLED_IN_VIEW => "sampled viewability",
        n if n == COL_IAS_VIEWABILITY => "IAS viewability",
        n if n == COL_PLAYER_ERRORS => "player error rate",
        n if n == COL_PLAYER_MUTE => "player mute rate",
        n if n == COL_AD_LOAD_RATE => "excessive ad load rate",
        n if n == COL_AD_REFRESH_RATE => "fast ad refresh rate",
        n if n == COL_CPM => "CPM",
        n if n == COL_ECPM => "eCPM",
        n if n == COL_TVQI_RATIO => "TV quality index ratio",
        n if n == COL_UNIQUE_ID_RATIO => "unique ID ratio",
        _ => return name.replace('_', " "),
    };
    label.to_string()
}

/// Rates render as percents, cost metrics as dollars, ratios as plain
/// numbers.
fn format_metric(name: &str, value: f64) -> String {
    if RATE_COLUMNS.contains(&name) {
        format!("of {:.2}%", value * 100.0)
    } else if name == COL_CPM || name == COL_ECPM {
        format!("of ${value:.2}")
    } else {
        format!("of {value:.2}")
    }
}
