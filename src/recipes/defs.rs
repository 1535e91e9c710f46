//! Built-in weighting recipes per platform, channel and campaign goal.
//!
//! Weights within each recipe sum to 1.0. Lower-is-better metrics (costs,
//! error rates, churn signals) are inverted during normalization so a high
//! quality score always means good inventory.

use crate::model::recipe::{AnalysisLevel, Channel, Goal, Platform};

use super::mapping as col;

#[derive(Debug, Clone)]
pub struct MetricDef {
    pub name: &'static str,
    pub weight: f64,
    pub higher_is_better: bool,
    pub required: bool,
}

#[derive(Debug, Clone)]
pub struct RecipeDef {
    pub platform: Platform,
    pub channel: Channel,
    /// `None` when the weighting does not depend on the campaign goal.
    pub goal: Option<Goal>,
    pub ctr_sensitive: bool,
    pub analysis_level: AnalysisLevel,
    pub metrics: &'static [MetricDef],
    /// Canonical columns the platform export is expected to carry.
    pub required_raw_fields: &'static [&'static str],
}

const TTD_DISPLAY_AWARENESS: &[MetricDef] = &[
    MetricDef {
        name: col::COL_CPM,
        weight: 0.15,
        higher_is_better: false,
        required: true,
    },
    MetricDef {
        name: col::COL_IAS_VIEWABILITY,
        weight: 0.25,
        higher_is_better: true,
        required: false,
    },
    MetricDef {
        name: col::COL_CTR,
        weight: 0.20,
        higher_is_better: true,
        required: true,
    },
    MetricDef {
        name: col::COL_AD_LOAD_RATE,
        weight: 0.20,
        higher_is_better: false,
        required: false,
    },
    MetricDef {
        name: col::COL_AD_REFRESH_RATE,
        weight: 0.20,
        higher_is_better: false,
        required: false,
    },
];

const TTD_DISPLAY_AWARENESS_CTR: &[MetricDef] = &[
    MetricDef {
        name: col::COL_CPM,
        weight: 0.10,
        higher_is_better: false,
        required: true,
    },
    MetricDef {
        name: col::COL_IAS_VIEWABILITY,
        weight: 0.25,
        higher_is_better: true,
        required: false,
    },
    MetricDef {
        name: col::COL_CTR,
        weight: 0.30,
        higher_is_better: true,
        required: true,
    },
    MetricDef {
        name: col::COL_AD_LOAD_RATE,
        weight: 0.15,
        higher_is_better: false,
        required: false,
    },
    MetricDef {
        name: col::COL_AD_REFRESH_RATE,
        weight: 0.20,
        higher_is_better: false,
        required: false,
    },
];

const TTD_DISPLAY_ACTION: &[MetricDef] = &[
    MetricDef {
        name: col::COL_CPM,
        weight: 0.10,
        higher_is_better: false,
        required: true,
    },
    MetricDef {
        name: col::COL_IAS_VIEWABILITY,
        weight: 0.10,
        higher_is_better: true,
        required: false,
    },
    MetricDef {
        name: col::COL_CONVERSION_RATE,
        weight: 0.30,
        higher_is_better: true,
        required: true,
    },
    MetricDef {
        name: col::COL_CTR,
        weight: 0.15,
        higher_is_better: true,
        required: true,
    },
    MetricDef {
        name: col::COL_AD_LOAD_RATE,
        weight: 0.15,
        higher_is_better: false,
        required: false,
    },
    MetricDef {
        name: col::COL_AD_REFRESH_RATE,
        weight: 0.20,
        higher_is_better: false,
        required: false,
    },
];

const TTD_PLAYER: &[MetricDef] = &[
    MetricDef {
        name: col::COL_CPM,
        weight: 0.10,
        higher_is_better: false,
        required: true,
    },
    MetricDef {
        name: col::COL_SAMPLED_IN_VIEW,
        weight: 0.20,
        higher_is_better: true,
        required: false,
    },
    MetricDef {
        name: col::COL_PLAYER_COMPLETION,
        weight: 0.35,
        higher_is_better: true,
        required: true,
    },
    MetricDef {
        name: col::COL_PLAYER_ERRORS,
        weight: 0.20,
        higher_is_better: false,
        required: false,
    },
    MetricDef {
        name: col::COL_PLAYER_MUTE,
        weight: 0.15,
        higher_is_better: false,
        required: false,
    },
];

const TTD_CTV: &[MetricDef] = &[
    MetricDef {
        name: col::COL_TVQI_RATIO,
        weight: 0.70,
        higher_is_better: true,
        required: true,
    },
    MetricDef {
        name: col::COL_UNIQUE_ID_RATIO,
        weight: 0.30,
        higher_is_better: true,
        required: false,
    },
];

const PP_DISPLAY_AWARENESS: &[MetricDef] = &[
    MetricDef {
        name: col::COL_ECPM,
        weight: 0.35,
        higher_is_better: false,
        required: true,
    },
    MetricDef {
        name: col::COL_CTR,
        weight: 0.40,
        higher_is_better: true,
        required: true,
    },
    MetricDef {
        name: col::COL_CONVERSION_RATE,
        weight: 0.25,
        higher_is_better: true,
        required: false,
    },
];

const PP_DISPLAY_ACTION: &[MetricDef] = &[
    MetricDef {
        name: col::COL_ECPM,
        weight: 0.15,
        higher_is_better: false,
        required: true,
    },
    MetricDef {
        name: col::COL_CTR,
        weight: 0.25,
        higher_is_better: true,
        required: false,
    },
    MetricDef {
        name: col::COL_CONVERSION_RATE,
        weight: 0.60,
        higher_is_better: true,
        required: true,
    },
];

const PP_VIDEO: &[MetricDef] = &[
    MetricDef {
        name: col::COL_ECPM,
        weight: 0.20,
        higher_is_better: false,
        required: true,
    },
    MetricDef {
        name: col::COL_CTR,
        weight: 0.10,
        higher_is_better: true,
        required: false,
    },
    MetricDef {
        name: col::COL_COMPLETION_RATE,
        weight: 0.50,
        higher_is_better: true,
        required: true,
    },
    MetricDef {
        name: col::COL_CONVERSION_RATE,
        weight: 0.20,
        higher_is_better: true,
        required: false,
    },
];

const TTD_DISPLAY_FIELDS: &[&str] = &[
    col::COL_DOMAIN,
    col::COL_SUPPLY_VENDOR,
    col::COL_ADVERTISER_COST,
    col::COL_IMPRESSIONS,
    col::COL_CPM,
    col::COL_IAS_VIEWABILITY,
    col::COL_AD_LOAD_IMPS,
    col::COL_AD_REFRESH_IMPS,
];

const TTD_DISPLAY_CTR_FIELDS: &[&str] = &[
    col::COL_DOMAIN,
    col::COL_SUPPLY_VENDOR,
    col::COL_ADVERTISER_COST,
    col::COL_IMPRESSIONS,
    col::COL_CPM,
    col::COL_CLICKS,
    col::COL_CTR,
    col::COL_IAS_VIEWABILITY,
    col::COL_AD_LOAD_IMPS,
    col::COL_AD_REFRESH_IMPS,
];

const TTD_DISPLAY_ACTION_FIELDS: &[&str] = &[
    col::COL_DOMAIN,
    col::COL_SUPPLY_VENDOR,
    col::COL_ADVERTISER_COST,
    col::COL_IMPRESSIONS,
    col::COL_CPM,
    col::COL_CLICKS,
    col::COL_CTR,
    col::COL_CONVERSION_RATE,
    col::COL_IAS_VIEWABILITY,
    col::COL_AD_LOAD_IMPS,
    col::COL_AD_REFRESH_IMPS,
];

const TTD_PLAYER_FIELDS: &[&str] = &[
    col::COL_DOMAIN,
    col::COL_SUPPLY_VENDOR,
    col::COL_ADVERTISER_COST,
    col::COL_IMPRESSIONS,
    col::COL_CPM,
    col::COL_SAMPLED_IN_VIEW,
    col::COL_PLAYER_COMPLETION,
    col::COL_PLAYER_ERRORS,
    col::COL_PLAYER_MUTE,
];

const TTD_CTV_FIELDS: &[&str] = &[
    col::COL_SUPPLY_VENDOR,
    col::COL_ADVERTISER_COST,
    col::COL_IMPRESSIONS,
    col::COL_TVQI_RAW,
    col::COL_TVQI_MEASURED,
    col::COL_UNIQUE_IDS,
];

const PP_DISPLAY_FIELDS: &[&str] = &[
    col::COL_DOMAIN,
    col::COL_TOTAL_SPEND,
    col::COL_IMPRESSIONS,
    col::COL_ECPM,
    col::COL_CTR,
    col::COL_CONVERSIONS,
];

const PP_VIDEO_FIELDS: &[&str] = &[
    col::COL_DOMAIN,
    col::COL_TOTAL_SPEND,
    col::COL_IMPRESSIONS,
    col::COL_ECPM,
    col::COL_CTR,
    col::COL_CONVERSIONS,
    col::COL_COMPLETION_RATE,
];

const BUILTIN_RECIPES: &[RecipeDef] = &[
    RecipeDef {
        platform: Platform::TradeDesk,
        channel: Channel::Display,
        goal: Some(Goal::Awareness),
        ctr_sensitive: false,
        analysis_level: AnalysisLevel::Domain,
        metrics: TTD_DISPLAY_AWARENESS,
        required_raw_fields: TTD_DISPLAY_FIELDS,
    },
    RecipeDef {
        platform: Platform::TradeDesk,
        channel: Channel::Display,
        goal: Some(Goal::Awareness),
        ctr_sensitive: true,
        analysis_level: AnalysisLevel::Domain,
        metrics: TTD_DISPLAY_AWARENESS_CTR,
        required_raw_fields: TTD_DISPLAY_CTR_FIELDS,
    },
    RecipeDef {
        platform: Platform::TradeDesk,
        channel: Channel::Display,
        goal: Some(Goal::Action),
        ctr_sensitive: false,
        analysis_level: AnalysisLevel::Domain,
        metrics: TTD_DISPLAY_ACTION,
        required_raw_fields: TTD_DISPLAY_ACTION_FIELDS,
    },
    RecipeDef {
        platform: Platform::TradeDesk,
        channel: Channel::Video,
        goal: None,
        ctr_sensitive: false,
        analysis_level: AnalysisLevel::Domain,
        metrics: TTD_PLAYER,
        required_raw_fields: TTD_PLAYER_FIELDS,
    },
    RecipeDef {
        platform: Platform::TradeDesk,
        channel: Channel::Audio,
        goal: None,
        ctr_sensitive: false,
        analysis_level: AnalysisLevel::Domain,
        metrics: TTD_PLAYER,
        required_raw_fields: TTD_PLAYER_FIELDS,
    },
    RecipeDef {
        platform: Platform::TradeDesk,
        channel: Channel::Ctv,
        goal: None,
        ctr_sensitive: false,
        analysis_level: AnalysisLevel::SupplyVendor,
        metrics: TTD_CTV,
        required_raw_fields: TTD_CTV_FIELDS,
    },
    RecipeDef {
        platform: Platform::PulsePoint,
        channel: Channel::Display,
        goal: Some(Goal::Awareness),
        ctr_sensitive: false,
        analysis_level: AnalysisLevel::Domain,
        metrics: PP_DISPLAY_AWARENESS,
        required_raw_fields: PP_DISPLAY_FIELDS,
    },
    RecipeDef {
        platform: Platform::PulsePoint,
        channel: Channel::Display,
        goal: Some(Goal::Action),
        ctr_sensitive: false,
        analysis_level: AnalysisLevel::Domain,
        metrics: PP_DISPLAY_ACTION,
        required_raw_fields: PP_DISPLAY_FIELDS,
    },
    RecipeDef {
        platform: Platform::PulsePoint,
        channel: Channel::Video,
        goal: None,
        ctr_sensitive: false,
        analysis_level: AnalysisLevel::Domain,
        metrics: PP_VIDEO,
        required_raw_fields: PP_VIDEO_FIELDS,
    },
];

pub fn builtin_recipes() -> &'static [RecipeDef] {
    BUILTIN_RECIPES
}
