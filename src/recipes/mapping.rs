//! Canonical column vocabulary and the vendor-header mapping table.

pub const COL_DOMAIN: &str = "domain";
pub const COL_SUPPLY_VENDOR: &str = "supply_vendor";
pub const COL_PUBLISHER: &str = "publisher";
pub const COL_APP_NAME: &str = "app_name";
pub const COL_IMPRESSIONS: &str = "impressions";
pub const COL_CLICKS: &str = "clicks";
pub const COL_CONVERSIONS: &str = "conversions";
pub const COL_TOTAL_SPEND: &str = "total_spend";
pub const COL_ADVERTISER_COST: &str = "advertiser_cost";
pub const COL_CPM: &str = "cpm";
pub const COL_ECPM: &str = "ecpm";
pub const COL_CTR: &str = "ctr";
pub const COL_CONVERSION_RATE: &str = "conversion_rate";
pub const COL_COMPLETION_RATE: &str = "completion_rate";
pub const COL_IAS_VIEWABILITY: &str = "ias_display_fully_in_view_1s";
pub const COL_AD_LOAD_IMPS: &str = "ad_load_xl_imps";
pub const COL_AD_REFRESH_IMPS: &str = "ad_refresh_15s_imps";
pub const COL_AD_LOAD_RATE: &str = "ad_load_rate";
pub const COL_AD_REFRESH_RATE: &str = "ad_refresh_rate";
pub const COL_SAMPLED_IN_VIEW: &str = "sampled_in_view";
pub const COL_PLAYER_COMPLETION: &str = "player_completion";
pub const COL_PLAYER_ERRORS: &str = "player_errors";
pub const COL_PLAYER_MUTE: &str = "player_mute";
pub const COL_TVQI_RAW: &str = "tv_quality_index_raw";
pub const COL_TVQI_MEASURED: &str = "tv_quality_index_measured";
pub const COL_TVQI_RATIO: &str = "tv_quality_index_ratio";
pub const COL_UNIQUE_IDS: &str = "unique_ids";
pub const COL_UNIQUE_ID_RATIO: &str = "unique_id_ratio";

/// Synthetic column: how many export rows were merged into an aggregated
/// record. Absent on unaggregated tables.
pub const COL_SOURCE_ROWS: &str = "source_rows";

/// Report prefixes some exports prepend to every column.
const VENDOR_PREFIXES: &[&str] = &["ttd_", "pulsepoint_", "pp_"];

/// Vendor header variant -> canonical column, applied after `clean_header`.
/// Several raw labels share one canonical name; canonical names map to
/// themselves implicitly.
const HEADER_MAP: &[(&str, &str)] = &[
    ("domains", COL_DOMAIN),
    ("site", COL_DOMAIN),
    ("sites", COL_DOMAIN),
    ("website", COL_DOMAIN),
    ("app", COL_APP_NAME),
    ("application", COL_APP_NAME),
    ("impression", COL_IMPRESSIONS),
    ("imps", COL_IMPRESSIONS),
    ("views", COL_IMPRESSIONS),
    ("view", COL_IMPRESSIONS),
    ("click", COL_CLICKS),
    ("click_through_rate", COL_CTR),
    ("clickthrough_rate", COL_CTR),
    ("click_rate", COL_CTR),
    ("clicks_per_impression", COL_CTR),
    ("conversion", COL_CONVERSIONS),
    ("conv", COL_CONVERSIONS),
    ("actions", COL_CONVERSIONS),
    ("action", COL_CONVERSIONS),
    ("spend", COL_TOTAL_SPEND),
    ("cost", COL_TOTAL_SPEND),
    ("total_cost", COL_TOTAL_SPEND),
    ("budget", COL_TOTAL_SPEND),
    ("pub", COL_PUBLISHER),
    ("source", COL_PUBLISHER),
    ("vendor", COL_SUPPLY_VENDOR),
    ("ssp", COL_SUPPLY_VENDOR),
    ("exchange", COL_SUPPLY_VENDOR),
    ("cost_per_mille", COL_CPM),
    ("cost_per_thousand", COL_CPM),
    ("advertiser_cpm", COL_CPM),
    ("effective_cpm", COL_ECPM),
    ("media", "channel"),
    ("medium", "channel"),
    (
        "ias_display_fully_in_view_1_second_rate",
        COL_IAS_VIEWABILITY,
    ),
    ("ad_load_xl_impressions", COL_AD_LOAD_IMPS),
    ("ad_load_xl_excessive_impressions", COL_AD_LOAD_IMPS),
    ("ad_refresh_15s_impressions", COL_AD_REFRESH_IMPS),
    ("ad_refresh_below_15s_impressions", COL_AD_REFRESH_IMPS),
    ("all_last_click_view_conversion_rate", COL_CONVERSION_RATE),
    ("sampled_in_view_rate", COL_SAMPLED_IN_VIEW),
    ("player_completion_rate", COL_PLAYER_COMPLETION),
    ("player_errors_rate", COL_PLAYER_ERRORS),
    ("player_error_rate", COL_PLAYER_ERRORS),
    ("player_mute_rate", COL_PLAYER_MUTE),
    ("player_muted_rate", COL_PLAYER_MUTE),
    ("tv_quality_index", COL_TVQI_RAW),
    ("quality_index", COL_TVQI_RAW),
    ("unique_identifiers", COL_UNIQUE_IDS),
];

/// Columns counting things that cannot be negative, checked by the quality
/// flag pass.
pub const COUNT_COLUMNS: &[&str] = &[
    COL_IMPRESSIONS,
    COL_CLICKS,
    COL_CONVERSIONS,
    COL_TOTAL_SPEND,
    COL_ADVERTISER_COST,
    COL_AD_LOAD_IMPS,
    COL_AD_REFRESH_IMPS,
    COL_UNIQUE_IDS,
];

/// Columns holding rates that must land in [0,1].
pub const RATE_COLUMNS: &[&str] = &[
    COL_CTR,
    COL_CONVERSION_RATE,
    COL_COMPLETION_RATE,
    COL_IAS_VIEWABILITY,
    COL_AD_LOAD_RATE,
    COL_AD_REFRESH_RATE,
    COL_SAMPLED_IN_VIEW,
    COL_PLAYER_COMPLETION,
    COL_PLAYER_ERRORS,
    COL_PLAYER_MUTE,
];

/// Lowercase, trim, fold separator punctuation into underscores, drop
/// bracketing characters. "Ad Load - XL (Excessive) - Impressions" becomes
/// "ad_load_xl_excessive_impressions".
pub fn clean_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.trim().chars() {
        match ch {
            ' ' | '-' | '\u{2013}' | '\u{2014}' | '/' => out.push('_'),
            '(' | ')' | '[' | ']' | '+' | '%' | '<' | '>' | '"' | '\'' => {}
            _ => out.extend(ch.to_lowercase()),
        }
    }
    let mut collapsed = String::with_capacity(out.len());
    let mut prev_underscore = false;
    for ch in out.chars() {
        if ch == '_' {
            if !prev_underscore && !collapsed.is_empty() {
                collapsed.push('_');
            }
            prev_underscore = true;
        } else {
            collapsed.push(ch);
            prev_underscore = false;
        }
    }
    while collapsed.ends_with('_') {
        collapsed.pop();
    }
    for prefix in VENDOR_PREFIXES {
        if let Some(stripped) = collapsed.strip_prefix(prefix) {
            if !stripped.is_empty() {
                return stripped.to_string();
            }
        }
    }
    collapsed
}

pub fn canonical_name(cleaned: &str) -> Option<&'static str> {
    for (variant, canonical) in HEADER_MAP {
        if *variant == cleaned {
            return Some(canonical);
        }
    }
    None
}

/// Full header canonicalization: cleanup then rename; unmapped headers keep
/// their cleaned form.
pub fn canonicalize_header(raw: &str) -> String {
    let cleaned = clean_header(raw);
    match canonical_name(&cleaned) {
        Some(canonical) => canonical.to_string(),
        None => cleaned,
    }
}
