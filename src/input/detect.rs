//! Source detection: guess platform and channel from canonical headers.
//!
//! Templates are tried in order of specificity. A template matches when all
//! of its anchor columns are present and enough of its expected columns are
//! found. Detection is a convenience; an ambiguous export leaves the caller
//! to name the source explicitly.

use crate::model::recipe::{Channel, Platform};
use crate::recipes::mapping as col;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedSource {
    pub platform: Platform,
    pub channel: Channel,
    /// Fraction of expected columns found.
    pub confidence: f64,
}

struct SourceTemplate {
    platform: Platform,
    channel: Channel,
    anchors: &'static [&'static str],
    expected: &'static [&'static str],
    min_ratio: f64,
}

const TTD_MIN_RATIO: f64 = 0.6;
const PP_MIN_RATIO: f64 = 0.7;

const TEMPLATES: &[SourceTemplate] = &[
    SourceTemplate {
        platform: Platform::TradeDesk,
        channel: Channel::Ctv,
        anchors: &[col::COL_SUPPLY_VENDOR, col::COL_TVQI_RAW],
        expected: &[
            col::COL_SUPPLY_VENDOR,
            col::COL_ADVERTISER_COST,
            col::COL_IMPRESSIONS,
            col::COL_TVQI_RAW,
            col::COL_TVQI_MEASURED,
            col::COL_UNIQUE_IDS,
        ],
        min_ratio: TTD_MIN_RATIO,
    },
    SourceTemplate {
        platform: Platform::TradeDesk,
        channel: Channel::Video,
        anchors: &[col::COL_DOMAIN, col::COL_SUPPLY_VENDOR, col::COL_PLAYER_COMPLETION],
        expected: &[
            col::COL_DOMAIN,
            col::COL_SUPPLY_VENDOR,
            col::COL_ADVERTISER_COST,
            col::COL_IMPRESSIONS,
            col::COL_CPM,
            col::COL_SAMPLED_IN_VIEW,
            col::COL_PLAYER_COMPLETION,
            col::COL_PLAYER_ERRORS,
            col::COL_PLAYER_MUTE,
        ],
        min_ratio: TTD_MIN_RATIO,
    },
    SourceTemplate {
        platform: Platform::TradeDesk,
        channel: Channel::Display,
        anchors: &[col::COL_DOMAIN, col::COL_SUPPLY_VENDOR],
        expected: &[
            col::COL_DOMAIN,
            col::COL_SUPPLY_VENDOR,
            col::COL_ADVERTISER_COST,
            col::COL_IMPRESSIONS,
            col::COL_CPM,
            col::COL_CTR,
            col::COL_CLICKS,
            col::COL_IAS_VIEWABILITY,
            col::COL_AD_LOAD_IMPS,
            col::COL_AD_REFRESH_IMPS,
        ],
        min_ratio: TTD_MIN_RATIO,
    },
    SourceTemplate {
        platform: Platform::PulsePoint,
        channel: Channel::Video,
        anchors: &[col::COL_DOMAIN, col::COL_ECPM, col::COL_COMPLETION_RATE],
        expected: &[
            col::COL_DOMAIN,
            col::COL_TOTAL_SPEND,
            col::COL_IMPRESSIONS,
            col::COL_ECPM,
            col::COL_CTR,
            col::COL_CONVERSIONS,
            col::COL_COMPLETION_RATE,
        ],
        min_ratio: PP_MIN_RATIO,
    },
    SourceTemplate {
        platform: Platform::PulsePoint,
        channel: Channel::Display,
        anchors: &[col::COL_DOMAIN, col::COL_ECPM],
        expected: &[
            col::COL_DOMAIN,
            col::COL_TOTAL_SPEND,
            col::COL_IMPRESSIONS,
            col::COL_ECPM,
            col::COL_CTR,
            col::COL_CONVERSIONS,
        ],
        min_ratio: PP_MIN_RATIO,
    },
];

/// Audio exports carry the same player columns as video and detect as video;
/// the channel flag overrides when it matters.
pub fn detect_source(canonical_headers: &[String]) -> Option<DetectedSource> {
    for template in TEMPLATES {
        let present = |name: &str| canonical_headers.iter().any(|h| h == name);
        if !template.anchors.iter().all(|a| present(a)) {
            continue;
        }
        let hits = template.expected.iter().filter(|c| present(c)).count();
        let ratio = hits as f64 / template.expected.len() as f64;
        if ratio >= template.min_ratio {
            return Some(DetectedSource {
                platform: template.platform,
                channel: template.channel,
                confidence: ratio,
            });
        }
    }
    None
}
