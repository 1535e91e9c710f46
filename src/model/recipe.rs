use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    TradeDesk,
    PulsePoint,
}

impl Platform {
    pub fn label(self) -> &'static str {
        match self {
            Platform::TradeDesk => "TradeDesk",
            Platform::PulsePoint => "PulsePoint",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Goal {
    Awareness,
    Action,
}

impl Goal {
    pub fn label(self) -> &'static str {
        match self {
            Goal::Awareness => "Awareness",
            Goal::Action => "Action",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Display,
    Video,
    Audio,
    Ctv,
}

impl Channel {
    pub fn label(self) -> &'static str {
        match self {
            Channel::Display => "display",
            Channel::Video => "video",
            Channel::Audio => "audio",
            Channel::Ctv => "ctv",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisLevel {
    Domain,
    SupplyVendor,
}

impl AnalysisLevel {
    pub fn label(self) -> &'static str {
        match self {
            AnalysisLevel::Domain => "domain",
            AnalysisLevel::SupplyVendor => "supply_vendor",
        }
    }

    /// Canonical column holding the entity identifier at this level.
    pub fn entity_column(self) -> &'static str {
        match self {
            AnalysisLevel::Domain => "domain",
            AnalysisLevel::SupplyVendor => "supply_vendor",
        }
    }
}

/// One metric in a recipe: canonical name, weight, direction, whether the run
/// must fail when its backing column cannot be found or derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSpec {
    pub name: String,
    pub weight: f64,
    pub higher_is_better: bool,
    pub required: bool,
}

pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Immutable scoring configuration for one run. A JSON snapshot of the
/// selected recipe is persisted on the run record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringRecipe {
    pub platform: Platform,
    pub goal: Goal,
    pub channel: Channel,
    pub ctr_sensitivity: bool,
    pub analysis_level: AnalysisLevel,
    pub metrics: Vec<MetricSpec>,
    pub required_raw_fields: Vec<String>,
}

impl ScoringRecipe {
    pub fn weight_sum(&self) -> f64 {
        self.metrics.iter().map(|m| m.weight).sum()
    }

    pub fn metric(&self, name: &str) -> Option<&MetricSpec> {
        self.metrics.iter().find(|m| m.name == name)
    }

    /// Highest-weight metric; ties resolve to the first listed.
    pub fn primary_metric(&self) -> Option<&MetricSpec> {
        let mut best: Option<&MetricSpec> = None;
        for spec in &self.metrics {
            match best {
                Some(b) if spec.weight <= b.weight => {}
                _ => best = Some(spec),
            }
        }
        best
    }

    pub fn entity_column(&self) -> &'static str {
        self.analysis_level.entity_column()
    }
}
