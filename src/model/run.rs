use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::model::recipe::ScoringRecipe;
use crate::model::report::{CampaignSummary, QualityReport};
use crate::model::scored::{OptimizationList, ScoredRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Pending,
    Preprocessing,
    Normalizing,
    Scoring,
    Completed,
    Failed,
}

impl RunState {
    pub fn label(self) -> &'static str {
        match self {
            RunState::Pending => "pending",
            RunState::Preprocessing => "preprocessing",
            RunState::Normalizing => "normalizing",
            RunState::Scoring => "scoring",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }
}

/// Persisted record of one scoring run: state machine position, progress
/// checkpoint, the recipe snapshot, and the failure message if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub state: RunState,
    pub progress: u8,
    pub recipe: ScoringRecipe,
    pub input_rows: usize,
    pub scored_rows: usize,
    pub error: Option<String>,
    pub created_unix: u64,
}

impl RunRecord {
    pub fn new(id: impl Into<String>, recipe: ScoringRecipe) -> Self {
        RunRecord {
            id: id.into(),
            state: RunState::Pending,
            progress: 0,
            recipe,
            input_rows: 0,
            scored_rows: 0,
            error: None,
            created_unix: unix_now(),
        }
    }

    pub fn transition(&mut self, state: RunState, progress: u8) {
        self.state = state;
        self.progress = progress;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.state = RunState::Failed;
        self.error = Some(message.into());
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Everything a completed run persists besides the run record itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResults {
    pub run_id: String,
    pub records: Vec<ScoredRecord>,
    pub quality_report: QualityReport,
    pub whitelist: OptimizationList,
    pub blacklist: OptimizationList,
    pub summary: CampaignSummary,
}
