use thiserror::Error;
use tracing::{debug, warn};

use crate::input::RawTable;
use crate::model::recipe::ScoringRecipe;
use crate::model::run::{RunRecord, RunResults, RunState};
use crate::model::scored::ScoredRecord;
use crate::model::table::CanonicalTable;
use crate::outliers::{self, OutlierMethod};
use crate::pipeline::stage1_preprocess::{PreprocessError, Stage1Inputs, run_stage1};
use crate::pipeline::stage2_normalize::run_stage2;
use crate::pipeline::stage3_score::{ScoreError, Stage3Inputs, run_stage3};
use crate::pipeline::stage4_lists::{DEFAULT_LIST_MIN_IMPRESSIONS, Stage4Inputs, run_stage4};
use crate::report::build_summary;
use crate::store::{RunStore, StoreError};

pub const PROGRESS_PREPROCESSING: u8 = 10;
pub const PROGRESS_PREPROCESSED: u8 = 20;
pub const PROGRESS_NORMALIZING: u8 = 40;
pub const PROGRESS_SCORING: u8 = 60;
pub const PROGRESS_SCORED: u8 = 80;
pub const PROGRESS_COMPLETED: u8 = 100;

/// Caps applied to metric columns under `OutlierPolicy::Cap`.
pub const CAP_LOWER_QUANTILE: f64 = 0.01;
pub const CAP_UPPER_QUANTILE: f64 = 0.99;

/// What to do with outlying rows before and after scoring. Remediation
/// happens on the canonical table before normalization; flagging happens on
/// the scored records afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlierPolicy {
    None,
    Flag,
    Drop,
    Cap,
    Winsorize,
}

impl OutlierPolicy {
    pub fn label(self) -> &'static str {
        match self {
            OutlierPolicy::None => "none",
            OutlierPolicy::Flag => "flag",
            OutlierPolicy::Drop => "drop",
            OutlierPolicy::Cap => "cap",
            OutlierPolicy::Winsorize => "winsorize",
        }
    }
}

/// Observer for run-state checkpoints. The store already persists each
/// checkpoint; this exists for callers that want to surface progress live.
pub trait ProgressSink {
    fn progress(&mut self, run: &RunRecord);
}

pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn progress(&mut self, _run: &RunRecord) {}
}

pub struct RunContext<'a> {
    pub store: &'a mut dyn RunStore,
    pub progress: &'a mut dyn ProgressSink,
}

#[derive(Debug, Clone)]
pub struct RunParams {
    pub run_id: String,
    pub recipe: ScoringRecipe,
    /// Volume floor override; also the eligibility floor for optimization
    /// lists.
    pub min_impressions: Option<f64>,
    pub outlier_policy: OutlierPolicy,
    pub outlier_method: OutlierMethod,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
    #[error(transparent)]
    Score(#[from] ScoreError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Walks one run through the full state machine. Every state transition is
/// persisted before the next stage starts, so an interrupted or failed run
/// leaves its last checkpoint behind.
pub fn execute_run(
    ctx: &mut RunContext<'_>,
    params: &RunParams,
    raw: &RawTable,
) -> Result<RunResults, RunError> {
    let mut run = RunRecord::new(params.run_id.clone(), params.recipe.clone());
    run.input_rows = raw.len();
    ctx.store.save_run(&run)?;

    match run_pipeline(ctx, params, raw, &mut run) {
        Ok(results) => Ok(results),
        Err(err) => {
            run.fail(err.to_string());
            if let Err(store_err) = ctx.store.save_run(&run) {
                warn!(error = %store_err, run = %run.id, "failed to persist failed run state");
            }
            ctx.progress.progress(&run);
            Err(err)
        }
    }
}

fn run_pipeline(
    ctx: &mut RunContext<'_>,
    params: &RunParams,
    raw: &RawTable,
    run: &mut RunRecord,
) -> Result<RunResults, RunError> {
    run.transition(RunState::Preprocessing, PROGRESS_PREPROCESSING);
    checkpoint(ctx, run)?;

    let stage1 = run_stage1(&Stage1Inputs {
        table: raw,
        recipe: &params.recipe,
        min_impressions: params.min_impressions,
    })?;
    let mut table = stage1.table;
    let mut quality = stage1.report;

    apply_remediation(params, &mut table);
    quality.output_rows = table.len();
    run.transition(RunState::Preprocessing, PROGRESS_PREPROCESSED);
    checkpoint(ctx, run)?;

    run.transition(RunState::Normalizing, PROGRESS_NORMALIZING);
    checkpoint(ctx, run)?;
    let normalized = run_stage2(table, &params.recipe);

    run.transition(RunState::Scoring, PROGRESS_SCORING);
    checkpoint(ctx, run)?;
    let mut records = run_stage3(&Stage3Inputs {
        normalized: &normalized,
        recipe: &params.recipe,
    })?;

    if params.outlier_policy != OutlierPolicy::None {
        flag_outliers(params, &normalized.table, &mut records);
    }

    let lists = run_stage4(&Stage4Inputs {
        records: &records,
        min_impressions: params
            .min_impressions
            .unwrap_or(DEFAULT_LIST_MIN_IMPRESSIONS),
    });
    let summary = build_summary(&records, &normalized.table, &params.recipe);

    run.scored_rows = records.len();
    run.transition(RunState::Scoring, PROGRESS_SCORED);
    checkpoint(ctx, run)?;

    let results = RunResults {
        run_id: run.id.clone(),
        records,
        quality_report: quality,
        whitelist: lists.whitelist,
        blacklist: lists.blacklist,
        summary,
    };
    ctx.store.save_results(&results)?;

    run.transition(RunState::Completed, PROGRESS_COMPLETED);
    checkpoint(ctx, run)?;
    Ok(results)
}

fn checkpoint(ctx: &mut RunContext<'_>, run: &RunRecord) -> Result<(), RunError> {
    ctx.store.save_run(run)?;
    ctx.progress.progress(run);
    debug!(
        run = %run.id,
        state = run.state.label(),
        progress = run.progress,
        "run checkpoint"
    );
    Ok(())
}

/// Rewrites the canonical table in place according to the outlier policy.
/// Detection-only policies leave the table untouched.
fn apply_remediation(params: &RunParams, table: &mut CanonicalTable) {
    match params.outlier_policy {
        OutlierPolicy::None | OutlierPolicy::Flag => {}
        OutlierPolicy::Drop => {
            let Some(columns) = usable_columns(params, table) else {
                return;
            };
            let report = outliers::detect_outliers(table, &columns, params.outlier_method);
            if !report.is_empty() {
                debug!(
                    dropped = report.flagged_rows.len(),
                    "dropping outlier rows before normalization"
                );
                outliers::drop_rows(table, &report.flagged_rows);
            }
        }
        OutlierPolicy::Cap => {
            let Some(columns) = usable_columns(params, table) else {
                return;
            };
            outliers::cap_columns(table, &columns, CAP_LOWER_QUANTILE, CAP_UPPER_QUANTILE);
        }
        OutlierPolicy::Winsorize => outliers::winsorize(table),
    }
}

fn flag_outliers(params: &RunParams, table: &CanonicalTable, records: &mut [ScoredRecord]) {
    let Some(columns) = usable_columns(params, table) else {
        return;
    };
    let report = outliers::detect_outliers(table, &columns, params.outlier_method);
    outliers::annotate_records(records, &report, params.outlier_method);
}

/// Recipe metric columns actually present in the table. `None` with a warning
/// when there is nothing to analyze, which downgrades outlier handling to a
/// no-op instead of failing the run.
fn usable_columns(params: &RunParams, table: &CanonicalTable) -> Option<Vec<String>> {
    let columns: Vec<String> = params
        .recipe
        .metrics
        .iter()
        .map(|m| m.name.clone())
        .filter(|name| table.has_column(name))
        .collect();
    if columns.is_empty() {
        warn!(
            policy = params.outlier_policy.label(),
            "no metric columns available for outlier analysis"
        );
        None
    } else {
        Some(columns)
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/run.rs"]
mod tests;
