mod input;
mod model;
mod outliers;
mod pipeline;
mod recipes;
mod report;
mod store;
mod weights;

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::input::detect::detect_source;
use crate::input::load_table;
use crate::model::recipe::{AnalysisLevel, Channel, Goal, Platform};
use crate::model::run::RunRecord;
use crate::outliers::{DEFAULT_CONTAMINATION, OutlierMethod};
use crate::pipeline::run::{OutlierPolicy, ProgressSink, RunContext, RunParams, execute_run};
use crate::recipes::get_recipe;
use crate::recipes::mapping::canonicalize_header;
use crate::report::write::write_outputs;
use crate::store::{JsonFileStore, RunStore};

#[derive(Parser)]
#[command(
    name = "iqscore",
    version,
    about = "Inventory quality scoring for programmatic media buys"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score one platform export and write report artifacts.
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Input CSV export, plain or gzip-compressed.
    #[arg(long)]
    input: PathBuf,
    /// Output directory for artifacts and run state.
    #[arg(long)]
    out: PathBuf,
    /// Source platform (ttd|pulsepoint); header detection decides when omitted.
    #[arg(long)]
    platform: Option<String>,
    /// Channel (display|video|audio|ctv); header detection decides when omitted.
    #[arg(long)]
    channel: Option<String>,
    /// Campaign goal (awareness|action).
    #[arg(long, default_value = "awareness")]
    goal: String,
    /// Prefer the CTR-weighted display recipe where one exists.
    #[arg(long)]
    ctr_sensitive: bool,
    /// Score supply vendors instead of domains.
    #[arg(long)]
    vendor_level: bool,
    /// Override the impression volume floor.
    #[arg(long)]
    min_impressions: Option<f64>,
    /// Outlier policy (none|flag|drop|cap|winsorize).
    #[arg(long, default_value = "flag")]
    outliers: String,
    /// Outlier detection method (zscore|modified|iqr|ensemble|combined).
    #[arg(long, default_value = "combined")]
    outlier_method: String,
    /// Run identifier; derived from the input file name when omitted.
    #[arg(long)]
    run_id: Option<String>,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
}

fn run() -> Result<(), String> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run_command(&args),
    }
}

fn run_command(args: &RunArgs) -> Result<(), String> {
    let raw = load_table(&args.input).map_err(|e| e.to_string())?;
    let canonical: Vec<String> = raw.headers.iter().map(|h| canonicalize_header(h)).collect();
    let detected = detect_source(&canonical);

    let platform = match &args.platform {
        Some(value) => parse_platform(value)?,
        None => {
            detected
                .as_ref()
                .ok_or("could not detect the source platform from headers; pass --platform")?
                .platform
        }
    };
    let channel = match &args.channel {
        Some(value) => parse_channel(value)?,
        None => {
            detected
                .as_ref()
                .ok_or("could not detect the channel from headers; pass --channel")?
                .channel
        }
    };
    if (args.platform.is_none() || args.channel.is_none())
        && let Some(d) = &detected
    {
        info!(
            platform = d.platform.label(),
            channel = d.channel.label(),
            confidence = d.confidence,
            "source detected from headers"
        );
    }
    let goal = parse_goal(&args.goal)?;

    let mut recipe =
        get_recipe(platform, goal, channel, args.ctr_sensitive).map_err(|e| e.to_string())?;
    if args.vendor_level {
        recipe.analysis_level = AnalysisLevel::SupplyVendor;
    }

    let params = RunParams {
        run_id: args
            .run_id
            .clone()
            .unwrap_or_else(|| default_run_id(&args.input)),
        recipe,
        min_impressions: args.min_impressions,
        outlier_policy: parse_policy(&args.outliers)?,
        outlier_method: parse_method(&args.outlier_method)?,
    };

    let mut store = JsonFileStore::new(&args.out);
    let mut progress = LogProgress;
    let results = execute_run(
        &mut RunContext {
            store: &mut store,
            progress: &mut progress,
        },
        &params,
        &raw,
    )
    .map_err(|e| e.to_string())?;

    let run = store
        .load_run(&params.run_id)
        .map_err(|e| e.to_string())?
        .ok_or("run state missing after completion")?;
    write_outputs(&args.out, &run, &results).map_err(|e| e.to_string())?;
    info!(
        run = %params.run_id,
        out = %args.out.display(),
        rows = results.records.len(),
        "run complete"
    );
    Ok(())
}

struct LogProgress;

impl ProgressSink for LogProgress {
    fn progress(&mut self, run: &RunRecord) {
        info!(
            state = run.state.label(),
            progress = run.progress,
            "pipeline progress"
        );
    }
}

fn default_run_id(input: &Path) -> String {
    // file_stem of "export.csv.gz" still carries ".csv".
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.trim_end_matches(".csv"))
        .unwrap_or("run");
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{stem}-{now}")
}

fn parse_platform(value: &str) -> Result<Platform, String> {
    match value.to_ascii_lowercase().as_str() {
        "ttd" | "tradedesk" | "thetradedesk" => Ok(Platform::TradeDesk),
        "pp" | "pulsepoint" => Ok(Platform::PulsePoint),
        other => Err(format!("invalid --platform {other} (use ttd|pulsepoint)")),
    }
}

fn parse_channel(value: &str) -> Result<Channel, String> {
    match value.to_ascii_lowercase().as_str() {
        "display" => Ok(Channel::Display),
        "video" => Ok(Channel::Video),
        "audio" => Ok(Channel::Audio),
        "ctv" => Ok(Channel::Ctv),
        other => Err(format!(
            "invalid --channel {other} (use display|video|audio|ctv)"
        )),
    }
}

fn parse_goal(value: &str) -> Result<Goal, String> {
    match value.to_ascii_lowercase().as_str() {
        "awareness" => Ok(Goal::Awareness),
        "action" => Ok(Goal::Action),
        other => Err(format!("invalid --goal {other} (use awareness|action)")),
    }
}

fn parse_policy(value: &str) -> Result<OutlierPolicy, String> {
    match value.to_ascii_lowercase().as_str() {
        "none" => Ok(OutlierPolicy::None),
        "flag" => Ok(OutlierPolicy::Flag),
        "drop" => Ok(OutlierPolicy::Drop),
        "cap" => Ok(OutlierPolicy::Cap),
        "winsorize" => Ok(OutlierPolicy::Winsorize),
        other => Err(format!(
            "invalid --outliers {other} (use none|flag|drop|cap|winsorize)"
        )),
    }
}

fn parse_method(value: &str) -> Result<OutlierMethod, String> {
    match value.to_ascii_lowercase().as_str() {
        "zscore" => Ok(OutlierMethod::ZScore),
        "modified" => Ok(OutlierMethod::ModifiedZScore),
        "iqr" => Ok(OutlierMethod::Iqr),
        "ensemble" => Ok(OutlierMethod::Ensemble {
            contamination: DEFAULT_CONTAMINATION,
        }),
        "combined" => Ok(OutlierMethod::Combined),
        other => Err(format!(
            "invalid --outlier-method {other} (use zscore|modified|iqr|ensemble|combined)"
        )),
    }
}
