use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::model::report::{CampaignSummary, QualityReport};
use crate::model::run::{RunRecord, RunResults};
use crate::model::scored::{OptimizationList, ScoredRecord};
use crate::report::text::render_report_text;

pub const SCORED_FILE: &str = "scored.csv";
pub const SUMMARY_FILE: &str = "summary.json";
pub const REPORT_FILE: &str = "report.txt";
pub const WHITELIST_FILE: &str = "whitelist.csv";
pub const BLACKLIST_FILE: &str = "blacklist.csv";

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to write report artifact: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode summary json: {0}")]
    Serde(#[from] serde_json::Error),
}

/// The machine-readable slice of a run, written next to the human report.
#[derive(Serialize)]
struct SummaryDocument<'a> {
    run_id: &'a str,
    summary: &'a CampaignSummary,
    quality_report: &'a QualityReport,
}

/// Writes every output artifact of a completed run into `out_dir`.
pub fn write_outputs(
    out_dir: &Path,
    run: &RunRecord,
    results: &RunResults,
) -> Result<(), WriteError> {
    fs::create_dir_all(out_dir)?;

    write_scored_csv(&out_dir.join(SCORED_FILE), run, &results.records)?;

    let summary_file = File::create(out_dir.join(SUMMARY_FILE))?;
    serde_json::to_writer_pretty(
        BufWriter::new(summary_file),
        &SummaryDocument {
            run_id: &results.run_id,
            summary: &results.summary,
            quality_report: &results.quality_report,
        },
    )?;

    write_text(&out_dir.join(REPORT_FILE), &render_report_text(run, results))?;
    write_list_csv(&out_dir.join(WHITELIST_FILE), &results.whitelist)?;
    write_list_csv(&out_dir.join(BLACKLIST_FILE), &results.blacklist)?;

    Ok(())
}

fn write_scored_csv(
    path: &Path,
    run: &RunRecord,
    records: &[ScoredRecord],
) -> Result<(), WriteError> {
    let mut w = BufWriter::new(File::create(path)?);

    let metric_names: Vec<&str> = run.recipe.metrics.iter().map(|m| m.name.as_str()).collect();
    let mut header = vec!["entity".to_string(), "impressions".to_string()];
    for name in &metric_names {
        header.push(name.to_string());
    }
    for fixed in [
        "quality_score",
        "percentile_rank",
        "quality_status",
        "is_outlier",
        "outlier_flags",
        "explanation",
    ] {
        header.push(fixed.to_string());
    }
    writeln!(w, "{}", header.join(","))?;

    let mut row_order: Vec<usize> = (0..records.len()).collect();
    row_order.sort_by(|&a, &b| {
        let ra = &records[a];
        let rb = &records[b];
        rb.quality_score
            .partial_cmp(&ra.quality_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| ra.entity.cmp(&rb.entity))
    });

    for idx in row_order {
        let record = &records[idx];
        let mut row = vec![csv_field(&record.entity), format!("{}", record.impressions)];
        for name in &metric_names {
            match record.raw_metrics.get(*name) {
                Some(value) => row.push(format!("{value}")),
                None => row.push(String::new()),
            }
        }
        row.push(format!("{:.4}", record.quality_score));
        row.push(format!("{:.2}", record.percentile_rank));
        row.push(record.quality_status.label().to_string());
        row.push(record.is_outlier.to_string());
        row.push(csv_field(&record.outlier_flags.join(";")));
        row.push(csv_field(&record.explanation));
        writeln!(w, "{}", row.join(","))?;
    }

    Ok(())
}

fn write_list_csv(path: &Path, list: &OptimizationList) -> Result<(), WriteError> {
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "entity,quality_score,impressions")?;
    for entry in &list.entries {
        writeln!(
            w,
            "{},{:.4},{}",
            csv_field(&entry.entity),
            entry.quality_score,
            entry.impressions
        )?;
    }
    Ok(())
}

fn write_text(path: &Path, contents: &str) -> Result<(), WriteError> {
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(contents.as_bytes())?;
    Ok(())
}

/// Quotes a CSV field when it carries a delimiter, quote, or newline.
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/report_write.rs"]
mod tests;
