use crate::model::report::{CampaignSummary, EntityDigest};
use crate::model::run::{RunRecord, RunResults};
use crate::model::scored::OptimizationList;

pub fn render_report_text(run: &RunRecord, results: &RunResults) -> String {
    let mut out = String::new();
    let summary = &results.summary;
    let quality = &results.quality_report;

    out.push_str("Inventory Quality Report\n");
    out.push_str("========================\n\n");

    out.push_str("1. Run\n");
    out.push_str(&format!("Run id: {}\n", run.id));
    out.push_str(&format!("Platform: {}\n", run.recipe.platform.label()));
    out.push_str(&format!("Channel: {}\n", run.recipe.channel.label()));
    out.push_str(&format!("Goal: {}\n", run.recipe.goal.label()));
    out.push_str(&format!(
        "Analysis level: {}\n",
        run.recipe.analysis_level.label()
    ));
    if run.recipe.ctr_sensitivity {
        out.push_str("CTR sensitivity: on\n");
    }
    out.push('\n');

    out.push_str("2. Input quality\n");
    out.push_str(&format!("Rows in: {}\n", quality.input_rows));
    out.push_str(&format!("Rows scored: {}\n", quality.output_rows));
    out.push_str(&format!(
        "Removed: {} aggregate, {} unparseable, {} below volume floor\n",
        quality.aggregate_rows_removed,
        quality.unparseable_rows_removed,
        quality.below_volume_removed
    ));
    if quality.entities_merged > 0 {
        out.push_str(&format!("Entities merged: {}\n", quality.entities_merged));
    }
    if !quality.missing_fields.is_empty() {
        out.push_str(&format!(
            "Missing fields: {}\n",
            quality.missing_fields.join(", ")
        ));
    }
    if !quality.excluded_metrics.is_empty() {
        out.push_str(&format!(
            "Excluded metrics: {}\n",
            quality.excluded_metrics.join(", ")
        ));
    }
    let flags = &quality.flags;
    if flags.negative_values + flags.rates_out_of_range + flags.cpm_above_ceiling > 0 {
        out.push_str(&format!(
            "Flags: {} negative values, {} rates out of range, {} CPM above ceiling\n",
            flags.negative_values, flags.rates_out_of_range, flags.cpm_above_ceiling
        ));
    }
    out.push('\n');

    out.push_str("3. Campaign\n");
    out.push_str(&format!("Campaign score: {:.2}\n", summary.campaign_score));
    out.push_str(&format!(
        "Total impressions: {:.0}\n",
        summary.total_impressions
    ));
    out.push_str(&format!("Total spend: ${:.2}\n", summary.total_spend));
    if let Some(cpm) = summary.average_cpm {
        out.push_str(&format!("Average CPM: ${cpm:.2}\n"));
    }
    if let Some(ecpm) = summary.average_ecpm {
        out.push_str(&format!("Average eCPM: ${ecpm:.2}\n"));
    }
    out.push_str(&format!(
        "Tiers: {} good, {} moderate, {} poor\n",
        summary.status_counts.good, summary.status_counts.moderate, summary.status_counts.poor
    ));
    let dist = &summary.score_distribution;
    out.push_str(&format!(
        "Score spread: min {:.2}, q25 {:.2}, median {:.2}, q75 {:.2}, max {:.2}\n",
        dist.min, dist.q25, dist.median, dist.q75, dist.max
    ));
    if summary.outlier_count > 0 {
        out.push_str(&format!("Outlier rows: {}\n", summary.outlier_count));
    }
    out.push_str(&format!("{}\n\n", campaign_statement(summary)));

    out.push_str("4. Rankings\n");
    out.push_str("Top performers:\n");
    push_digests(&mut out, &summary.top_performers);
    out.push_str("Bottom performers:\n");
    push_digests(&mut out, &summary.bottom_performers);
    out.push('\n');

    if let Some(guidance) = &summary.vendor_guidance {
        out.push_str("5. Vendor guidance\n");
        out.push_str(&format!(
            "Vendors analyzed: {} (benchmark size {})\n",
            guidance.vendor_count, guidance.benchmark_size
        ));
        out.push_str("Benchmark vendors:\n");
        push_digests(&mut out, &guidance.benchmark);
        out.push_str("Vendors to review:\n");
        push_digests(&mut out, &guidance.review);
        out.push('\n');
    }

    out.push_str("6. Optimization lists\n");
    push_list_line(&mut out, "Whitelist", &results.whitelist);
    push_list_line(&mut out, "Blacklist", &results.blacklist);

    out
}

fn push_digests(out: &mut String, digests: &[EntityDigest]) {
    if digests.is_empty() {
        out.push_str("  (none)\n");
        return;
    }
    for (i, d) in digests.iter().enumerate() {
        out.push_str(&format!(
            "  {}. {}  score {:.2}  impressions {:.0}  {}\n",
            i + 1,
            d.entity,
            d.quality_score,
            d.impressions,
            d.status.label()
        ));
    }
}

fn push_list_line(out: &mut String, name: &str, list: &OptimizationList) {
    out.push_str(&format!(
        "{}: {} entities, average score {:.2}, {:.0} impressions\n",
        name,
        list.entries.len(),
        list.average_score,
        list.total_impressions
    ));
}

fn campaign_statement(summary: &CampaignSummary) -> &'static str {
    if summary.campaign_score >= 75.0 {
        "Inventory quality skews strong."
    } else if summary.campaign_score >= 40.0 {
        "Inventory quality is mixed."
    } else {
        "Inventory quality skews weak."
    }
}
