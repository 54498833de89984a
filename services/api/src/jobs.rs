use crate::infra::Runtime;
use clap::Args;
use fund_leads::config::AppConfig;
use fund_leads::error::AppError;
use fund_leads::telemetry;
use fund_leads::workflows::jobs::{DigestSummary, StaleScanSummary};
use fund_leads::workflows::notifications::templates::format_rate;
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub(crate) struct StaleScanArgs {
    /// Days without a status change before a lead counts as stale (defaults to config)
    #[arg(long)]
    pub(crate) days: Option<i64>,
    /// JSON document to seed the in-memory stores from
    #[arg(long)]
    pub(crate) fixtures: Option<PathBuf>,
    /// Print the summary as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DigestArgs {
    /// Length of the reporting window in days (defaults to config)
    #[arg(long)]
    pub(crate) days: Option<i64>,
    /// JSON document to seed the in-memory stores from
    #[arg(long)]
    pub(crate) fixtures: Option<PathBuf>,
    /// Print the summary as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) async fn run_stale_scan(args: StaleScanArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let runtime = Runtime::build(&config, args.fixtures.as_deref())?;
    let jobs = runtime.jobs(&config.leads);
    let days = args.days.unwrap_or(jobs.stale_after_days);
    let summary = jobs.stale.scan(days).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", render_stale_summary(days, &summary));
    }
    Ok(())
}

pub(crate) async fn run_digest(args: DigestArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let runtime = Runtime::build(&config, args.fixtures.as_deref())?;
    let jobs = runtime.jobs(&config.leads);
    let days = args.days.unwrap_or(jobs.digest_window_days);
    let summary = jobs.digest.run(days).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", render_digest_summary(&summary));
    }
    Ok(())
}

pub(crate) fn render_stale_summary(days: i64, summary: &StaleScanSummary) -> String {
    let mut out = format!("Stale lead scan (threshold {days} days)\n");
    out.push_str(&format!("  leads processed:     {}\n", summary.leads_processed));
    out.push_str(&format!("  leads reminded:      {}\n", summary.reminders_sent));
    out.push_str(&format!("  emails delivered:    {}\n", summary.notifications_sent));
    if !summary.errors.is_empty() {
        out.push_str("  errors:\n");
        for error in &summary.errors {
            out.push_str(&format!("    - {}: {}\n", error.enquiry_id, error.reason));
        }
    }
    out
}

pub(crate) fn render_digest_summary(summary: &DigestSummary) -> String {
    let report = &summary.report;
    let mut out = format!(
        "Weekly digest {} to {}\n",
        report.window_start.format("%Y-%m-%d"),
        report.window_end.format("%Y-%m-%d")
    );
    out.push_str(&format!(
        "  new {} | open {} | contacted {} | won {} | lost {} | conversion {}\n",
        report.totals.new_leads,
        report.totals.open_leads,
        report.totals.contacted_leads,
        report.totals.won_leads,
        report.totals.closed_lost_leads,
        format_rate(report.totals.conversion_rate)
    ));
    out.push_str(&format!("  status changes: {}\n", report.status_changes));
    for fund in &report.funds {
        out.push_str(&format!(
            "  - {}: {} new, {} won, {} lost ({})\n",
            fund.fund_name,
            fund.new_leads,
            fund.won_leads,
            fund.closed_lost_leads,
            format_rate(fund.conversion_rate)
        ));
    }
    out.push_str(&format!(
        "  digest delivered: {} sent, {} failed\n",
        summary.dispatch.sent, summary.dispatch.failed
    ));
    out
}
