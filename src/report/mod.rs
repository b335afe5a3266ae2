pub mod types;

pub use types::SyncReport;

use crate::pr::{PrStatus, PullRequestFact};
use crate::sync::{SyncAction, SyncOutcome};
use colored::{ColoredString, Colorize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report file: {0}")]
    FileWrite(#[from] std::io::Error),
}

/// Combine the synced fact with the reconciliation outcome.
pub fn build(fact: &PullRequestFact, outcome: &SyncOutcome, dry_run: bool) -> SyncReport {
    SyncReport {
        pr_number: fact.number,
        pr_title: fact.title.clone(),
        repository: fact.repository.clone(),
        author: fact.author.clone(),
        branch: fact.branch.clone(),
        status: fact.status,
        record_id: outcome.record_id.clone(),
        action: outcome.action,
        dry_run,
    }
}

/// Print the report to the terminal, or append it as markdown to `summary_path`
/// (the job summary file under GitHub Actions).
#[instrument(skip(report), fields(pr = report.pr_number, action = %report.action))]
pub fn output(report: &SyncReport, summary_path: Option<&Path>) -> Result<(), ReportError> {
    match summary_path {
        None => {
            debug!("writing report to terminal");
            print_terminal_report(report);
            Ok(())
        }
        Some(path) => {
            debug!(path = %path.display(), "appending report to summary file");
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            file.write_all(render_markdown(report).as_bytes())?;
            Ok(())
        }
    }
}

/// PR #42: "Add OAuth2 login flow"
/// org/repo | alice | oauth
/// Status: Open | created page-1
fn print_terminal_report(report: &SyncReport) {
    println!();
    println!("PR #{}: \"{}\"", report.pr_number, report.pr_title);
    println!("{} | {} | {}", report.repository, report.author, report.branch);
    println!(
        "Status: {} | {} {}{}",
        colorize_status(report.status),
        colorize_action(report.action),
        report.record_id,
        if report.dry_run { " (dry run)".dimmed().to_string() } else { String::new() }
    );
    println!();
}

pub fn render_markdown(report: &SyncReport) -> String {
    let mut md = String::new();
    md.push_str(&format!("### PR #{}: \"{}\"\n\n", report.pr_number, report.pr_title));
    md.push_str(&format!(
        "**Repository:** {} | **Author:** {} | **Branch:** `{}`\n\n",
        report.repository, report.author, report.branch
    ));
    md.push_str(&format!(
        "- **Status:** {}\n- **Notion page:** `{}` ({})\n",
        report.status, report.record_id, report.action
    ));
    if report.dry_run {
        md.push_str("- _Dry run: no changes were written._\n");
    }
    md.push('\n');
    md
}

fn colorize_status(status: PrStatus) -> ColoredString {
    match status {
        PrStatus::Open => status.label().green().bold(),
        PrStatus::Closed => status.label().red().bold(),
        PrStatus::Merged => status.label().purple().bold(),
        PrStatus::Draft => status.label().yellow().bold(),
    }
}

fn colorize_action(action: SyncAction) -> ColoredString {
    match action {
        SyncAction::Created => "created".cyan(),
        SyncAction::Updated => "updated".blue(),
    }
}
