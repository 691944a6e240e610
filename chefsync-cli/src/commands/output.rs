//! Human and JSON rendering of run reports.

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use chefsync_engine::{
    ApplyReport, ArtifactOutcome, ItemStatus, ReplicaOutcome, RunReport, RunStatus,
};

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize report JSON")?
    );
    Ok(())
}

#[derive(Tabled)]
struct ReplicaRow {
    #[tabled(rename = "replica")]
    replica: String,
    #[tabled(rename = "outcome")]
    outcome: String,
    #[tabled(rename = "detail")]
    detail: String,
    #[tabled(rename = "took")]
    took: String,
}

pub fn print_run_report(report: &RunReport) {
    let elapsed = report
        .finished_at
        .signed_duration_since(report.started_at)
        .num_milliseconds()
        .max(0);
    println!(
        "{} {} ({} staged, {} committed, {}ms)",
        status_label(report.status()),
        report.request.bold(),
        report.staged_count(),
        report.committed.len(),
        elapsed,
    );

    print_problems(&report.artifacts);

    if report.replicas.is_empty() {
        println!("No replicas configured.");
        return;
    }

    let rows: Vec<ReplicaRow> = report
        .replicas
        .iter()
        .map(|r| {
            let (outcome, detail) = replica_outcome(&r.outcome);
            ReplicaRow {
                replica: r.replica.to_string(),
                outcome,
                detail,
                took: format!("{}ms", r.duration_ms),
            }
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    if !report.committed.is_empty() {
        let committed: Vec<String> = report.committed.iter().map(|cv| cv.to_string()).collect();
        println!("Marked distributed: {}", committed.join(", "));
    }
}

pub fn print_apply_report(report: &ApplyReport) {
    println!(
        "{} replica {} ({} uploaded)",
        status_label(report.status()),
        report.replica.to_string().bold(),
        report.uploaded().count(),
    );
    for outcome in &report.artifacts {
        let marker = match outcome.status {
            ItemStatus::Uploaded => "  ✎ ".green().to_string(),
            ItemStatus::Present => "  · ".bright_black().to_string(),
            _ if !outcome.status.is_success() => "  ✗ ".red().to_string(),
            _ => "    ".to_string(),
        };
        println!("{marker}{}", describe(outcome));
    }
}

fn print_problems(artifacts: &[ArtifactOutcome]) {
    for outcome in artifacts.iter().filter(|a| !a.status.is_success()) {
        println!("  {} {}", "✗".red(), describe(outcome));
    }
}

fn describe(outcome: &ArtifactOutcome) -> String {
    let mut subject = outcome.kind.to_string();
    if let Some(name) = &outcome.name {
        subject.push(' ');
        subject.push_str(&name.0);
    }
    if let Some(version) = &outcome.version {
        subject.push(' ');
        subject.push_str(&version.0);
    }
    match &outcome.status {
        ItemStatus::Fetched => format!("{subject}: fetched"),
        ItemStatus::Staged => format!("{subject}: staged"),
        ItemStatus::Uploaded => format!("{subject}: uploaded"),
        ItemStatus::Present => format!("{subject}: already present"),
        ItemStatus::Skipped { reason } => format!("{subject}: skipped ({reason})"),
        ItemStatus::Missing { reason } => format!("{subject}: missing ({reason})"),
        ItemStatus::Failed { reason } => format!("{subject}: failed ({reason})"),
    }
}

fn replica_outcome(outcome: &ReplicaOutcome) -> (String, String) {
    match outcome {
        ReplicaOutcome::Success => ("ok".green().to_string(), String::new()),
        ReplicaOutcome::TransferFailed { reason } => {
            ("transfer failed".red().to_string(), reason.clone())
        }
        ReplicaOutcome::ApplyFailed { reason } => ("apply failed".red().to_string(), reason.clone()),
        ReplicaOutcome::Aborted { reason } => ("aborted".magenta().to_string(), reason.clone()),
    }
}

fn status_label(status: RunStatus) -> String {
    match status {
        RunStatus::Success => "✓".green().bold().to_string(),
        RunStatus::Degraded => "!".yellow().bold().to_string(),
    }
}
