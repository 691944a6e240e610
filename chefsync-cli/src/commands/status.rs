//! `chefsync status`: cookbook history and what is still to distribute.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use chefsync_core::{SyncConfig, VersionToken};
use chefsync_engine::{
    status::{check_all, format_datetime_age},
    ManifestSignal, ManifestStore, RunStatus, VersionRecord,
};

/// Arguments for `chefsync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self, config: &SyncConfig) -> Result<RunStatus> {
        let store = ManifestStore::at_state(&config.state_dir());
        let records = check_all(&store).context("failed to read version manifests")?;
        let rows: Vec<CookbookStatus> = records
            .into_iter()
            .map(|(record, signal)| CookbookStatus::new(record, signal))
            .collect();

        if self.json {
            print_json(config, &rows)?;
        } else {
            print_table(config, rows);
        }
        Ok(RunStatus::Success)
    }
}

#[derive(Debug, Clone)]
struct CookbookStatus {
    record: VersionRecord,
    signal: ManifestSignal,
}

impl CookbookStatus {
    fn new(record: VersionRecord, signal: ManifestSignal) -> Self {
        Self { record, signal }
    }

    fn needs_sync(&self) -> bool {
        matches!(
            self.signal,
            ManifestSignal::NeverSynced { .. } | ManifestSignal::Pending { .. }
        )
    }
}

#[derive(Serialize)]
struct StatusReportJson {
    summary: StatusSummaryJson,
    cookbooks: Vec<CookbookStatusJson>,
}

#[derive(Serialize)]
struct StatusSummaryJson {
    replicas: usize,
    cookbooks: usize,
    pending: usize,
}

#[derive(Serialize)]
struct CookbookStatusJson {
    cookbook: String,
    status: &'static str,
    head: Option<String>,
    versions: Vec<String>,
    pending: Vec<String>,
    high_water_mark: Option<String>,
    recorded_at: String,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "cookbook")]
    cookbook: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "head")]
    head: String,
    #[tabled(rename = "pending")]
    pending: String,
    #[tabled(rename = "recorded")]
    recorded: String,
}

fn print_json(config: &SyncConfig, rows: &[CookbookStatus]) -> Result<()> {
    let payload = StatusReportJson {
        summary: StatusSummaryJson {
            replicas: config.replicas.len(),
            cookbooks: rows.len(),
            pending: rows.iter().filter(|r| r.needs_sync()).count(),
        },
        cookbooks: rows
            .iter()
            .map(|row| CookbookStatusJson {
                cookbook: row.record.name.0.clone(),
                status: signal_key(&row.signal),
                head: row.record.head().map(|v| v.0.clone()),
                versions: strings(&row.record.versions),
                pending: strings(&row.record.pending()),
                high_water_mark: row.record.high_water_mark().map(|v| v.0.clone()),
                recorded_at: row.record.recorded_at.to_rfc3339(),
            })
            .collect(),
    };
    super::output::print_json(&payload)
}

fn print_table(config: &SyncConfig, rows: Vec<CookbookStatus>) {
    let pending = rows.iter().filter(|r| r.needs_sync()).count();
    println!(
        "chefsync v{} | {} replicas | {} cookbooks | {} pending",
        env!("CARGO_PKG_VERSION"),
        config.replicas.len(),
        rows.len(),
        pending,
    );

    if rows.is_empty() {
        println!("No version manifests yet. Run 'chefsync master all' first.");
        return;
    }

    println!(
        "Indicators: {} CURRENT  {} PENDING  {} NEVER SYNCED  {} HEAD ONLY",
        signal_indicator(&ManifestSignal::Current),
        signal_indicator(&ManifestSignal::Pending { versions: vec![] }),
        signal_indicator(&ManifestSignal::NeverSynced { versions: vec![] }),
        signal_indicator(&ManifestSignal::HeadOnly),
    );

    let table_rows: Vec<StatusTableRow> = rows
        .iter()
        .map(|row| StatusTableRow {
            cookbook: row.record.name.0.clone(),
            status: format!(
                "{} {}",
                signal_indicator(&row.signal),
                signal_label(&row.signal)
            ),
            head: row
                .record
                .head()
                .map(|v| v.0.clone())
                .unwrap_or_else(|| "-".to_string()),
            pending: summarize(&row.record.pending()),
            recorded: format_datetime_age(row.record.recorded_at),
        })
        .collect();
    let mut table = Table::new(table_rows);
    table.with(Style::rounded());
    println!("{table}");

    if pending > 0 {
        println!("Run 'chefsync master all' to distribute pending versions.");
    }
}

fn signal_key(signal: &ManifestSignal) -> &'static str {
    match signal {
        ManifestSignal::Untracked => "untracked",
        ManifestSignal::HeadOnly => "head_only",
        ManifestSignal::NeverSynced { .. } => "never_synced",
        ManifestSignal::Pending { .. } => "pending",
        ManifestSignal::Current => "current",
    }
}

fn signal_label(signal: &ManifestSignal) -> &'static str {
    match signal {
        ManifestSignal::Untracked => "UNTRACKED",
        ManifestSignal::HeadOnly => "HEAD ONLY",
        ManifestSignal::NeverSynced { .. } => "NEVER SYNCED",
        ManifestSignal::Pending { .. } => "PENDING",
        ManifestSignal::Current => "CURRENT",
    }
}

fn signal_indicator(signal: &ManifestSignal) -> String {
    match signal {
        ManifestSignal::Untracked => "■".bright_black().bold().to_string(),
        ManifestSignal::HeadOnly => "■".blue().bold().to_string(),
        ManifestSignal::NeverSynced { .. } => "■".red().bold().to_string(),
        ManifestSignal::Pending { .. } => "■".yellow().bold().to_string(),
        ManifestSignal::Current => "■".green().bold().to_string(),
    }
}

fn strings(versions: &[VersionToken]) -> Vec<String> {
    versions.iter().map(|v| v.0.clone()).collect()
}

fn summarize(versions: &[VersionToken]) -> String {
    if versions.is_empty() {
        return "-".to_string();
    }
    let mut shown = strings(&versions[..versions.len().min(3)]);
    if versions.len() > shown.len() {
        shown.push(format!("+{} more", versions.len() - shown.len()));
    }
    shown.join(", ")
}
