//! chefsync: keep replica Chef servers in step with a master server.
//!
//! # Usage
//!
//! ```text
//! chefsync [--config <file>] [--verbose] master all [--full-resync] [--json]
//! chefsync master cookbook <name> <version> [<name> <version>...]
//! chefsync master environment|role|databag <name>...
//! chefsync slave <replica>
//! chefsync status [--json]
//! ```
//!
//! Exit status: 0 when everything succeeded, 2 when the run finished but some
//! artifact or replica failed, 1 on a fatal error.

mod commands;
mod log_rotation;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use chefsync_core::{config, SyncConfig};
use chefsync_engine::RunStatus;

use commands::{master::MasterCommand, slave::SlaveArgs, status::StatusArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "chefsync",
    version,
    about = "Synchronize Chef server content from a master to replica servers",
    long_about = None,
)]
struct Cli {
    /// Configuration file (default: ~/.chefsync/config.yaml).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stage from the master server and distribute to every replica.
    Master {
        #[command(subcommand)]
        command: MasterCommand,
    },

    /// Apply a transferred workspace to this replica's Chef server.
    Slave(SlaveArgs),

    /// Show cookbook history distribution state.
    Status(StatusArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(RunStatus::Success) => ExitCode::SUCCESS,
        Ok(RunStatus::Degraded) => ExitCode::from(2),
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<RunStatus> {
    let config = load_config(cli.config.as_ref())?;
    logging::init(&config, cli.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    match cli.command {
        Commands::Master { command } => runtime.block_on(commands::master::run(config, command)),
        Commands::Slave(args) => runtime.block_on(args.run(config)),
        Commands::Status(args) => args.run(&config),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<SyncConfig> {
    match path {
        Some(path) => config::load_at(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => config::load().context("failed to load ~/.chefsync/config.yaml"),
    }
}
