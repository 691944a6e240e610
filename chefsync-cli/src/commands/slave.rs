//! `chefsync slave`: runs on a replica host after the master's transfer.

use anyhow::{Context, Result};
use clap::Args;

use chefsync_core::{ReplicaName, SyncConfig};
use chefsync_engine::{run_replica, RunStatus, SyncError};
use chefsync_knife::KnifeClient;

use super::output::{print_apply_report, print_json};

#[derive(Args, Debug)]
pub struct SlaveArgs {
    /// Name of this replica in the configuration.
    pub replica: String,

    /// Emit the apply report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SlaveArgs {
    pub async fn run(self, config: SyncConfig) -> Result<RunStatus> {
        let name = ReplicaName::from(self.replica);
        let server = config
            .replica(&name)
            .map(|replica| replica.server.clone())
            .ok_or_else(|| SyncError::UnknownReplica(name.clone()))?;
        let service = KnifeClient::new(&config.tools.knife, server);

        let report = run_replica(&config, &name, &service)
            .await
            .with_context(|| format!("apply on replica '{name}' failed"))?;

        if self.json {
            print_json(&report)?;
        } else {
            print_apply_report(&report);
        }
        Ok(report.status())
    }
}
