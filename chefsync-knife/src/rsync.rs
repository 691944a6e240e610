//! Replica target over `rsync` and `ssh`.
//!
//! Transfer mirrors the local workspace onto the replica host, deleting
//! anything the source no longer stages. Apply runs chefsync in replica mode
//! on that host, which uploads the tree to the replica's own Chef server.

use std::path::Path;

use async_trait::async_trait;

use chefsync_core::{ReplicaConfig, ReplicaName, ToolPaths};
use chefsync_engine::{ReplicaError, ReplicaTarget};

use crate::command::Invocation;
use crate::error::{apply_err, transfer_err};

const SSH_OPTIONS: [&str; 2] = ["-o", "StrictHostKeyChecking=no"];

pub struct RsyncReplica {
    config: ReplicaConfig,
    tools: ToolPaths,
}

impl RsyncReplica {
    pub fn new(config: ReplicaConfig, tools: ToolPaths) -> Self {
        Self { config, tools }
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.config.ssh_user, self.config.address)
    }

    /// `rsync -a --delete -e "ssh -o StrictHostKeyChecking=no" <ws>/ user@host:<remote>/`
    pub fn transfer_command(&self, workspace: &Path) -> Invocation {
        let shell = format!("{} {}", self.tools.ssh.display(), SSH_OPTIONS.join(" "));
        Invocation::new(&self.tools.rsync)
            .args(["-a", "--delete", "-e"])
            .arg(shell)
            .arg(format!("{}/", workspace.display()))
            .arg(format!(
                "{}:{}/",
                self.destination(),
                self.config.remote_workspace.display()
            ))
    }

    /// `ssh -o StrictHostKeyChecking=no user@host "<cmd> slave <name> --verbose"`
    pub fn apply_command(&self) -> Invocation {
        Invocation::new(&self.tools.ssh)
            .args(SSH_OPTIONS)
            .arg(self.destination())
            .arg(format!(
                "{} slave {} --verbose",
                self.config.remote_command, self.config.name
            ))
    }
}

#[async_trait]
impl ReplicaTarget for RsyncReplica {
    fn name(&self) -> &ReplicaName {
        &self.config.name
    }

    async fn transfer(&self, workspace: &Path) -> Result<(), ReplicaError> {
        tracing::info!(
            "rsync workspace to {} ({})",
            self.config.label(),
            self.config.address
        );
        self.transfer_command(workspace)
            .run()
            .await
            .map(|_| ())
            .map_err(transfer_err)
    }

    async fn apply(&self) -> Result<(), ReplicaError> {
        tracing::info!("executing remote upload on {}", self.config.label());
        let stdout = self.apply_command().run().await.map_err(apply_err)?;
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            tracing::debug!("[{}] {line}", self.config.name);
        }
        Ok(())
    }
}
