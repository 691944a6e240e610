//! Shared run entrypoints used by the CLI.
//!
//! [`run_source`] is the source-side run: stage, distribute, commit.
//! [`run_replica`] is what a replica executes after receiving the tree.

use std::sync::Arc;

use chrono::Utc;

use chefsync_core::{ArtifactKind, ArtifactName, CookbookVersion, ReplicaName, SyncConfig};

use crate::apply::apply_workspace;
use crate::engine::{SyncEngine, SyncScope};
use crate::error::{workspace_err, SyncError};
use crate::replica::{LocalService, ReplicaTarget};
use crate::report::{ApplyReport, RunReport};
use crate::scheduler::DistributionScheduler;
use crate::source::SourceClient;
use crate::workspace::Workspace;

/// A run request as received from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunRequest {
    SyncAll,
    SyncKind {
        kind: ArtifactKind,
        names: Vec<ArtifactName>,
    },
    SyncCookbookVersions(Vec<CookbookVersion>),
    /// Replica side: apply the transferred workspace to the named replica.
    Distribute(ReplicaName),
}

impl RunRequest {
    /// Staging scope of a source-side request; `None` for `Distribute`.
    pub fn scope(&self) -> Option<SyncScope> {
        match self {
            RunRequest::SyncAll => Some(SyncScope::All),
            RunRequest::SyncKind { kind, names } => Some(SyncScope::Kind {
                kind: *kind,
                names: names.clone(),
            }),
            RunRequest::SyncCookbookVersions(pairs) => {
                Some(SyncScope::CookbookVersions(pairs.clone()))
            }
            RunRequest::Distribute(_) => None,
        }
    }
}

/// Options of a source-side run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Drop every manifest before staging.
    pub full_resync: bool,
}

/// Stage `scope`, distribute to every replica, then commit the staged history
/// if every replica succeeded.
pub async fn run_source(
    config: Arc<SyncConfig>,
    source: Arc<dyn SourceClient>,
    replicas: &[Arc<dyn ReplicaTarget>],
    scope: SyncScope,
    options: RunOptions,
) -> Result<RunReport, SyncError> {
    let started_at = Utc::now();
    let scheduler = DistributionScheduler::new(config.max_parallel);
    let mut engine = SyncEngine::new(config, source);

    if options.full_resync {
        engine.full_resync()?;
    }

    let staged = engine.stage(&scope).await?;
    let distributed = scheduler
        .distribute(engine.workspace().root(), replicas)
        .await;

    let mut artifacts = staged.artifacts;
    let committed = if distributed.iter().all(|r| r.outcome.is_success()) {
        let (committed, failures) = engine.commit(&staged.pending);
        artifacts.extend(failures);
        committed
    } else {
        if !staged.pending.is_empty() {
            tracing::warn!(
                "{} staged version(s) left pending: not every replica succeeded",
                staged.pending.len()
            );
        }
        Vec::new()
    };

    Ok(RunReport {
        request: scope.label(),
        started_at,
        finished_at: Utc::now(),
        artifacts,
        replicas: distributed,
        committed,
    })
}

/// Apply the workspace under the replica's state directory to its own server.
pub async fn run_replica(
    config: &SyncConfig,
    replica: &ReplicaName,
    service: &dyn LocalService,
) -> Result<ApplyReport, SyncError> {
    if config.replica(replica).is_none() {
        return Err(SyncError::UnknownReplica(replica.clone()));
    }

    let workspace = Workspace::at_state(&config.state_dir());
    if !workspace.root().is_dir() {
        return Err(workspace_err(
            workspace.root(),
            std::io::Error::new(std::io::ErrorKind::NotFound, "no workspace transferred"),
        ));
    }

    tracing::info!("applying workspace as replica {replica}");
    Ok(apply_workspace(replica, &workspace, &config.kinds, service).await)
}
