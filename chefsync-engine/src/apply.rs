//! Replica-side apply: load a transferred workspace into the local server.
//!
//! Current state is uploaded for every configured kind present in the tree.
//! Cookbook history is driven by the staged lists: for each staged cookbook
//! the replica asks its own server which versions it already holds and
//! uploads only the rest, so a rerun after a partial apply is cheap.

use chefsync_core::{ArtifactKind, ArtifactName, ReplicaName};

use crate::replica::LocalService;
use crate::report::{ApplyReport, ArtifactOutcome, ItemStatus};
use crate::workspace::{StagedVersions, Workspace};

pub async fn apply_workspace(
    replica: &ReplicaName,
    workspace: &Workspace,
    kinds: &[ArtifactKind],
    service: &dyn LocalService,
) -> ApplyReport {
    let mut artifacts = Vec::new();

    for kind in kinds {
        let dir = workspace.kind_dir(*kind);
        if !dir.is_dir() {
            tracing::debug!("nothing staged for {}", kind.repo_dir());
            continue;
        }
        tracing::info!("uploading {}", kind.repo_dir());
        let status = match service.upload_kind(*kind, &workspace.repo_dir()).await {
            Ok(()) => ItemStatus::Uploaded,
            Err(err) => {
                tracing::error!("upload of {} failed: {err}", kind.repo_dir());
                ItemStatus::Failed {
                    reason: err.to_string(),
                }
            }
        };
        artifacts.push(ArtifactOutcome::kind(*kind, status));
    }

    match workspace.read_staged() {
        Ok(staged) => {
            for item in &staged {
                apply_history(workspace, item, service, &mut artifacts).await;
            }
        }
        Err(err) => {
            tracing::error!("cannot read staged versions: {err}");
            artifacts.push(ArtifactOutcome::kind(
                ArtifactKind::Cookbook,
                ItemStatus::from(&err),
            ));
        }
    }

    ApplyReport {
        replica: replica.clone(),
        artifacts,
    }
}

async fn apply_history(
    workspace: &Workspace,
    staged: &StagedVersions,
    service: &dyn LocalService,
    artifacts: &mut Vec<ArtifactOutcome>,
) {
    let name: &ArtifactName = &staged.cookbook;
    let present = match service.list_versions(name).await {
        Ok(present) => present,
        Err(err) => {
            tracing::error!("cannot list local versions of {name}: {err}");
            artifacts.push(ArtifactOutcome::item(
                ArtifactKind::Cookbook,
                name,
                ItemStatus::Failed {
                    reason: err.to_string(),
                },
            ));
            return;
        }
    };

    for version in &staged.versions {
        if present.contains(version) {
            tracing::debug!("cookbook {name} {version} already uploaded");
            artifacts.push(ArtifactOutcome::version(name, version, ItemStatus::Present));
            continue;
        }
        tracing::info!("uploading cookbook {name} {version}");
        let status = match service
            .upload_version(name, version, &workspace.version_dir(version))
            .await
        {
            Ok(()) => ItemStatus::Uploaded,
            Err(err) => {
                tracing::error!("upload of cookbook {name} {version} failed: {err}");
                ItemStatus::Failed {
                    reason: err.to_string(),
                }
            }
        };
        artifacts.push(ArtifactOutcome::version(name, version, status));
    }
}
