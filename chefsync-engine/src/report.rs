//! Aggregate run reports.
//!
//! A run never stops at the first artifact or replica failure; instead every
//! scoped item gets an outcome here and [`RunStatus`] summarizes them.

use chrono::{DateTime, Utc};
use serde::Serialize;

use chefsync_core::{ArtifactKind, ArtifactName, CookbookVersion, ReplicaName, VersionToken};

use crate::error::{ManifestError, SourceError};

/// What happened to one artifact (or one artifact version).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemStatus {
    /// Current state fetched into the repository mirror.
    Fetched,
    /// Historical version fetched and staged for replicas.
    Staged,
    /// Nothing to do, by policy.
    Skipped { reason: String },
    /// Uploaded to a replica's local service.
    Uploaded,
    /// Already present on the replica; not uploaded again.
    Present,
    /// The source does not know the artifact or version.
    Missing { reason: String },
    Failed { reason: String },
}

impl ItemStatus {
    pub fn is_success(&self) -> bool {
        !matches!(self, ItemStatus::Missing { .. } | ItemStatus::Failed { .. })
    }
}

impl From<&SourceError> for ItemStatus {
    fn from(err: &SourceError) -> Self {
        match err {
            SourceError::NotFound(_) => ItemStatus::Missing {
                reason: err.to_string(),
            },
            SourceError::Unavailable(_) => ItemStatus::Failed {
                reason: err.to_string(),
            },
        }
    }
}

impl From<&ManifestError> for ItemStatus {
    fn from(err: &ManifestError) -> Self {
        ItemStatus::Failed {
            reason: err.to_string(),
        }
    }
}

/// Outcome of one artifact. `name` is `None` when a whole kind failed to
/// enumerate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactOutcome {
    pub kind: ArtifactKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<ArtifactName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionToken>,
    #[serde(flatten)]
    pub status: ItemStatus,
}

impl ArtifactOutcome {
    pub fn kind(kind: ArtifactKind, status: ItemStatus) -> Self {
        Self {
            kind,
            name: None,
            version: None,
            status,
        }
    }

    pub fn item(kind: ArtifactKind, name: &ArtifactName, status: ItemStatus) -> Self {
        Self {
            kind,
            name: Some(name.clone()),
            version: None,
            status,
        }
    }

    pub fn version(name: &ArtifactName, version: &VersionToken, status: ItemStatus) -> Self {
        Self {
            kind: ArtifactKind::Cookbook,
            name: Some(name.clone()),
            version: Some(version.clone()),
            status,
        }
    }
}

/// Per-replica distribution result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReplicaOutcome {
    Success,
    TransferFailed { reason: String },
    ApplyFailed { reason: String },
    /// The worker task panicked or was cancelled.
    Aborted { reason: String },
}

impl ReplicaOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ReplicaOutcome::Success)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicaReport {
    pub replica: ReplicaName,
    #[serde(flatten)]
    pub outcome: ReplicaOutcome,
    pub duration_ms: u128,
}

/// Overall verdict of a run. Fatal failures never produce a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Degraded,
}

/// Result of one source-side run: staging plus distribution.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub request: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub artifacts: Vec<ArtifactOutcome>,
    pub replicas: Vec<ReplicaReport>,
    /// Versions marked distributed once every replica succeeded.
    pub committed: Vec<CookbookVersion>,
}

impl RunReport {
    pub fn status(&self) -> RunStatus {
        let artifacts_ok = self.artifacts.iter().all(|a| a.status.is_success());
        let replicas_ok = self.replicas.iter().all(|r| r.outcome.is_success());
        if artifacts_ok && replicas_ok {
            RunStatus::Success
        } else {
            RunStatus::Degraded
        }
    }

    /// Number of historical versions fetched by this run.
    pub fn staged_count(&self) -> usize {
        self.artifacts
            .iter()
            .filter(|a| matches!(a.status, ItemStatus::Staged))
            .count()
    }
}

/// Result of applying a transferred workspace on a replica.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub replica: ReplicaName,
    pub artifacts: Vec<ArtifactOutcome>,
}

impl ApplyReport {
    pub fn status(&self) -> RunStatus {
        if self.artifacts.iter().all(|a| a.status.is_success()) {
            RunStatus::Success
        } else {
            RunStatus::Degraded
        }
    }

    pub fn uploaded(&self) -> impl Iterator<Item = &ArtifactOutcome> {
        self.artifacts
            .iter()
            .filter(|a| matches!(a.status, ItemStatus::Uploaded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(artifacts: Vec<ArtifactOutcome>, replicas: Vec<ReplicaReport>) -> RunReport {
        RunReport {
            request: "sync-all".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            artifacts,
            replicas,
            committed: vec![],
        }
    }

    fn replica(name: &str, outcome: ReplicaOutcome) -> ReplicaReport {
        ReplicaReport {
            replica: ReplicaName::from(name),
            outcome,
            duration_ms: 0,
        }
    }

    #[test]
    fn skipped_items_do_not_degrade_a_run() {
        let nginx = ArtifactName::from("nginx");
        let r = report(
            vec![
                ArtifactOutcome::item(ArtifactKind::Cookbook, &nginx, ItemStatus::Fetched),
                ArtifactOutcome::item(
                    ArtifactKind::Cookbook,
                    &nginx,
                    ItemStatus::Skipped {
                        reason: "only one version".to_string(),
                    },
                ),
            ],
            vec![replica("syd", ReplicaOutcome::Success)],
        );
        assert_eq!(r.status(), RunStatus::Success);
    }

    #[test]
    fn missing_artifact_or_failed_replica_degrades() {
        let prod = ArtifactName::from("prod");
        let missing = report(
            vec![ArtifactOutcome::item(
                ArtifactKind::Environment,
                &prod,
                ItemStatus::from(&SourceError::NotFound("prod".to_string())),
            )],
            vec![],
        );
        assert_eq!(missing.status(), RunStatus::Degraded);

        let replica_down = report(
            vec![],
            vec![
                replica("syd", ReplicaOutcome::Success),
                replica(
                    "mel",
                    ReplicaOutcome::ApplyFailed {
                        reason: "knife exited 1".to_string(),
                    },
                ),
            ],
        );
        assert_eq!(replica_down.status(), RunStatus::Degraded);
    }

    #[test]
    fn outcome_json_is_flat() {
        let json = serde_json::to_value(ArtifactOutcome::version(
            &ArtifactName::from("nginx"),
            &VersionToken::from("2.0"),
            ItemStatus::Staged,
        ))
        .unwrap();
        assert_eq!(json["kind"], "cookbooks");
        assert_eq!(json["name"], "nginx");
        assert_eq!(json["version"], "2.0");
        assert_eq!(json["status"], "staged");

        let json = serde_json::to_value(replica(
            "syd",
            ReplicaOutcome::TransferFailed {
                reason: "rsync exited 23".to_string(),
            },
        ))
        .unwrap();
        assert_eq!(json["replica"], "syd");
        assert_eq!(json["outcome"], "transfer_failed");
        assert_eq!(json["reason"], "rsync exited 23");
    }
}
