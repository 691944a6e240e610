//! Staging: decide what to fetch and lay it out in the workspace.
//!
//! ## `stage` protocol
//!
//! 1. Reset the workspace (the only fatal step).
//! 2. Explicit cookbook versions: fetch exactly those, mark them distributed
//!    immediately.
//! 3. Full run: fetch current state of every configured kind; for cookbooks
//!    also enumerate history, record it in the manifest and fetch only the
//!    pending versions.
//! 4. Kind run: fetch current state of the named artifacts only.
//!
//! Pending versions are marked distributed by [`SyncEngine::commit`], which
//! the pipeline calls only after every replica succeeded.

use std::collections::BTreeMap;
use std::sync::Arc;

use chefsync_core::{ArtifactKind, ArtifactName, CookbookVersion, SyncConfig, VersionToken};

use crate::error::{SourceError, SyncError};
use crate::manifest::ManifestStore;
use crate::report::{ArtifactOutcome, ItemStatus};
use crate::source::{FetchRequest, SourceClient};
use crate::workspace::{StagedVersions, Workspace};

/// What a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncScope {
    /// Every configured kind, with cookbook history.
    All,
    /// Current state of the named artifacts of one kind.
    Kind {
        kind: ArtifactKind,
        names: Vec<ArtifactName>,
    },
    /// Exactly these cookbook versions.
    CookbookVersions(Vec<CookbookVersion>),
}

impl SyncScope {
    pub fn label(&self) -> String {
        match self {
            SyncScope::All => "sync-all".to_string(),
            SyncScope::Kind { kind, names } => {
                let names: Vec<&str> = names.iter().map(|n| n.0.as_str()).collect();
                format!("sync-kind {kind} [{}]", names.join(", "))
            }
            SyncScope::CookbookVersions(pairs) => {
                let pairs: Vec<String> = pairs.iter().map(|p| p.to_string()).collect();
                format!("sync-cookbook-versions [{}]", pairs.join(", "))
            }
        }
    }
}

/// Result of staging, handed to distribution.
#[derive(Debug, Clone, Default)]
pub struct StageOutcome {
    pub artifacts: Vec<ArtifactOutcome>,
    /// Staged versions still waiting to be marked distributed.
    pub pending: Vec<CookbookVersion>,
}

impl StageOutcome {
    fn push(&mut self, outcome: ArtifactOutcome) {
        self.artifacts.push(outcome);
    }
}

/// Single writer of the workspace and the source-side manifests.
pub struct SyncEngine {
    config: Arc<SyncConfig>,
    workspace: Workspace,
    manifests: ManifestStore,
    source: Arc<dyn SourceClient>,
}

impl SyncEngine {
    /// Engine using the state layout of `config`.
    pub fn new(config: Arc<SyncConfig>, source: Arc<dyn SourceClient>) -> Self {
        let state = config.state_dir();
        Self {
            workspace: Workspace::at_state(&state),
            manifests: ManifestStore::at_state(&state),
            config,
            source,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn manifests(&self) -> &ManifestStore {
        &self.manifests
    }

    /// Forget every manifest so the next stage rebuilds all history.
    pub fn full_resync(&self) -> Result<(), SyncError> {
        tracing::warn!(
            "full resync: dropping manifests at {}",
            self.manifests.dir().display()
        );
        self.manifests.clear().map_err(SyncError::ManifestReset)?;
        self.workspace.reset()
    }

    /// Rebuild the workspace for `scope`.
    pub async fn stage(&mut self, scope: &SyncScope) -> Result<StageOutcome, SyncError> {
        tracing::info!("staging {}", scope.label());
        self.workspace.reset()?;

        let mut outcome = StageOutcome::default();
        match scope {
            SyncScope::All => {
                for kind in &self.config.kinds {
                    if kind.is_versioned() {
                        self.stage_cookbooks(&mut outcome).await?;
                    } else {
                        self.stage_kind(*kind, &mut outcome).await;
                    }
                }
            }
            SyncScope::Kind { kind, names } => {
                if !self.config.kinds.contains(kind) {
                    tracing::warn!("{kind} is not a configured kind; replicas will not upload it");
                }
                for name in names {
                    let status = self.fetch_current(*kind, name).await;
                    outcome.push(ArtifactOutcome::item(*kind, name, status));
                }
            }
            SyncScope::CookbookVersions(pairs) => {
                self.stage_explicit(pairs, &mut outcome).await?;
            }
        }

        tracing::info!(
            "staged {} artifact outcome(s), {} pending version(s)",
            outcome.artifacts.len(),
            outcome.pending.len()
        );
        Ok(outcome)
    }

    /// Mark `staged` versions distributed. Manifest failures are reported per
    /// version and leave that version pending for the next run.
    pub fn commit(&self, staged: &[CookbookVersion]) -> (Vec<CookbookVersion>, Vec<ArtifactOutcome>) {
        let mut committed = Vec::new();
        let mut failures = Vec::new();
        for cv in staged {
            match self.manifests.mark_distributed(&cv.name, &cv.version) {
                Ok(_) => committed.push(cv.clone()),
                Err(err) => {
                    tracing::error!("could not mark {cv} distributed: {err}");
                    failures.push(ArtifactOutcome::version(
                        &cv.name,
                        &cv.version,
                        ItemStatus::from(&err),
                    ));
                }
            }
        }
        (committed, failures)
    }

    // -----------------------------------------------------------------------
    // Non-versioned kinds
    // -----------------------------------------------------------------------

    async fn stage_kind(&self, kind: ArtifactKind, outcome: &mut StageOutcome) {
        tracing::info!("downloading {}", kind.repo_dir());
        let names = match self.source.list_artifacts(kind).await {
            Ok(names) => names,
            Err(err) => {
                tracing::error!("cannot list {}: {err}", kind.repo_dir());
                outcome.push(ArtifactOutcome::kind(kind, ItemStatus::from(&err)));
                return;
            }
        };
        for name in &names {
            let status = self.fetch_current(kind, name).await;
            outcome.push(ArtifactOutcome::item(kind, name, status));
        }
    }

    async fn fetch_current(&self, kind: ArtifactKind, name: &ArtifactName) -> ItemStatus {
        let request = FetchRequest::Current {
            kind,
            name: name.clone(),
        };
        tracing::info!("downloading {request}");
        match self.source.fetch(&request, &self.workspace.repo_dir()).await {
            Ok(()) => ItemStatus::Fetched,
            Err(err) => {
                log_source_error(&request, &err);
                ItemStatus::from(&err)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Cookbooks with history
    // -----------------------------------------------------------------------

    async fn stage_cookbooks(&self, outcome: &mut StageOutcome) -> Result<(), SyncError> {
        let kind = ArtifactKind::Cookbook;
        tracing::info!("downloading cookbooks and old versions");
        let names = match self.source.list_artifacts(kind).await {
            Ok(names) => names,
            Err(err) => {
                tracing::error!("cannot list cookbooks: {err}");
                outcome.push(ArtifactOutcome::kind(kind, ItemStatus::from(&err)));
                return Ok(());
            }
        };

        for name in &names {
            let status = self.fetch_current(kind, name).await;
            outcome.push(ArtifactOutcome::item(kind, name, status));
            self.stage_history(name, outcome).await?;
        }
        Ok(())
    }

    async fn stage_history(
        &self,
        name: &ArtifactName,
        outcome: &mut StageOutcome,
    ) -> Result<(), SyncError> {
        let kind = ArtifactKind::Cookbook;
        let versions = match self.source.list_versions(name).await {
            Ok(versions) => versions,
            Err(err) => {
                tracing::error!("cannot list versions of {name}: {err}");
                outcome.push(ArtifactOutcome::item(kind, name, ItemStatus::from(&err)));
                return Ok(());
            }
        };

        let record = match self.manifests.record_versions(name, versions) {
            Ok(record) => record,
            Err(err) => {
                tracing::error!("manifest for {name} not updated: {err}");
                outcome.push(ArtifactOutcome::item(kind, name, ItemStatus::from(&err)));
                return Ok(());
            }
        };

        if record.archival_candidates().is_empty() {
            tracing::info!("history skipped for {name}: only one version");
            outcome.push(ArtifactOutcome::item(
                kind,
                name,
                ItemStatus::Skipped {
                    reason: "only one version".to_string(),
                },
            ));
            return Ok(());
        }

        let pending = record.pending();
        if pending.is_empty() {
            tracing::debug!("history of {name} already distributed");
            outcome.push(ArtifactOutcome::item(
                kind,
                name,
                ItemStatus::Skipped {
                    reason: "history already distributed".to_string(),
                },
            ));
            return Ok(());
        }

        let mut staged = Vec::new();
        for version in &pending {
            let status = self.fetch_version(name, version).await?;
            if matches!(status, ItemStatus::Staged) {
                staged.push(version.clone());
            }
            outcome.push(ArtifactOutcome::version(name, version, status));
        }
        self.record_staged(name, staged, outcome);
        Ok(())
    }

    async fn fetch_version(
        &self,
        name: &ArtifactName,
        version: &VersionToken,
    ) -> Result<ItemStatus, SyncError> {
        let dest = self.workspace.prepare_version_dir(version)?;
        let request = FetchRequest::Version(CookbookVersion {
            name: name.clone(),
            version: version.clone(),
        });
        tracing::info!("downloading {request}");
        Ok(match self.source.fetch(&request, &dest).await {
            Ok(()) => ItemStatus::Staged,
            Err(err) => {
                log_source_error(&request, &err);
                ItemStatus::from(&err)
            }
        })
    }

    /// Write the staged list replicas read, and queue the versions for commit.
    fn record_staged(
        &self,
        name: &ArtifactName,
        versions: Vec<VersionToken>,
        outcome: &mut StageOutcome,
    ) {
        if versions.is_empty() {
            return;
        }
        let staged = StagedVersions {
            cookbook: name.clone(),
            versions,
        };
        match self.workspace.write_staged(&staged) {
            Ok(()) => outcome
                .pending
                .extend(staged.versions.into_iter().map(|version| CookbookVersion {
                    name: name.clone(),
                    version,
                })),
            Err(err) => {
                tracing::error!("staged list for {name} not written: {err}");
                outcome.push(ArtifactOutcome::item(
                    ArtifactKind::Cookbook,
                    name,
                    ItemStatus::from(&err),
                ));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Explicit versions
    // -----------------------------------------------------------------------

    async fn stage_explicit(
        &self,
        pairs: &[CookbookVersion],
        outcome: &mut StageOutcome,
    ) -> Result<(), SyncError> {
        let mut by_cookbook: BTreeMap<ArtifactName, Vec<VersionToken>> = BTreeMap::new();
        for cv in pairs {
            let status = self.fetch_version(&cv.name, &cv.version).await?;
            if !matches!(status, ItemStatus::Staged) {
                outcome.push(ArtifactOutcome::version(&cv.name, &cv.version, status));
                continue;
            }

            // Explicit intent: distributed from the manifest's point of view
            // as soon as it is staged.
            let status = match self.manifests.mark_distributed(&cv.name, &cv.version) {
                Ok(_) => status,
                Err(err) => {
                    tracing::error!("manifest for {} not updated: {err}", cv.name);
                    ItemStatus::from(&err)
                }
            };
            outcome.push(ArtifactOutcome::version(&cv.name, &cv.version, status));

            let versions = by_cookbook.entry(cv.name.clone()).or_default();
            if !versions.contains(&cv.version) {
                versions.push(cv.version.clone());
            }
        }

        for (name, versions) in by_cookbook {
            let staged = StagedVersions {
                cookbook: name.clone(),
                versions,
            };
            if let Err(err) = self.workspace.write_staged(&staged) {
                tracing::error!("staged list for {name} not written: {err}");
                outcome.push(ArtifactOutcome::item(
                    ArtifactKind::Cookbook,
                    &name,
                    ItemStatus::from(&err),
                ));
            }
        }
        Ok(())
    }
}

fn log_source_error(request: &FetchRequest, err: &SourceError) {
    match err {
        SourceError::NotFound(_) => tracing::warn!("skipping {request}: {err}"),
        SourceError::Unavailable(_) => tracing::error!("fetch of {request} failed: {err}"),
    }
}
