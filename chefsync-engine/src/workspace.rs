//! Local staging tree.
//!
//! ```text
//! workspace/
//!   repo/<kind dir>/...              current source state
//!   versions/<version>/<cookbook>/   historical cookbook payloads
//!   staged/<cookbook>.json           versions staged by this run
//! ```
//!
//! The whole directory is what gets mirrored to replicas. The engine is the
//! only writer; once staging finishes the tree is treated as read-only.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use chefsync_core::{paths, ArtifactKind, ArtifactName, VersionToken};

use crate::error::{manifest_io, workspace_err, ManifestError, SyncError};

/// Versions of one cookbook staged under `versions/` for replicas to upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StagedVersions {
    pub cookbook: ArtifactName,
    pub versions: Vec<VersionToken>,
}

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Workspace rooted at `<state>/workspace`.
    pub fn at_state(state: &Path) -> Self {
        Self::new(paths::workspace_dir(state))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Chef repository mirror (`--chef-repo-path` for knife).
    pub fn repo_dir(&self) -> PathBuf {
        self.root.join("repo")
    }

    pub fn kind_dir(&self, kind: ArtifactKind) -> PathBuf {
        self.repo_dir().join(kind.repo_dir())
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    /// Cookbook path for `knife cookbook upload -o` of one version.
    pub fn version_dir(&self, version: &VersionToken) -> PathBuf {
        self.versions_dir().join(&version.0)
    }

    pub fn staged_dir(&self) -> PathBuf {
        self.root.join("staged")
    }

    fn staged_path(&self, cookbook: &ArtifactName) -> PathBuf {
        self.staged_dir().join(format!("{}.json", cookbook.0))
    }

    /// Discard the tree and recreate the empty layout.
    pub fn reset(&self) -> Result<(), SyncError> {
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => {
                tracing::info!("discarded workspace {}", self.root.display());
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(workspace_err(&self.root, err)),
        }
        self.ensure()
    }

    /// Create the layout without touching existing content.
    pub fn ensure(&self) -> Result<(), SyncError> {
        for dir in [self.repo_dir(), self.versions_dir(), self.staged_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| workspace_err(&dir, e))?;
        }
        Ok(())
    }

    /// Prepare the directory a version fetch writes into.
    pub fn prepare_version_dir(&self, version: &VersionToken) -> Result<PathBuf, SyncError> {
        let dir = self.version_dir(version);
        std::fs::create_dir_all(&dir).map_err(|e| workspace_err(&dir, e))?;
        Ok(dir)
    }

    /// Record which versions of a cookbook were staged.
    pub fn write_staged(&self, staged: &StagedVersions) -> Result<(), ManifestError> {
        let dir = self.staged_dir();
        std::fs::create_dir_all(&dir).map_err(|e| manifest_io(&dir, e))?;
        let path = self.staged_path(&staged.cookbook);
        let json = serde_json::to_string_pretty(staged).map_err(|source| ManifestError::Json {
            path: path.clone(),
            source,
        })?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| manifest_io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| manifest_io(&path, e))
    }

    /// Every staged list in the tree, sorted by cookbook name.
    pub fn read_staged(&self) -> Result<Vec<StagedVersions>, ManifestError> {
        let dir = self.staged_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(manifest_io(&dir, err)),
        };

        let mut staged = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| manifest_io(&dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let contents = std::fs::read_to_string(&path).map_err(|e| manifest_io(&path, e))?;
            let item: StagedVersions = serde_json::from_str(&contents)
                .map_err(|source| ManifestError::Json { path, source })?;
            staged.push(item);
        }
        staged.sort_by(|a, b| a.cookbook.cmp(&b.cookbook));
        Ok(staged)
    }
}
