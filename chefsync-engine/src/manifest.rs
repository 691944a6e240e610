//! Version manifest: per-cookbook record of known and distributed versions.
//!
//! Persists one `VersionRecord` JSON document per cookbook at
//! `<state>/manifests/<cookbook>.json`. Writes use the `.json.tmp` + rename
//! pattern so a crash never leaves a half-written manifest behind.
//!
//! The manifest lives outside the staging tree: resetting the workspace does
//! not forget what was already distributed. Dropping the whole directory
//! ([`ManifestStore::clear`]) is what forces a full resync.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chefsync_core::{paths, ArtifactName, VersionToken};

use crate::error::{manifest_io, ManifestError};

/// Known history of one cookbook and the subset already pushed to replicas.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionRecord {
    pub name: ArtifactName,
    /// Version tokens in source order, newest first.
    #[serde(default)]
    pub versions: Vec<VersionToken>,
    #[serde(default)]
    pub distributed: BTreeSet<VersionToken>,
    pub recorded_at: DateTime<Utc>,
}

impl VersionRecord {
    pub fn empty(name: ArtifactName) -> Self {
        Self {
            name,
            versions: Vec::new(),
            distributed: BTreeSet::new(),
            recorded_at: Utc::now(),
        }
    }

    /// The current version, if the source reported any.
    pub fn head(&self) -> Option<&VersionToken> {
        self.versions.first()
    }

    /// Versions worth archiving on replicas: everything but the head.
    ///
    /// A history of zero or one version has nothing to archive.
    pub fn archival_candidates(&self) -> &[VersionToken] {
        if self.versions.len() <= 1 {
            return &[];
        }
        &self.versions[1..]
    }

    /// Archival candidates not yet marked distributed, in source order.
    pub fn pending(&self) -> Vec<VersionToken> {
        self.archival_candidates()
            .iter()
            .filter(|v| !self.distributed.contains(*v))
            .cloned()
            .collect()
    }

    /// Newest version already marked distributed.
    pub fn high_water_mark(&self) -> Option<&VersionToken> {
        self.versions.iter().find(|v| self.distributed.contains(*v))
    }

    pub fn is_distributed(&self, version: &VersionToken) -> bool {
        self.distributed.contains(version)
    }
}

/// Directory of version records.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    dir: PathBuf,
}

impl ManifestStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at `<state>/manifests`.
    pub fn at_state(state: &Path) -> Self {
        Self::new(paths::manifests_dir(state))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<name>.json`
    pub fn path_for(&self, name: &ArtifactName) -> PathBuf {
        self.dir.join(format!("{}.json", name.0))
    }

    /// Load the record for `name`, or `None` if it was never written.
    pub fn load(&self, name: &ArtifactName) -> Result<Option<VersionRecord>, ManifestError> {
        let path = self.path_for(name);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(manifest_io(&path, err)),
        };
        let record = serde_json::from_str(&contents)
            .map_err(|source| ManifestError::Json { path, source })?;
        Ok(Some(record))
    }

    /// Save `record` atomically.
    pub fn save(&self, record: &VersionRecord) -> Result<(), ManifestError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| manifest_io(&self.dir, e))?;

        let path = self.path_for(&record.name);
        let json = serde_json::to_string_pretty(record).map_err(|source| ManifestError::Json {
            path: path.clone(),
            source,
        })?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| manifest_io(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(manifest_io(&path, e));
        }
        Ok(())
    }

    /// Replace the known history of `name`, keeping its distributed set.
    pub fn record_versions(
        &self,
        name: &ArtifactName,
        versions: Vec<VersionToken>,
    ) -> Result<VersionRecord, ManifestError> {
        let mut record = self
            .load(name)?
            .unwrap_or_else(|| VersionRecord::empty(name.clone()));
        record.versions = versions;
        record.recorded_at = Utc::now();
        self.save(&record)?;
        Ok(record)
    }

    /// Versions of `name` that still have to reach the replicas.
    pub fn pending_versions(&self, name: &ArtifactName) -> Result<Vec<VersionToken>, ManifestError> {
        Ok(self
            .load(name)?
            .map(|record| record.pending())
            .unwrap_or_default())
    }

    /// Mark one version of `name` as distributed, creating the record if needed.
    pub fn mark_distributed(
        &self,
        name: &ArtifactName,
        version: &VersionToken,
    ) -> Result<VersionRecord, ManifestError> {
        let mut record = self
            .load(name)?
            .unwrap_or_else(|| VersionRecord::empty(name.clone()));
        if record.distributed.insert(version.clone()) {
            self.save(&record)?;
        }
        Ok(record)
    }

    /// All records, sorted by cookbook name. Leftover `.tmp` files are ignored.
    pub fn list(&self) -> Result<Vec<VersionRecord>, ManifestError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(manifest_io(&self.dir, err)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| manifest_io(&self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(ArtifactName::from(stem));
            }
        }
        names.sort();

        let mut records = Vec::with_capacity(names.len());
        for name in names {
            if let Some(record) = self.load(&name)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Drop every record. The next run re-stages all history from scratch.
    pub fn clear(&self) -> Result<(), ManifestError> {
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(manifest_io(&self.dir, err)),
        }
    }
}
