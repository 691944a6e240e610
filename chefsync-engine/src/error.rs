//! Error types for chefsync-engine.
//!
//! Only [`SyncError`] aborts a run. The other enums describe failures local
//! to one artifact or one replica; they are recorded in the run report and
//! the run carries on with the siblings.

use std::path::PathBuf;

use thiserror::Error;

use chefsync_core::{ConfigError, ReplicaName};

/// Run-level failures. Anything here is fatal to the whole run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The staging tree could not be created, reset or read.
    #[error("workspace error at {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An error from the configuration layer.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// `distribute` was asked for a replica that is not configured.
    #[error("replica '{0}' is not configured")]
    UnknownReplica(ReplicaName),

    /// Full resync could not drop the manifest directory.
    #[error("manifest reset failed: {0}")]
    ManifestReset(#[source] ManifestError),
}

/// Failures reported by a [`crate::SourceClient`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// Transient: the source (or the tool talking to it) is unreachable.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// Permanent: the artifact or version does not exist at the source.
    #[error("artifact not found: {0}")]
    NotFound(String),
}

/// Local persistence failures of a version manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest JSON error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures isolated to one replica.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReplicaError {
    #[error("transfer to replica failed: {0}")]
    Transfer(String),

    #[error("apply on replica failed: {0}")]
    Apply(String),
}

/// Convenience constructor for [`SyncError::Workspace`].
pub(crate) fn workspace_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Workspace {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`ManifestError::Io`].
pub(crate) fn manifest_io(path: impl Into<PathBuf>, source: std::io::Error) -> ManifestError {
    ManifestError::Io {
        path: path.into(),
        source,
    }
}
