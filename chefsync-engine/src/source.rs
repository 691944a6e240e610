//! Source capability: enumerate and fetch artifacts from the authoritative server.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use async_trait::async_trait;

use chefsync_core::{ArtifactKind, ArtifactName, CookbookVersion, VersionToken};

use crate::error::SourceError;

/// One fetch against the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRequest {
    /// Current state of any artifact. `dest` is the repository mirror root.
    Current {
        kind: ArtifactKind,
        name: ArtifactName,
    },
    /// One historical cookbook version. `dest` is the version's directory and
    /// the payload must land at `dest/<cookbook>/`.
    Version(CookbookVersion),
}

impl fmt::Display for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchRequest::Current { kind, name } => write!(f, "{kind} {name}"),
            FetchRequest::Version(cv) => write!(f, "cookbook {cv}"),
        }
    }
}

/// The authoritative configuration server.
///
/// `Unavailable` errors are transient and surface to the caller, who may
/// rerun; `NotFound` errors are permanent and the artifact is skipped.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Names of every artifact of `kind`.
    async fn list_artifacts(&self, kind: ArtifactKind)
        -> Result<BTreeSet<ArtifactName>, SourceError>;

    /// Every version of a cookbook, newest first.
    async fn list_versions(&self, cookbook: &ArtifactName)
        -> Result<Vec<VersionToken>, SourceError>;

    /// Write the requested payload under `dest`.
    async fn fetch(&self, request: &FetchRequest, dest: &Path) -> Result<(), SourceError>;
}
