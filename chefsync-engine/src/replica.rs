//! Replica capabilities.
//!
//! [`ReplicaTarget`] is the source-side view of one replica: push the staging
//! tree there and ask it to apply. [`LocalService`] is the replica-side view
//! of its own configuration server, used by [`crate::apply`].

use std::path::Path;

use async_trait::async_trait;

use chefsync_core::{ArtifactKind, ArtifactName, ReplicaName, VersionToken};

use crate::error::ReplicaError;

#[async_trait]
pub trait ReplicaTarget: Send + Sync {
    fn name(&self) -> &ReplicaName;

    /// Mirror `workspace` to the replica, deleting anything there that is no
    /// longer staged. Only the staging tree is touched.
    async fn transfer(&self, workspace: &Path) -> Result<(), ReplicaError>;

    /// Run the apply procedure on the replica against the transferred tree.
    async fn apply(&self) -> Result<(), ReplicaError>;
}

#[async_trait]
pub trait LocalService: Send + Sync {
    /// Upload the current state of every `kind` artifact found in `repo_dir`.
    async fn upload_kind(&self, kind: ArtifactKind, repo_dir: &Path) -> Result<(), ReplicaError>;

    /// Versions of `cookbook` the service already holds; empty when unknown.
    async fn list_versions(&self, cookbook: &ArtifactName)
        -> Result<Vec<VersionToken>, ReplicaError>;

    /// Upload one version; `cookbook_path` contains `<cookbook>/`.
    async fn upload_version(
        &self,
        cookbook: &ArtifactName,
        version: &VersionToken,
        cookbook_path: &Path,
    ) -> Result<(), ReplicaError>;
}
