//! # chefsync-engine
//!
//! Version-aware synchronization of a Chef repository to replica servers.
//!
//! Call [`pipeline::run_source`] on the source side to stage the workspace
//! and distribute it, and [`pipeline::run_replica`] on a replica to apply a
//! transferred workspace. The collaborators that actually talk to servers
//! are the [`SourceClient`], [`ReplicaTarget`] and [`LocalService`] traits.

pub mod apply;
pub mod engine;
pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod replica;
pub mod report;
pub mod scheduler;
pub mod source;
pub mod status;
pub mod workspace;

pub use engine::{StageOutcome, SyncEngine, SyncScope};
pub use error::{ManifestError, ReplicaError, SourceError, SyncError};
pub use manifest::{ManifestStore, VersionRecord};
pub use pipeline::{run_replica, run_source, RunOptions, RunRequest};
pub use replica::{LocalService, ReplicaTarget};
pub use report::{
    ApplyReport, ArtifactOutcome, ItemStatus, ReplicaOutcome, ReplicaReport, RunReport, RunStatus,
};
pub use scheduler::DistributionScheduler;
pub use source::{FetchRequest, SourceClient};
pub use status::ManifestSignal;
pub use workspace::{StagedVersions, Workspace};
