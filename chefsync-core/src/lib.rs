//! chefsync core library: domain types, configuration, state layout, errors.
//!
//! - [`types`]: newtypes for artifacts, versions and replicas
//! - [`config`]: immutable [`SyncConfig`] and its YAML loader
//! - [`paths`]: on-disk state layout helpers
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use config::{ChefServer, LogConfig, ReplicaConfig, SyncConfig, ToolPaths};
pub use error::ConfigError;
pub use types::{ArtifactKind, ArtifactName, CookbookVersion, ReplicaName, VersionToken};
