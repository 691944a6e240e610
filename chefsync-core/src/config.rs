//! Immutable sync configuration.
//!
//! Loaded once per process from YAML and passed by reference into the engine,
//! the scheduler and the adapters. Relative paths in the file (state
//! directory, keys, knife configs) are resolved against the directory that
//! holds the config file.
//!
//! ```yaml
//! kinds: [cookbooks, environments, roles, data_bags]
//! source:
//!   url: https://chef-master.example.com/organizations/acme
//!   key: keys/master.pem
//! max_parallel: 4
//! replicas:
//!   - name: syd
//!     address: 10.0.0.21
//!     ssh_user: chef
//!     server:
//!       url: https://chef-syd.example.com/organizations/acme
//!       key: keys/syd.pem
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::paths;
use crate::types::{ArtifactKind, ReplicaName};

/// Connection details for one Chef server. `key` is a reference to a
/// credential file; chefsync never reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChefServer {
    pub url: String,
    #[serde(default = "default_client")]
    pub client: String,
    pub key: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knife_config: Option<PathBuf>,
}

/// One replica Chef server and how to reach its host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaConfig {
    pub name: ReplicaName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    /// Host name or IP used for rsync and ssh.
    pub address: String,
    #[serde(default = "default_ssh_user")]
    pub ssh_user: String,
    /// The replica's own Chef server, used when running in replica mode.
    pub server: ChefServer,
    /// Workspace path on the replica host (relative to the ssh user's home).
    #[serde(default = "default_remote_workspace")]
    pub remote_workspace: PathBuf,
    /// Command that runs chefsync on the replica host.
    #[serde(default = "default_remote_command")]
    pub remote_command: String,
}

impl ReplicaConfig {
    /// Human label: the site name when configured, otherwise the replica name.
    pub fn label(&self) -> &str {
        self.site.as_deref().unwrap_or(&self.name.0)
    }
}

/// External binaries used by the adapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPaths {
    #[serde(default = "default_knife")]
    pub knife: PathBuf,
    #[serde(default = "default_rsync")]
    pub rsync: PathBuf,
    #[serde(default = "default_ssh")]
    pub ssh: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            knife: default_knife(),
            rsync: default_rsync(),
            ssh: default_ssh(),
        }
    }
}

/// Log file settings. The file is rotated by size at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(default = "default_log_max_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_log_max_files")]
    pub max_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: None,
            max_bytes: default_log_max_bytes(),
            max_files: default_log_max_files(),
        }
    }
}

/// Root of the chefsync YAML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Local state directory; defaults to the directory holding the config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
    #[serde(default = "default_kinds")]
    pub kinds: Vec<ArtifactKind>,
    pub source: ChefServer,
    #[serde(default)]
    pub replicas: Vec<ReplicaConfig>,
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
    #[serde(default)]
    pub tools: ToolPaths,
    #[serde(default)]
    pub log: LogConfig,
}

impl SyncConfig {
    /// Resolved state directory. Always `Some` after [`load_at`].
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(paths::STATE_DIR))
    }

    /// Log file path: the configured file or `<state>/logs/chefsync.log`.
    pub fn log_file(&self) -> PathBuf {
        self.log
            .file
            .clone()
            .unwrap_or_else(|| paths::log_path(&self.state_dir()))
    }

    /// Look up a replica by name.
    pub fn replica(&self, name: &ReplicaName) -> Option<&ReplicaConfig> {
        self.replicas.iter().find(|r| &r.name == name)
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kinds.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one artifact kind must be configured".to_string(),
            ));
        }
        if self.max_parallel == 0 {
            return Err(ConfigError::Invalid(
                "max_parallel must be at least 1".to_string(),
            ));
        }
        let mut kinds = BTreeSet::new();
        for kind in &self.kinds {
            if !kinds.insert(kind) {
                return Err(ConfigError::Invalid(format!(
                    "artifact kind '{kind}' is listed more than once"
                )));
            }
        }
        let mut seen = BTreeSet::new();
        for replica in &self.replicas {
            if replica.name.0.trim().is_empty() {
                return Err(ConfigError::Invalid("replica name is empty".to_string()));
            }
            if !seen.insert(&replica.name) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate replica name '{}'",
                    replica.name
                )));
            }
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        let state = match self.state_dir.take() {
            Some(dir) => base.join(dir),
            None => base.to_path_buf(),
        };
        self.state_dir = Some(state);
        resolve_server(&mut self.source, base);
        for replica in &mut self.replicas {
            resolve_server(&mut replica.server, base);
        }
        if let Some(file) = self.log.file.take() {
            self.log.file = Some(base.join(file));
        }
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load and validate the config at `path`.
///
/// Returns `ConfigError::NotFound` if absent, `ConfigError::Parse` (with path
/// and line context) if malformed YAML, `ConfigError::Invalid` if it fails
/// validation.
pub fn load_at(path: &Path) -> Result<SyncConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: SyncConfig =
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    config.resolve_paths(base);
    config.validate()?;
    Ok(config)
}

/// Load `~/.chefsync/config.yaml`.
pub fn load() -> Result<SyncConfig, ConfigError> {
    load_at(&paths::config_path(&home()?))
}

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

fn resolve_server(server: &mut ChefServer, base: &Path) {
    server.key = base.join(&server.key);
    if let Some(knife) = server.knife_config.take() {
        server.knife_config = Some(base.join(knife));
    }
}

// ---------------------------------------------------------------------------
// Serde defaults
// ---------------------------------------------------------------------------

fn default_client() -> String {
    "admin".to_string()
}

fn default_ssh_user() -> String {
    "chef".to_string()
}

fn default_remote_workspace() -> PathBuf {
    PathBuf::from(paths::STATE_DIR).join("workspace")
}

fn default_remote_command() -> String {
    "chefsync".to_string()
}

fn default_knife() -> PathBuf {
    PathBuf::from("knife")
}

fn default_rsync() -> PathBuf {
    PathBuf::from("rsync")
}

fn default_ssh() -> PathBuf {
    PathBuf::from("ssh")
}

fn default_log_max_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_log_max_files() -> usize {
    7
}

fn default_kinds() -> Vec<ArtifactKind> {
    ArtifactKind::all().to_vec()
}

fn default_max_parallel() -> usize {
    4
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
