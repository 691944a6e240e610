//! Error types for chefsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure while reading the config file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The config file did not exist at the expected path.
    #[error("config not found at {path}")]
    NotFound { path: PathBuf },

    /// The config parsed but is not usable.
    #[error("invalid config: {0}")]
    Invalid(String),

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.chefsync/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}
