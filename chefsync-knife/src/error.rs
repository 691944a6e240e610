use std::path::PathBuf;

use thiserror::Error;

use chefsync_engine::{ReplicaError, SourceError};

/// Failure of one external tool invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("cannot run {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    Exit {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ToolError {
    /// Whether the tool reported that the requested object does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            ToolError::Exit { stderr, .. } => {
                let stderr = stderr.to_ascii_lowercase();
                stderr.contains("404") || stderr.contains("not found")
            }
            _ => false,
        }
    }
}

impl From<ToolError> for SourceError {
    fn from(err: ToolError) -> Self {
        if err.is_not_found() {
            SourceError::NotFound(err.to_string())
        } else {
            SourceError::Unavailable(err.to_string())
        }
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ToolError {
    ToolError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn apply_err(err: ToolError) -> ReplicaError {
    ReplicaError::Apply(err.to_string())
}

pub(crate) fn transfer_err(err: ToolError) -> ReplicaError {
    ReplicaError::Transfer(err.to_string())
}
