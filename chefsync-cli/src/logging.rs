//! tracing setup: an appended, size-rotated log file, echoed to stderr only
//! with `--verbose`. `RUST_LOG` overrides the default level unless
//! `--verbose` is given.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chefsync_core::SyncConfig;

use crate::log_rotation::rotate_if_needed;

pub fn init(config: &SyncConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let path = config.log_file();
    let (file_layer, open_error) =
        match open_log_file(&path, config.log.max_bytes, config.log.max_files) {
            Ok(file) => (
                Some(
                    fmt::layer()
                        .with_ansi(false)
                        .with_target(false)
                        .with_writer(Mutex::new(file)),
                ),
                None,
            ),
            Err(err) => (None, Some(err)),
        };

    // Without a log file, stderr is the only place left to write to.
    let console_layer = (verbose || file_layer.is_none())
        .then(|| fmt::layer().with_target(false).with_writer(io::stderr));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    if let Some(err) = open_error {
        tracing::warn!("cannot open log file {}: {err}", path.display());
    }
}

fn open_log_file(path: &Path, max_bytes: u64, max_files: usize) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    rotate_if_needed(path, max_bytes, max_files)?;
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn log_file_and_parent_are_created() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("chefsync.log");
        open_log_file(&path, 1024, 7).unwrap();
        assert!(path.is_file());
    }
}
