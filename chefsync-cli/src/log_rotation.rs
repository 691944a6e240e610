//! Size-based rotation of the chefsync log file.
//!
//! Checked once at startup, before the file is opened for appending:
//!   chefsync.log → chefsync.log.1 → chefsync.log.2 → … → chefsync.log.<max>

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Rotate `log_path` if its size reached `max_bytes`, keeping at most
/// `max_files` numbered backups.
///
/// Returns `true` if rotation occurred. A missing log file is not an error.
pub fn rotate_if_needed(log_path: &Path, max_bytes: u64, max_files: usize) -> io::Result<bool> {
    match fs::metadata(log_path) {
        Ok(meta) if meta.len() >= max_bytes => {}
        Ok(_) => return Ok(false),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    }

    // No backups wanted: the oversized file is simply dropped.
    let Some(last_kept) = max_files.checked_sub(1) else {
        fs::remove_file(log_path)?;
        return Ok(true);
    };

    missing_ok(fs::remove_file(numbered_path(log_path, max_files)))?;
    for n in (1..=last_kept).rev() {
        missing_ok(fs::rename(
            numbered_path(log_path, n),
            numbered_path(log_path, n + 1),
        ))?;
    }
    fs::rename(log_path, numbered_path(log_path, 1))?;
    Ok(true)
}

fn missing_ok(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Path of the `n`-th backup (`chefsync.log.2`).
fn numbered_path(base: &Path, n: usize) -> PathBuf {
    let name = base
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(chefsync_core::paths::LOG_FILE);
    base.with_file_name(format!("{name}.{n}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const LIMIT: u64 = 1024;

    fn oversized(path: &Path, fill: u8) {
        fs::write(path, vec![fill; LIMIT as usize + 1]).unwrap();
    }

    #[test]
    fn small_file_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("chefsync.log");
        fs::write(&log, "short").unwrap();

        assert!(!rotate_if_needed(&log, LIMIT, 7).unwrap());
        assert!(!numbered_path(&log, 1).exists());
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(!rotate_if_needed(&dir.path().join("chefsync.log"), LIMIT, 7).unwrap());
    }

    #[test]
    fn oversized_file_moves_to_first_backup() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("chefsync.log");
        oversized(&log, b'a');

        assert!(rotate_if_needed(&log, LIMIT, 7).unwrap());
        assert!(!log.exists());
        assert_eq!(
            fs::metadata(numbered_path(&log, 1)).unwrap().len(),
            LIMIT + 1
        );
    }

    #[test]
    fn backups_are_capped_and_shifted() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("chefsync.log");

        for round in 0..4u8 {
            oversized(&log, b'0' + round);
            rotate_if_needed(&log, LIMIT, 3).unwrap();
        }

        assert!(numbered_path(&log, 3).exists());
        assert!(!numbered_path(&log, 4).exists());
        let newest = fs::read(numbered_path(&log, 1)).unwrap();
        assert_eq!(newest[0], b'3');
    }

    #[test]
    fn zero_backups_drops_the_oversized_file() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("chefsync.log");
        oversized(&log, b'z');

        assert!(rotate_if_needed(&log, LIMIT, 0).unwrap());
        assert!(!log.exists());
        assert!(!numbered_path(&log, 1).exists());
    }
}
