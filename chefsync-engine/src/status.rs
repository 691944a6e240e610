//! Manifest status signals for `chefsync status`.
//!
//! Signal precedence:
//! 1. `Untracked` (no history recorded, only explicit versions marked)
//! 2. `HeadOnly` (a single version; nothing to archive)
//! 3. `NeverSynced` (history recorded, none of it distributed)
//! 4. `Pending` (some archival versions still to distribute)
//! 5. `Current`

use chrono::{DateTime, Utc};

use chefsync_core::VersionToken;

use crate::error::ManifestError;
use crate::manifest::{ManifestStore, VersionRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSignal {
    Untracked,
    HeadOnly,
    NeverSynced { versions: Vec<VersionToken> },
    Pending { versions: Vec<VersionToken> },
    Current,
}

/// Classify one record.
pub fn check(record: &VersionRecord) -> ManifestSignal {
    if record.versions.is_empty() {
        return ManifestSignal::Untracked;
    }
    let candidates = record.archival_candidates();
    if candidates.is_empty() {
        return ManifestSignal::HeadOnly;
    }
    let pending = record.pending();
    if pending.is_empty() {
        return ManifestSignal::Current;
    }
    if pending.len() == candidates.len() {
        return ManifestSignal::NeverSynced { versions: pending };
    }
    ManifestSignal::Pending { versions: pending }
}

/// Classify every record in `store`, sorted by cookbook name.
pub fn check_all(store: &ManifestStore) -> Result<Vec<(VersionRecord, ManifestSignal)>, ManifestError> {
    Ok(store
        .list()?
        .into_iter()
        .map(|record| {
            let signal = check(&record);
            (record, signal)
        })
        .collect())
}

/// Format age from a chrono timestamp (manifest `recorded_at`).
pub fn format_datetime_age(timestamp: DateTime<Utc>) -> String {
    let age = Utc::now()
        .signed_duration_since(timestamp)
        .num_seconds()
        .max(0) as u64;
    format_seconds(age)
}

fn format_seconds(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chefsync_core::ArtifactName;
    use tempfile::TempDir;

    fn record(versions: &[&str], distributed: &[&str]) -> VersionRecord {
        VersionRecord {
            name: ArtifactName::from("nginx"),
            versions: versions.iter().map(|v| VersionToken::from(*v)).collect(),
            distributed: distributed.iter().map(|v| VersionToken::from(*v)).collect(),
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn precedence_of_signals() {
        assert_eq!(check(&record(&[], &["1.0"])), ManifestSignal::Untracked);
        assert_eq!(check(&record(&["1.0"], &[])), ManifestSignal::HeadOnly);
        assert_eq!(
            check(&record(&["2.1", "2.0", "1.9"], &[])),
            ManifestSignal::NeverSynced {
                versions: vec![VersionToken::from("2.0"), VersionToken::from("1.9")]
            }
        );
        assert_eq!(
            check(&record(&["2.1", "2.0", "1.9"], &["1.9"])),
            ManifestSignal::Pending {
                versions: vec![VersionToken::from("2.0")]
            }
        );
        assert_eq!(
            check(&record(&["2.1", "2.0", "1.9"], &["2.0", "1.9"])),
            ManifestSignal::Current
        );
    }

    #[test]
    fn check_all_reads_store() {
        let tmp = TempDir::new().unwrap();
        let store = ManifestStore::at_state(tmp.path());
        store
            .record_versions(
                &ArtifactName::from("nginx"),
                vec![VersionToken::from("2.1"), VersionToken::from("2.0")],
            )
            .unwrap();
        let all = check_all(&store).unwrap();
        assert_eq!(all.len(), 1);
        assert!(matches!(all[0].1, ManifestSignal::NeverSynced { .. }));
    }

    #[test]
    fn seconds_format_into_largest_unit() {
        assert_eq!(format_seconds(42), "42s");
        assert_eq!(format_seconds(125), "2m");
        assert_eq!(format_seconds(2 * 3600 + 5), "2h");
        assert_eq!(format_seconds(3 * 86400), "3d");
    }
}
