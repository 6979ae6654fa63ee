//! Recovery: snapshot plus log replay
//!
//! Loads `table.snap` (if any) and replays every segment record whose lsn is
//! past the snapshot's checkpoint. Replayed lsns must be contiguous; a gap
//! means a segment the snapshot depends on is missing and recovery fails.
//! Recovery never writes to the directory.

use crate::checkpoint::SnapshotBody;
use crate::journal::{parse_segment_name, scan_segment, segment_name, SegmentInfo};
use crate::Result;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;
use wr_core::SessionError;

/// State rebuilt from an engine home
#[derive(Debug, Default)]
pub struct Recovered {
    pub table: BTreeMap<String, String>,
    /// Lsn covered by the snapshot (0 without one)
    pub checkpoint_lsn: u64,
    /// Highest lsn applied
    pub last_lsn: u64,
    pub next_segment_id: u64,
    /// Every segment found on disk
    pub segments: BTreeMap<u64, SegmentInfo>,
    pub has_snapshot: bool,
    /// `(segment id, valid length)` when the last segment ends mid-frame
    pub torn_tail: Option<(u64, u64)>,
}

/// Rebuild table state from the files in `home`
pub fn recover(home: &Path) -> Result<Recovered> {
    let mut recovered = Recovered {
        next_segment_id: 1,
        ..Recovered::default()
    };

    if let Some(snapshot) = SnapshotBody::read(home)? {
        recovered.has_snapshot = true;
        recovered.checkpoint_lsn = snapshot.checkpoint_lsn;
        recovered.next_segment_id = snapshot.next_segment_id.max(1);
        recovered.table = snapshot.entries.into_iter().collect();
    }
    recovered.last_lsn = recovered.checkpoint_lsn;

    let ids = list_segments(home)?;
    for (pos, &id) in ids.iter().enumerate() {
        let name = segment_name(id);
        let path = home.join(&name);
        let scan = scan_segment(&path, id)?;

        if scan.torn {
            if pos + 1 != ids.len() {
                return Err(SessionError::corrupt(&path, "partial record in a sealed segment"));
            }
            recovered.torn_tail = Some((id, scan.valid_len));
        }

        for record in scan.records {
            if record.lsn <= recovered.last_lsn {
                continue;
            }
            if record.lsn != recovered.last_lsn + 1 {
                return Err(SessionError::MissingLog {
                    expected: recovered.last_lsn + 1,
                    found: record.lsn,
                    segment: name,
                });
            }
            recovered.last_lsn = record.lsn;
            recovered.table.insert(record.key, record.value);
        }

        recovered.segments.insert(id, scan.info);
        recovered.next_segment_id = recovered.next_segment_id.max(id + 1);
    }

    debug!(
        home = %home.display(),
        keys = recovered.table.len(),
        checkpoint_lsn = recovered.checkpoint_lsn,
        last_lsn = recovered.last_lsn,
        segments = recovered.segments.len(),
        "recovered engine state"
    );
    Ok(recovered)
}

/// Segment ids present in `home`, ascending
pub fn list_segments(home: &Path) -> Result<Vec<u64>> {
    let mut ids = Vec::new();
    for entry in fs::read_dir(home)? {
        let entry = entry?;
        if let Some(id) = entry.file_name().to_str().and_then(parse_segment_name) {
            ids.push(id);
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::LogJournal;
    use crate::record::LogRecord;
    use tempfile::TempDir;

    fn write_segments(home: &Path, lsns: std::ops::RangeInclusive<u64>, file_max: u64) {
        let mut journal = LogJournal::new(home.to_path_buf(), file_max, false, BTreeMap::new(), 1);
        for lsn in lsns {
            journal
                .append(&LogRecord::new(lsn, format!("key.{}", lsn), format!("value.{}", lsn)))
                .unwrap();
        }
        journal.switch().unwrap();
    }

    #[test]
    fn test_recover_empty_home() {
        let temp_dir = TempDir::new().unwrap();
        let recovered = recover(temp_dir.path()).unwrap();

        assert!(recovered.table.is_empty());
        assert!(!recovered.has_snapshot);
        assert_eq!(recovered.next_segment_id, 1);
    }

    #[test]
    fn test_recover_replays_past_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        write_segments(temp_dir.path(), 1..=10, 1 << 20);
        SnapshotBody {
            checkpoint_lsn: 4,
            next_segment_id: 2,
            entries: vec![("key.1".to_string(), "from-snapshot".to_string())],
        }
        .write(temp_dir.path())
        .unwrap();

        let recovered = recover(temp_dir.path()).unwrap();

        // Records 1..=4 are covered by the snapshot and not replayed
        assert_eq!(recovered.table["key.1"], "from-snapshot");
        assert!(!recovered.table.contains_key("key.3"));
        assert_eq!(recovered.table["key.5"], "value.5");
        assert_eq!(recovered.last_lsn, 10);
        assert_eq!(recovered.table.len(), 7);
    }

    #[test]
    fn test_recover_detects_missing_segment() {
        let temp_dir = TempDir::new().unwrap();
        write_segments(temp_dir.path(), 1..=30, 128);
        let ids = list_segments(temp_dir.path()).unwrap();
        assert!(ids.len() >= 3);

        fs::remove_file(temp_dir.path().join(segment_name(ids[1]))).unwrap();

        let err = recover(temp_dir.path()).unwrap_err();
        assert!(matches!(err, SessionError::MissingLog { .. }), "{:?}", err);
    }

    #[test]
    fn test_recover_next_segment_after_archived_ids() {
        let temp_dir = TempDir::new().unwrap();
        SnapshotBody {
            checkpoint_lsn: 0,
            next_segment_id: 9,
            entries: Vec::new(),
        }
        .write(temp_dir.path())
        .unwrap();

        let recovered = recover(temp_dir.path()).unwrap();
        assert_eq!(recovered.next_segment_id, 9);
    }

    #[test]
    fn test_list_segments_ignores_other_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("table.snap"), b"").unwrap();
        fs::write(temp_dir.path().join("log.0000000003"), b"").unwrap();
        fs::write(temp_dir.path().join("log.0000000001"), b"").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), b"").unwrap();

        assert_eq!(list_segments(temp_dir.path()).unwrap(), vec![1, 3]);
    }
}
