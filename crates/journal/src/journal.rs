//! Segmented write-ahead log
//!
//! Records are appended to the active segment until it reaches
//! `file_max` bytes, then the segment is sealed and a new one is started on
//! the next write. Sealed segments are immutable until archived.
//!
//! Segment layout: magic "WRL1", segment id (u64 LE), then framed records.

use crate::record::{decode_frame, FrameRead, LogRecord};
use crate::Result;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use wr_core::SessionError;

/// File name prefix shared by all log segments
pub const SEGMENT_PREFIX: &str = "log.";

const SEGMENT_MAGIC: [u8; 4] = *b"WRL1";

/// Bytes occupied by the segment header
pub const SEGMENT_HEADER_LEN: u64 = 12;

/// File name of segment `id`
pub fn segment_name(id: u64) -> String {
    format!("{}{:010}", SEGMENT_PREFIX, id)
}

/// Parse a segment file name back to its id
pub fn parse_segment_name(name: &str) -> Option<u64> {
    let digits = name.strip_prefix(SEGMENT_PREFIX)?;
    if digits.len() != 10 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Bookkeeping for one segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfo {
    pub id: u64,
    /// First record's lsn, `None` while the segment holds no records
    pub first_lsn: Option<u64>,
    pub last_lsn: Option<u64>,
    /// File size including the header
    pub bytes: u64,
}

impl SegmentInfo {
    fn empty(id: u64) -> Self {
        Self {
            id,
            first_lsn: None,
            last_lsn: None,
            bytes: SEGMENT_HEADER_LEN,
        }
    }

    /// File name of this segment
    pub fn name(&self) -> String {
        segment_name(self.id)
    }

    fn note_record(&mut self, lsn: u64, frame_len: u64) {
        self.first_lsn.get_or_insert(lsn);
        self.last_lsn = Some(lsn);
        self.bytes += frame_len;
    }
}

/// Records read back from one segment file
#[derive(Debug)]
pub struct SegmentScan {
    pub info: SegmentInfo,
    pub records: Vec<LogRecord>,
    /// Length of the well-formed prefix
    pub valid_len: u64,
    /// The file ends with a partially written frame
    pub torn: bool,
}

/// Read every complete record of a segment
pub fn scan_segment(path: &Path, id: u64) -> Result<SegmentScan> {
    let bytes = fs::read(path)?;

    if (bytes.len() as u64) < SEGMENT_HEADER_LEN {
        // Header never finished: nothing durable was written here
        return Ok(SegmentScan {
            info: SegmentInfo {
                bytes: 0,
                ..SegmentInfo::empty(id)
            },
            records: Vec::new(),
            valid_len: 0,
            torn: true,
        });
    }

    if bytes[..4] != SEGMENT_MAGIC {
        return Err(SessionError::corrupt(path, "bad segment magic"));
    }
    let mut id_bytes = [0u8; 8];
    id_bytes.copy_from_slice(&bytes[4..12]);
    if u64::from_le_bytes(id_bytes) != id {
        return Err(SessionError::corrupt(path, "segment id does not match file name"));
    }

    let mut info = SegmentInfo::empty(id);
    let mut records = Vec::new();
    let mut offset = SEGMENT_HEADER_LEN as usize;
    let torn = loop {
        match decode_frame(&bytes[offset..], path)? {
            FrameRead::Record(record, used) => {
                info.note_record(record.lsn, used as u64);
                records.push(record);
                offset += used;
            }
            FrameRead::Torn => break true,
            FrameRead::End => break false,
        }
    };

    Ok(SegmentScan {
        info,
        records,
        valid_len: offset as u64,
        torn,
    })
}

struct ActiveSegment {
    file: File,
    info: SegmentInfo,
}

/// Append side of the write-ahead log plus the set of sealed segments
pub struct LogJournal {
    dir: PathBuf,
    file_max: u64,
    sync_on_write: bool,
    active: Option<ActiveSegment>,
    closed: BTreeMap<u64, SegmentInfo>,
    next_segment_id: u64,
}

impl LogJournal {
    /// Resume a journal over already-sealed segments
    pub fn new(
        dir: PathBuf,
        file_max: u64,
        sync_on_write: bool,
        closed: BTreeMap<u64, SegmentInfo>,
        next_segment_id: u64,
    ) -> Self {
        Self {
            dir,
            file_max,
            sync_on_write,
            active: None,
            closed,
            next_segment_id,
        }
    }

    /// Append a record, starting a segment if none is active
    pub fn append(&mut self, record: &LogRecord) -> Result<()> {
        let frame = record.encode_frame()?;

        let mut active = match self.active.take() {
            Some(active) => active,
            None => self.create_segment()?,
        };

        let written = active.file.write_all(&frame).and_then(|_| {
            if self.sync_on_write {
                active.file.sync_data()
            } else {
                Ok(())
            }
        });
        if let Err(e) = written {
            self.active = Some(active);
            return Err(e.into());
        }

        active.info.note_record(record.lsn, frame.len() as u64);

        if active.info.bytes >= self.file_max {
            self.seal(active)?;
        } else {
            self.active = Some(active);
        }
        Ok(())
    }

    /// Seal the active segment so it becomes enumerable
    ///
    /// Returns the sealed segment id, or `None` when nothing was active.
    pub fn switch(&mut self) -> Result<Option<u64>> {
        match self.active.take() {
            Some(active) => Ok(Some(self.seal(active)?)),
            None => Ok(None),
        }
    }

    fn seal(&mut self, active: ActiveSegment) -> Result<u64> {
        active.file.sync_all()?;
        let id = active.info.id;
        debug!(segment = %active.info.name(), bytes = active.info.bytes, "sealed log segment");
        self.closed.insert(id, active.info);
        Ok(id)
    }

    fn create_segment(&mut self) -> Result<ActiveSegment> {
        let id = self.next_segment_id;
        let path = self.dir.join(segment_name(id));

        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)?;
        file.write_all(&SEGMENT_MAGIC)?;
        file.write_all(&id.to_le_bytes())?;
        if self.sync_on_write {
            file.sync_all()?;
        }

        self.next_segment_id += 1;
        Ok(ActiveSegment {
            file,
            info: SegmentInfo::empty(id),
        })
    }

    /// Sealed segments in id order
    pub fn closed(&self) -> impl Iterator<Item = &SegmentInfo> {
        self.closed.values()
    }

    /// Ids of sealed segments in order
    pub fn closed_ids(&self) -> Vec<u64> {
        self.closed.keys().copied().collect()
    }

    /// Look up a sealed segment
    pub fn segment(&self, id: u64) -> Option<&SegmentInfo> {
        self.closed.get(&id)
    }

    /// Delete a sealed segment from disk
    pub fn archive(&mut self, id: u64) -> Result<SegmentInfo> {
        let info = self
            .closed
            .remove(&id)
            .ok_or_else(|| SessionError::TruncationRefused(format!("{} is not sealed", segment_name(id))))?;

        match fs::remove_file(self.dir.join(info.name())) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(segment = %info.name(), "segment already gone while archiving");
            }
            Err(e) => {
                self.closed.insert(id, info);
                return Err(e.into());
            }
        }
        Ok(info)
    }

    /// Id the next new segment will use
    pub fn next_segment_id(&self) -> u64 {
        self.next_segment_id
    }

    /// Id of the segment currently receiving writes
    pub fn active_id(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.info.id)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn journal(dir: &Path, file_max: u64) -> LogJournal {
        LogJournal::new(dir.to_path_buf(), file_max, false, BTreeMap::new(), 1)
    }

    #[test]
    fn test_segment_names() {
        assert_eq!(segment_name(1), "log.0000000001");
        assert_eq!(parse_segment_name("log.0000000042"), Some(42));
        assert_eq!(parse_segment_name("log.42"), None);
        assert_eq!(parse_segment_name("table.snap"), None);
        assert_eq!(parse_segment_name("log.00000000x1"), None);
    }

    #[test]
    fn test_append_then_switch_seals_segment() {
        let temp_dir = TempDir::new().unwrap();
        let mut journal = journal(temp_dir.path(), 1 << 20);

        journal.append(&LogRecord::new(1, "a", "1")).unwrap();
        journal.append(&LogRecord::new(2, "b", "2")).unwrap();
        assert_eq!(journal.active_id(), Some(1));
        assert!(journal.closed_ids().is_empty());

        assert_eq!(journal.switch().unwrap(), Some(1));
        assert_eq!(journal.switch().unwrap(), None);

        let info = journal.segment(1).unwrap();
        assert_eq!(info.first_lsn, Some(1));
        assert_eq!(info.last_lsn, Some(2));

        let scan = scan_segment(&temp_dir.path().join("log.0000000001"), 1).unwrap();
        assert_eq!(scan.records.len(), 2);
        assert!(!scan.torn);
        assert_eq!(scan.info, *info);
    }

    #[test]
    fn test_segments_roll_at_file_max() {
        let temp_dir = TempDir::new().unwrap();
        let mut journal = journal(temp_dir.path(), 128);

        for lsn in 1..=40 {
            journal
                .append(&LogRecord::new(lsn, format!("key.{}", lsn), "value"))
                .unwrap();
        }
        journal.switch().unwrap();

        let ids = journal.closed_ids();
        assert!(ids.len() > 1, "expected several segments, got {:?}", ids);

        // Lsns stay contiguous across segment boundaries
        let mut expected = 1;
        for id in ids {
            let scan = scan_segment(&temp_dir.path().join(segment_name(id)), id).unwrap();
            for record in scan.records {
                assert_eq!(record.lsn, expected);
                expected += 1;
            }
        }
        assert_eq!(expected, 41);
    }

    #[test]
    fn test_archive_removes_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut journal = journal(temp_dir.path(), 1 << 20);
        journal.append(&LogRecord::new(1, "a", "1")).unwrap();
        journal.switch().unwrap();

        let archived = journal.archive(1).unwrap();
        assert_eq!(archived.id, 1);
        assert!(!temp_dir.path().join("log.0000000001").exists());
        assert!(journal.archive(1).is_err());
    }

    #[test]
    fn test_scan_reports_torn_tail() {
        let temp_dir = TempDir::new().unwrap();
        let mut journal = journal(temp_dir.path(), 1 << 20);
        journal.append(&LogRecord::new(1, "a", "1")).unwrap();
        journal.append(&LogRecord::new(2, "b", "2")).unwrap();
        journal.switch().unwrap();

        let path = temp_dir.path().join("log.0000000001");
        let full_len = fs::metadata(&path).unwrap().len();
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(full_len - 3).unwrap();

        let scan = scan_segment(&path, 1).unwrap();
        assert!(scan.torn);
        assert_eq!(scan.records.len(), 1);
        assert!(scan.valid_len < full_len - 3);
    }

    #[test]
    fn test_scan_rejects_mismatched_id() {
        let temp_dir = TempDir::new().unwrap();
        let mut journal = journal(temp_dir.path(), 1 << 20);
        journal.append(&LogRecord::new(1, "a", "1")).unwrap();
        journal.switch().unwrap();

        let err = scan_segment(&temp_dir.path().join("log.0000000001"), 2).unwrap_err();
        assert!(matches!(err, SessionError::Corrupt { .. }));
    }
}
