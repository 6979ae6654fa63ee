//! Engine session: table, write-ahead log, checkpoints and backup cursors
//!
//! Opening a backup cursor seals the active log segment so every enumerated
//! file is immutable while the cursor is held. Only one cursor may be open at
//! a time, and checkpoints are refused while one is open so the snapshot file
//! stays stable for the copy.

use crate::checkpoint::{SnapshotBody, SNAPSHOT_FILE};
use crate::journal::{segment_name, LogJournal};
use crate::record::LogRecord;
use crate::recovery::recover;
use crate::retention::RetentionPolicy;
use crate::Result;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use wr_core::{
    BackupCursor, CheckpointInfo, CursorId, CursorKind, SessionError, StorageSession, TableWriter,
    TruncateReport, TruncateScope,
};

/// Engine tuning
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Segment size that triggers a switch to a new segment (default: 100 KiB)
    pub log_file_max: u64,
    /// Fsync after every appended record
    pub sync_on_write: bool,
    pub retention: RetentionPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_file_max: 100 * 1024,
            sync_on_write: false,
            retention: RetentionPolicy::default(),
        }
    }
}

#[derive(Debug)]
struct OpenCursor {
    id: CursorId,
    kind: CursorKind,
    /// Segment ids enumerated by this cursor and not yet archived
    segments: Vec<u64>,
}

/// A session over one engine home directory
pub struct Engine {
    home: PathBuf,
    config: EngineConfig,
    table: BTreeMap<String, String>,
    next_lsn: u64,
    checkpoint_lsn: u64,
    has_snapshot: bool,
    journal: LogJournal,
    read_only: bool,
    cursor: Option<OpenCursor>,
    next_cursor_id: u64,
}

impl Engine {
    /// Open or create an engine at `home`, running recovery
    pub fn open(home: &Path, config: EngineConfig) -> Result<Self> {
        fs::create_dir_all(home)?;
        let recovered = recover(home)?;

        // A torn tail must not survive into a sealed segment
        if let Some((id, valid_len)) = recovered.torn_tail {
            warn!(segment = %segment_name(id), valid_len, "truncating torn log tail");
            let file = OpenOptions::new().write(true).open(home.join(segment_name(id)))?;
            file.set_len(valid_len)?;
            file.sync_all()?;
        }

        Ok(Self::from_recovered(home, config, recovered, false))
    }

    /// Recover the directory without ever writing to it
    pub fn open_read_only(home: &Path) -> Result<Self> {
        let recovered = recover(home)?;
        Ok(Self::from_recovered(home, EngineConfig::default(), recovered, true))
    }

    fn from_recovered(
        home: &Path,
        config: EngineConfig,
        recovered: crate::recovery::Recovered,
        read_only: bool,
    ) -> Self {
        let journal = LogJournal::new(
            home.to_path_buf(),
            config.log_file_max,
            config.sync_on_write,
            recovered.segments,
            recovered.next_segment_id,
        );

        info!(
            home = %home.display(),
            keys = recovered.table.len(),
            last_lsn = recovered.last_lsn,
            read_only,
            "opened engine"
        );

        Self {
            home: home.to_path_buf(),
            config,
            table: recovered.table,
            next_lsn: recovered.last_lsn + 1,
            checkpoint_lsn: recovered.checkpoint_lsn,
            has_snapshot: recovered.has_snapshot,
            journal,
            read_only,
            cursor: None,
            next_cursor_id: 1,
        }
    }

    /// Look up a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.table.get(key).map(String::as_str)
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Every key/value pair, ordered by key
    pub fn dump(&self) -> Vec<(String, String)> {
        self.table
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Lsn covered by the last checkpoint
    pub fn checkpoint_lsn(&self) -> u64 {
        self.checkpoint_lsn
    }

    /// Highest lsn written so far
    pub fn last_lsn(&self) -> u64 {
        self.next_lsn - 1
    }

    /// Names of sealed, unarchived log segments
    pub fn log_segments(&self) -> Vec<String> {
        self.journal.closed().map(|s| s.name()).collect()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            Err(SessionError::ReadOnly)
        } else {
            Ok(())
        }
    }
}

impl TableWriter for Engine {
    fn insert(&mut self, key: &str, value: &str) -> Result<()> {
        self.ensure_writable()?;

        let record = LogRecord::new(self.next_lsn, key, value);
        self.journal.append(&record)?;

        self.next_lsn += 1;
        self.table.insert(record.key, record.value);
        Ok(())
    }
}

impl StorageSession for Engine {
    fn home(&self) -> &Path {
        &self.home
    }

    fn checkpoint(&mut self) -> Result<CheckpointInfo> {
        self.ensure_writable()?;
        if let Some(cursor) = &self.cursor {
            return Err(SessionError::CursorBusy(cursor.id));
        }

        let body = SnapshotBody {
            checkpoint_lsn: self.last_lsn(),
            next_segment_id: self.journal.next_segment_id(),
            entries: self.dump(),
        };
        body.write(&self.home)?;

        self.checkpoint_lsn = body.checkpoint_lsn;
        self.has_snapshot = true;

        info!(lsn = self.checkpoint_lsn, keys = body.entries.len(), "checkpoint complete");
        Ok(CheckpointInfo {
            lsn: self.checkpoint_lsn,
            entries: body.entries.len(),
            file: SNAPSHOT_FILE.to_string(),
        })
    }

    fn open_cursor(&mut self, kind: CursorKind) -> Result<BackupCursor> {
        if let Some(cursor) = &self.cursor {
            return Err(SessionError::CursorBusy(cursor.id));
        }

        if !self.read_only {
            self.journal.switch()?;
        }

        let segments = self.journal.closed_ids();
        let mut files = Vec::with_capacity(segments.len() + 1);
        if kind == CursorKind::Full && self.has_snapshot {
            files.push(SNAPSHOT_FILE.to_string());
        }
        files.extend(segments.iter().map(|&id| segment_name(id)));

        let id = CursorId(self.next_cursor_id);
        self.next_cursor_id += 1;
        self.cursor = Some(OpenCursor { id, kind, segments });

        debug!(cursor = %id, ?kind, files = files.len(), "opened backup cursor");
        Ok(BackupCursor::new(id, kind, files))
    }

    fn close_cursor(&mut self, cursor: BackupCursor) -> Result<()> {
        match &self.cursor {
            Some(open) if open.id == cursor.id() => {
                debug!(cursor = %open.id, "closed backup cursor");
                self.cursor = None;
                Ok(())
            }
            _ => Err(SessionError::UnknownCursor(cursor.id())),
        }
    }

    fn truncate(&mut self, scope: TruncateScope) -> Result<TruncateReport> {
        let TruncateScope::Log = scope;
        self.ensure_writable()?;

        let cursor = self.cursor.as_mut().ok_or(SessionError::NoCursor)?;
        if cursor.kind != CursorKind::IncrementalLog {
            return Err(SessionError::TruncationRefused(format!(
                "cursor {} is not an incremental log cursor",
                cursor.id
            )));
        }

        let enumerated = std::mem::take(&mut cursor.segments);
        let plan = self.config.retention.plan(
            enumerated.iter().filter_map(|&id| self.journal.segment(id)),
            self.checkpoint_lsn,
        );

        let mut report = TruncateReport::default();
        for id in plan.archive {
            let info = self.journal.archive(id)?;
            report.archived.push(info.name());
        }
        report.retained = plan.retain.iter().map(|&id| segment_name(id)).collect();

        info!(
            archived = report.archived.len(),
            retained = report.retained.len(),
            "truncated log"
        );
        Ok(report)
    }
}
