//! Storage session contract consumed by the backup coordinator
//!
//! The engine under backup owns its files. The coordinator only:
//! - asks for checkpoints,
//! - enumerates files through a backup cursor (full or log-only),
//! - acknowledges a finished log copy by requesting truncation.
//!
//! At most one backup cursor may be open against a session at a time.

use crate::error::SessionResult;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;

/// Identifier of an open backup cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CursorId(pub u64);

impl std::fmt::Display for CursorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a backup cursor enumerates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CursorKind {
    /// Every file needed to restore the current snapshot
    Full,
    /// Only log segments produced since the last truncation
    IncrementalLog,
}

/// Namespace a truncation applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncateScope {
    /// Log segments enumerated by the held incremental cursor
    Log,
}

/// Enumeration handle handed out by the engine
///
/// The file list is fixed when the cursor is opened and stays valid until it
/// is closed. Iteration returning `None` is the end-of-sequence signal, not an
/// error.
#[derive(Debug)]
pub struct BackupCursor {
    id: CursorId,
    kind: CursorKind,
    files: VecDeque<String>,
}

impl BackupCursor {
    /// Create a cursor over a fixed file list
    pub fn new(id: CursorId, kind: CursorKind, files: Vec<String>) -> Self {
        Self {
            id,
            kind,
            files: files.into(),
        }
    }

    pub fn id(&self) -> CursorId {
        self.id
    }

    pub fn kind(&self) -> CursorKind {
        self.kind
    }

    /// Number of files not yet yielded
    pub fn remaining(&self) -> usize {
        self.files.len()
    }
}

impl Iterator for BackupCursor {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.files.pop_front()
    }
}

/// Result of a checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointInfo {
    /// Last log sequence number covered by the snapshot
    pub lsn: u64,
    /// Number of live keys in the snapshot
    pub entries: usize,
    /// Snapshot file name inside the engine home
    pub file: String,
}

/// Outcome of a log truncation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruncateReport {
    /// Segments deleted from the source
    pub archived: Vec<String>,
    /// Segments kept because the last checkpoint does not cover them yet
    pub retained: Vec<String>,
}

/// A transactional, log-structured engine session that can be backed up
pub trait StorageSession {
    /// Directory holding the engine's files
    fn home(&self) -> &Path;

    /// Make the on-disk state consistent as of now
    fn checkpoint(&mut self) -> SessionResult<CheckpointInfo>;

    /// Open the (single) backup cursor
    fn open_cursor(&mut self, kind: CursorKind) -> SessionResult<BackupCursor>;

    /// Release the backup cursor
    fn close_cursor(&mut self, cursor: BackupCursor) -> SessionResult<()>;

    /// Archive log segments enumerated by the held incremental cursor
    fn truncate(&mut self, scope: TruncateScope) -> SessionResult<TruncateReport>;
}

/// Write path used by workload generators
pub trait TableWriter {
    /// Insert or overwrite a key with an auto-committed write
    fn insert(&mut self, key: &str, value: &str) -> SessionResult<()>;
}
