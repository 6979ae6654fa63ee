//! Errors reported by a storage session

use crate::session::CursorId;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a storage engine operation
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("backup cursor {0} is already open")]
    CursorBusy(CursorId),

    #[error("backup cursor {0} is not the open cursor")]
    UnknownCursor(CursorId),

    #[error("no incremental backup cursor is open")]
    NoCursor,

    #[error("log truncation refused: {0}")]
    TruncationRefused(String),

    #[error("session is read-only")]
    ReadOnly,

    #[error("corrupt file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("log gap: expected lsn {expected}, found {found} in {segment}")]
    MissingLog {
        expected: u64,
        found: u64,
        segment: String,
    },

    #[error("encoding error: {0}")]
    Encode(#[from] bincode::Error),
}

impl SessionError {
    /// Build a corruption error for a file
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        SessionError::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for session operations
pub type SessionResult<T> = std::result::Result<T, SessionError>;
