//! Walround Core - shared primitives for the backup round engine
//!
//! This crate provides the contracts every other crate builds on:
//! - Round numbering
//! - Storage session contract (checkpoint, backup cursors, log truncation)
//! - File transport and directory operations
//! - BLAKE3 hashing and atomic writes

pub mod error;
pub mod fsops;
pub mod hash;
pub mod round;
pub mod session;

// Re-export main types for convenience
pub use error::{SessionError, SessionResult};
pub use fsops::{atomic_write, DirectoryOps, FileTransport, LocalDirectoryOps, LocalTransport};
pub use hash::{checksum32, hash_file, FileDigest};
pub use round::Round;
pub use session::{
    BackupCursor, CheckpointInfo, CursorId, CursorKind, StorageSession, TableWriter,
    TruncateReport, TruncateScope,
};
