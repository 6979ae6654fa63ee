//! Reference log-structured storage engine
//!
//! This crate provides:
//! - Framed write-ahead log records
//! - Size-bounded log segments (`log.<id>`)
//! - Checkpoints written as an atomic snapshot file (`table.snap`)
//! - Backup cursors and log truncation (the `StorageSession` contract)
//! - Recovery, including read-only recovery over a backup directory

pub mod checkpoint;
pub mod engine;
pub mod journal;
pub mod record;
pub mod recovery;
pub mod retention;

// Re-exports
pub use checkpoint::{SnapshotBody, SNAPSHOT_FILE};
pub use engine::{Engine, EngineConfig};
pub use journal::{segment_name, parse_segment_name, LogJournal, SegmentInfo};
pub use record::LogRecord;
pub use recovery::{recover, Recovered};
pub use retention::{ArchivePlan, RetentionPolicy};

/// Result type for journal operations
pub type Result<T> = wr_core::SessionResult<T>;
