//! Backup round engine
//!
//! Drives repeated rounds of workload, checkpoint, full copy, incremental
//! copy, log truncation and cross-verification against a
//! [`StorageSession`](wr_core::StorageSession), keeping several backup
//! targets alive that lag each other by different numbers of rounds.

pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod copy;
pub mod error;
pub mod full;
pub mod incremental;
pub mod layout;
pub mod provision;
pub mod targets;
pub mod verify;
pub mod workload;

// Re-exports
pub use catalog::{Catalog, RoundEvent};
pub use config::RunConfig;
pub use coordinator::{RoundCoordinator, RoundPhase, RoundReport, RunSummary};
pub use copy::{CopyOptions, CopyReport};
pub use error::{BackupError, CopyError, ProvisionError, Result};
pub use full::FullBackupEngine;
pub use incremental::IncrementalBackupEngine;
pub use provision::{DirectoryHandle, DirectoryProvisioner};
pub use targets::{BackupTarget, BackupTargetSet, SegmentRef, TargetId, TargetKind, TargetSetError};
pub use verify::{Comparison, Instance, VerificationOracle};
pub use workload::{KeyValueWorkload, Workload};
