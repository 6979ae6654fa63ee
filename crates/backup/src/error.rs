//! Backup error taxonomy
//!
//! Every variant is fatal for the run. Nothing is retried and partial
//! artifacts are left on disk for inspection.

use crate::coordinator::RoundPhase;
use crate::targets::{TargetId, TargetSetError};
use std::path::PathBuf;
use thiserror::Error;
use wr_core::{Round, SessionError};

/// A target directory could not be recreated empty
#[derive(Error, Debug)]
#[error("failed to provision {target} at {path}: {source}")]
pub struct ProvisionError {
    pub target: TargetId,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// A file copy into a target failed
#[derive(Error, Debug)]
#[error("failed to copy {file} into {target}: {cause}")]
pub struct CopyError {
    pub target: TargetId,
    pub file: String,
    pub cause: String,
}

/// Errors from the backup round engine
#[derive(Error, Debug)]
pub enum BackupError {
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Copy(#[from] CopyError),

    #[error("log truncation failed at round {round}: {reason}")]
    Truncation { round: Round, reason: String },

    #[error(
        "verification mismatch at round {round}: {candidate} differs from {reference} at entry {index} (key {key:?})"
    )]
    VerificationMismatch {
        round: Round,
        reference: String,
        candidate: String,
        index: usize,
        key: String,
    },

    #[error("target bookkeeping error: {0}")]
    Targets(#[from] TargetSetError),

    #[error("storage session error: {0}")]
    Session(#[from] SessionError),

    #[error("catalog error: {0}")]
    Catalog(anyhow::Error),

    #[error("round {round}: illegal phase transition {from:?} -> {to:?}")]
    Phase {
        round: Round,
        from: RoundPhase,
        to: RoundPhase,
    },
}

impl BackupError {
    /// Whether the source log was left untruncated by this failure
    pub fn leaves_log_intact(&self) -> bool {
        matches!(self, BackupError::Copy(_) | BackupError::Provision(_))
    }
}

/// Result type for backup operations
pub type Result<T> = std::result::Result<T, BackupError>;
