//! Incremental backup: log segments since the last successful pass
//!
//! Ordering within one pass:
//! 1. open the `IncrementalLog` cursor and drain it into a fixed list
//! 2. copy each segment into every target that needs it
//! 3. check that every needing target has every segment
//! 4. truncate while the cursor is still held, then close it
//!
//! A copy failure skips steps 3 and 4. The segments stay on the source and
//! the next incremental cursor enumerates them again.

use crate::copy::{fan_out, CopyOptions, CopyReport};
use crate::error::{BackupError, Result};
use crate::provision::{DirectoryHandle, DirectoryProvisioner};
use crate::targets::{BackupTargetSet, SegmentRef};
use std::sync::Arc;
use tracing::{debug, info, warn};
use wr_core::{
    BackupCursor, CursorKind, FileTransport, LocalTransport, Round, StorageSession, TruncateScope,
};

/// Copies log increments and gates truncation on delivery
pub struct IncrementalBackupEngine {
    transport: Arc<dyn FileTransport>,
    options: CopyOptions,
}

impl Default for IncrementalBackupEngine {
    fn default() -> Self {
        Self::new(Arc::new(LocalTransport::default()), CopyOptions::default())
    }
}

impl IncrementalBackupEngine {
    pub fn new(transport: Arc<dyn FileTransport>, options: CopyOptions) -> Self {
        Self { transport, options }
    }

    /// Copy the round's increment into every live target, then truncate
    pub fn copy_increment<S>(
        &self,
        session: &mut S,
        round: Round,
        targets: &mut BackupTargetSet,
        dirs: &DirectoryProvisioner,
    ) -> Result<CopyReport>
    where
        S: StorageSession + ?Sized,
    {
        let mut cursor = session.open_cursor(CursorKind::IncrementalLog)?;
        let files: Vec<String> = cursor.by_ref().collect();

        match self.deliver_and_truncate(session, round, targets, dirs, &files) {
            Ok(mut report) => {
                session.close_cursor(cursor)?;
                report.files = files;
                info!(
                    round = %round,
                    segments = report.files.len(),
                    archived = report.truncated.len(),
                    bytes = report.bytes,
                    "incremental backup complete"
                );
                Ok(report)
            }
            Err(e) => {
                release(session, cursor);
                Err(e)
            }
        }
    }

    fn deliver_and_truncate<S>(
        &self,
        session: &mut S,
        round: Round,
        targets: &mut BackupTargetSet,
        dirs: &DirectoryProvisioner,
        files: &[String],
    ) -> Result<CopyReport>
    where
        S: StorageSession + ?Sized,
    {
        let home = session.home().to_path_buf();
        let segments: Vec<SegmentRef> = files.iter().map(|f| SegmentRef::new(f.as_str(), round)).collect();

        let mut report = CopyReport::default();
        for segment in &segments {
            let handles: Vec<DirectoryHandle> = targets
                .targets_needing(segment)
                .into_iter()
                .map(|id| dirs.handle(id))
                .collect();
            let refs: Vec<&DirectoryHandle> = handles.iter().collect();

            report.bytes += fan_out(self.transport.as_ref(), self.options, &home, &segment.name, &refs)?;
            report.copies += refs.len();

            for handle in &handles {
                targets.record_delivery(handle.id, &segment.name)?;
            }
            debug!(segment = %segment.name, targets = handles.len(), "copied log segment");
        }

        // Barrier: nothing is truncated until every consumer has its copy
        for segment in &segments {
            let missing = targets.undelivered(segment);
            if !missing.is_empty() {
                let names: Vec<String> = missing.iter().map(ToString::to_string).collect();
                return Err(truncation_error(
                    round,
                    format!("{} not delivered to {}", segment.name, names.join(", ")),
                ));
            }
        }

        let truncated = session
            .truncate(TruncateScope::Log)
            .map_err(|e| truncation_error(round, e))?;
        targets.acknowledge(&truncated.archived);
        if !truncated.retained.is_empty() {
            debug!(retained = truncated.retained.len(), "segments kept for live recovery");
        }
        report.truncated = truncated.archived;

        Ok(report)
    }
}

fn truncation_error(round: Round, reason: impl ToString) -> BackupError {
    BackupError::Truncation {
        round,
        reason: reason.to_string(),
    }
}

fn release<S: StorageSession + ?Sized>(session: &mut S, cursor: BackupCursor) {
    if let Err(e) = session.close_cursor(cursor) {
        warn!(error = %e, "failed to close incremental cursor after error");
    }
}
