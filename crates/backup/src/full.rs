//! Full backup: every file of a checkpointed snapshot
//!
//! One `Full` cursor pass serves all targets. The cursor is always closed
//! before returning, so a failed pass leaves the engine re-enumerable.

use crate::copy::{fan_out, CopyOptions, CopyReport};
use crate::error::Result;
use crate::provision::DirectoryHandle;
use std::sync::Arc;
use tracing::{debug, info, warn};
use wr_core::{CursorKind, FileTransport, LocalTransport, StorageSession};

/// Copies full snapshots into target directories
pub struct FullBackupEngine {
    transport: Arc<dyn FileTransport>,
    options: CopyOptions,
}

impl Default for FullBackupEngine {
    fn default() -> Self {
        Self::new(Arc::new(LocalTransport::default()), CopyOptions::default())
    }
}

impl FullBackupEngine {
    pub fn new(transport: Arc<dyn FileTransport>, options: CopyOptions) -> Self {
        Self { transport, options }
    }

    /// Copy every file of the current snapshot into each target
    pub fn copy_full_snapshot<S>(
        &self,
        session: &mut S,
        targets: &[DirectoryHandle],
    ) -> Result<CopyReport>
    where
        S: StorageSession + ?Sized,
    {
        let mut cursor = session.open_cursor(CursorKind::Full)?;
        let files: Vec<String> = cursor.by_ref().collect();
        let home = session.home().to_path_buf();
        let handles: Vec<&DirectoryHandle> = targets.iter().collect();

        let mut report = CopyReport::default();
        for file in &files {
            match fan_out(self.transport.as_ref(), self.options, &home, file, &handles) {
                Ok(bytes) => {
                    report.bytes += bytes;
                    report.copies += handles.len();
                }
                Err(e) => {
                    if let Err(close_err) = session.close_cursor(cursor) {
                        warn!(error = %close_err, "failed to close full cursor after copy error");
                    }
                    return Err(e.into());
                }
            }
            debug!(file = %file, targets = handles.len(), "copied snapshot file");
        }

        session.close_cursor(cursor)?;
        report.files = files;

        info!(
            files = report.files.len(),
            targets = targets.len(),
            bytes = report.bytes,
            "full backup complete"
        );
        Ok(report)
    }
}
