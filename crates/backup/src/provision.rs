//! Staging directory provisioning

use crate::error::ProvisionError;
use crate::layout;
use crate::targets::TargetId;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use wr_core::{DirectoryOps, LocalDirectoryOps};

/// A provisioned target directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryHandle {
    pub id: TargetId,
    pub path: PathBuf,
}

/// Creates and removes per-target directories under a work root
pub struct DirectoryProvisioner {
    root: PathBuf,
    ops: Arc<dyn DirectoryOps>,
}

impl DirectoryProvisioner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_ops(root, Arc::new(LocalDirectoryOps))
    }

    pub fn with_ops(root: impl Into<PathBuf>, ops: Arc<dyn DirectoryOps>) -> Self {
        Self {
            root: root.into(),
            ops,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Recreate the target's directory empty
    pub fn provision(&self, id: TargetId) -> Result<DirectoryHandle, ProvisionError> {
        let path = layout::target_dir(&self.root, id);
        self.ops.make_empty_dir(&path).map_err(|source| ProvisionError {
            target: id,
            path: path.clone(),
            source,
        })?;

        debug!(target_id = %id, path = %path.display(), "provisioned target directory");
        Ok(DirectoryHandle { id, path })
    }

    /// Handle for a directory that is already provisioned
    pub fn handle(&self, id: TargetId) -> DirectoryHandle {
        DirectoryHandle {
            id,
            path: layout::target_dir(&self.root, id),
        }
    }

    /// Best-effort recursive delete
    ///
    /// Returns whether the directory is gone. Failures are logged, never
    /// raised.
    pub fn reclaim(&self, id: TargetId) -> bool {
        let path = layout::target_dir(&self.root, id);
        match self.ops.remove_dir_recursive(&path) {
            Ok(()) => {
                debug!(target_id = %id, "reclaimed target directory");
                true
            }
            Err(e) => {
                warn!(target_id = %id, path = %path.display(), error = %e, "failed to reclaim target directory");
                false
            }
        }
    }
}
