//! Work directory layout
//!
//! ```text
//! <work>/
//!   source/            live engine home
//!   backup_incr.<i>/   rolling (i = 0) and lagging targets
//!   backup_full.<i>/   full-snapshot targets
//!   catalog/           run catalog
//! ```

use crate::targets::{TargetId, TargetKind};
use std::path::{Path, PathBuf};

pub const SOURCE_DIR: &str = "source";
pub const CATALOG_DIR: &str = "catalog";

/// Directory name for a target
pub fn target_dir_name(id: TargetId) -> String {
    match id.kind {
        TargetKind::Rolling | TargetKind::Lagging => format!("backup_incr.{}", id.index),
        TargetKind::FullSnapshot => format!("backup_full.{}", id.index),
    }
}

/// Directory of a target under `root`
pub fn target_dir(root: &Path, id: TargetId) -> PathBuf {
    root.join(target_dir_name(id))
}

/// Live engine home under `root`
pub fn source_dir(root: &Path) -> PathBuf {
    root.join(SOURCE_DIR)
}

pub fn catalog_dir(root: &Path) -> PathBuf {
    root.join(CATALOG_DIR)
}

/// Parse a directory name back into a target id
pub fn parse_target_dir(name: &str) -> Option<TargetId> {
    let (prefix, index) = name.split_once('.')?;
    let index: u32 = index.parse().ok()?;
    let kind = match (prefix, index) {
        ("backup_incr", 0) => TargetKind::Rolling,
        ("backup_incr", _) => TargetKind::Lagging,
        ("backup_full", _) => TargetKind::FullSnapshot,
        _ => return None,
    };
    Some(TargetId { index, kind })
}
