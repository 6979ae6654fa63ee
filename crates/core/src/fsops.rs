//! File transport and directory operations
//!
//! The coordinator never touches the filesystem directly: copies go through
//! a [`FileTransport`] and staging directories through [`DirectoryOps`], so
//! tests can inject failures without spawning processes.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Copies one file verbatim
pub trait FileTransport: Send + Sync {
    /// Copy `src` to `dst`, returning the number of bytes written
    fn copy_file(&self, src: &Path, dst: &Path) -> io::Result<u64>;
}

/// Creates and removes staging directories
pub trait DirectoryOps: Send + Sync {
    /// Remove `path` if present and create it empty
    fn make_empty_dir(&self, path: &Path) -> io::Result<()>;

    /// Recursively delete `path`; a missing path is not an error
    fn remove_dir_recursive(&self, path: &Path) -> io::Result<()>;
}

/// Local filesystem copy
#[derive(Debug, Clone, Copy)]
pub struct LocalTransport {
    /// Fsync each destination before reporting success
    pub fsync: bool,
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self { fsync: true }
    }
}

impl FileTransport for LocalTransport {
    fn copy_file(&self, src: &Path, dst: &Path) -> io::Result<u64> {
        let bytes = fs::copy(src, dst)?;
        if self.fsync {
            File::open(dst)?.sync_all()?;
        }
        Ok(bytes)
    }
}

/// Local filesystem directory operations
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDirectoryOps;

impl DirectoryOps for LocalDirectoryOps {
    fn make_empty_dir(&self, path: &Path) -> io::Result<()> {
        self.remove_dir_recursive(path)?;
        fs::create_dir_all(path)
    }

    fn remove_dir_recursive(&self, path: &Path) -> io::Result<()> {
        match fs::remove_dir_all(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Atomic write helper
///
/// Writes data to a temporary file in `tmp_dir`, fsyncs it, renames it onto
/// `target`, then fsyncs the parent directory.
pub fn atomic_write(tmp_dir: &Path, target: &Path, data: &[u8]) -> io::Result<()> {
    let file_name = target
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "target has no file name"))?;

    let tmp_path = tmp_dir.join(format!(
        ".{}.{}.{}.tmp",
        file_name.to_string_lossy(),
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let mut file = OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&tmp_path)?;
    if let Err(e) = file.write_all(data).and_then(|_| file.sync_all()) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    drop(file);

    fs::rename(&tmp_path, target)?;
    sync_parent_dir(target)
}

/// Fsync the directory containing `path` (no-op where unsupported)
pub fn sync_parent_dir(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        if let Some(parent) = path.parent() {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            File::open(parent)?.sync_all()?;
        }
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
