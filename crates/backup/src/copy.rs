//! Fan-out of one enumerated file to many target directories

use crate::error::CopyError;
use crate::provision::DirectoryHandle;
use rayon::prelude::*;
use std::path::Path;
use wr_core::{hash_file, FileTransport};

/// How a copy pass moves files
#[derive(Debug, Clone, Copy)]
pub struct CopyOptions {
    /// Copy into all targets concurrently
    pub parallel: bool,
    /// Re-hash source and destination after each copy
    pub verify_checksums: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            verify_checksums: false,
        }
    }
}

/// Summary of one copy pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyReport {
    /// Files enumerated by the cursor, in order
    pub files: Vec<String>,
    /// Individual file copies performed
    pub copies: usize,
    /// Bytes written across all targets
    pub bytes: u64,
    /// Segments the source archived after the pass
    pub truncated: Vec<String>,
}

/// Copy `file` from `home` into every target, returning bytes written
pub(crate) fn fan_out(
    transport: &dyn FileTransport,
    options: CopyOptions,
    home: &Path,
    file: &str,
    targets: &[&DirectoryHandle],
) -> Result<u64, CopyError> {
    let src = home.join(file);
    let copy_one = |handle: &&DirectoryHandle| copy_into(transport, options, &src, file, handle);

    let written: Vec<u64> = if options.parallel && targets.len() > 1 {
        targets.par_iter().map(copy_one).collect::<Result<_, _>>()?
    } else {
        targets.iter().map(copy_one).collect::<Result<_, _>>()?
    };
    Ok(written.into_iter().sum())
}

fn copy_into(
    transport: &dyn FileTransport,
    options: CopyOptions,
    src: &Path,
    file: &str,
    handle: &DirectoryHandle,
) -> Result<u64, CopyError> {
    let fail = |cause: String| CopyError {
        target: handle.id,
        file: file.to_string(),
        cause,
    };

    let dst = handle.path.join(file);
    let bytes = transport
        .copy_file(src, &dst)
        .map_err(|e| fail(e.to_string()))?;

    if options.verify_checksums {
        let expected = hash_file(src).map_err(|e| fail(e.to_string()))?;
        let actual = hash_file(&dst).map_err(|e| fail(e.to_string()))?;
        if expected != actual {
            return Err(fail(format!(
                "checksum mismatch: expected {}, found {}",
                expected.short(),
                actual.short()
            )));
        }
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::targets::TargetId;
    use std::fs;
    use std::io;
    use tempfile::TempDir;
    use wr_core::{LocalTransport, Round};

    /// Writes a damaged copy without reporting an error
    struct FlippingTransport;

    impl FileTransport for FlippingTransport {
        fn copy_file(&self, src: &Path, dst: &Path) -> io::Result<u64> {
            let mut bytes = fs::read(src)?;
            if let Some(first) = bytes.first_mut() {
                *first ^= 0xff;
            }
            fs::write(dst, &bytes)?;
            Ok(bytes.len() as u64)
        }
    }

    fn setup(targets: u32) -> (TempDir, Vec<DirectoryHandle>) {
        let temp_dir = TempDir::new().unwrap();
        let home = temp_dir.path().join("source");
        fs::create_dir_all(&home).unwrap();
        fs::write(home.join("log.0000000001"), b"segment bytes").unwrap();

        let handles = (1..=targets)
            .map(|i| {
                let path = temp_dir.path().join(format!("backup_incr.{}", i));
                fs::create_dir_all(&path).unwrap();
                DirectoryHandle {
                    id: TargetId::lagging(Round(i)),
                    path,
                }
            })
            .collect();
        (temp_dir, handles)
    }

    #[test]
    fn test_fan_out_copies_to_every_target() {
        let (temp_dir, handles) = setup(4);
        let refs: Vec<&DirectoryHandle> = handles.iter().collect();
        let options = CopyOptions {
            parallel: true,
            verify_checksums: true,
        };

        let bytes = fan_out(
            &LocalTransport { fsync: false },
            options,
            &temp_dir.path().join("source"),
            "log.0000000001",
            &refs,
        )
        .unwrap();

        assert_eq!(bytes, 4 * "segment bytes".len() as u64);
        for handle in &handles {
            assert_eq!(fs::read(handle.path.join("log.0000000001")).unwrap(), b"segment bytes");
        }
    }

    #[test]
    fn test_checksum_mismatch_is_copy_error() {
        let (temp_dir, handles) = setup(1);
        let refs: Vec<&DirectoryHandle> = handles.iter().collect();
        let options = CopyOptions {
            parallel: false,
            verify_checksums: true,
        };

        let err = fan_out(
            &FlippingTransport,
            options,
            &temp_dir.path().join("source"),
            "log.0000000001",
            &refs,
        )
        .unwrap_err();

        assert_eq!(err.target, TargetId::lagging(Round(1)));
        assert!(err.cause.contains("checksum mismatch"), "{}", err.cause);
    }

    #[test]
    fn test_missing_source_file_names_file() {
        let (temp_dir, handles) = setup(2);
        let refs: Vec<&DirectoryHandle> = handles.iter().collect();

        let err = fan_out(
            &LocalTransport { fsync: false },
            CopyOptions::default(),
            &temp_dir.path().join("source"),
            "log.0000000009",
            &refs,
        )
        .unwrap_err();

        assert_eq!(err.file, "log.0000000009");
    }
}
