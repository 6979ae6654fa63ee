//! BLAKE3 digests for copy verification and record framing

use anyhow::{Context, Result};
use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;

/// BLAKE3 digest of a whole file
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct FileDigest([u8; 32]);

impl FileDigest {
    /// Leading 12 hex digits, enough to tell two copies apart in a message
    pub fn short(&self) -> String {
        self.0[..6].iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Debug for FileDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileDigest({})", self.short())
    }
}

/// First four bytes of the BLAKE3 hash, little endian.
///
/// Used as the per-frame checksum of log records and snapshot bodies.
pub fn checksum32(data: &[u8]) -> u32 {
    let hash = blake3::hash(data);
    let bytes = hash.as_bytes();
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Stream a file through BLAKE3
pub fn hash_file(path: &Path) -> Result<FileDigest> {
    let mut file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut file, &mut hasher).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(FileDigest(*hasher.finalize().as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_hash_file_streams_large_files() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let file_path = temp_dir.path().join("table.snap");

        let mut file = File::create(&file_path)?;
        let chunk = vec![0xAB; 64 * 1024];
        for _ in 0..3 {
            file.write_all(&chunk)?;
        }
        drop(file);

        let expected = blake3::hash(&vec![0xAB; 3 * 64 * 1024]);
        let digest = hash_file(&file_path)?;
        assert_eq!(digest.0, *expected.as_bytes());
        assert_eq!(digest.short().len(), 12);
        Ok(())
    }

    #[test]
    fn test_hash_file_sees_single_byte_change() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let a = temp_dir.path().join("log.0000000001");
        let b = temp_dir.path().join("log.0000000002");
        std::fs::write(&a, b"WRL1 frame")?;
        std::fs::write(&b, b"WRL1 frbme")?;

        assert_ne!(hash_file(&a)?, hash_file(&b)?);
        assert_eq!(hash_file(&a)?, hash_file(&a)?);
        Ok(())
    }

    #[test]
    fn test_checksum32_detects_change() {
        let a = checksum32(b"key.0.1=value.0.1");
        let b = checksum32(b"key.0.1=value.0.2");
        assert_ne!(a, b);
        assert_eq!(a, checksum32(b"key.0.1=value.0.1"));
    }

    #[test]
    fn test_hash_file_missing() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(hash_file(&temp_dir.path().join("absent")).is_err());
    }
}
