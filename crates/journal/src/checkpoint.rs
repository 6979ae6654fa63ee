//! Checkpoint snapshot file
//!
//! A checkpoint writes the whole table to `table.snap` atomically. Recovery
//! loads the snapshot and replays only log records past `checkpoint_lsn`.
//!
//! File layout (little endian):
//! - magic: "WRS1" (4 bytes)
//! - checksum: u32 over the body
//! - body_len: u64
//! - body: bincode-encoded [`SnapshotBody`]

use crate::Result;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use wr_core::{atomic_write, checksum32, SessionError};

/// Name of the snapshot file inside an engine home
pub const SNAPSHOT_FILE: &str = "table.snap";

const SNAPSHOT_MAGIC: [u8; 4] = *b"WRS1";
const HEADER_LEN: usize = 16;

/// Contents of a checkpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotBody {
    /// Last log sequence number reflected in `entries`
    pub checkpoint_lsn: u64,
    /// First segment id not yet allocated when the checkpoint was taken
    pub next_segment_id: u64,
    /// Table contents, ordered by key
    pub entries: Vec<(String, String)>,
}

impl SnapshotBody {
    /// Serialize with header and checksum
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let body = bincode::serialize(self)?;
        let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
        bytes.extend_from_slice(&SNAPSHOT_MAGIC);
        bytes.extend_from_slice(&checksum32(&body).to_le_bytes());
        bytes.extend_from_slice(&(body.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    /// Parse a snapshot file's bytes
    pub fn deserialize(bytes: &[u8], path: &Path) -> Result<Self> {
        if bytes.len() < HEADER_LEN || bytes[..4] != SNAPSHOT_MAGIC {
            return Err(SessionError::corrupt(path, "bad snapshot header"));
        }

        let expected = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&bytes[8..16]);
        let end = usize::try_from(u64::from_le_bytes(len_bytes))
            .ok()
            .and_then(|len| HEADER_LEN.checked_add(len));

        let body = end
            .and_then(|end| bytes.get(HEADER_LEN..end))
            .ok_or_else(|| SessionError::corrupt(path, "truncated snapshot body"))?;
        if checksum32(body) != expected {
            return Err(SessionError::corrupt(path, "snapshot checksum mismatch"));
        }

        Ok(bincode::deserialize(body)?)
    }

    /// Atomically replace the snapshot in `home`
    pub fn write(&self, home: &Path) -> Result<()> {
        let bytes = self.serialize()?;
        atomic_write(home, &home.join(SNAPSHOT_FILE), &bytes)?;
        Ok(())
    }

    /// Load the snapshot from `home`, if one was ever written
    pub fn read(home: &Path) -> Result<Option<Self>> {
        let path = home.join(SNAPSHOT_FILE);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(Self::deserialize(&bytes, &path)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
