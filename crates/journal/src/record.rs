//! Write-ahead log records and their on-disk framing
//!
//! Frame layout (little endian):
//! - payload_len: u32
//! - checksum: u32 (first four bytes of BLAKE3 over the payload)
//! - payload: bincode-encoded [`LogRecord`]

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use wr_core::{checksum32, SessionError};

/// Length of the frame header preceding each payload
pub const FRAME_HEADER_LEN: usize = 8;

/// One auto-committed insert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Log sequence number, contiguous across segments
    pub lsn: u64,
    pub key: String,
    pub value: String,
}

/// Result of decoding the next frame in a buffer
#[derive(Debug, PartialEq, Eq)]
pub enum FrameRead {
    /// A complete record and the number of bytes it occupied
    Record(LogRecord, usize),
    /// A partially written frame (only acceptable at the tail of the last segment)
    Torn,
    /// Buffer exhausted on a frame boundary
    End,
}

impl LogRecord {
    pub fn new(lsn: u64, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            lsn,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Encode the record as a framed byte vector
    pub fn encode_frame(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&checksum32(&payload).to_le_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }
}

/// Decode the frame at the start of `buf`
///
/// `path` only labels corruption errors.
pub fn decode_frame(buf: &[u8], path: &Path) -> Result<FrameRead> {
    if buf.is_empty() {
        return Ok(FrameRead::End);
    }
    if buf.len() < FRAME_HEADER_LEN {
        return Ok(FrameRead::Torn);
    }

    let len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    let expected = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let end = FRAME_HEADER_LEN + len;
    if buf.len() < end {
        return Ok(FrameRead::Torn);
    }

    let payload = &buf[FRAME_HEADER_LEN..end];
    if checksum32(payload) != expected {
        return Err(SessionError::corrupt(path, "log record checksum mismatch"));
    }

    let record: LogRecord = bincode::deserialize(payload)?;
    Ok(FrameRead::Record(record, end))
}
