//! Append-only run catalog using sled
//!
//! Every phase transition of a run is recorded as a [`RoundEvent`] keyed by a
//! monotonic sequence number, so a finished or aborted run can be inspected
//! afterwards with `walround history`.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sled::Db;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use ulid::Ulid;
use wr_core::Round;

/// One recorded step of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundEvent {
    pub run_id: Ulid,
    pub round: Round,
    /// Phase name (`checkpointed`, `verified`, `failed`, ...)
    pub phase: String,
    pub detail: String,
    pub ts_unix_ms: u64,
}

impl RoundEvent {
    pub fn new(run_id: Ulid, round: Round, phase: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            run_id,
            round,
            phase: phase.into(),
            detail: detail.into(),
            ts_unix_ms: now_unix_ms(),
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Run catalog
pub struct Catalog {
    db: Db,
    /// In-memory index: run id -> sequence numbers of its events
    index: RwLock<BTreeMap<Ulid, Vec<u64>>>,
    /// Run that wrote the most recent event
    latest: RwLock<Option<(u64, Ulid)>>,
    seq_counter: AtomicU64,
}

impl Catalog {
    /// Open or create a catalog in `path`
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::open(path.join("runs.db"))
            .with_context(|| format!("Failed to open run catalog at {}", path.display()))?;

        // Build in-memory index on startup
        let mut index: BTreeMap<Ulid, Vec<u64>> = BTreeMap::new();
        let mut latest = None;
        let mut max_seq = 0u64;

        for item in db.iter() {
            let (key, value) = item?;
            let seq = u64::from_be_bytes(key.as_ref().try_into()?);
            let event = RoundEvent::deserialize(&value)?;
            index.entry(event.run_id).or_default().push(seq);
            if seq >= max_seq {
                max_seq = seq;
                latest = Some((seq, event.run_id));
            }
        }

        Ok(Self {
            db,
            index: RwLock::new(index),
            latest: RwLock::new(latest),
            seq_counter: AtomicU64::new(max_seq + 1),
        })
    }

    /// Append an event and flush it
    pub fn append(&self, event: &RoundEvent) -> Result<u64> {
        let seq = self.seq_counter.fetch_add(1, Ordering::SeqCst);
        // Big-endian keys keep sled's iteration order equal to append order
        self.db.insert(seq.to_be_bytes(), event.serialize()?)?;

        self.index.write().entry(event.run_id).or_default().push(seq);
        *self.latest.write() = Some((seq, event.run_id));

        self.db.flush()?;
        Ok(seq)
    }

    /// Events of one run in append order
    pub fn events_for_run(&self, run_id: &Ulid) -> Result<Vec<RoundEvent>> {
        let seqs = match self.index.read().get(run_id) {
            Some(seqs) => seqs.clone(),
            None => return Ok(Vec::new()),
        };

        let mut events = Vec::with_capacity(seqs.len());
        for seq in seqs {
            if let Some(value) = self.db.get(seq.to_be_bytes())? {
                events.push(RoundEvent::deserialize(&value)?);
            }
        }
        Ok(events)
    }

    /// Run that recorded the most recent event
    pub fn latest_run(&self) -> Option<Ulid> {
        self.latest.read().map(|(_, run_id)| run_id)
    }

    /// Every run id, oldest first
    pub fn runs(&self) -> Vec<Ulid> {
        self.index.read().keys().copied().collect()
    }

    /// Total number of events
    pub fn count(&self) -> usize {
        self.db.len()
    }
}
