//! Backup target bookkeeping
//!
//! Pure in-memory record of every live backup target: when its baseline was
//! taken and which log segments it holds that the source has not yet been
//! allowed to truncate. No I/O happens here.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;
use wr_core::Round;

/// Role a target plays in the round schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    /// Seeded at round 0 and extended by every increment
    Rolling,
    /// Seeded at round 0 and extended until its own round, then verified
    Lagging,
    /// Full copy of one round's checkpoint, used as a comparison reference
    FullSnapshot,
}

/// Target identity: a round index plus a kind
///
/// Ordered by index first so that targets sort in round order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TargetId {
    pub index: u32,
    pub kind: TargetKind,
}

impl TargetId {
    /// The rolling target
    pub const ROLLING: TargetId = TargetId {
        index: 0,
        kind: TargetKind::Rolling,
    };

    pub fn lagging(round: Round) -> Self {
        Self {
            index: round.index(),
            kind: TargetKind::Lagging,
        }
    }

    pub fn full_snapshot(round: Round) -> Self {
        Self {
            index: round.index(),
            kind: TargetKind::FullSnapshot,
        }
    }

    /// Round index this target is named after
    pub fn round(&self) -> Round {
        Round(self.index)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TargetKind::Rolling => write!(f, "rolling"),
            TargetKind::Lagging => write!(f, "lagging.{}", self.index),
            TargetKind::FullSnapshot => write!(f, "full.{}", self.index),
        }
    }
}

/// A log segment as seen by one incremental pass
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SegmentRef {
    /// File name inside the engine home
    pub name: String,
    /// Round whose incremental pass enumerated it
    pub round: Round,
}

impl SegmentRef {
    pub fn new(name: impl Into<String>, round: Round) -> Self {
        Self {
            name: name.into(),
            round,
        }
    }
}

/// A live backup target
#[derive(Debug, Clone)]
pub struct BackupTarget {
    pub id: TargetId,
    /// Round at which the baseline full copy was taken
    pub created_round: Round,
    /// Segments delivered but not yet acknowledged by a truncation
    pub pending_segments: BTreeSet<String>,
}

impl BackupTarget {
    pub fn new(id: TargetId, created_round: Round) -> Self {
        Self {
            id,
            created_round,
            pending_segments: BTreeSet::new(),
        }
    }
}

/// Bookkeeping failures
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TargetSetError {
    #[error("target {0} is already registered")]
    Duplicate(TargetId),

    #[error("target {0} is not registered")]
    Unknown(TargetId),
}

/// Set of live backup targets
#[derive(Debug, Default)]
pub struct BackupTargetSet {
    targets: BTreeMap<TargetId, BackupTarget>,
}

impl BackupTargetSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target; ids are unique
    pub fn register(&mut self, target: BackupTarget) -> Result<(), TargetSetError> {
        if self.targets.contains_key(&target.id) {
            return Err(TargetSetError::Duplicate(target.id));
        }
        self.targets.insert(target.id, target);
        Ok(())
    }

    /// Drop a target from the set
    ///
    /// The caller must have verified the target's directory first.
    pub fn retire(&mut self, id: TargetId) -> Option<BackupTarget> {
        self.targets.remove(&id)
    }

    /// Live targets that must receive `segment`
    pub fn targets_needing(&self, segment: &SegmentRef) -> BTreeSet<TargetId> {
        self.targets
            .values()
            .filter(|t| t.created_round <= segment.round)
            .map(|t| t.id)
            .collect()
    }

    /// Live targets whose index is at least `round`, in `(index, kind)` order
    pub fn all_targets_from(&self, round: Round) -> Vec<&BackupTarget> {
        let start = TargetId {
            index: round.index(),
            kind: TargetKind::Rolling,
        };
        self.targets.range(start..).map(|(_, t)| t).collect()
    }

    /// Note that `segment` now has a durable copy in target `id`
    pub fn record_delivery(&mut self, id: TargetId, segment: &str) -> Result<(), TargetSetError> {
        let target = self.targets.get_mut(&id).ok_or(TargetSetError::Unknown(id))?;
        target.pending_segments.insert(segment.to_string());
        Ok(())
    }

    /// Targets that need `segment` but have not received it
    pub fn undelivered(&self, segment: &SegmentRef) -> Vec<TargetId> {
        self.targets_needing(segment)
            .into_iter()
            .filter(|id| {
                self.targets
                    .get(id)
                    .map_or(true, |t| !t.pending_segments.contains(&segment.name))
            })
            .collect()
    }

    /// Forget segments the source has archived
    pub fn acknowledge<S: AsRef<str>>(&mut self, segments: &[S]) {
        for target in self.targets.values_mut() {
            for segment in segments {
                target.pending_segments.remove(segment.as_ref());
            }
        }
    }

    pub fn get(&self, id: TargetId) -> Option<&BackupTarget> {
        self.targets.get(&id)
    }

    pub fn contains(&self, id: TargetId) -> bool {
        self.targets.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Live targets in id order
    pub fn iter(&self) -> impl Iterator<Item = &BackupTarget> {
        self.targets.values()
    }
}
