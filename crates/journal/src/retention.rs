//! Retention policy for log truncation
//!
//! Truncation archives the segments enumerated by the held incremental
//! cursor. A segment that still carries records newer than the last
//! checkpoint is needed by the live engine's own recovery, so it is kept and
//! enumerated again by the next incremental pass.

use crate::journal::SegmentInfo;

/// Retention policy configuration
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Keep segments holding records past the last checkpoint (default: true)
    pub retain_uncheckpointed: bool,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            retain_uncheckpointed: true,
        }
    }
}

/// Segments split into those to delete and those to keep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchivePlan {
    pub archive: Vec<u64>,
    pub retain: Vec<u64>,
}

impl RetentionPolicy {
    /// Decide the fate of each enumerated segment
    pub fn plan<'a>(
        &self,
        segments: impl IntoIterator<Item = &'a SegmentInfo>,
        checkpoint_lsn: u64,
    ) -> ArchivePlan {
        let mut plan = ArchivePlan::default();
        for segment in segments {
            let covered = segment.last_lsn.map_or(true, |lsn| lsn <= checkpoint_lsn);
            if covered || !self.retain_uncheckpointed {
                plan.archive.push(segment.id);
            } else {
                plan.retain.push(segment.id);
            }
        }
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(id: u64, first: Option<u64>, last: Option<u64>) -> SegmentInfo {
        SegmentInfo {
            id,
            first_lsn: first,
            last_lsn: last,
            bytes: 0,
        }
    }

    #[test]
    fn test_plan_keeps_uncheckpointed_segments() {
        let segments = vec![
            segment(1, Some(1), Some(10)),
            segment(2, Some(11), Some(20)),
            segment(3, Some(21), Some(25)),
            segment(4, None, None),
        ];

        let plan = RetentionPolicy::default().plan(&segments, 20);

        assert_eq!(plan.archive, vec![1, 2, 4]);
        assert_eq!(plan.retain, vec![3]);
    }

    #[test]
    fn test_plan_without_retention_archives_everything() {
        let segments = vec![segment(1, Some(1), Some(10)), segment(2, Some(11), Some(30))];
        let policy = RetentionPolicy {
            retain_uncheckpointed: false,
        };

        let plan = policy.plan(&segments, 5);
        assert_eq!(plan.archive, vec![1, 2]);
        assert!(plan.retain.is_empty());
    }
}
