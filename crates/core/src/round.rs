//! Round numbering

use serde::{Deserialize, Serialize};

/// One iteration of workload-then-backup, counted from 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Round(pub u32);

impl Round {
    /// The round that seeds every baseline
    pub const ZERO: Round = Round(0);

    /// Index of this round
    pub fn index(self) -> u32 {
        self.0
    }

    /// The round after this one
    pub fn next(self) -> Round {
        Round(self.0 + 1)
    }

    /// Whether this is the seeding round
    pub fn is_initial(self) -> bool {
        self.0 == 0
    }

    /// Iterate rounds `0..count`
    pub fn range(count: u32) -> impl Iterator<Item = Round> {
        (0..count).map(Round)
    }
}

impl std::fmt::Display for Round {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Round {
    fn from(value: u32) -> Self {
        Round(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_ordering() {
        assert!(Round(1) < Round(2));
        assert_eq!(Round(3).next(), Round(4));
        assert!(Round::ZERO.is_initial());
        assert!(!Round(1).is_initial());
    }

    #[test]
    fn test_round_range() {
        let rounds: Vec<_> = Round::range(3).collect();
        assert_eq!(rounds, vec![Round(0), Round(1), Round(2)]);
        assert_eq!(Round::range(0).count(), 0);
    }
}
