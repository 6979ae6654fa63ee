//! Logical verification of backup directories
//!
//! A directory is materialized by running the engine's own recovery over it
//! in read-only mode, so verifying the same directory twice gives the same
//! answer. Comparison is over the ordered key/value dump, never over bytes.

use crate::error::Result;
use journal::Engine;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A materialized, independent view of a directory's logical content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    dir: PathBuf,
    entries: Vec<(String, String)>,
}

impl Instance {
    /// Build from entries; they are sorted by key
    pub fn new(dir: impl Into<PathBuf>, mut entries: Vec<(String, String)>) -> Self {
        entries.sort();
        Self {
            dir: dir.into(),
            entries,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of comparing two logical dumps
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    /// First divergence: position in the dumps and the key involved
    Differs { index: usize, key: String },
}

impl Comparison {
    pub fn is_equal(&self) -> bool {
        matches!(self, Comparison::Equal)
    }
}

/// Materializes and compares backup directories
#[derive(Debug, Default, Clone, Copy)]
pub struct VerificationOracle;

impl VerificationOracle {
    pub fn new() -> Self {
        Self
    }

    /// Recover `dir` read-only with the reference engine
    pub fn materialize(&self, dir: &Path) -> Result<Instance> {
        let engine = Engine::open_read_only(dir)?;
        Ok(Instance::new(dir, engine.dump()))
    }

    /// Every key/value pair, ordered by key
    pub fn dump_logical(&self, instance: &Instance) -> Vec<(String, String)> {
        instance.entries.clone()
    }

    /// Find the first divergence between two ordered dumps
    pub fn compare(&self, a: &[(String, String)], b: &[(String, String)]) -> Comparison {
        for (index, (left, right)) in a.iter().zip(b.iter()).enumerate() {
            if left == right {
                continue;
            }
            // Report the key that is missing from the other side
            let key = match left.0.cmp(&right.0) {
                Ordering::Greater => &right.0,
                _ => &left.0,
            };
            return Comparison::Differs {
                index,
                key: key.clone(),
            };
        }

        match a.len().cmp(&b.len()) {
            Ordering::Equal => Comparison::Equal,
            Ordering::Less => Comparison::Differs {
                index: a.len(),
                key: b[a.len()].0.clone(),
            },
            Ordering::Greater => Comparison::Differs {
                index: b.len(),
                key: a[b.len()].0.clone(),
            },
        }
    }

    /// Materialize both directories and compare them
    pub fn verify_pair(&self, reference: &Path, candidate: &Path) -> Result<Comparison> {
        let reference = self.materialize(reference)?;
        let candidate = self.materialize(candidate)?;
        let result = self.compare(&reference.entries, &candidate.entries);

        debug!(
            reference = %reference.dir.display(),
            candidate = %candidate.dir.display(),
            entries = reference.len(),
            equal = result.is_equal(),
            "verified pair"
        );
        Ok(result)
    }
}
