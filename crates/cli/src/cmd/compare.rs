//! Compare two directories logically

use anyhow::{bail, Context, Result};
use backup::{Comparison, VerificationOracle};
use owo_colors::OwoColorize;
use std::path::Path;

pub fn run(reference: &Path, candidate: &Path) -> Result<()> {
    let oracle = VerificationOracle::new();
    let comparison = oracle
        .verify_pair(reference, candidate)
        .with_context(|| {
            format!(
                "Failed to materialize {} or {}",
                reference.display(),
                candidate.display()
            )
        })?;

    match comparison {
        Comparison::Equal => {
            println!(
                "{} {} and {} are logically equal",
                "✓".green(),
                reference.display(),
                candidate.display()
            );
            Ok(())
        }
        Comparison::Differs { index, key } => {
            println!(
                "{} first difference at entry {} (key {})",
                "✗".red(),
                index,
                key.yellow()
            );
            bail!(
                "{} differs from {}",
                candidate.display(),
                reference.display()
            )
        }
    }
}
