//! Print the logical contents of a directory

use anyhow::{Context, Result};
use backup::VerificationOracle;
use owo_colors::OwoColorize;
use std::path::Path;
use tracing::debug;

pub fn run(dir: &Path, limit: Option<usize>) -> Result<()> {
    let oracle = VerificationOracle::new();
    let instance = oracle
        .materialize(dir)
        .with_context(|| format!("Failed to recover {}", dir.display()))?;
    let entries = oracle.dump_logical(&instance);
    debug!(dir = %dir.display(), entries = entries.len(), "materialized");

    let shown = limit.unwrap_or(entries.len()).min(entries.len());
    for (key, value) in &entries[..shown] {
        println!("{}\t{}", key, value);
    }

    if shown < entries.len() {
        println!(
            "{}",
            format!("... and {} more", entries.len() - shown).dimmed()
        );
    }
    eprintln!("{} entries in {}", entries.len(), dir.display());

    Ok(())
}
