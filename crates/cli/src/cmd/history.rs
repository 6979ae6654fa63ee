//! Show the recorded phases of a run

use crate::util;
use anyhow::{Context, Result};
use backup::{layout, Catalog, RunConfig};
use owo_colors::OwoColorize;
use ulid::Ulid;

pub fn run(config: &RunConfig, run: Option<&str>) -> Result<()> {
    // 1. Open the catalog
    let catalog_dir = layout::catalog_dir(&config.run.work_dir);
    if !catalog_dir.exists() {
        anyhow::bail!(
            "No run catalog in {} (run 'walround run' first)",
            config.run.work_dir.display()
        );
    }
    let catalog = Catalog::open(&catalog_dir).context("Failed to open run catalog")?;

    // 2. Resolve the run
    let run_id = match run {
        Some(text) => Ulid::from_string(text).with_context(|| format!("Invalid run id: {}", text))?,
        None => match catalog.latest_run() {
            Some(id) => id,
            None => {
                println!("{}", "No runs recorded yet".dimmed());
                return Ok(());
            }
        },
    };

    let events = catalog.events_for_run(&run_id)?;
    if events.is_empty() {
        anyhow::bail!("Unknown run: {}", run_id);
    }

    // 3. Display
    println!("{} {}", "Run".bold(), run_id.to_string().yellow());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for event in &events {
        let phase = match event.phase.as_str() {
            "failed" => event.phase.red().to_string(),
            "verified" | "finished" => event.phase.green().to_string(),
            _ => event.phase.cyan().to_string(),
        };
        println!(
            "{}  round {:>3}  {:<28} {}",
            util::format_clock(event.ts_unix_ms).dimmed(),
            event.round,
            phase,
            event.detail
        );
    }
    println!();
    println!(
        "{} events ({} runs in catalog)",
        events.len(),
        catalog.runs().len()
    );

    Ok(())
}
