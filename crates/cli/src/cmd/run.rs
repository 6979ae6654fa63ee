//! Run backup rounds end to end

use crate::util;
use anyhow::{Context, Result};
use backup::{layout, BackupError, RoundCoordinator, RunConfig, TargetId};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tracing::debug;

pub fn run(config: &RunConfig, show_progress: bool) -> Result<()> {
    let work_dir = &config.run.work_dir;

    // 1. Prepare the source engine, catalog and coordinator
    let coordinator = RoundCoordinator::from_config(config)
        .with_context(|| format!("Failed to prepare work directory {}", work_dir.display()))?;
    let run_id = coordinator.run_id();
    debug!(run_id = %run_id, work_dir = %work_dir.display(), "coordinator ready");

    println!("{}", "Backup Run".bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Run:           {}", run_id.to_string().yellow());
    println!("Work dir:      {}", work_dir.display().to_string().cyan());
    println!(
        "Rounds:        {} × {} keys",
        config.run.rounds, config.run.keys_per_round
    );
    println!();

    // 2. Progress over rounds
    let progress = if show_progress {
        let bar = ProgressBar::new(u64::from(config.run.rounds));
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{bar:30}] round {pos}/{len} {msg}")?
                .progress_chars("=> "),
        );
        bar
    } else {
        ProgressBar::hidden()
    };
    let tick = progress.clone();
    let mut coordinator = coordinator.on_round_complete(move |report| {
        let detail = match report.verified {
            Some(target) => format!("verified {}", target),
            None => "seeded baselines".to_string(),
        };
        tick.set_message(detail);
        tick.inc(1);
    });

    // 3. Run
    let result = coordinator.run();
    progress.finish_and_clear();

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            report_failure(&e);
            return Err(e).context("Backup run failed");
        }
    };

    // 4. Summary
    for report in &summary.rounds {
        let incremental = report
            .incremental
            .as_ref()
            .map(|i| format!("{} segments, {} archived", i.files.len(), i.truncated.len()))
            .unwrap_or_else(|| "-".to_string());
        let verified = match report.verified {
            Some(target) => format!("{} ✓", target).green().to_string(),
            None => "baseline".dimmed().to_string(),
        };
        println!(
            "  round {:>3}  lsn {:>8}  full {:>3} files  incr {:<28} {}",
            report.round,
            report.checkpoint_lsn,
            report.full.files.len(),
            incremental,
            verified
        );
    }
    println!();

    let rolling_size = util::calculate_dir_size(&layout::target_dir(work_dir, TargetId::ROLLING))?;
    println!(
        "{} {} keys in rolling target match the source",
        "✓".green(),
        summary.rolling_entries
    );
    println!("  Copied:      {}", util::format_size(summary.bytes_copied()));
    println!("  Truncated:   {} segments", summary.segments_truncated());
    println!("  Rolling:     {}", util::format_size(rolling_size));

    Ok(())
}

fn report_failure(error: &BackupError) {
    eprintln!("{} {}", "✗".red(), error.to_string().red());
    if error.leaves_log_intact() {
        eprintln!(
            "  {}",
            "Source log was not truncated; the failed round can be re-enumerated.".dimmed()
        );
    }
    eprintln!(
        "  {}",
        "Partial artifacts were left in place for inspection.".dimmed()
    );
}
