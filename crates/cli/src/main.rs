//! Walround CLI - walround command

use anyhow::Result;
use backup::RunConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;
mod util;

/// Walround - incremental backup rounds with cross-verification
#[derive(Parser)]
#[command(name = "walround")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Work directory (overrides run.work_dir)
    #[arg(short = 'C', long, global = true)]
    work_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run backup rounds and verify every target
    Run {
        /// Number of rounds, round 0 included (default: 5)
        #[arg(long)]
        rounds: Option<u32>,
        /// Keys written per round (default: 10000)
        #[arg(long)]
        keys: Option<u32>,
        /// BLAKE3-check every copied file
        #[arg(long)]
        verify_checksums: bool,
        /// Copy into targets one at a time
        #[arg(long)]
        sequential: bool,
        /// Hide the progress bar
        #[arg(long)]
        quiet: bool,
    },
    /// Print the logical contents of an engine or backup directory
    Dump {
        /// Directory to materialize
        dir: PathBuf,
        /// Maximum entries to print
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Compare the logical contents of two directories
    Compare {
        /// Reference directory
        reference: PathBuf,
        /// Candidate directory
        candidate: PathBuf,
    },
    /// Show the phase history of a run
    History {
        /// Run id (default: latest run)
        #[arg(long)]
        run: Option<String>,
    },
    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = RunConfig::load(cli.config.as_deref())?;
    if let Some(work_dir) = cli.work_dir {
        config.run.work_dir = work_dir;
    }
    util::init_logging(&config.log.level);

    match cli.command {
        Commands::Run { rounds, keys, verify_checksums, sequential, quiet } => {
            if let Some(rounds) = rounds {
                config.run.rounds = rounds;
            }
            if let Some(keys) = keys {
                config.run.keys_per_round = keys;
            }
            config.copy.verify_checksums |= verify_checksums;
            config.copy.parallel &= !sequential;
            config.validate()?;
            cmd::run::run(&config, !quiet)
        }
        Commands::Dump { dir, limit } => cmd::dump::run(&dir, limit),
        Commands::Compare { reference, candidate } => cmd::compare::run(&reference, &candidate),
        Commands::History { run } => cmd::history::run(&config, run.as_deref()),
        Commands::Config => cmd::config::run(&config),
    }
}
