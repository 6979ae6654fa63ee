//! Print the effective configuration

use anyhow::Result;
use backup::RunConfig;
use owo_colors::OwoColorize;

pub fn run(config: &RunConfig) -> Result<()> {
    config.validate()?;

    println!("{}", "# Effective configuration".dimmed());
    print!("{}", config.to_toml()?);

    println!();
    println!("{}", "# Valid ranges".dimmed());
    println!("{}", "#   run.rounds: >= 1".dimmed());
    println!("{}", "#   engine.log_file_max: >= 4096".dimmed());

    Ok(())
}
