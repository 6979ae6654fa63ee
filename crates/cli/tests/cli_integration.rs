//! End-to-end tests for the walround binary

mod common;

use anyhow::Result;
use tempfile::TempDir;

#[test]
fn test_single_round_run() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let result = walround!(
        temp_dir.path(),
        "-C", "work", "run", "--rounds", "1", "--keys", "10", "--quiet"
    )
    .assert_success()?;

    assert!(result.contains_stdout("10 keys in rolling target match the source"));
    assert!(temp_dir.path().join("work/backup_incr.0/table.snap").exists());
    Ok(())
}

#[test]
fn test_multi_round_run_then_inspect() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let result = walround!(
        temp_dir.path(),
        "-C", "work", "run", "--rounds", "3", "--keys", "500", "--quiet", "--verify-checksums"
    )
    .assert_success()?;
    assert!(result.contains_stdout("lagging.1"));
    assert!(result.contains_stdout("lagging.2"));
    assert!(result.contains_stdout("1500 keys in rolling target match the source"));

    // Retired targets are reclaimed, the rolling one stays
    let work = temp_dir.path().join("work");
    assert!(work.join("backup_incr.0").exists());
    assert!(!work.join("backup_incr.1").exists());
    assert!(!work.join("backup_full.2").exists());

    walround!(&work, "compare", "source", "backup_incr.0").assert_success()?;

    let dump = walround!(&work, "dump", "backup_incr.0", "--limit", "3").assert_success()?;
    assert_eq!(dump.stdout.lines().filter(|l| l.contains('\t')).count(), 3);
    assert!(dump.contains_stdout("... and 1497 more"));
    assert!(dump.contains_stderr("1500 entries"));

    let history = walround!(temp_dir.path(), "-C", "work", "history").assert_success()?;
    assert!(history.contains_stdout("incremental_copied"));
    assert!(history.contains_stdout("finished"));
    Ok(())
}

#[test]
fn test_compare_reports_difference() -> Result<()> {
    let temp_dir = TempDir::new()?;

    walround!(temp_dir.path(), "-C", "a", "run", "--rounds", "1", "--keys", "10", "--quiet")
        .assert_success()?;
    walround!(temp_dir.path(), "-C", "b", "run", "--rounds", "1", "--keys", "12", "--quiet")
        .assert_success()?;

    let result = walround!(
        temp_dir.path(),
        "compare", "a/backup_incr.0", "b/backup_incr.0"
    )
    .assert_failure()?;

    assert!(result.contains_stdout("first difference"));
    Ok(())
}

#[test]
fn test_config_file_and_validation() -> Result<()> {
    let temp_dir = TempDir::new()?;
    std::fs::write(
        temp_dir.path().join("walround.toml"),
        "[run]\nrounds = 2\nkeys_per_round = 40\n\n[copy]\nparallel = false\n",
    )?;

    let result = walround!(temp_dir.path(), "--config", "walround.toml", "config").assert_success()?;
    assert!(result.contains_stdout("rounds = 2"));
    assert!(result.contains_stdout("parallel = false"));

    std::fs::write(temp_dir.path().join("bad.toml"), "[engine]\nlog_file_max = 16\n")?;
    let result = walround!(temp_dir.path(), "--config", "bad.toml", "config").assert_failure()?;
    assert!(result.contains_stderr("log_file_max"));
    Ok(())
}

#[test]
fn test_zero_rounds_rejected() -> Result<()> {
    let temp_dir = TempDir::new()?;

    walround!(temp_dir.path(), "-C", "work", "run", "--rounds", "0", "--quiet").assert_failure()?;
    assert!(!temp_dir.path().join("work/source").exists());
    Ok(())
}

#[test]
fn test_history_without_runs() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let result = walround!(temp_dir.path(), "-C", "empty", "history").assert_failure()?;
    assert!(result.contains_stderr("No run catalog"));
    Ok(())
}
