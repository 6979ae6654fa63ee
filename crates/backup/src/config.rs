//! Run configuration
//!
//! Loaded from a TOML file (every key optional), validated, then overridden
//! by command-line flags.

use anyhow::{bail, Context, Result};
use journal::{EngineConfig, RetentionPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::copy::CopyOptions;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub run: RunSection,
    pub engine: EngineSection,
    pub copy: CopySection,
    pub log: LogSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSection {
    /// Rounds to run, round 0 included (default: 5)
    pub rounds: u32,
    /// Keys written by the workload each round (default: 10000)
    pub keys_per_round: u32,
    /// Work directory holding the source and every target
    pub work_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Segment size in bytes before the log switches files (default: 100 KiB)
    pub log_file_max: u64,
    pub sync_on_write: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopySection {
    /// Copy each file into all targets concurrently
    pub parallel: bool,
    /// BLAKE3 compare every copy against its source
    pub verify_checksums: bool,
    /// Fsync each copied file
    pub fsync: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            rounds: 5,
            keys_per_round: 10_000,
            work_dir: PathBuf::from("walround-work"),
        }
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            log_file_max: 100 * 1024,
            sync_on_write: false,
        }
    }
}

impl Default for CopySection {
    fn default() -> Self {
        Self {
            parallel: true,
            verify_checksums: false,
            fsync: true,
        }
    }
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

const MIN_LOG_FILE_MAX: u64 = 4096;

impl RunConfig {
    /// Load and validate a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: RunConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, otherwise defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.run.rounds < 1 {
            bail!("run.rounds must be at least 1");
        }
        if self.engine.log_file_max < MIN_LOG_FILE_MAX {
            bail!(
                "engine.log_file_max must be at least {} bytes (got {})",
                MIN_LOG_FILE_MAX,
                self.engine.log_file_max
            );
        }
        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            log_file_max: self.engine.log_file_max,
            sync_on_write: self.engine.sync_on_write,
            retention: RetentionPolicy::default(),
        }
    }

    pub fn copy_options(&self) -> CopyOptions {
        CopyOptions {
            parallel: self.copy.parallel,
            verify_checksums: self.copy.verify_checksums,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.run.rounds, 5);
        assert_eq!(config.run.keys_per_round, 10_000);
        assert_eq!(config.engine.log_file_max, 102_400);
        assert!(config.copy.parallel);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("walround.toml");
        std::fs::write(
            &path,
            "[run]\nrounds = 3\n\n[copy]\nverify_checksums = true\n",
        )
        .unwrap();

        let config = RunConfig::from_file(&path).unwrap();
        assert_eq!(config.run.rounds, 3);
        assert_eq!(config.run.keys_per_round, 10_000);
        assert!(config.copy.verify_checksums);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = RunConfig::default();
        config.run.rounds = 0;
        assert!(config.validate().is_err());

        let mut config = RunConfig::default();
        config.engine.log_file_max = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_output_parses_back() {
        let config = RunConfig::default();
        let text = config.to_toml().unwrap();
        let parsed: RunConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
