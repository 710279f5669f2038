//! Configuration for the knowledge store and retrieval index.
//!
//! A [`RetrieverConfig`] can be built in code with the `with_*` methods or
//! loaded from a TOML file. Every field has a default, so a config file only
//! needs to name the settings it changes:
//!
//! ```toml
//! base_dir = "/var/lib/knowledge"
//! refresh_interval_secs = 600
//! default_top_n = 5
//! ```

use crate::error::{KnowledgeError, Result};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default keyword cache lifetime, one hour.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 3600;

/// Default number of entries returned by a search.
pub const DEFAULT_TOP_N: usize = 3;

/// Default database file name inside `base_dir`.
pub const DEFAULT_DATABASE_FILE: &str = ".knowledge.db";

/// Settings for opening a store and building a retrieval index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// Directory holding the database file
    pub base_dir: PathBuf,
    /// Database file name, relative to `base_dir`
    pub database_file: String,
    /// Seconds a keyword cache stays fresh before the next gate check rebuilds it
    pub refresh_interval_secs: u64,
    /// Result count used when a caller does not pass one
    pub default_top_n: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            default_top_n: DEFAULT_TOP_N,
        }
    }
}

impl RetrieverConfig {
    /// Create a configuration rooted at `base_dir` with default settings.
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            ..Self::default()
        }
    }

    /// Load a configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| KnowledgeError::config(format!("failed to parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_base_dir(mut self, base_dir: PathBuf) -> Self {
        self.base_dir = base_dir;
        self
    }

    pub fn with_database_file(mut self, database_file: impl Into<String>) -> Self {
        self.database_file = database_file.into();
        self
    }

    pub fn with_refresh_interval_secs(mut self, secs: u64) -> Self {
        self.refresh_interval_secs = secs;
        self
    }

    pub fn with_default_top_n(mut self, top_n: usize) -> Self {
        self.default_top_n = top_n;
        self
    }

    /// Reject settings that cannot work at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.database_file.trim().is_empty() {
            return Err(KnowledgeError::config("database_file must not be empty"));
        }
        Ok(())
    }

    /// Full path to the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        self.base_dir.join(&self.database_file)
    }

    /// Refresh interval as a chrono duration, saturating on overflow.
    pub fn refresh_interval(&self) -> TimeDelta {
        i64::try_from(self.refresh_interval_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RetrieverConfig::default();
        assert_eq!(config.refresh_interval_secs, 3600);
        assert_eq!(config.default_top_n, 3);
        assert_eq!(config.database_path(), PathBuf::from("./.knowledge.db"));
        assert_eq!(config.refresh_interval(), TimeDelta::hours(1));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RetrieverConfig::from_toml_str("refresh_interval_secs = 60\n").unwrap();
        assert_eq!(config.refresh_interval_secs, 60);
        assert_eq!(config.default_top_n, DEFAULT_TOP_N);
        assert_eq!(config.database_file, DEFAULT_DATABASE_FILE);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = RetrieverConfig::from_toml_str("refresh_interval_secs = \"soon\"").unwrap_err();
        assert!(matches!(err, KnowledgeError::Config { .. }));

        let err = RetrieverConfig::from_toml_str("database_file = \"\"").unwrap_err();
        assert!(matches!(err, KnowledgeError::Config { .. }));
    }

    #[test]
    fn test_huge_interval_saturates() {
        let config = RetrieverConfig::default().with_refresh_interval_secs(u64::MAX);
        assert_eq!(config.refresh_interval(), TimeDelta::MAX);
    }

    #[test]
    fn test_from_toml_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("retriever.toml");
        std::fs::write(&path, "default_top_n = 7\ndatabase_file = \"kb.db\"\n")?;

        let config = RetrieverConfig::from_toml_file(&path)?.with_base_dir(dir.path().into());
        assert_eq!(config.default_top_n, 7);
        assert_eq!(config.database_path(), dir.path().join("kb.db"));
        Ok(())
    }
}
