//! TOML configuration file for the slotpool binary
//!
//! ```toml
//! [pool]
//! capacity = 8
//! acquire_timeout_ms = 30000
//!
//! [connect]
//! database = "slotpool.db"
//!
//! [retry]
//! initial_ms = 10
//! max_ms = 1000
//! max_attempts = 20
//! ```
//!
//! Command-line flags and environment variables override the file.

use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use slotpool_connection::PoolConfig;
use slotpool_core::ConnectParams;

use crate::retry::RetryConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub pool: PoolConfig,
    pub connect: ConnectParams,
    pub retry: RetryConfig,
}

impl FileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = FileConfig::parse("").unwrap();
        assert_eq!(config, FileConfig::default());
        assert_eq!(config.pool.capacity(), 8);
        assert!(config.connect.autocommit);
    }

    #[test]
    fn test_parse_full_file() {
        let config = FileConfig::parse(
            r#"
            [pool]
            capacity = 4
            acquire_timeout_ms = 2500

            [connect]
            database = "bench.db"

            [retry]
            initial_ms = 5
            max_ms = 200
            max_attempts = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.pool.capacity(), 4);
        assert_eq!(config.pool.acquire_timeout(), Duration::from_millis(2500));
        assert_eq!(config.connect.database.as_deref(), Some("bench.db"));
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn test_unknown_value_type_is_rejected() {
        assert!(FileConfig::parse("[pool]\ncapacity = \"many\"").is_err());
    }
}
