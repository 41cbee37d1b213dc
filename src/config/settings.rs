//! Database Configuration
//!
//! Settings can come from environment variables (`ROWDB_*`), a TOML file, or
//! the defaults below.
//!
//! ```toml
//! config_path = "/etc/rowdb/tables.json"
//! data_path = "/var/lib/rowdb"
//!
//! [log]
//! level = "debug"
//! json = true
//! ```

use crate::error::{DbError, Result};
use crate::observability::LogConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "rowdb.json";

/// Settings for opening a [`crate::Database`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Registry document location
    pub config_path: PathBuf,
    /// Table directory; falls back to the registry document's, then `data/`
    /// next to it
    pub data_path: Option<PathBuf>,
    pub log: LogConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            data_path: None,
            log: LogConfig::default(),
        }
    }
}

impl DatabaseConfig {
    /// Config rooted in a directory: `<dir>/rowdb.json` and `<dir>/data`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        DatabaseConfig {
            config_path: dir.join(DEFAULT_CONFIG_PATH),
            data_path: Some(dir.join("data")),
            log: LogConfig::default(),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        DatabaseConfig {
            config_path: std::env::var("ROWDB_CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.config_path),
            data_path: std::env::var("ROWDB_DATA_PATH").ok().map(PathBuf::from),
            log: LogConfig {
                level: std::env::var("ROWDB_LOG_LEVEL").unwrap_or(defaults.log.level),
                json: std::env::var("ROWDB_LOG_JSON")
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(defaults.log.json),
            },
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| DbError::io(path, e))?;
        Self::from_toml_str(&text)
    }
}
