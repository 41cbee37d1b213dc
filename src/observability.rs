//! Logging setup
//!
//! The library only emits `tracing` events. Embedders that do not install
//! their own subscriber can call [`init_tracing`] once at startup.

use crate::error::{DbError, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `info` or `rowdb=debug`
    pub level: String,
    /// JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".to_string(),
            json: false,
        }
    }
}

fn build_env_filter(level: &str) -> Result<EnvFilter> {
    if level.trim().is_empty() {
        return Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));
    }
    EnvFilter::try_new(level)
        .map_err(|e| DbError::InvalidConfig(format!("Invalid log filter '{}': {}", level, e)))
}

/// Install a global fmt subscriber.
///
/// Returns `Ok(false)` if a global subscriber was already installed.
pub fn init_tracing(config: &LogConfig) -> Result<bool> {
    let filter = build_env_filter(&config.level)?;
    let installed = if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .is_ok()
    };
    Ok(installed)
}
