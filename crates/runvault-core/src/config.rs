//! Runvault configuration.
//!
//! Configuration is YAML with camelCase keys. [`Config::load`] starts from
//! built-in defaults and overlays the user file group by group, so a file
//! that only sets `database:` keeps the default `log:` and frequency.
//!
//! `database.type` is validated eagerly: only the `firebase` backend is
//! supported, and any other value is a fatal [`RunvaultError::Configuration`]
//! raised before a run ever starts.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, RunvaultError};

/// The one supported store backend.
pub const SUPPORTED_BACKEND: &str = "firebase";

/// Remote store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Backend type; must equal [`SUPPORTED_BACKEND`].
    #[serde(rename = "type")]
    pub backend: String,

    /// Base URL of the store.
    pub url: String,

    /// Optional auth secret appended to write requests.
    #[serde(default)]
    pub secret: Option<String>,
}

/// Child-process log capture settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    /// File name of the combined stdout/stderr log, created inside the
    /// experiment's model directory.
    pub name: String,
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub database: DatabaseConfig,
    pub log: LogConfig,

    /// Interval, in minutes, between periodic workspace/model snapshots.
    pub save_workspace_frequency: u64,

    /// Root directory under which per-experiment model directories are
    /// created.
    pub experiments_dir: PathBuf,
}

/// Partial configuration as read from a user file. Each present group
/// replaces the corresponding default group wholesale.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConfigOverlay {
    database: Option<DatabaseConfig>,
    log: Option<LogConfig>,
    save_workspace_frequency: Option<u64>,
    experiments_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            database: DatabaseConfig {
                backend: SUPPORTED_BACKEND.to_string(),
                url: String::new(),
                secret: None,
            },
            log: LogConfig {
                name: "output.log".to_string(),
            },
            save_workspace_frequency: 5,
            experiments_dir: home.join(".runvault").join("experiments"),
        }
    }
}

impl Config {
    /// Load configuration: defaults, then the optional user file on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = path {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                RunvaultError::Configuration(format!(
                    "cannot read config file {}: {e}",
                    path.display()
                ))
            })?;
            let overlay: ConfigOverlay = serde_yaml::from_str(&raw).map_err(|e| {
                RunvaultError::Configuration(format!(
                    "invalid config file {}: {e}",
                    path.display()
                ))
            })?;
            config.apply(overlay);
        }
        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, overlay: ConfigOverlay) {
        if let Some(database) = overlay.database {
            self.database = database;
        }
        if let Some(log) = overlay.log {
            self.log = log;
        }
        if let Some(freq) = overlay.save_workspace_frequency {
            self.save_workspace_frequency = freq;
        }
        if let Some(dir) = overlay.experiments_dir {
            self.experiments_dir = dir;
        }
    }

    /// Validate the loaded configuration. Fails before any run work starts.
    pub fn validate(&self) -> Result<()> {
        if !self.database.backend.eq_ignore_ascii_case(SUPPORTED_BACKEND) {
            return Err(RunvaultError::Configuration(format!(
                "unsupported database type: {} (only {SUPPORTED_BACKEND} is supported)",
                self.database.backend
            )));
        }
        if self.database.url.is_empty() {
            return Err(RunvaultError::Configuration(
                "database.url must be set".to_string(),
            ));
        }
        if self.save_workspace_frequency == 0 {
            return Err(RunvaultError::Configuration(
                "saveWorkspaceFrequency must be at least 1 minute".to_string(),
            ));
        }
        Ok(())
    }
}
