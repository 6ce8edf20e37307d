//! Client configuration.
//!
//! Reads/writes `~/.rental-bell/config.toml`.

use std::path::{Path, PathBuf};

use rental_notify::SyncConfig;
use serde::{Deserialize, Serialize};

/// Client configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API base URL (e.g. "http://localhost:8080/api").
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub server: String,

    /// Bearer token obtained from the web login.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,

    #[serde(default)]
    pub sync: SyncConfig,
}

impl ClientConfig {
    /// Default config file path: ~/.rental-bell/config.toml.
    pub fn default_path() -> PathBuf {
        dirs_path().join("config.toml")
    }

    /// Load config from disk, or return default if file doesn't exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&content)?;
        config.sync.validate()?;
        Ok(config)
    }

    /// Save config to disk.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        self.sync.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply command-line overrides (they win over the file).
    pub fn with_overrides(mut self, server: Option<String>, token: Option<String>) -> Self {
        if let Some(server) = server {
            self.server = server;
        }
        if let Some(token) = token {
            self.token = token;
        }
        self
    }
}

/// Return the bell config directory (~/.rental-bell).
fn dirs_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".rental-bell")
}
