//! Config commands.

use std::path::Path;

use anyhow::Result;

use crate::config::ClientConfig;

/// Properties to change with `bell config set`. `None` keeps the value.
#[derive(Debug, Default)]
pub struct Changes {
    pub server: Option<String>,
    pub token: Option<String>,
    pub page_size: Option<u32>,
    pub poll_interval: Option<u64>,
    pub timeout: Option<u64>,
}

impl Changes {
    fn apply(self, config: &mut ClientConfig) -> bool {
        let mut changed = false;
        if let Some(server) = self.server {
            config.server = server.trim_end_matches('/').to_string();
            changed = true;
        }
        if let Some(token) = self.token {
            config.token = token;
            changed = true;
        }
        if let Some(page_size) = self.page_size {
            config.sync.page_size = page_size;
            changed = true;
        }
        if let Some(secs) = self.poll_interval {
            config.sync.poll_interval_secs = secs;
            changed = true;
        }
        if let Some(secs) = self.timeout {
            config.sync.request_timeout_secs = secs;
            changed = true;
        }
        changed
    }
}

/// Print the configuration with the token masked.
pub fn show(config_path: &Path) -> Result<()> {
    print!("{}", describe(&ClientConfig::load(config_path)?)?);
    println!("# file: {}", config_path.display());
    Ok(())
}

fn describe(config: &ClientConfig) -> Result<String> {
    let mut shown = config.clone();
    if !shown.token.is_empty() {
        shown.token = "********".to_string();
    }
    Ok(toml::to_string_pretty(&shown)?)
}

pub fn set(config_path: &Path, changes: Changes) -> Result<()> {
    let mut config = ClientConfig::load(config_path)?;
    if !changes.apply(&mut config) {
        anyhow::bail!("Nothing to set. See `bell config set --help`.");
    }
    config.save(config_path)?;
    println!("Saved {}.", config_path.display());
    Ok(())
}
