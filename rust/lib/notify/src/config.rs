use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tuning for one notification session.
///
/// Deserializable from the `[sync]` table of a client config file; every
/// field has a default, so an empty table is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Items per page requested from the server.
    pub page_size: u32,

    /// Seconds between background unread-count refreshes. `0` disables
    /// polling.
    pub poll_interval_secs: u64,

    /// Per-request timeout for the HTTP gateway.
    pub request_timeout_secs: u64,

    /// Push bus topic that triggers invalidation.
    pub push_topic: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: 5,
            poll_interval_secs: 5,
            request_timeout_secs: 10,
            push_topic: "notification".to_string(),
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid {
                field: "page_size",
                reason: "must be greater than zero".into(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "request_timeout_secs",
                reason: "must be greater than zero".into(),
            });
        }
        if self.push_topic.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "push_topic",
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Polling period, or `None` when polling is disabled.
    pub fn poll_interval(&self) -> Option<Duration> {
        (self.poll_interval_secs > 0).then(|| Duration::from_secs(self.poll_interval_secs))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
