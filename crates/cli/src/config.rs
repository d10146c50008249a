// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration.
//!
//! Configuration is stored in `<state_dir>/config.toml`. Every field has a
//! default, so a missing file or a missing section is fine:
//!
//! ```toml
//! [remote]
//! url = "ws://127.0.0.1:7890"
//!
//! [sync]
//! max_rejections = 5
//!
//! [feed]
//! topics = ["members", "prayer_requests"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::env;
use crate::error::{Error, Result};

const CONFIG_FILE_NAME: &str = "config.toml";
const STATE_DIR_NAME: &str = "flock";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub sync: SyncPolicy,
    #[serde(default)]
    pub feed: FeedConfig,
}

/// Remote store connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// WebSocket URL of the remote store (`ws://` or `wss://`).
    pub url: String,
    /// Max time to wait for a mutation to be acknowledged (milliseconds).
    pub request_timeout_ms: u64,
    /// Interval between connectivity samples (milliseconds).
    pub probe_interval_ms: u64,
    /// Max time a connectivity sample may take (milliseconds).
    pub probe_timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            url: "ws://127.0.0.1:7890".to_string(),
            request_timeout_ms: 10_000,
            probe_interval_ms: 5_000,
            probe_timeout_ms: 2_000,
        }
    }
}

impl RemoteConfig {
    /// Validates that the URL is a WebSocket URL.
    pub fn validate_url(&self) -> Result<()> {
        if self.url.starts_with("ws://") || self.url.starts_with("wss://") {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "invalid remote url '{}': must be ws:// or wss://",
                self.url
            )))
        }
    }
}

/// Drain retry policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncPolicy {
    /// Permanent rejections before an item is dead-lettered. 0 = never.
    pub max_rejections: u32,
    /// Periodic drain interval in seconds. 0 = only on enqueue and reconnect.
    pub drain_interval_secs: u64,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        SyncPolicy {
            max_rejections: 5,
            drain_interval_secs: 0,
        }
    }
}

/// Change feed subscription settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Collections to subscribe to.
    pub topics: Vec<String>,
    /// Collection whose inserts raise a notice for privileged roles.
    pub prayer_topic: String,
    /// How long a notice stays visible (seconds).
    pub notice_ttl_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            topics: fk_core::change::default_topics(),
            prayer_topic: fk_core::change::PRAYER_TOPIC.to_string(),
            notice_ttl_secs: 8,
        }
    }
}

impl Config {
    /// Loads configuration from `<state_dir>/config.toml`.
    ///
    /// A missing file yields the defaults. `FLOCK_REMOTE_URL` overrides the
    /// remote URL.
    pub fn load(state_dir: &Path) -> Result<Self> {
        let config_path = state_dir.join(CONFIG_FILE_NAME);
        let mut config = match fs::read_to_string(&config_path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => return Err(Error::Config(format!("failed to read config: {}", e))),
        };

        if let Some(url) = env::remote_url() {
            config.remote.url = url;
        }
        config.remote.validate_url()?;

        Ok(config)
    }

    /// Saves configuration to `<state_dir>/config.toml`.
    pub fn save(&self, state_dir: &Path) -> Result<()> {
        fs::create_dir_all(state_dir)?;
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(state_dir.join(CONFIG_FILE_NAME), content)?;
        Ok(())
    }
}

/// Resolves the state directory.
///
/// Order: explicit flag, `FLOCK_STATE_DIR`, `$XDG_STATE_HOME/flock`,
/// `~/.local/state/flock`.
pub fn resolve_state_dir(flag: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = flag {
        return dir;
    }
    if let Some(dir) = env::state_dir() {
        return dir;
    }
    if let Some(dir) = env::xdg_state_home() {
        return dir.join(STATE_DIR_NAME);
    }
    dirs::home_dir()
        .map(|h| h.join(".local/state").join(STATE_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(".local/state").join(STATE_DIR_NAME))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
