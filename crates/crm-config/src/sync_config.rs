use crate::{ConfigError, ConfigErrorResult};

use std::time::Duration;

use serde::Deserialize;

// Sync constraints
pub const MIN_COOLDOWN_SECS: u64 = 0;
pub const MAX_COOLDOWN_SECS: u64 = 86_400;
pub const DEFAULT_COOLDOWN_SECS: u64 = 60;

pub const DEFAULT_NETWORK: &str = "portal";

/// Dedup behaviour of the sync coordinator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// An unchanged profile synced less than this many seconds ago is
    /// answered from the local stamp without a network call.
    pub cooldown_secs: u64,
    /// Identity network the profile is registered under.
    pub network: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            network: String::from(DEFAULT_NETWORK),
        }
    }
}

impl SyncConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn validate(&self) -> ConfigErrorResult<()> {
        if !(MIN_COOLDOWN_SECS..=MAX_COOLDOWN_SECS).contains(&self.cooldown_secs) {
            return Err(ConfigError::sync(format!(
                "sync.cooldown_secs must be {}-{}, got {}",
                MIN_COOLDOWN_SECS, MAX_COOLDOWN_SECS, self.cooldown_secs
            )));
        }

        if self.network.trim().is_empty() {
            return Err(ConfigError::sync("sync.network cannot be empty"));
        }

        Ok(())
    }
}
