use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Session cache configuration.
///
/// The cache memoizes the whole authentication handshake per credential set,
/// so repeated `client()` calls within the validity window reuse the same
/// bearer token instead of going back to the federation provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionCacheConfig {
    /// Serve cached sessions. When false every request performs a full
    /// handshake.
    #[serde(default)]
    pub enabled: bool,

    /// How long a cached session stays valid, in seconds.
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,

    /// Record successful handshakes even while `enabled` is false, so that
    /// turning the cache on later starts warm.
    #[serde(default)]
    pub record_when_disabled: bool,
}

impl Default for SessionCacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_secs: default_ttl(),
            record_when_disabled: false,
        }
    }
}

impl SessionCacheConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "cache.ttl_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Whether a successful handshake should be written to the cache.
    pub fn should_record(&self) -> bool {
        self.enabled || self.record_when_disabled
    }
}

fn default_ttl() -> u64 {
    1200 // 20 minutes
}
