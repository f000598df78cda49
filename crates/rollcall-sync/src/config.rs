//! Sync engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the synchronization engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Maximum attendance entries per bucket page.
    #[serde(default = "default_bucket_capacity")]
    pub bucket_capacity: usize,
    /// Attempts to clear the sync lock before giving up.
    #[serde(default = "default_lock_release_retries")]
    pub lock_release_retries: u32,
    /// Fixed delay between lock release attempts, in milliseconds.
    #[serde(default = "default_lock_release_delay_ms")]
    pub lock_release_delay_ms: u64,
}

fn default_bucket_capacity() -> usize {
    200
}

fn default_lock_release_retries() -> u32 {
    3
}

fn default_lock_release_delay_ms() -> u64 {
    500
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            bucket_capacity: default_bucket_capacity(),
            lock_release_retries: default_lock_release_retries(),
            lock_release_delay_ms: default_lock_release_delay_ms(),
        }
    }
}

impl SyncConfig {
    /// The delay between lock release attempts.
    #[must_use]
    pub fn lock_release_delay(&self) -> Duration {
        Duration::from_millis(self.lock_release_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.bucket_capacity, 200);
        assert_eq!(config.lock_release_retries, 3);
        assert_eq!(config.lock_release_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: SyncConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.bucket_capacity, SyncConfig::default().bucket_capacity);
    }

    #[test]
    fn test_partial_json_overrides() {
        let config: SyncConfig =
            serde_json::from_str(r#"{ "bucket_capacity": 3 }"#).unwrap();
        assert_eq!(config.bucket_capacity, 3);
        assert_eq!(config.lock_release_retries, 3);
    }
}
