//! DelayQueueConfig - 調整可能な定数
//!
//! 既定値: poll 1 秒、index の保険 TTL 3 日、result buffer 1。

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::KeySpace;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayQueueConfig {
    /// Prefix of every bucket id (`<prefix>:<queue>:<due>`).
    pub key_prefix: String,

    /// Wait between scans that found nothing due.
    pub poll_interval_ms: u64,

    /// Safety-net TTL of the queue's index, re-armed on every new bucket.
    pub index_ttl_secs: u64,

    /// Capacity of the result channel handed to consumers.
    pub result_buffer: usize,
}

impl DelayQueueConfig {
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
    pub const DEFAULT_INDEX_TTL_SECS: u64 = 60 * 60 * 24 * 3;

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn index_ttl(&self) -> Duration {
        Duration::from_secs(self.index_ttl_secs)
    }

    pub fn key_space(&self) -> KeySpace {
        KeySpace::new(self.key_prefix.clone())
    }
}

impl Default for DelayQueueConfig {
    fn default() -> Self {
        Self {
            key_prefix: KeySpace::DEFAULT_PREFIX.to_string(),
            poll_interval_ms: Self::DEFAULT_POLL_INTERVAL_MS,
            index_ttl_secs: Self::DEFAULT_INDEX_TTL_SECS,
            result_buffer: 1,
        }
    }
}
