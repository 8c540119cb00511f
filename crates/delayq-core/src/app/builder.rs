//! DelayQueueBuilder - store / clock / config のワイヤリング
//!
//! # Fail-fast 設計
//! - build() 時に config を検証し、不正なら BuildError を返す
//! - 実行中に poll interval 0 で busy loop する、といった事故を起動時に防ぐ

use std::sync::Arc;

use crate::ports::{Clock, OrderedStore, SystemClock};

use super::{DelayQueue, DelayQueueConfig};

/// BuildError は構築時のエラー
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("key_prefix must not be empty")]
    EmptyKeyPrefix,

    #[error("key_prefix must not contain ':' (got {0:?})")]
    InvalidKeyPrefix(String),

    #[error("poll_interval_ms must be greater than zero")]
    ZeroPollInterval,

    #[error("index_ttl_secs must be greater than zero")]
    ZeroIndexTtl,

    #[error("result_buffer must be greater than zero")]
    ZeroResultBuffer,
}

/// # 使用例
/// ```ignore
/// let queue = DelayQueueBuilder::new(RedisStore::connect(url).await?)
///     .config(config)
///     .build()?;
/// ```
pub struct DelayQueueBuilder<S> {
    store: Arc<S>,
    config: DelayQueueConfig,
    clock: Option<Arc<dyn Clock>>,
}

impl<S: OrderedStore + 'static> DelayQueueBuilder<S> {
    pub fn new(store: S) -> Self {
        Self::from_shared(Arc::new(store))
    }

    /// Share a store that other components also hold.
    pub fn from_shared(store: Arc<S>) -> Self {
        Self {
            store,
            config: DelayQueueConfig::default(),
            clock: None,
        }
    }

    pub fn config(mut self, config: DelayQueueConfig) -> Self {
        self.config = config;
        self
    }

    /// Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<DelayQueue<S>, BuildError> {
        validate(&self.config)?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        Ok(DelayQueue::new(self.store, clock, self.config))
    }
}

fn validate(config: &DelayQueueConfig) -> Result<(), BuildError> {
    if config.key_prefix.is_empty() {
        return Err(BuildError::EmptyKeyPrefix);
    }
    if config.key_prefix.contains(':') {
        return Err(BuildError::InvalidKeyPrefix(config.key_prefix.clone()));
    }
    if config.poll_interval_ms == 0 {
        return Err(BuildError::ZeroPollInterval);
    }
    if config.index_ttl_secs == 0 {
        return Err(BuildError::ZeroIndexTtl);
    }
    if config.result_buffer == 0 {
        return Err(BuildError::ZeroResultBuffer);
    }
    Ok(())
}
