//! Enqueuer - payload を due-time の bucket に積む
//!
//! # フロー
//! 1. due_at = now + delay_secs
//! 2. bucket id を (queue, due_at) から導出
//! 3. index に add-if-absent（score = due_at）
//! 4. bucket の list に append（常に）
//! 5. 新規 bucket なら bucket TTL = max_ttl + delay、index の保険 TTL も張り直す
//!
//! 3 と 4 の間で失敗すると空の bucket が index に残るが、
//! Consumer は空 bucket をそのまま retire するので補正はしない。

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::domain::{DelayQueueError, DueAt, KeySpace, QueueName};
use crate::ports::{Clock, OrderedStore};

use super::DelayQueueConfig;

pub struct Enqueuer<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    keys: KeySpace,
    index_ttl: Duration,
}

impl<S: OrderedStore> Enqueuer<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, config: &DelayQueueConfig) -> Self {
        Self {
            store,
            clock,
            keys: config.key_space(),
            index_ttl: config.index_ttl(),
        }
    }

    /// Make `payload` visible on `queue` after `delay_secs` seconds.
    ///
    /// `delay_secs <= 0` means due immediately. An unconsumed payload is
    /// dropped by the store `max_ttl_secs` seconds after it became due.
    /// Store failures are returned as-is.
    pub async fn enqueue(
        &self,
        queue: &QueueName,
        payload: &[u8],
        delay_secs: i64,
        max_ttl_secs: i64,
    ) -> Result<(), DelayQueueError> {
        if max_ttl_secs < 0 {
            return Err(DelayQueueError::InvalidArgument(format!(
                "max_ttl_secs must be >= 0, got {max_ttl_secs}"
            )));
        }

        let due_at = DueAt::after(self.clock.now(), delay_secs);
        let bucket = self.keys.bucket_id(queue, due_at);

        let created = self
            .store
            .index_insert_if_absent(queue.index_key(), bucket.as_str(), due_at.unix())
            .await?;
        self.store.list_append(bucket.list_key(), payload).await?;

        if created {
            let bucket_ttl = bucket_ttl(delay_secs, max_ttl_secs);
            self.store.set_expiry(bucket.list_key(), bucket_ttl).await?;
            self.store.set_expiry(queue.index_key(), self.index_ttl).await?;
            debug!(%queue, %bucket, %due_at, ttl_secs = bucket_ttl.as_secs(), "bucket registered");
        }

        debug!(%queue, %bucket, bytes = payload.len(), "payload enqueued");
        Ok(())
    }
}

/// `max_ttl + delay`, clamped at zero (a zero TTL expires the bucket at once).
fn bucket_ttl(delay_secs: i64, max_ttl_secs: i64) -> Duration {
    let secs = max_ttl_secs.saturating_add(delay_secs).max(0);
    Duration::from_secs(secs.unsigned_abs())
}
