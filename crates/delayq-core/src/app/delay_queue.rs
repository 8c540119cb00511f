use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::domain::{DelayQueueError, QueueName};
use crate::ports::{Clock, OrderedStore};

use super::status::{self, QueueStats};
use super::{Consumer, ConsumerGroup, Consumption, DelayQueueConfig, Enqueuer, PayloadHandler};

/// Producer and consumer sides of the delay queue over one store.
///
/// Build it with [`DelayQueueBuilder`](super::DelayQueueBuilder).
pub struct DelayQueue<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: DelayQueueConfig,
    enqueuer: Enqueuer<S>,
    consumer: Consumer<S>,
}

impl<S: OrderedStore + 'static> DelayQueue<S> {
    pub(crate) fn new(store: Arc<S>, clock: Arc<dyn Clock>, config: DelayQueueConfig) -> Self {
        let enqueuer = Enqueuer::new(Arc::clone(&store), Arc::clone(&clock), &config);
        let consumer = Consumer::new(Arc::clone(&store), Arc::clone(&clock), &config);
        Self {
            store,
            clock,
            config,
            enqueuer,
            consumer,
        }
    }

    pub fn config(&self) -> &DelayQueueConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// See [`Enqueuer::enqueue`].
    pub async fn enqueue(
        &self,
        queue: &QueueName,
        payload: impl AsRef<[u8]>,
        delay_secs: i64,
        max_ttl_secs: i64,
    ) -> Result<(), DelayQueueError> {
        self.enqueuer
            .enqueue(queue, payload.as_ref(), delay_secs, max_ttl_secs)
            .await
    }

    /// See [`Consumer::consume`].
    pub fn consume(&self, cancel: CancellationToken, queue: &QueueName) -> Consumption {
        self.consumer.consume(cancel, queue.clone())
    }

    /// Spawn `n` competing consume loops feeding `handler`.
    pub fn consumer_group(
        &self,
        n: usize,
        queue: &QueueName,
        handler: Arc<dyn PayloadHandler>,
        cancel: &CancellationToken,
    ) -> ConsumerGroup {
        ConsumerGroup::spawn(n, &self.consumer, queue, handler, cancel)
    }

    pub async fn stats(&self, queue: &QueueName) -> Result<QueueStats, DelayQueueError> {
        status::collect(self.store.as_ref(), queue, self.clock.now()).await
    }

    /// Delete every bucket of `queue` and its index. Returns the number of
    /// buckets removed.
    ///
    /// Payloads enqueued concurrently may survive or be lost.
    pub async fn purge(&self, queue: &QueueName) -> Result<usize, DelayQueueError> {
        let buckets = self
            .store
            .index_range_by_score(queue.index_key(), 0, i64::MAX, None)
            .await?;
        for bucket in &buckets {
            self.store.delete_key(bucket).await?;
        }
        self.store.delete_key(queue.index_key()).await?;
        info!(%queue, buckets = buckets.len(), "queue purged");
        Ok(buckets.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::DelayQueueBuilder;
    use crate::app::test_support::fixed_clock;
    use crate::impls::InMemoryStore;
    use crate::ports::FixedClock;
    use std::time::Duration;

    fn queue_with_clock() -> (DelayQueue<InMemoryStore>, Arc<FixedClock>) {
        let clock = fixed_clock();
        let queue = DelayQueueBuilder::new(InMemoryStore::with_clock(clock.clone()))
            .clock(clock.clone())
            .config(DelayQueueConfig {
                poll_interval_ms: 10,
                ..DelayQueueConfig::default()
            })
            .build()
            .unwrap();
        (queue, clock)
    }

    #[tokio::test]
    async fn stats_split_due_and_waiting_buckets() {
        let (dq, clock) = queue_with_clock();
        let q = QueueName::new("stats").unwrap();

        dq.enqueue(&q, "a", 0, 100).await.unwrap();
        dq.enqueue(&q, "b", 0, 100).await.unwrap();
        dq.enqueue(&q, "c", 10, 100).await.unwrap();
        dq.enqueue(&q, "d", 20, 100).await.unwrap();

        let stats = dq.stats(&q).await.unwrap();
        assert_eq!(
            stats,
            QueueStats {
                buckets: 3,
                due_buckets: 1
            }
        );
        assert_eq!(stats.waiting_buckets(), 2);

        clock.advance(Duration::from_secs(10));
        assert_eq!(dq.stats(&q).await.unwrap().due_buckets, 2);
    }

    #[tokio::test]
    async fn purge_removes_buckets_and_index() {
        let (dq, clock) = queue_with_clock();
        let q = QueueName::new("purge").unwrap();
        let first_bucket = format!("dq:purge:{}", clock.now().timestamp() + 1);
        dq.enqueue(&q, "a", 1, 100).await.unwrap();
        dq.enqueue(&q, "b", 2, 100).await.unwrap();

        assert_eq!(dq.purge(&q).await.unwrap(), 2);
        assert_eq!(dq.stats(&q).await.unwrap(), QueueStats::default());
        assert!(!dq.store().exists(&first_bucket).await);
        assert_eq!(dq.purge(&q).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn queues_are_isolated() {
        let (dq, clock) = queue_with_clock();
        let mail = QueueName::new("mail").unwrap();
        let sms = QueueName::new("sms").unwrap();
        dq.enqueue(&mail, "m1", 0, 100).await.unwrap();
        dq.enqueue(&sms, "s1", 0, 100).await.unwrap();
        clock.advance(Duration::from_secs(1));

        let cancel = CancellationToken::new();
        let mut consumption = dq.consume(cancel.clone(), &sms);
        let got = tokio::time::timeout(Duration::from_secs(2), consumption.recv())
            .await
            .unwrap();
        assert_eq!(got.as_deref(), Some(&b"s1"[..]));
        cancel.cancel();
        assert!(consumption.finish().await.is_some_and(|e| e.is_cancelled()));

        assert_eq!(dq.stats(&mail).await.unwrap().buckets, 1);
    }
}
