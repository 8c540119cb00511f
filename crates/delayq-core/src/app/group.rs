use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::{DelayQueueError, QueueName};
use crate::ports::OrderedStore;

use super::Consumer;

/// Receives payloads delivered to a [`ConsumerGroup`] member.
#[async_trait]
pub trait PayloadHandler: Send + Sync {
    async fn handle(&self, payload: Vec<u8>);
}

/// N consume loops competing for the same queue.
///
/// Each payload goes to exactly one member: pop is destructive and atomic in
/// the store.
/// - `request_shutdown()` でグループ全体が止まる（親 token には影響しない）
/// - `shutdown_and_join()` で全メンバーの終了を待てる
pub struct ConsumerGroup {
    cancel: CancellationToken,
    joins: Vec<JoinHandle<Option<DelayQueueError>>>,
}

impl ConsumerGroup {
    /// Spawn `n` members. They stop when `parent` or the group is cancelled.
    pub fn spawn<S: OrderedStore + 'static>(
        n: usize,
        consumer: &Consumer<S>,
        queue: &QueueName,
        handler: Arc<dyn PayloadHandler>,
        parent: &CancellationToken,
    ) -> Self {
        let cancel = parent.child_token();

        let mut joins = Vec::with_capacity(n);
        for member in 0..n {
            let mut consumption = consumer.consume(cancel.clone(), queue.clone());
            let handler = Arc::clone(&handler);

            let join = tokio::spawn(async move {
                while let Some(payload) = consumption.recv().await {
                    handler.handle(payload).await;
                }
                let err = consumption.finish().await;
                debug!(member, error = ?err, "group member stopped");
                err
            });
            joins.push(join);
        }

        Self { cancel, joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    pub fn request_shutdown(&self) {
        self.cancel.cancel();
    }

    /// Shutdown and wait for all members.
    ///
    /// Returns the terminal errors other than cancellation (store failures,
    /// typically), one per failed member.
    pub async fn shutdown_and_join(self) -> Vec<DelayQueueError> {
        self.request_shutdown();

        let mut failures = Vec::new();
        for j in self.joins {
            match j.await {
                Ok(Some(err)) if !err.is_cancelled() => failures.push(err),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "group member task failed"),
            }
        }
        failures
    }
}
