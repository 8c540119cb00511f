//! Consumer - due な bucket を poll して payload を流す
//!
//! # フロー
//! 1. Scanning: index から score ∈ [0, now] の最小 bucket を 1 つ取る
//!    - 無ければ poll interval だけ待つ（cancel と競合）
//! 2. Draining: bucket の list を先頭から pop して result channel に送る
//! 3. Retiring: list が空 / 消えていたら index から外して key を消す
//! 4. cancel か store エラーで停止。エラーは error channel に 1 回だけ送る
//!
//! # cancel を見る場所
//! - poll interval の待ち
//! - result channel への送信待ち
//! - store 操作の直前
//!
//! result の受信側が drop されたら ResultReceiverDropped で止まる（idle 中も）

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::domain::{BucketId, DelayQueueError, ErrorKind, PollState, QueueName};
use crate::ports::{Clock, OrderedStore};

use super::DelayQueueConfig;

/// Starts consume loops against one store.
pub struct Consumer<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    result_buffer: usize,
}

impl<S: OrderedStore + 'static> Consumer<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, config: &DelayQueueConfig) -> Self {
        Self {
            store,
            clock,
            poll_interval: config.poll_interval(),
            result_buffer: config.result_buffer.max(1),
        }
    }

    /// Spawn one poll loop for `queue`.
    ///
    /// The loop runs until `cancel` fires or the store fails. Either way the
    /// terminal error is sent on `errors` and then both channels close.
    /// Must be called within a tokio runtime.
    pub fn consume(&self, cancel: CancellationToken, queue: QueueName) -> Consumption {
        let (result_tx, results) = mpsc::channel(self.result_buffer);
        let (error_tx, errors) = mpsc::channel(1);

        let span = info_span!("consume", queue = %queue);
        let poller = Poller {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            poll_interval: self.poll_interval,
            queue,
            cancel,
            results: result_tx,
        };

        let task = tokio::spawn(
            async move {
                info!("consume loop started");
                let err = poller.run().await;
                match err.kind() {
                    ErrorKind::Cancelled => info!("consume loop cancelled"),
                    _ => warn!(error = %err, "consume loop stopped"),
                }
                // sole sender, capacity 1: never waits
                let _ = error_tx.send(err).await;
                drop(poller);
            }
            .instrument(span),
        );

        Consumption {
            results,
            errors,
            task,
        }
    }
}

/// The two output streams of one consume loop.
///
/// `results` yields payloads in due-time order. `errors` yields at most one
/// terminal error. Both close once the loop has stopped.
#[derive(Debug)]
pub struct Consumption {
    pub results: mpsc::Receiver<Vec<u8>>,
    pub errors: mpsc::Receiver<DelayQueueError>,
    task: JoinHandle<()>,
}

impl Consumption {
    /// Next payload, or `None` once the loop has stopped.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.results.recv().await
    }

    /// Stop reading results and wait for the loop's terminal error.
    ///
    /// Dropping the result stream stops the loop, idle or blocked on
    /// delivery, with [`DelayQueueError::ResultReceiverDropped`] unless it was
    /// already cancelled.
    pub async fn finish(self) -> Option<DelayQueueError> {
        let Consumption {
            results,
            mut errors,
            task,
        } = self;
        drop(results);
        let err = errors.recv().await;
        if let Err(e) = task.await {
            warn!(error = %e, "consume task did not complete cleanly");
        }
        err
    }
}

struct Poller<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    queue: QueueName,
    cancel: CancellationToken,
    results: mpsc::Sender<Vec<u8>>,
}

impl<S: OrderedStore> Poller<S> {
    /// Drive the state machine until it stops; returns the terminal error.
    async fn run(&self) -> DelayQueueError {
        let mut state = PollState::Scanning;
        loop {
            let step = match state {
                PollState::Scanning => self.scan().await,
                PollState::Draining(bucket) => self.drain(bucket).await,
                PollState::Retiring(bucket) => self.retire(bucket).await,
            };
            match step {
                Ok(next) => state = next,
                Err(err) => return err,
            }
        }
    }

    async fn scan(&self) -> Result<PollState, DelayQueueError> {
        self.ensure_running()?;
        let now = self.clock.now().timestamp();
        let due = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(DelayQueueError::Cancelled),
            due = self.store.index_range_by_score(self.queue.index_key(), 0, now, Some(1)) => due?,
        };

        match due.into_iter().next() {
            Some(member) => {
                let bucket = BucketId::from_member(member);
                debug!(%bucket, "bucket due");
                Ok(PollState::Draining(bucket))
            }
            None => {
                self.wait().await?;
                Ok(PollState::Scanning)
            }
        }
    }

    async fn drain(&self, bucket: BucketId) -> Result<PollState, DelayQueueError> {
        self.ensure_running()?;
        // pop は破壊的: cancel と競合させない
        match self.store.list_pop_front(bucket.list_key()).await? {
            Some(payload) => {
                debug!(%bucket, bytes = payload.len(), "payload popped");
                self.emit(payload).await?;
                Ok(PollState::Draining(bucket))
            }
            None => Ok(PollState::Retiring(bucket)),
        }
    }

    async fn retire(&self, bucket: BucketId) -> Result<PollState, DelayQueueError> {
        self.ensure_running()?;
        self.store
            .index_remove(self.queue.index_key(), bucket.as_str())
            .await?;
        self.ensure_running()?;
        self.store.delete_key(bucket.list_key()).await?;
        debug!(%bucket, "bucket retired");
        Ok(PollState::Scanning)
    }

    async fn wait(&self) -> Result<(), DelayQueueError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(DelayQueueError::Cancelled),
            _ = self.results.closed() => Err(DelayQueueError::ResultReceiverDropped),
            _ = tokio::time::sleep(self.poll_interval) => Ok(()),
        }
    }

    /// Deliver one payload. A send that can complete right away wins over a
    /// concurrent cancel; a blocked send is interrupted by it.
    async fn emit(&self, payload: Vec<u8>) -> Result<(), DelayQueueError> {
        tokio::select! {
            biased;
            sent = self.results.send(payload) => {
                sent.map_err(|_| DelayQueueError::ResultReceiverDropped)
            }
            _ = self.cancel.cancelled() => Err(DelayQueueError::Cancelled),
        }
    }

    /// Checked before every store operation. Cancellation takes precedence
    /// over a dropped result receiver.
    fn ensure_running(&self) -> Result<(), DelayQueueError> {
        if self.cancel.is_cancelled() {
            Err(DelayQueueError::Cancelled)
        } else if self.results.is_closed() {
            Err(DelayQueueError::ResultReceiverDropped)
        } else {
            Ok(())
        }
    }
}
