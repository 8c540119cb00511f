//! Status - queue の観測用スナップショット

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DelayQueueError, QueueName};
use crate::ports::OrderedStore;

/// Bucket counts of one queue's index.
///
/// Buckets whose list already expired in the store still count until a
/// consume loop retires them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub buckets: usize,
    pub due_buckets: usize,
}

impl QueueStats {
    pub fn waiting_buckets(&self) -> usize {
        self.buckets.saturating_sub(self.due_buckets)
    }
}

pub(crate) async fn collect<S: OrderedStore>(
    store: &S,
    queue: &QueueName,
    now: DateTime<Utc>,
) -> Result<QueueStats, DelayQueueError> {
    let all = store
        .index_range_by_score(queue.index_key(), 0, i64::MAX, None)
        .await?;
    let due = store
        .index_range_by_score(queue.index_key(), 0, now.timestamp(), None)
        .await?;
    Ok(QueueStats {
        buckets: all.len(),
        due_buckets: due.len().min(all.len()),
    })
}
