//! Test helpers: a fixed start time and a fault-injecting store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::impls::InMemoryStore;
use crate::ports::{Clock, FixedClock, OrderedStore, StoreError};

pub(crate) fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

pub(crate) fn fixed_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(start_time()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum StoreOp {
    IndexInsert,
    IndexRange,
    IndexRemove,
    ListAppend,
    ListPop,
    SetExpiry,
    DeleteKey,
}

/// Wraps an [`InMemoryStore`] and fails selected operations until cleared.
pub(crate) struct FaultyStore {
    inner: InMemoryStore,
    failures: Mutex<HashMap<StoreOp, StoreError>>,
    calls: Mutex<Vec<StoreOp>>,
}

impl FaultyStore {
    pub(crate) fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: InMemoryStore::with_clock(clock),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn inner(&self) -> &InMemoryStore {
        &self.inner
    }

    pub(crate) fn fail(&self, op: StoreOp, err: StoreError) {
        self.failures.lock().unwrap().insert(op, err);
    }

    pub(crate) fn clear(&self, op: StoreOp) {
        self.failures.lock().unwrap().remove(&op);
    }

    pub(crate) fn calls(&self, op: StoreOp) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == op).count()
    }

    fn check(&self, op: StoreOp) -> Result<(), StoreError> {
        self.calls.lock().unwrap().push(op);
        match self.failures.lock().unwrap().get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl OrderedStore for FaultyStore {
    async fn index_insert_if_absent(
        &self,
        index_key: &str,
        member: &str,
        score: i64,
    ) -> Result<bool, StoreError> {
        self.check(StoreOp::IndexInsert)?;
        self.inner.index_insert_if_absent(index_key, member, score).await
    }

    async fn index_range_by_score(
        &self,
        index_key: &str,
        min: i64,
        max: i64,
        limit: Option<usize>,
    ) -> Result<Vec<String>, StoreError> {
        self.check(StoreOp::IndexRange)?;
        self.inner.index_range_by_score(index_key, min, max, limit).await
    }

    async fn index_remove(&self, index_key: &str, member: &str) -> Result<(), StoreError> {
        self.check(StoreOp::IndexRemove)?;
        self.inner.index_remove(index_key, member).await
    }

    async fn list_append(&self, list_key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.check(StoreOp::ListAppend)?;
        self.inner.list_append(list_key, value).await
    }

    async fn list_pop_front(&self, list_key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.check(StoreOp::ListPop)?;
        self.inner.list_pop_front(list_key).await
    }

    async fn set_expiry(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        self.check(StoreOp::SetExpiry)?;
        self.inner.set_expiry(key, ttl).await
    }

    async fn delete_key(&self, key: &str) -> Result<(), StoreError> {
        self.check(StoreOp::DeleteKey)?;
        self.inner.delete_key(key).await
    }
}
