//! InMemoryStore - 開発・テスト用の OrderedStore
//!
//! # 学習ポイント
//! - tokio::sync::Mutex で状態を守る（ロック中に await しない）
//! - TTL はアクセス時に遅延評価する（Redis と同じく、期限切れ key は存在しない扱い）
//! - 空になった list は key ごと消える

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::ports::{Clock, OrderedStore, StoreError, SystemClock};

#[derive(Debug)]
enum Value {
    /// member -> score
    Index(HashMap<String, i64>),
    List(VecDeque<Vec<u8>>),
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Default)]
struct InMemoryState {
    entries: HashMap<String, Entry>,
}

impl InMemoryState {
    /// Drop `key` if its TTL has passed, then return it.
    fn live_mut(&mut self, key: &str, now: DateTime<Utc>) -> Option<&mut Entry> {
        if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }

    fn index_mut(
        &mut self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<&mut HashMap<String, i64>>, StoreError> {
        match self.live_mut(key, now) {
            None => Ok(None),
            Some(Entry {
                value: Value::Index(members),
                ..
            }) => Ok(Some(members)),
            Some(_) => Err(StoreError::WrongType {
                key: key.to_string(),
            }),
        }
    }

    fn list_mut(
        &mut self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<&mut VecDeque<Vec<u8>>>, StoreError> {
        match self.live_mut(key, now) {
            None => Ok(None),
            Some(Entry {
                value: Value::List(items),
                ..
            }) => Ok(Some(items)),
            Some(_) => Err(StoreError::WrongType {
                key: key.to_string(),
            }),
        }
    }
}

/// In-process store with Redis-like semantics.
///
/// Cloning shares the underlying state, so one instance can back several
/// producers and consumers in a test.
#[derive(Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<InMemoryState>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Evaluate TTLs against `clock` instead of the wall clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryState::default())),
            clock,
        }
    }

    /// Whether `key` currently exists (expired keys do not).
    pub async fn exists(&self, key: &str) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        state.live_mut(key, now).is_some()
    }

    /// Remaining time-to-live of `key`, if one is armed.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let expires_at = state.live_mut(key, now)?.expires_at?;
        (expires_at - now).to_std().ok()
    }

    /// Number of items in a list (0 when missing).
    pub async fn list_len(&self, key: &str) -> usize {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        match state.list_mut(key, now) {
            Ok(Some(items)) => items.len(),
            _ => 0,
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl OrderedStore for InMemoryStore {
    async fn index_insert_if_absent(
        &self,
        index_key: &str,
        member: &str,
        score: i64,
    ) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        if state.index_mut(index_key, now)?.is_none() {
            state
                .entries
                .insert(index_key.to_string(), Entry::new(Value::Index(HashMap::new())));
        }
        let Some(members) = state.index_mut(index_key, now)? else {
            return Ok(false);
        };
        if members.contains_key(member) {
            return Ok(false);
        }
        members.insert(member.to_string(), score);
        Ok(true)
    }

    async fn index_range_by_score(
        &self,
        index_key: &str,
        min: i64,
        max: i64,
        limit: Option<usize>,
    ) -> Result<Vec<String>, StoreError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let Some(members) = state.index_mut(index_key, now)? else {
            return Ok(Vec::new());
        };

        // score 昇順、同点は member の辞書順（Redis の sorted set と同じ）
        let mut hits: Vec<(i64, &String)> = members
            .iter()
            .filter(|(_, score)| (min..=max).contains(*score))
            .map(|(member, score)| (*score, member))
            .collect();
        hits.sort();

        let limit = limit.unwrap_or(usize::MAX);
        Ok(hits
            .into_iter()
            .take(limit)
            .map(|(_, member)| member.clone())
            .collect())
    }

    async fn index_remove(&self, index_key: &str, member: &str) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let now_empty = match state.index_mut(index_key, now)? {
            Some(members) => {
                members.remove(member);
                members.is_empty()
            }
            None => false,
        };
        if now_empty {
            state.entries.remove(index_key);
        }
        Ok(())
    }

    async fn list_append(&self, list_key: &str, value: &[u8]) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        match state.list_mut(list_key, now)? {
            Some(items) => items.push_back(value.to_vec()),
            None => {
                let items = VecDeque::from([value.to_vec()]);
                state
                    .entries
                    .insert(list_key.to_string(), Entry::new(Value::List(items)));
            }
        }
        Ok(())
    }

    async fn list_pop_front(&self, list_key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let (popped, now_empty) = match state.list_mut(list_key, now)? {
            Some(items) => {
                let popped = items.pop_front();
                (popped, items.is_empty())
            }
            None => (None, false),
        };
        if now_empty {
            state.entries.remove(list_key);
        }
        Ok(popped)
    }

    async fn set_expiry(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        if ttl.is_zero() {
            state.entries.remove(key);
            return Ok(());
        }
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| StoreError::Command {
            command: "EXPIRE",
            message: e.to_string(),
        })?;
        if let Some(entry) = state.live_mut(key, now) {
            entry.expires_at = Some(now + ttl);
        }
        Ok(())
    }

    async fn delete_key(&self, key: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use chrono::TimeZone;

    fn fixed_store() -> (InMemoryStore, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        (InMemoryStore::with_clock(clock.clone()), clock)
    }

    #[tokio::test]
    async fn insert_if_absent_reports_only_the_first_insert() {
        let store = InMemoryStore::new();
        assert!(store.index_insert_if_absent("q", "dq:q:1", 1).await.unwrap());
        assert!(!store.index_insert_if_absent("q", "dq:q:1", 1).await.unwrap());
        assert!(store.index_insert_if_absent("q", "dq:q:2", 2).await.unwrap());
    }

    #[tokio::test]
    async fn range_is_score_ordered_bounded_and_limited() {
        let store = InMemoryStore::new();
        store.index_insert_if_absent("q", "c", 30).await.unwrap();
        store.index_insert_if_absent("q", "a", 10).await.unwrap();
        store.index_insert_if_absent("q", "b", 20).await.unwrap();

        let all = store.index_range_by_score("q", 0, 100, None).await.unwrap();
        assert_eq!(all, vec!["a", "b", "c"]);

        let due = store.index_range_by_score("q", 0, 20, None).await.unwrap();
        assert_eq!(due, vec!["a", "b"]);

        let first = store.index_range_by_score("q", 0, 100, Some(1)).await.unwrap();
        assert_eq!(first, vec!["a"]);

        let missing = store.index_range_by_score("nope", 0, 100, None).await.unwrap();
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn list_is_fifo_and_vanishes_when_empty() {
        let store = InMemoryStore::new();
        store.list_append("l", b"a").await.unwrap();
        store.list_append("l", b"b").await.unwrap();

        assert_eq!(store.list_pop_front("l").await.unwrap(), Some(b"a".to_vec()));
        assert_eq!(store.list_pop_front("l").await.unwrap(), Some(b"b".to_vec()));
        assert!(!store.exists("l").await);
        assert_eq!(store.list_pop_front("l").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_keys_behave_as_missing() {
        let (store, clock) = fixed_store();
        store.list_append("l", b"a").await.unwrap();
        store.set_expiry("l", Duration::from_secs(3)).await.unwrap();
        assert_eq!(store.ttl("l").await, Some(Duration::from_secs(3)));

        clock.advance(Duration::from_secs(2));
        assert!(store.exists("l").await);

        clock.advance(Duration::from_secs(1));
        assert!(!store.exists("l").await);
        assert_eq!(store.list_pop_front("l").await.unwrap(), None);
    }

    #[tokio::test]
    async fn zero_ttl_deletes_and_missing_key_is_noop() {
        let store = InMemoryStore::new();
        store.list_append("l", b"a").await.unwrap();
        store.set_expiry("l", Duration::ZERO).await.unwrap();
        assert!(!store.exists("l").await);

        store.set_expiry("ghost", Duration::from_secs(5)).await.unwrap();
        assert!(!store.exists("ghost").await);
    }

    #[tokio::test]
    async fn removing_last_member_drops_the_index() {
        let store = InMemoryStore::new();
        store.index_insert_if_absent("q", "a", 1).await.unwrap();
        store.index_remove("q", "a").await.unwrap();
        assert!(!store.exists("q").await);
        store.index_remove("q", "a").await.unwrap();
    }

    #[tokio::test]
    async fn wrong_type_access_is_an_error() {
        let store = InMemoryStore::new();
        store.list_append("k", b"a").await.unwrap();
        let err = store.index_insert_if_absent("k", "m", 1).await.unwrap_err();
        assert_eq!(err, StoreError::WrongType { key: "k".to_string() });
    }
}
