//! OrderedStore port - ordered index / list / key expiry を持つ外部ストア
//!
//! delay queue の状態はすべてここにある（プロセス内には持たない）。
//! consume ループを作り直しても安全なのはそのため。
//!
//! # 実装
//! - **InMemoryStore**: 開発・テスト用（impls::inmem_store）
//! - **RedisStore**: 本番用（impls::redis_store, feature = "redis"）

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Failure talking to the backing store.
///
/// "Nothing to pop" is not an error; see [`OrderedStore::list_pop_front`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store connection failed: {0}")]
    Connection(String),

    #[error("store command {command} failed: {message}")]
    Command {
        command: &'static str,
        message: String,
    },

    #[error("operation against a key holding the wrong kind of value: {key}")]
    WrongType { key: String },
}

/// The primitives the delay queue needs from its store.
///
/// # 設計原則
/// - 各メソッドは単独で atomic（複数操作をまたぐトランザクションは仮定しない）
/// - index の score は Unix 秒
/// - 空になった list は消える（存在しない key と区別しない）
#[async_trait]
pub trait OrderedStore: Send + Sync {
    /// Add `member` with `score` unless it is already present.
    ///
    /// Returns `true` only when a new member was added.
    async fn index_insert_if_absent(
        &self,
        index_key: &str,
        member: &str,
        score: i64,
    ) -> Result<bool, StoreError>;

    /// Members with `min <= score <= max`, lowest score first.
    async fn index_range_by_score(
        &self,
        index_key: &str,
        min: i64,
        max: i64,
        limit: Option<usize>,
    ) -> Result<Vec<String>, StoreError>;

    async fn index_remove(&self, index_key: &str, member: &str) -> Result<(), StoreError>;

    async fn list_append(&self, list_key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Pop the head of a list. `Ok(None)` when the list is empty or gone.
    async fn list_pop_front(&self, list_key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Arm a time-to-live. A zero `ttl` deletes the key; a missing key is a no-op.
    async fn set_expiry(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn delete_key(&self, key: &str) -> Result<(), StoreError>;
}
