//! RedisStore - 本番用の OrderedStore
//!
//! ordered index = sorted set、bucket = list。
//! すべての primitive は Redis 側で単独 atomic なコマンド 1 つに対応する。

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::{debug, info};

use crate::ports::{OrderedStore, StoreError};

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_io_error() || e.is_connection_dropped() {
            StoreError::Connection(e.to_string())
        } else {
            StoreError::Command {
                command: "redis",
                message: e.to_string(),
            }
        }
    }
}

fn command_error(command: &'static str) -> impl FnOnce(redis::RedisError) -> StoreError {
    move |e| match StoreError::from(e) {
        StoreError::Command { message, .. } => StoreError::Command { command, message },
        other => other,
    }
}

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        info!("Connecting to Redis at {}", redis_url);

        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::Connection(format!("invalid Redis URL: {e}")))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Connection(format!("failed to connect to Redis: {e}")))?;

        info!("Connected to Redis");
        Ok(Self { conn })
    }

    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl OrderedStore for RedisStore {
    async fn index_insert_if_absent(
        &self,
        index_key: &str,
        member: &str,
        score: i64,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let added: u64 = redis::cmd("ZADD")
            .arg(index_key)
            .arg("NX")
            .arg(score)
            .arg(member)
            .query_async(&mut conn)
            .await
            .map_err(command_error("ZADD"))?;
        debug!(index_key, member, score, added, "ZADD NX");
        Ok(added > 0)
    }

    async fn index_range_by_score(
        &self,
        index_key: &str,
        min: i64,
        max: i64,
        limit: Option<usize>,
    ) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("ZRANGEBYSCORE");
        cmd.arg(index_key).arg(min).arg(max);
        if let Some(limit) = limit {
            cmd.arg("LIMIT").arg(0).arg(limit);
        }
        cmd.query_async(&mut conn)
            .await
            .map_err(command_error("ZRANGEBYSCORE"))
    }

    async fn index_remove(&self, index_key: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("ZREM")
            .arg(index_key)
            .arg(member)
            .query_async::<()>(&mut conn)
            .await
            .map_err(command_error("ZREM"))
    }

    async fn list_append(&self, list_key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("RPUSH")
            .arg(list_key)
            .arg(value)
            .query_async::<()>(&mut conn)
            .await
            .map_err(command_error("RPUSH"))
    }

    async fn list_pop_front(&self, list_key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn.clone();
        // nil (空 list / 存在しない key) は None になる
        redis::cmd("LPOP")
            .arg(list_key)
            .query_async::<Option<Vec<u8>>>(&mut conn)
            .await
            .map_err(command_error("LPOP"))
    }

    async fn set_expiry(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs())
            .query_async::<()>(&mut conn)
            .await
            .map_err(command_error("EXPIRE"))
    }

    async fn delete_key(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<()>(&mut conn)
            .await
            .map_err(command_error("DEL"))
    }
}
