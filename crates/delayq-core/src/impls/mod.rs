//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryStore**: 開発・テスト用の OrderedStore
//! - **RedisStore**: 本番用の OrderedStore（feature = "redis"）

pub mod inmem_store;
#[cfg(feature = "redis")]
pub mod redis_store;

pub use self::inmem_store::InMemoryStore;
#[cfg(feature = "redis")]
pub use self::redis_store::RedisStore;
