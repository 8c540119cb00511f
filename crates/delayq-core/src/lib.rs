//! delayq-core
//!
//! Delay queue over an ordered-index store: payloads become visible at a
//! due second and are streamed to consumers by a polling loop.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（QueueName, BucketId, DueAt, PollState, errors）
//! - **ports**: 抽象化レイヤー（OrderedStore, Clock）
//! - **app**: アプリケーションロジック（builder, enqueuer, consumer, group, status）
//! - **impls**: 実装（InMemoryStore, RedisStore）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{
    BuildError, ConsumerGroup, Consumption, DelayQueue, DelayQueueBuilder, DelayQueueConfig,
    PayloadHandler, QueueStats,
};
pub use domain::{DelayQueueError, ErrorKind, QueueName};
pub use ports::{Clock, OrderedStore, StoreError, SystemClock};
pub use tokio_util::sync::CancellationToken;
