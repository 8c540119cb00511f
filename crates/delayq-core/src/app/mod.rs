//! App - アプリケーション層
//!
//! ports を組み合わせて delay queue を実装する。
//!
//! # 主要コンポーネント
//! - **DelayQueueBuilder**: store / clock / config のワイヤリングと検証
//! - **Enqueuer**: due-time bucket への投入
//! - **Consumer**: poll ループ（Scanning → Draining → Retiring）
//! - **ConsumerGroup**: 競合する複数ループの起動と停止
//! - **QueueStats**: index の観測

pub mod builder;
pub mod config;
pub mod consumer;
pub mod delay_queue;
pub mod enqueuer;
pub mod group;
pub mod status;

#[cfg(test)]
pub(crate) mod test_support;

pub use self::builder::{BuildError, DelayQueueBuilder};
pub use self::config::DelayQueueConfig;
pub use self::consumer::{Consumer, Consumption};
pub use self::delay_queue::DelayQueue;
pub use self::enqueuer::Enqueuer;
pub use self::group::{ConsumerGroup, PayloadHandler};
pub use self::status::QueueStats;
