//! Ports - 抽象化レイヤー
//!
//! 外部ストアと時刻の trait を定義し、実装の詳細を隠蔽する。
//! Enqueuer / Consumer はこれらをコンストラクタで受け取る（グローバル状態は持たない）。

pub mod clock;
pub mod ordered_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::ordered_store::{OrderedStore, StoreError};
