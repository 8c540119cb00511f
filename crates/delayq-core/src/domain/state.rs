//! State - consume ループの状態
//!
//! # 状態遷移
//! - Scanning -> Draining(bucket): due な bucket が見つかった
//! - Scanning -> Scanning: 見つからない（poll interval 待ち）
//! - Draining(bucket) -> Retiring(bucket): list が空 / key が消えている
//! - Retiring(bucket) -> Scanning
//! - 任意の状態 -> Stopped: cancel または store エラー

use super::BucketId;

/// Poll loop state.
///
/// `Stopped` is not a variant: the loop returns its terminal error instead,
/// so a stopped loop cannot be resumed by accident.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    /// Looking for the lowest-score bucket that is already due.
    Scanning,

    /// Popping payloads from one bucket until it is empty.
    Draining(BucketId),

    /// Removing an exhausted (or store-expired) bucket from the index.
    Retiring(BucketId),
}

impl PollState {
    pub fn bucket(&self) -> Option<&BucketId> {
        match self {
            PollState::Scanning => None,
            PollState::Draining(b) | PollState::Retiring(b) => Some(b),
        }
    }
}
