//! Errors - エラー型と分類
//!
//! 呼び出し側は文字列比較ではなく `ErrorKind` で判定する。

use thiserror::Error;

use crate::ports::StoreError;

/// ErrorKind はエラーの運用分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Backing store failure (connectivity, command error). Never retried here.
    Store,
    /// Caller-initiated stop. Expected, terminal.
    Cancelled,
    /// Rejected before touching the store.
    InvalidArgument,
    /// The consumer stopped reading the result stream.
    Disconnected,
}

#[derive(Debug, Error)]
pub enum DelayQueueError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("consume loop cancelled")]
    Cancelled,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("result stream receiver dropped")]
    ResultReceiverDropped,
}

impl DelayQueueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DelayQueueError::Store(_) => ErrorKind::Store,
            DelayQueueError::Cancelled => ErrorKind::Cancelled,
            DelayQueueError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            DelayQueueError::ResultReceiverDropped => ErrorKind::Disconnected,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}
