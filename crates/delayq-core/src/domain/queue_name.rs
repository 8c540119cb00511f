use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::DelayQueueError;

/// Name of a delay queue.
///
/// The name doubles as the key of the queue's ordered index in the store, so
/// it must be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueName(String);

impl QueueName {
    pub fn new(s: impl Into<String>) -> Result<Self, DelayQueueError> {
        let s = s.into();
        if s.trim().is_empty() {
            return Err(DelayQueueError::InvalidArgument(
                "queue name must not be empty".to_string(),
            ));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key of the ordered index that tracks this queue's buckets.
    pub fn index_key(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<&str> for QueueName {
    type Error = DelayQueueError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
