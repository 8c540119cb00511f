//! Bucket - 同じ due-time を共有する payload の集まり
//!
//! ordered index の member が `BucketId`、score が `DueAt`（Unix 秒）。
//! bucket の list key は member と同じ文字列を使う。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::QueueName;

/// The Unix second at which a bucket becomes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DueAt(i64);

impl DueAt {
    pub fn from_unix(secs: i64) -> Self {
        Self(secs)
    }

    /// `now + delay_secs`, truncated to whole seconds and never below zero
    /// (the poller only scans scores in `[0, now]`).
    pub fn after(now: DateTime<Utc>, delay_secs: i64) -> Self {
        Self(now.timestamp().saturating_add(delay_secs).max(0))
    }

    pub fn unix(self) -> i64 {
        self.0
    }

    pub fn is_due(self, now: DateTime<Utc>) -> bool {
        self.0 <= now.timestamp()
    }
}

impl fmt::Display for DueAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Index member naming one bucket; also the key of the bucket's list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketId(String);

impl BucketId {
    /// Wrap a member read back from the index.
    pub fn from_member(member: impl Into<String>) -> Self {
        Self(member.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key of the list holding this bucket's payloads.
    pub fn list_key(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Derives bucket ids as `<prefix>:<queue>:<due>`.
///
/// The format must not change within a deployment: producers and consumers
/// restarted independently have to agree on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub const DEFAULT_PREFIX: &'static str = "dq";

    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn bucket_id(&self, queue: &QueueName, due_at: DueAt) -> BucketId {
        BucketId(format!("{}:{}:{}", self.prefix, queue, due_at))
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[test]
    fn bucket_id_uses_prefix_queue_and_due_second() {
        let keys = KeySpace::default();
        let queue = QueueName::new("delay_queue_name").unwrap();
        let id = keys.bucket_id(&queue, DueAt::from_unix(1645614542));
        assert_eq!(id.as_str(), "dq:delay_queue_name:1645614542");
        assert_eq!(id.list_key(), id.as_str());
    }

    #[test]
    fn same_queue_and_due_time_give_same_bucket() {
        let keys = KeySpace::new("jobs");
        let queue = QueueName::new("mail").unwrap();
        let a = keys.bucket_id(&queue, DueAt::from_unix(10));
        let b = keys.bucket_id(&queue, DueAt::from_unix(10));
        let c = keys.bucket_id(&queue, DueAt::from_unix(11));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[rstest]
    #[case::future(5, 1_700_000_005)]
    #[case::immediate(0, 1_700_000_000)]
    #[case::past(-1, 1_699_999_999)]
    fn due_at_adds_delay_to_now(#[case] delay: i64, #[case] expected: i64) {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(DueAt::after(now, delay).unix(), expected);
    }

    #[test]
    fn due_at_never_goes_below_zero() {
        let now = Utc.timestamp_opt(100, 0).unwrap();
        assert_eq!(DueAt::after(now, -1_000).unix(), 0);
    }

    #[test]
    fn due_at_truncates_sub_second_now() {
        let now = Utc.timestamp_opt(1_700_000_000, 999_000_000).unwrap();
        let due = DueAt::after(now, 1);
        assert_eq!(due.unix(), 1_700_000_001);
        assert!(!due.is_due(now));
        assert!(due.is_due(Utc.timestamp_opt(1_700_000_001, 0).unwrap()));
    }
}
