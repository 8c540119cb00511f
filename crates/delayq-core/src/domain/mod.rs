//! Domain model (queue names, buckets, poll states, errors).

pub mod bucket;
pub mod errors;
pub mod queue_name;
pub mod state;

pub use self::bucket::{BucketId, DueAt, KeySpace};
pub use self::errors::{DelayQueueError, ErrorKind};
pub use self::queue_name::QueueName;
pub use self::state::PollState;
