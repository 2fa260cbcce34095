//! The storage engine: segment file pairs (A), partition logs (B), and
//! the topic registry (C) built on top of them.

pub mod fd_cache;
pub mod partition;
pub mod registry;
pub mod segment;

use thiserror::Error;

pub use fd_cache::FdCache;
pub use partition::{FetchRange, PartitionLog, ReplicatedAppendOutcome};
pub use registry::TopicRegistry;
pub use segment::Segment;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown topic or partition: {topic}-{partition}")]
    UnknownTopicOrPartition { topic: String, partition: i32 },

    #[error(transparent)]
    Partition(#[from] partition::Error),
}
