//! Chain replication: the chain map (who is head/tail for which topics),
//! the client that forwards replicate traffic downstream, and the
//! supervisor that drives a produce through the chain.

pub mod client;
pub mod map;
pub mod supervisor;

pub use client::ChainClient;
pub use map::{Bound, ChainEntry, ChainMap, ChainMapSnapshot, Role};
pub use supervisor::{ProduceOutcome, Supervisor};
