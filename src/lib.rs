//! Vonnegut: a chain-replicated, Kafka-wire-compatible append-only log
//! service.
//!
//! - [`codec`] — the wire framing and every request/response body.
//! - [`storage`] — segmented on-disk partition logs.
//! - [`chain`] — the chain map, the downstream client, and the
//!   produce/replicate supervisor that drives a batch down a chain.
//! - [`server`] — the accept loop and per-connection state machine.
//! - [`config`] — on-disk service configuration.

pub mod chain;
pub mod codec;
pub mod config;
pub mod server;
pub mod storage;
