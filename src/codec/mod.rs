//! The wire codec (component D): length-prefixed framing, the request and
//! response envelopes, and every request/response body the service
//! understands. Mirrors the `ReadType`/`WriteType` split the teacher crate
//! uses for its own Kafka-protocol codec, simplified to the single
//! unversioned frame shape this service's spec calls for (no tagged
//! fields, no per-API version negotiation).

pub mod api_key;
pub mod compression;
pub mod error_code;
pub mod frame;
pub mod header;
pub mod messages;
pub mod primitives;
pub mod record;
pub mod traits;

pub use api_key::ApiKey;
pub use error_code::ErrorCode;
pub use frame::{put_frame, try_parse_frame, FrameError};
pub use header::{RequestHeader, ResponseHeader};
pub use record::{Record, Records};
pub use traits::{ReadError, ReadType, WriteError, WriteType};
