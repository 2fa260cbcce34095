//! Typed request/response bodies for every opcode in §6 of the spec.

pub mod delete_topic;
pub mod ensure;
pub mod fetch;
pub mod metadata;
pub mod produce;
pub mod replicate;
pub mod topics;

use std::io::{Read, Write};

use super::api_key::ApiKey;
use super::traits::{ReadType, WriteType};

/// Ties a request body to its opcode and response type, mirroring the
/// `RequestBody` association the teacher's protocol layer uses to dispatch
/// encode/decode without a big match statement at every call site.
pub trait RequestBody<R, W>: WriteType<W> + Sized
where
    R: Read,
    W: Write,
{
    type ResponseBody: ReadType<R>;

    const API_KEY: ApiKey;
}
