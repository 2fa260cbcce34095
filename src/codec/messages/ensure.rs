//! `ensure`: idempotent topic creation. Calling it any number of times
//! yields the same on-disk state as calling it once (spec §8).

use std::io::{Read, Write};

use crate::codec::api_key::ApiKey;
use crate::codec::traits::{ReadError, ReadType, WriteError, WriteType};

use super::RequestBody;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsureRequest {
    pub topic: String,
    pub partitions: i32,
}

impl<R: Read> ReadType<R> for EnsureRequest {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            topic: String::read(reader)?,
            partitions: i32::read(reader)?,
        })
    }
}

impl<W: Write> WriteType<W> for EnsureRequest {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.topic.write(writer)?;
        self.partitions.write(writer)?;
        Ok(())
    }
}

impl<R: Read, W: Write> RequestBody<R, W> for EnsureRequest {
    type ResponseBody = EnsureResponse;

    const API_KEY: ApiKey = ApiKey::Ensure;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnsureResponse {
    pub error_code: i16,
}

impl<R: Read> ReadType<R> for EnsureResponse {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            error_code: i16::read(reader)?,
        })
    }
}

impl<W: Write> WriteType<W> for EnsureResponse {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.error_code.write(writer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn roundtrip_ensure_request() {
        let req = EnsureRequest {
            topic: "t".to_string(),
            partitions: 1,
        };
        let mut buf = Vec::new();
        req.write(&mut buf).unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(req, EnsureRequest::read(&mut cursor).unwrap());
    }
}
