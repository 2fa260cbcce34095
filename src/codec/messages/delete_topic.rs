//! `delete_topic` and its chain-internal counterpart
//! `replicate_delete_topic`, which a head/middle uses to push a deletion
//! down its chain once its own local delete has completed.

use std::io::{Read, Write};

use crate::codec::traits::{ReadError, ReadType, WriteError, WriteType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTopicRequest {
    pub topic: String,
}

impl<R: Read> ReadType<R> for DeleteTopicRequest {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            topic: String::read(reader)?,
        })
    }
}

impl<W: Write> WriteType<W> for DeleteTopicRequest {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.topic.write(writer)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteTopicResponse {
    pub error_code: i16,
}

impl<R: Read> ReadType<R> for DeleteTopicResponse {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            error_code: i16::read(reader)?,
        })
    }
}

impl<W: Write> WriteType<W> for DeleteTopicResponse {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.error_code.write(writer)?;
        Ok(())
    }
}

pub type ReplicateDeleteTopicRequest = DeleteTopicRequest;
pub type ReplicateDeleteTopicResponse = DeleteTopicResponse;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn roundtrip_delete_topic_request() {
        let req = DeleteTopicRequest {
            topic: "t".to_string(),
        };
        let mut buf = Vec::new();
        req.write(&mut buf).unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(req, DeleteTopicRequest::read(&mut cursor).unwrap());
    }
}
