//! `topics`: enumerate every topic (and partition count) in the registry.
//! Accepted by every role (spec §4.2).

use std::io::{Read, Write};

use crate::codec::api_key::ApiKey;
use crate::codec::primitives::{read_array, write_array};
use crate::codec::traits::{ReadError, ReadType, WriteError, WriteType};

use super::RequestBody;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TopicsRequest;

impl<R: Read> ReadType<R> for TopicsRequest {
    fn read(_reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self)
    }
}

impl<W: Write> WriteType<W> for TopicsRequest {
    fn write(&self, _writer: &mut W) -> Result<(), WriteError> {
        Ok(())
    }
}

impl<R: Read, W: Write> RequestBody<R, W> for TopicsRequest {
    type ResponseBody = TopicsResponse;

    const API_KEY: ApiKey = ApiKey::Topics;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicsResponseEntry {
    pub topic: String,
    pub partitions: i32,
}

impl<R: Read> ReadType<R> for TopicsResponseEntry {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            topic: String::read(reader)?,
            partitions: i32::read(reader)?,
        })
    }
}

impl<W: Write> WriteType<W> for TopicsResponseEntry {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.topic.write(writer)?;
        self.partitions.write(writer)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TopicsResponse {
    pub topics: Vec<TopicsResponseEntry>,
}

impl<R: Read> ReadType<R> for TopicsResponse {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            topics: read_array(reader)?,
        })
    }
}

impl<W: Write> WriteType<W> for TopicsResponse {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        write_array(writer, &self.topics)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn roundtrip_topics_response() {
        let resp = TopicsResponse {
            topics: vec![TopicsResponseEntry {
                topic: "t".to_string(),
                partitions: 4,
            }],
        };
        let mut buf = Vec::new();
        resp.write(&mut buf).unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(resp, TopicsResponse::read(&mut cursor).unwrap());
    }
}
