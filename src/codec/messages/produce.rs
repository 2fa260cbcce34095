use std::io::{Read, Write};

use crate::codec::api_key::ApiKey;
use crate::codec::primitives::{read_array, write_array};
use crate::codec::record::Records;
use crate::codec::traits::{ReadError, ReadType, WriteError, WriteType};

use super::RequestBody;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceRequestPartition {
    pub partition: i32,
    pub records: Records,
}

impl<R: Read> ReadType<R> for ProduceRequestPartition {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            partition: i32::read(reader)?,
            records: Records::read(reader)?,
        })
    }
}

impl<W: Write> WriteType<W> for ProduceRequestPartition {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.partition.write(writer)?;
        self.records.write(writer)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceRequestTopic {
    pub topic: String,
    pub partitions: Vec<ProduceRequestPartition>,
}

impl<R: Read> ReadType<R> for ProduceRequestTopic {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            topic: String::read(reader)?,
            partitions: read_array(reader)?,
        })
    }
}

impl<W: Write> WriteType<W> for ProduceRequestTopic {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.topic.write(writer)?;
        write_array(writer, &self.partitions)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProduceRequest {
    pub topics: Vec<ProduceRequestTopic>,
}

impl<R: Read> ReadType<R> for ProduceRequest {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            topics: read_array(reader)?,
        })
    }
}

impl<W: Write> WriteType<W> for ProduceRequest {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        write_array(writer, &self.topics)?;
        Ok(())
    }
}

impl<R: Read, W: Write> RequestBody<R, W> for ProduceRequest {
    type ResponseBody = ProduceResponse;

    const API_KEY: ApiKey = ApiKey::Produce;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceResponsePartition {
    pub partition: i32,
    pub error_code: i16,
    /// The last assigned offset, or `-1` on any error (timeout, disallowed,
    /// unknown topic/partition).
    pub offset: i64,
}

impl<R: Read> ReadType<R> for ProduceResponsePartition {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            partition: i32::read(reader)?,
            error_code: i16::read(reader)?,
            offset: i64::read(reader)?,
        })
    }
}

impl<W: Write> WriteType<W> for ProduceResponsePartition {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.partition.write(writer)?;
        self.error_code.write(writer)?;
        self.offset.write(writer)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceResponseTopic {
    pub topic: String,
    pub partitions: Vec<ProduceResponsePartition>,
}

impl<R: Read> ReadType<R> for ProduceResponseTopic {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            topic: String::read(reader)?,
            partitions: read_array(reader)?,
        })
    }
}

impl<W: Write> WriteType<W> for ProduceResponseTopic {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.topic.write(writer)?;
        write_array(writer, &self.partitions)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProduceResponse {
    pub topics: Vec<ProduceResponseTopic>,
}

impl<R: Read> ReadType<R> for ProduceResponse {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            topics: read_array(reader)?,
        })
    }
}

impl<W: Write> WriteType<W> for ProduceResponse {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        write_array(writer, &self.topics)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::record::Record;
    use std::io::Cursor;

    #[test]
    fn roundtrip_produce_request() {
        let req = ProduceRequest {
            topics: vec![ProduceRequestTopic {
                topic: "t".to_string(),
                partitions: vec![ProduceRequestPartition {
                    partition: 0,
                    records: Records(vec![Record::new(0, b"hello".to_vec())]),
                }],
            }],
        };

        let mut buf = Vec::new();
        req.write(&mut buf).unwrap();
        let mut cursor = Cursor::new(buf);
        let got = ProduceRequest::read(&mut cursor).unwrap();
        assert_eq!(req, got);
    }

    #[test]
    fn roundtrip_produce_response() {
        let resp = ProduceResponse {
            topics: vec![ProduceResponseTopic {
                topic: "t".to_string(),
                partitions: vec![ProduceResponsePartition {
                    partition: 0,
                    error_code: 0,
                    offset: 41,
                }],
            }],
        };

        let mut buf = Vec::new();
        resp.write(&mut buf).unwrap();
        let mut cursor = Cursor::new(buf);
        let got = ProduceResponse::read(&mut cursor).unwrap();
        assert_eq!(resp, got);
    }
}
