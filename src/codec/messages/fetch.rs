//! `fetch` and its `fetch2` extension (an added per-partition `limit`).
//!
//! The response body only carries the header fields for each partition —
//! `error_code`, `high_water_mark`, and the byte length of the matching log
//! range. The log bytes themselves are never embedded in this struct: the
//! connection handler (`crate::server::connection`) streams them
//! immediately afterwards as a scatter/gather file-range transfer, per
//! spec §4.3.

use std::io::{Read, Write};

use crate::codec::api_key::ApiKey;
use crate::codec::primitives::{read_array, write_array};
use crate::codec::traits::{ReadError, ReadType, WriteError, WriteType};

use super::RequestBody;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequestPartition {
    pub partition: i32,
    pub fetch_offset: i64,
    pub max_bytes: i32,
}

impl<R: Read> ReadType<R> for FetchRequestPartition {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            partition: i32::read(reader)?,
            fetch_offset: i64::read(reader)?,
            max_bytes: i32::read(reader)?,
        })
    }
}

impl<W: Write> WriteType<W> for FetchRequestPartition {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.partition.write(writer)?;
        self.fetch_offset.write(writer)?;
        self.max_bytes.write(writer)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequestTopic {
    pub topic: String,
    pub partitions: Vec<FetchRequestPartition>,
}

impl<R: Read> ReadType<R> for FetchRequestTopic {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            topic: String::read(reader)?,
            partitions: read_array(reader)?,
        })
    }
}

impl<W: Write> WriteType<W> for FetchRequestTopic {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.topic.write(writer)?;
        write_array(writer, &self.partitions)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchRequest {
    pub topics: Vec<FetchRequestTopic>,
}

impl<R: Read> ReadType<R> for FetchRequest {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            topics: read_array(reader)?,
        })
    }
}

impl<W: Write> WriteType<W> for FetchRequest {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        write_array(writer, &self.topics)?;
        Ok(())
    }
}

impl<R: Read, W: Write> RequestBody<R, W> for FetchRequest {
    type ResponseBody = FetchResponse;

    const API_KEY: ApiKey = ApiKey::Fetch;
}

/// `fetch2`'s only addition over `fetch`: a per-partition record limit,
/// `-1` meaning "no limit".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetch2RequestPartition {
    pub partition: i32,
    pub fetch_offset: i64,
    pub max_bytes: i32,
    pub limit: i32,
}

impl<R: Read> ReadType<R> for Fetch2RequestPartition {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            partition: i32::read(reader)?,
            fetch_offset: i64::read(reader)?,
            max_bytes: i32::read(reader)?,
            limit: i32::read(reader)?,
        })
    }
}

impl<W: Write> WriteType<W> for Fetch2RequestPartition {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.partition.write(writer)?;
        self.fetch_offset.write(writer)?;
        self.max_bytes.write(writer)?;
        self.limit.write(writer)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetch2RequestTopic {
    pub topic: String,
    pub partitions: Vec<Fetch2RequestPartition>,
}

impl<R: Read> ReadType<R> for Fetch2RequestTopic {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            topic: String::read(reader)?,
            partitions: read_array(reader)?,
        })
    }
}

impl<W: Write> WriteType<W> for Fetch2RequestTopic {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.topic.write(writer)?;
        write_array(writer, &self.partitions)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fetch2Request {
    pub topics: Vec<Fetch2RequestTopic>,
}

impl<R: Read> ReadType<R> for Fetch2Request {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            topics: read_array(reader)?,
        })
    }
}

impl<W: Write> WriteType<W> for Fetch2Request {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        write_array(writer, &self.topics)?;
        Ok(())
    }
}

impl<R: Read, W: Write> RequestBody<R, W> for Fetch2Request {
    type ResponseBody = FetchResponse;

    const API_KEY: ApiKey = ApiKey::Fetch2;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponsePartition {
    pub partition: i32,
    pub error_code: i16,
    pub high_water_mark: i64,
    /// Byte length of the log range that follows this header as a
    /// scatter/gather transfer. Never `0` with a valid file-range
    /// descriptor attached: a `bytes == 0` descriptor is skipped entirely
    /// by the transport (spec §4.3), so an empty result simply carries
    /// `bytes_len == 0` and no following transfer.
    pub bytes_len: i32,
}

impl<R: Read> ReadType<R> for FetchResponsePartition {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            partition: i32::read(reader)?,
            error_code: i16::read(reader)?,
            high_water_mark: i64::read(reader)?,
            bytes_len: i32::read(reader)?,
        })
    }
}

impl<W: Write> WriteType<W> for FetchResponsePartition {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.partition.write(writer)?;
        self.error_code.write(writer)?;
        self.high_water_mark.write(writer)?;
        self.bytes_len.write(writer)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponseTopic {
    pub topic: String,
    pub partitions: Vec<FetchResponsePartition>,
}

impl<R: Read> ReadType<R> for FetchResponseTopic {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            topic: String::read(reader)?,
            partitions: read_array(reader)?,
        })
    }
}

impl<W: Write> WriteType<W> for FetchResponseTopic {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.topic.write(writer)?;
        write_array(writer, &self.partitions)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchResponse {
    pub topics: Vec<FetchResponseTopic>,
}

impl<R: Read> ReadType<R> for FetchResponse {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            topics: read_array(reader)?,
        })
    }
}

impl<W: Write> WriteType<W> for FetchResponse {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        write_array(writer, &self.topics)?;
        Ok(())
    }
}
