//! `replicate`: the downstream half of chain replication (spec §4.2).
//! Accepted only by `middle` and `tail` roles.

use std::io::{Read, Write};

use crate::codec::record::Records;
use crate::codec::traits::{ReadError, ReadType, WriteError, WriteType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicateRequest {
    pub topic: String,
    pub partition: i32,
    pub expected_start_offset: i64,
    pub records: Records,
}

impl<R: Read> ReadType<R> for ReplicateRequest {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            topic: String::read(reader)?,
            partition: i32::read(reader)?,
            expected_start_offset: i64::read(reader)?,
            records: Records::read(reader)?,
        })
    }
}

impl<W: Write> WriteType<W> for ReplicateRequest {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.topic.write(writer)?;
        self.partition.write(writer)?;
        self.expected_start_offset.write(writer)?;
        self.records.write(writer)?;
        Ok(())
    }
}

/// `{partition, error_code, offset_of_last | -1}`, plus the write-repair
/// suffix records when `error_code == WRITE_REPAIR`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicateResponse {
    pub partition: i32,
    pub error_code: i16,
    pub offset: i64,
    pub repair_records: Records,
}

impl<R: Read> ReadType<R> for ReplicateResponse {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            partition: i32::read(reader)?,
            error_code: i16::read(reader)?,
            offset: i64::read(reader)?,
            repair_records: Records::read(reader)?,
        })
    }
}

impl<W: Write> WriteType<W> for ReplicateResponse {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.partition.write(writer)?;
        self.error_code.write(writer)?;
        self.offset.write(writer)?;
        self.repair_records.write(writer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::record::Record;
    use std::io::Cursor;

    #[test]
    fn roundtrip_replicate_request() {
        let req = ReplicateRequest {
            topic: "t".to_string(),
            partition: 0,
            expected_start_offset: 100,
            records: Records(vec![Record::new(100, b"x".to_vec())]),
        };
        let mut buf = Vec::new();
        req.write(&mut buf).unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(req, ReplicateRequest::read(&mut cursor).unwrap());
    }

    #[test]
    fn roundtrip_write_repair_response() {
        let resp = ReplicateResponse {
            partition: 0,
            error_code: crate::codec::error_code::ErrorCode::WriteRepair.code(),
            offset: -1,
            repair_records: Records(vec![Record::new(95, b"missing".to_vec())]),
        };
        let mut buf = Vec::new();
        resp.write(&mut buf).unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(resp, ReplicateResponse::read(&mut cursor).unwrap());
    }
}
