//! `Record` / `RecordBatch` framing, identical on the wire and on disk
//! (spec §3): each record is `offset:i64, length:i32, payload:bytes`, and a
//! batch is simply a contiguous sequence of such records.
//!
//! The storage engine treats `payload` as fully opaque; the compression
//! flag the spec mentions ("bits 0-2 of the attribute byte") is a
//! producer/consumer-side convention layered on top of the payload's first
//! byte and is never inspected by [`crate::storage`].

use std::io::{Read, Write};

use super::primitives::read_exact_vec;
use super::traits::{ReadError, ReadType, WriteError, WriteType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Absolute offset, assigned by the head at append time.
    pub offset: i64,
    pub payload: Vec<u8>,
}

impl Record {
    pub fn new(offset: i64, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            offset,
            payload: payload.into(),
        }
    }

    /// Number of bytes this record occupies once framed: 8 (offset) + 4
    /// (length) + payload.
    pub fn encoded_len(&self) -> usize {
        8 + 4 + self.payload.len()
    }
}

impl<R: Read> ReadType<R> for Record {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let offset = i64::read(reader)?;
        let len = i32::read(reader)?;
        if len < 0 {
            return Err(ReadError::Malformed(
                format!("negative record length: {len}").into(),
            ));
        }
        let payload = read_exact_vec(reader, len as usize)?;
        Ok(Self { offset, payload })
    }
}

impl<W: Write> WriteType<W> for Record {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.offset.write(writer)?;
        let len = i32::try_from(self.payload.len()).map_err(WriteError::Overflow)?;
        len.write(writer)?;
        writer.write_all(&self.payload)?;
        Ok(())
    }
}

/// An `i32`-byte-length-prefixed run of concatenated [`Record`]s, used
/// wherever the wire protocol embeds a record batch inside a request or
/// response (produce bodies, replicate bodies). Inline fetch responses
/// instead describe their record bytes via a file-range descriptor
/// streamed by [`crate::server::connection`] and never go through this
/// type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Records(pub Vec<Record>);

impl<R: Read> ReadType<R> for Records {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let byte_len = i32::read(reader)?;
        if byte_len < 0 {
            return Err(ReadError::Malformed(
                format!("negative records length: {byte_len}").into(),
            ));
        }
        let bytes = read_exact_vec(reader, byte_len as usize)?;
        let mut cursor = std::io::Cursor::new(bytes);
        let mut records = Vec::new();
        let total = cursor.get_ref().len() as u64;
        while cursor.position() < total {
            records.push(Record::read(&mut cursor)?);
        }
        Ok(Self(records))
    }
}

impl<W: Write> WriteType<W> for Records {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        let byte_len: usize = self.0.iter().map(Record::encoded_len).sum();
        let byte_len = i32::try_from(byte_len).map_err(WriteError::Overflow)?;
        byte_len.write(writer)?;
        for record in &self.0 {
            record.write(writer)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn roundtrip_single_record() {
        let record = Record::new(41, b"from each according to his ability".to_vec());
        let mut buf = Vec::new();
        record.write(&mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        let got = Record::read(&mut cursor).unwrap();
        assert_eq!(record, got);
    }

    #[test]
    fn roundtrip_record_batch() {
        let batch = Records(vec![
            Record::new(0, b"one".to_vec()),
            Record::new(1, b"two".to_vec()),
            Record::new(2, b"three".to_vec()),
        ]);

        let mut buf = Vec::new();
        batch.write(&mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        let got = Records::read(&mut cursor).unwrap();
        assert_eq!(batch, got);
    }

    #[test]
    fn empty_batch_roundtrips() {
        let batch = Records::default();
        let mut buf = Vec::new();
        batch.write(&mut buf).unwrap();
        assert_eq!(buf, vec![0, 0, 0, 0]);

        let mut cursor = Cursor::new(buf);
        let got = Records::read(&mut cursor).unwrap();
        assert_eq!(got.0.len(), 0);
    }
}
