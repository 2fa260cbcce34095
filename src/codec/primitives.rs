//! Primitive wire types for the request/response envelope.
//!
//! # References
//! - <https://kafka.apache.org/protocol#protocol_types> (the subset this
//!   service reuses: fixed-width big-endian integers, an INT16-prefixed
//!   string, and an INT32-prefixed array)

use std::io::{Read, Write};

use super::traits::{ReadError, ReadType, WriteError, WriteType};

impl<R: Read> ReadType<R> for bool {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let mut buf = [0u8; 1];
        reader.read_exact(&mut buf)?;
        Ok(buf[0] != 0)
    }
}

impl<W: Write> WriteType<W> for bool {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        writer.write_all(&[*self as u8])?;
        Ok(())
    }
}

impl<R: Read> ReadType<R> for i8 {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let mut buf = [0u8; 1];
        reader.read_exact(&mut buf)?;
        Ok(i8::from_be_bytes(buf))
    }
}

impl<W: Write> WriteType<W> for i8 {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        writer.write_all(&self.to_be_bytes())?;
        Ok(())
    }
}

impl<R: Read> ReadType<R> for i16 {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf)?;
        Ok(i16::from_be_bytes(buf))
    }
}

impl<W: Write> WriteType<W> for i16 {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        writer.write_all(&self.to_be_bytes())?;
        Ok(())
    }
}

impl<R: Read> ReadType<R> for i32 {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }
}

impl<W: Write> WriteType<W> for i32 {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        writer.write_all(&self.to_be_bytes())?;
        Ok(())
    }
}

impl<R: Read> ReadType<R> for i64 {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let mut buf = [0u8; 8];
        reader.read_exact(&mut buf)?;
        Ok(i64::from_be_bytes(buf))
    }
}

impl<W: Write> WriteType<W> for i64 {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        writer.write_all(&self.to_be_bytes())?;
        Ok(())
    }
}

/// A non-nullable string: an INT16 byte length followed by UTF-8 bytes.
impl<R: Read> ReadType<R> for String {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let len = i16::read(reader)?;
        if len < 0 {
            return Err(ReadError::Malformed(
                format!("negative string length: {len}").into(),
            ));
        }
        let mut buf = vec![0u8; len as usize];
        reader.read_exact(&mut buf)?;
        String::from_utf8(buf).map_err(|e| ReadError::Malformed(Box::new(e)))
    }
}

impl<W: Write> WriteType<W> for String {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        let len = i16::try_from(self.len()).map_err(WriteError::Overflow)?;
        len.write(writer)?;
        writer.write_all(self.as_bytes())?;
        Ok(())
    }
}

impl<W: Write> WriteType<W> for str {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        let len = i16::try_from(self.len()).map_err(WriteError::Overflow)?;
        len.write(writer)?;
        writer.write_all(self.as_bytes())?;
        Ok(())
    }
}

/// Reads a raw byte blob of exactly `len` bytes (used for record payloads,
/// which are framed by an explicit length rather than a generic wire type).
pub fn read_exact_vec<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>, ReadError> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// `Array: i32 count + count elements`, per the framing section of the spec.
pub fn read_array<R, T>(reader: &mut R) -> Result<Vec<T>, ReadError>
where
    R: Read,
    T: ReadType<R>,
{
    let len = i32::read(reader)?;
    if len < 0 {
        return Err(ReadError::Malformed(
            format!("negative array length: {len}").into(),
        ));
    }
    let len = len as usize;
    let mut out = Vec::with_capacity(len.min(1 << 20));
    for _ in 0..len {
        out.push(T::read(reader)?);
    }
    Ok(out)
}

pub fn write_array<W, T>(writer: &mut W, items: &[T]) -> Result<(), WriteError>
where
    W: Write,
    T: WriteType<W>,
{
    let len = i32::try_from(items.len()).map_err(WriteError::Overflow)?;
    len.write(writer)?;
    for item in items {
        item.write(writer)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn roundtrip_string() {
        let s = "from each according to his ability".to_string();
        let mut buf = Vec::new();
        s.write(&mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        let got = String::read(&mut cursor).unwrap();
        assert_eq!(s, got);
    }

    #[test]
    fn roundtrip_array_of_i32() {
        let items = vec![1i32, 2, 3, -4];
        let mut buf = Vec::new();
        write_array(&mut buf, &items).unwrap();

        let mut cursor = Cursor::new(buf);
        let got: Vec<i32> = read_array(&mut cursor).unwrap();
        assert_eq!(items, got);
    }

    #[test]
    fn negative_string_length_is_malformed() {
        let buf = [0xFFu8, 0xFF]; // i16 = -1
        let mut cursor = Cursor::new(buf);
        assert!(String::read(&mut cursor).is_err());
    }
}
