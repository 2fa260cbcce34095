//! Request and response envelopes, per spec §4.3:
//!
//! ```text
//! Request:  api_key:i16, api_version:i16, correlation_id:i32, client_id:string, body
//! Response: correlation_id:i32, body
//! ```

use std::io::{Read, Write};

use super::api_key::ApiKey;
use super::traits::{ReadError, ReadType, WriteError, WriteType};

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct RequestHeader {
    pub api_key: ApiKey,
    pub api_version: i16,
    pub correlation_id: i32,
    pub client_id: String,
}

impl<R: Read> ReadType<R> for RequestHeader {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        let api_key = ApiKey::from(i16::read(reader)?);
        let api_version = i16::read(reader)?;
        let correlation_id = i32::read(reader)?;
        let client_id = String::read(reader)?;

        Ok(Self {
            api_key,
            api_version,
            correlation_id,
            client_id,
        })
    }
}

impl<W: Write> WriteType<W> for RequestHeader {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        i16::from(self.api_key).write(writer)?;
        self.api_version.write(writer)?;
        self.correlation_id.write(writer)?;
        self.client_id.write(writer)?;
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ResponseHeader {
    pub correlation_id: i32,
}

impl<R: Read> ReadType<R> for ResponseHeader {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            correlation_id: i32::read(reader)?,
        })
    }
}

impl<W: Write> WriteType<W> for ResponseHeader {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.correlation_id.write(writer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn roundtrip_request_header() {
        let header = RequestHeader {
            api_key: ApiKey::Produce,
            api_version: 0,
            correlation_id: 42,
            client_id: "vonnegut-client".to_string(),
        };

        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        let got = RequestHeader::read(&mut cursor).unwrap();
        assert_eq!(header, got);
    }

    #[test]
    fn roundtrip_response_header() {
        let header = ResponseHeader { correlation_id: 7 };
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        let got = ResponseHeader::read(&mut cursor).unwrap();
        assert_eq!(header, got);
    }
}
