//! `metadata`: probes the chain map for a set of topics.
//!
//! Per spec §6, a dense node-id space is produced per call: for each chain,
//! the head is node id `i`, and the tail is `i+1` iff its endpoint differs
//! from the head's, else the tail reuses `i`. Topics that do not exist are
//! silently omitted from the response — this is load-bearing, callers use
//! it to probe topic existence.

use std::io::{Read, Write};

use crate::codec::api_key::ApiKey;
use crate::codec::primitives::{read_array, write_array};
use crate::codec::traits::{ReadError, ReadType, WriteError, WriteType};

use super::RequestBody;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetadataRequest {
    pub topics: Vec<String>,
}

impl<R: Read> ReadType<R> for MetadataRequest {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            topics: read_array(reader)?,
        })
    }
}

impl<W: Write> WriteType<W> for MetadataRequest {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        write_array(writer, &self.topics)?;
        Ok(())
    }
}

impl<R: Read, W: Write> RequestBody<R, W> for MetadataRequest {
    type ResponseBody = MetadataResponse;

    const API_KEY: ApiKey = ApiKey::Metadata;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataNode {
    pub node_id: i32,
    pub host: String,
    pub port: i32,
}

impl<R: Read> ReadType<R> for MetadataNode {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            node_id: i32::read(reader)?,
            host: String::read(reader)?,
            port: i32::read(reader)?,
        })
    }
}

impl<W: Write> WriteType<W> for MetadataNode {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.node_id.write(writer)?;
        self.host.write(writer)?;
        self.port.write(writer)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataTopic {
    pub topic: String,
    /// Node id of the chain's head (produce entry point).
    pub head_node_id: i32,
    /// Node id of the chain's tail (sole read replica); equals
    /// `head_node_id` when the chain is a `solo` node.
    pub tail_node_id: i32,
}

impl<R: Read> ReadType<R> for MetadataTopic {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            topic: String::read(reader)?,
            head_node_id: i32::read(reader)?,
            tail_node_id: i32::read(reader)?,
        })
    }
}

impl<W: Write> WriteType<W> for MetadataTopic {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        self.topic.write(writer)?;
        self.head_node_id.write(writer)?;
        self.tail_node_id.write(writer)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetadataResponse {
    pub nodes: Vec<MetadataNode>,
    pub topics: Vec<MetadataTopic>,
}

impl<R: Read> ReadType<R> for MetadataResponse {
    fn read(reader: &mut R) -> Result<Self, ReadError> {
        Ok(Self {
            nodes: read_array(reader)?,
            topics: read_array(reader)?,
        })
    }
}

impl<W: Write> WriteType<W> for MetadataResponse {
    fn write(&self, writer: &mut W) -> Result<(), WriteError> {
        write_array(writer, &self.nodes)?;
        write_array(writer, &self.topics)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn roundtrip_metadata_request() {
        let req = MetadataRequest {
            topics: vec!["exists".to_string(), "missing".to_string()],
        };
        let mut buf = Vec::new();
        req.write(&mut buf).unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(req, MetadataRequest::read(&mut cursor).unwrap());
    }

    #[test]
    fn roundtrip_metadata_response_omits_missing_topics() {
        let resp = MetadataResponse {
            nodes: vec![MetadataNode {
                node_id: 0,
                host: "127.0.0.1".to_string(),
                port: 5555,
            }],
            topics: vec![MetadataTopic {
                topic: "exists".to_string(),
                head_node_id: 0,
                tail_node_id: 0,
            }],
        };
        let mut buf = Vec::new();
        resp.write(&mut buf).unwrap();
        let mut cursor = Cursor::new(buf);
        let got = MetadataResponse::read(&mut cursor).unwrap();
        assert_eq!(resp, got);
        assert_eq!(got.topics.len(), 1);
    }
}
