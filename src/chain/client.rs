//! Chain client (component E): the head-to-next-hop connection that
//! forwards `replicate` requests and awaits the downstream's ack.
//!
//! One long-lived task per downstream hop, with an explicit reconnect
//! state machine per spec §9: the connection is torn down on any I/O
//! error or timeout and reconnected lazily on the next call, never
//! eagerly in the background.

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::codec::messages::delete_topic::{DeleteTopicRequest, DeleteTopicResponse};
use crate::codec::messages::replicate::{ReplicateRequest, ReplicateResponse};
use crate::codec::{ApiKey, RequestHeader, ResponseHeader};
use crate::codec::{ReadType, WriteType};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("I/O error talking to {addr}: {source}")]
    Io {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("replicate round-trip to {addr} timed out")]
    Timeout { addr: SocketAddr },

    #[error("malformed response from {addr}: {source}")]
    Malformed {
        addr: SocketAddr,
        #[source]
        source: crate::codec::ReadError,
    },
}

pub struct ChainClient {
    addr: SocketAddr,
    timeout: Duration,
    correlation_id: AtomicI32,
    conn: Mutex<Option<TcpStream>>,
}

impl ChainClient {
    pub fn new(addr: SocketAddr, timeout: Duration) -> Self {
        Self {
            addr,
            timeout,
            correlation_id: AtomicI32::new(0),
            conn: Mutex::new(None),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn replicate(
        &self,
        request: &ReplicateRequest,
    ) -> Result<ReplicateResponse, Error> {
        self.call(ApiKey::Replicate, request).await
    }

    /// Pushes a topic deletion one hop downstream, so the whole chain
    /// converges once the head (or a forwarding middle) has deleted its
    /// own copy.
    pub async fn delete_topic(
        &self,
        request: &DeleteTopicRequest,
    ) -> Result<DeleteTopicResponse, Error> {
        self.call(ApiKey::ReplicateDeleteTopic, request).await
    }

    async fn call<Req, Resp>(&self, api_key: ApiKey, request: &Req) -> Result<Resp, Error>
    where
        Req: WriteType<Vec<u8>>,
        Resp: ReadType<Cursor<Vec<u8>>>,
    {
        let correlation_id = self.correlation_id.fetch_add(1, Ordering::Relaxed);
        let header = RequestHeader {
            api_key,
            api_version: 0,
            correlation_id,
            client_id: "chain-client".to_string(),
        };

        let mut body = Vec::new();
        header
            .write(&mut body)
            .map_err(|e| self.io_error(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        request
            .write(&mut body)
            .map_err(|e| self.io_error(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

        let mut frame = Vec::with_capacity(4 + body.len());
        frame.extend_from_slice(&(body.len() as i32).to_be_bytes());
        frame.extend_from_slice(&body);

        match tokio::time::timeout(self.timeout, self.round_trip(&frame)).await {
            Ok(Ok(response_bytes)) => {
                let mut cursor = Cursor::new(response_bytes);
                ResponseHeader::read(&mut cursor).map_err(|source| Error::Malformed {
                    addr: self.addr,
                    source,
                })?;
                Resp::read(&mut cursor).map_err(|source| Error::Malformed {
                    addr: self.addr,
                    source,
                })
            }
            Ok(Err(e)) => {
                self.drop_connection().await;
                Err(e)
            }
            Err(_elapsed) => {
                self.drop_connection().await;
                Err(Error::Timeout { addr: self.addr })
            }
        }
    }

    async fn round_trip(&self, frame: &[u8]) -> Result<Vec<u8>, Error> {
        let mut guard = self.conn.lock().await;
        if guard.is_none() {
            *guard = Some(self.connect().await?);
        }

        let stream = guard.as_mut().expect("just populated above");
        if let Err(source) = stream.write_all(frame).await {
            *guard = None;
            return Err(Error::Io {
                addr: self.addr,
                source,
            });
        }

        let mut len_buf = [0u8; 4];
        if let Err(source) = stream.read_exact(&mut len_buf).await {
            *guard = None;
            return Err(Error::Io {
                addr: self.addr,
                source,
            });
        }
        let len = i32::from_be_bytes(len_buf).max(0) as usize;

        let mut body = vec![0u8; len];
        if let Err(source) = stream.read_exact(&mut body).await {
            *guard = None;
            return Err(Error::Io {
                addr: self.addr,
                source,
            });
        }

        Ok(body)
    }

    async fn connect(&self) -> Result<TcpStream, Error> {
        debug!(addr = %self.addr, "connecting chain client");
        let stream = TcpStream::connect(self.addr)
            .await
            .map_err(|source| Error::Io {
                addr: self.addr,
                source,
            })?;
        stream.set_nodelay(true).map_err(|source| Error::Io {
            addr: self.addr,
            source,
        })?;
        Ok(stream)
    }

    async fn drop_connection(&self) {
        let mut guard = self.conn.lock().await;
        if guard.take().is_some() {
            warn!(addr = %self.addr, "chain client connection torn down");
        }
    }

    fn io_error(&self, source: std::io::Error) -> Error {
        Error::Io {
            addr: self.addr,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::record::Record;
    use tokio::net::TcpListener;

    /// Accepts one connection, reads one frame, echoes back a fixed
    /// `ReplicateResponse` acking every record as written at its own
    /// offset.
    async fn single_shot_replicate_server(listener: TcpListener) {
        let (mut stream, _) = listener.accept().await.unwrap();

        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).await.unwrap();
        let len = i32::from_be_bytes(len_buf) as usize;
        let mut body = vec![0u8; len];
        stream.read_exact(&mut body).await.unwrap();

        let mut cursor = Cursor::new(body);
        let request_header = RequestHeader::read(&mut cursor).unwrap();
        let request = ReplicateRequest::read(&mut cursor).unwrap();

        let response = ReplicateResponse {
            partition: request.partition,
            error_code: 0,
            offset: request.records.0.last().unwrap().offset,
            repair_records: crate::codec::record::Records::default(),
        };

        let mut envelope = Vec::new();
        ResponseHeader {
            correlation_id: request_header.correlation_id,
        }
        .write(&mut envelope)
        .unwrap();
        response.write(&mut envelope).unwrap();

        let mut frame = Vec::with_capacity(4 + envelope.len());
        frame.extend_from_slice(&(envelope.len() as i32).to_be_bytes());
        frame.extend_from_slice(&envelope);
        stream.write_all(&frame).await.unwrap();
    }

    #[tokio::test]
    async fn replicate_round_trips_over_a_real_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(single_shot_replicate_server(listener));

        let client = ChainClient::new(addr, Duration::from_secs(5));
        let request = ReplicateRequest {
            topic: "t".to_string(),
            partition: 0,
            expected_start_offset: 0,
            records: crate::codec::record::Records(vec![Record::new(0, b"x".to_vec())]),
        };

        let response = client.replicate(&request).await.unwrap();
        assert_eq!(response.error_code, 0);
        assert_eq!(response.offset, 0);
    }

    #[tokio::test]
    async fn replicate_times_out_against_a_silent_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _keep_alive = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let client = ChainClient::new(addr, Duration::from_millis(50));
        let request = ReplicateRequest {
            topic: "t".to_string(),
            partition: 0,
            expected_start_offset: 0,
            records: crate::codec::record::Records::default(),
        };

        let err = client.replicate(&request).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }
}
