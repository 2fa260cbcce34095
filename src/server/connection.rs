//! Connection handler (component F): the per-socket state machine from
//! spec §4.5 — parse as many complete frames as are buffered, dispatch
//! each by `(opcode, role)`, reply in request order, retain any trailing
//! partial frame.

use std::io::Cursor;
use std::net::SocketAddr;
use std::os::unix::fs::FileExt;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, instrument, warn};

use crate::chain::map::{ChainMapSnapshot, Role};
use crate::chain::supervisor::{self, Supervisor};
use crate::codec::messages::delete_topic::{DeleteTopicRequest, DeleteTopicResponse};
use crate::codec::messages::ensure::{EnsureRequest, EnsureResponse};
use crate::codec::messages::fetch::{
    Fetch2Request, FetchRequest, FetchResponse, FetchResponsePartition, FetchResponseTopic,
};
use crate::codec::messages::metadata::{MetadataNode, MetadataRequest, MetadataResponse, MetadataTopic};
use crate::codec::messages::produce::{
    ProduceRequest, ProduceResponse, ProduceResponsePartition, ProduceResponseTopic,
};
use crate::codec::messages::replicate::{ReplicateRequest, ReplicateResponse};
use crate::codec::messages::topics::{TopicsRequest, TopicsResponse, TopicsResponseEntry};
use crate::codec::record::Records;
use crate::codec::{ApiKey, ErrorCode, ReadType, RequestHeader, ResponseHeader, WriteType};
use crate::storage::{FdCache, ReplicatedAppendOutcome};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed frame: {0}")]
    Frame(#[from] crate::codec::FrameError),

    #[error("malformed request body: {0}")]
    Malformed(#[from] crate::codec::ReadError),

    #[error("could not encode response: {0}")]
    Encode(#[from] crate::codec::WriteError),
}

pub struct ConnectionContext {
    pub role: Role,
    pub supervisor: Arc<Supervisor>,
    pub chain_map: ChainMapSnapshot,
    pub fd_cache: Arc<FdCache>,
}

#[instrument(skip(stream, ctx), fields(role = ?ctx.role, peer = %peer))]
pub async fn handle(mut stream: TcpStream, peer: SocketAddr, ctx: ConnectionContext) {
    if let Err(e) = run(&mut stream, &ctx).await {
        debug!(error = %e, "connection closed");
    }
}

async fn run(stream: &mut TcpStream, ctx: &ConnectionContext) -> Result<(), Error> {
    let mut buf = BytesMut::with_capacity(64 * 1024);

    loop {
        let n = stream.read_buf(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }

        while let Some(frame) = crate::codec::try_parse_frame(&mut buf)? {
            dispatch(stream, ctx, frame).await?;
        }
    }
}

async fn dispatch(stream: &mut TcpStream, ctx: &ConnectionContext, frame: BytesMut) -> Result<(), Error> {
    let mut cursor = Cursor::new(&frame[..]);
    let header = RequestHeader::read(&mut cursor)?;
    let correlation_id = header.correlation_id;

    debug!(?header.api_key, correlation_id, "dispatching request");

    match header.api_key {
        ApiKey::Produce => {
            let request = ProduceRequest::read(&mut cursor)?;
            let response = handle_produce(ctx, request).await;
            reply(stream, correlation_id, &response).await
        }
        ApiKey::Fetch => {
            let request = FetchRequest::read(&mut cursor)?;
            reply_fetch(stream, ctx, correlation_id, from_fetch(request)).await
        }
        ApiKey::Fetch2 => {
            let request = Fetch2Request::read(&mut cursor)?;
            reply_fetch(stream, ctx, correlation_id, from_fetch2(request)).await
        }
        ApiKey::Metadata => {
            let request = MetadataRequest::read(&mut cursor)?;
            let response = handle_metadata(ctx, request);
            reply(stream, correlation_id, &response).await
        }
        ApiKey::Topics => {
            let _request = TopicsRequest::read(&mut cursor)?;
            let response = handle_topics(ctx);
            reply(stream, correlation_id, &response).await
        }
        ApiKey::Ensure => {
            let request = EnsureRequest::read(&mut cursor)?;
            let response = handle_ensure(ctx, request);
            reply(stream, correlation_id, &response).await
        }
        ApiKey::Replicate => {
            let request = ReplicateRequest::read(&mut cursor)?;
            let response = handle_replicate(ctx, request).await;
            reply(stream, correlation_id, &response).await
        }
        ApiKey::DeleteTopic => {
            let request = DeleteTopicRequest::read(&mut cursor)?;
            let response = handle_delete_topic(ctx, request).await;
            reply(stream, correlation_id, &response).await
        }
        ApiKey::ReplicateDeleteTopic => {
            let request = DeleteTopicRequest::read(&mut cursor)?;
            let response = handle_delete_topic(ctx, request).await;
            reply(stream, correlation_id, &response).await
        }
        ApiKey::Unknown(code) => {
            warn!(code, correlation_id, "unknown opcode, closing connection");
            Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown opcode {code}"),
            )))
        }
    }
}

async fn reply<B: WriteType<Vec<u8>>>(
    stream: &mut TcpStream,
    correlation_id: i32,
    body: &B,
) -> Result<(), Error> {
    let mut envelope = Vec::new();
    ResponseHeader { correlation_id }.write(&mut envelope)?;
    body.write(&mut envelope)?;

    let mut out = BytesMut::with_capacity(4 + envelope.len());
    crate::codec::put_frame(&mut out, &envelope);
    stream.write_all(&out).await?;
    Ok(())
}

async fn handle_produce(ctx: &ConnectionContext, request: ProduceRequest) -> ProduceResponse {
    if !matches!(ctx.role, Role::Head | Role::Solo) {
        return ProduceResponse {
            topics: request
                .topics
                .into_iter()
                .map(|t| ProduceResponseTopic {
                    topic: t.topic,
                    partitions: t
                        .partitions
                        .into_iter()
                        .map(|p| ProduceResponsePartition {
                            partition: p.partition,
                            error_code: ErrorCode::ProduceDisallowed.code(),
                            offset: -1,
                        })
                        .collect(),
                })
                .collect(),
        };
    }

    let mut topics = Vec::with_capacity(request.topics.len());
    for topic in request.topics {
        let mut partitions = Vec::with_capacity(topic.partitions.len());
        for partition in topic.partitions {
            let Records(records) = partition.records;
            let payloads: Vec<Vec<u8>> = records.into_iter().map(|r| r.payload).collect();
            let result = ctx
                .supervisor
                .produce(&topic.topic, partition.partition, payloads)
                .await;
            partitions.push(produce_result_to_wire(partition.partition, result));
        }
        topics.push(ProduceResponseTopic {
            topic: topic.topic,
            partitions,
        });
    }
    ProduceResponse { topics }
}

fn produce_result_to_wire(
    partition: i32,
    result: Result<supervisor::ProduceOutcome, supervisor::Error>,
) -> ProduceResponsePartition {
    match result {
        Ok(outcome) => ProduceResponsePartition {
            partition,
            error_code: ErrorCode::NoError.code(),
            offset: outcome.last_offset,
        },
        // Not-found gets offset 0, not the -1 timeout sentinel (spec §7b).
        Err(supervisor::Error::UnknownTopicOrPartition { .. }) => ProduceResponsePartition {
            partition,
            error_code: ErrorCode::UnknownTopicOrPartition.code(),
            offset: 0,
        },
        Err(e) => ProduceResponsePartition {
            partition,
            error_code: supervisor_error_code(&e).code(),
            offset: -1,
        },
    }
}

fn supervisor_error_code(e: &supervisor::Error) -> ErrorCode {
    match e {
        supervisor::Error::UnknownTopicOrPartition { .. } => ErrorCode::UnknownTopicOrPartition,
        supervisor::Error::Partition(crate::storage::partition::Error::ReplicaBehind { .. }) => {
            ErrorCode::Timeout
        }
        supervisor::Error::Downstream(_) => ErrorCode::Timeout,
        _ => ErrorCode::Timeout,
    }
}

/// A single shape `fetch` and `fetch2` both reduce to, since they share a
/// response type and differ only in the optional per-partition `limit`.
struct FetchPlan {
    topics: Vec<FetchPlanTopic>,
}

struct FetchPlanTopic {
    topic: String,
    partitions: Vec<FetchPlanPartition>,
}

struct FetchPlanPartition {
    partition: i32,
    fetch_offset: i64,
    max_bytes: i32,
    limit: Option<i64>,
}

fn from_fetch(request: FetchRequest) -> FetchPlan {
    FetchPlan {
        topics: request
            .topics
            .into_iter()
            .map(|t| FetchPlanTopic {
                topic: t.topic,
                partitions: t
                    .partitions
                    .into_iter()
                    .map(|p| FetchPlanPartition {
                        partition: p.partition,
                        fetch_offset: p.fetch_offset,
                        max_bytes: p.max_bytes,
                        limit: None,
                    })
                    .collect(),
            })
            .collect(),
    }
}

fn from_fetch2(request: Fetch2Request) -> FetchPlan {
    FetchPlan {
        topics: request
            .topics
            .into_iter()
            .map(|t| FetchPlanTopic {
                topic: t.topic,
                partitions: t
                    .partitions
                    .into_iter()
                    .map(|p| FetchPlanPartition {
                        partition: p.partition,
                        fetch_offset: p.fetch_offset,
                        max_bytes: p.max_bytes,
                        limit: if p.limit < 0 { None } else { Some(p.limit as i64) },
                    })
                    .collect(),
            })
            .collect(),
    }
}

async fn reply_fetch(
    stream: &mut TcpStream,
    ctx: &ConnectionContext,
    correlation_id: i32,
    plan: FetchPlan,
) -> Result<(), Error> {
    if !matches!(ctx.role, Role::Tail | Role::Solo) {
        let response = FetchResponse {
            topics: plan
                .topics
                .into_iter()
                .map(|t| FetchResponseTopic {
                    topic: t.topic,
                    partitions: t
                        .partitions
                        .into_iter()
                        .map(|p| FetchResponsePartition {
                            partition: p.partition,
                            error_code: ErrorCode::FetchDisallowed.code(),
                            high_water_mark: -1,
                            bytes_len: 0,
                        })
                        .collect(),
                })
                .collect(),
        };
        return reply(stream, correlation_id, &response).await;
    }

    // Each partition's header is emitted immediately before its own
    // file-range bytes (spec §4.3's scatter/gather sequence: H0 B0 H1 B1,
    // not every header followed by every range). A topic's name and
    // partition count ride along with its first partition's header,
    // since nothing else precedes it on the wire.
    let topic_count = plan.topics.len() as i32;
    let mut emits: Vec<(Vec<u8>, Option<crate::storage::FetchRange>)> = Vec::new();

    for topic in plan.topics {
        let partition_count = topic.partitions.len() as i32;
        if topic.partitions.is_empty() {
            let mut header_bytes = Vec::new();
            topic.topic.write(&mut header_bytes)?;
            partition_count.write(&mut header_bytes)?;
            emits.push((header_bytes, None));
            continue;
        }
        for (i, partition) in topic.partitions.into_iter().enumerate() {
            let (response_partition, range) =
                match ctx.supervisor.registry().get(&topic.topic, partition.partition) {
                    Some(log) => {
                        let max_bytes = partition.max_bytes.max(0) as usize;
                        match log.fetch(partition.fetch_offset, max_bytes, partition.limit) {
                            Ok(range) => {
                                let response_partition = FetchResponsePartition {
                                    partition: partition.partition,
                                    error_code: ErrorCode::NoError.code(),
                                    high_water_mark: range.high_water_mark,
                                    bytes_len: range.len as i32,
                                };
                                let range = if range.len > 0 { Some(range) } else { None };
                                (response_partition, range)
                            }
                            Err(e) => {
                                warn!(error = %e, "fetch failed");
                                (
                                    FetchResponsePartition {
                                        partition: partition.partition,
                                        error_code: ErrorCode::Timeout.code(),
                                        high_water_mark: -1,
                                        bytes_len: 0,
                                    },
                                    None,
                                )
                            }
                        }
                    }
                    None => (
                        FetchResponsePartition {
                            partition: partition.partition,
                            error_code: ErrorCode::UnknownTopicOrPartition.code(),
                            high_water_mark: -1,
                            bytes_len: 0,
                        },
                        None,
                    ),
                };

            let mut header_bytes = Vec::new();
            if i == 0 {
                topic.topic.write(&mut header_bytes)?;
                partition_count.write(&mut header_bytes)?;
            }
            response_partition.write(&mut header_bytes)?;

            emits.push((header_bytes, range));
        }
    }

    let mut envelope_head = Vec::new();
    ResponseHeader { correlation_id }.write(&mut envelope_head)?;
    topic_count.write(&mut envelope_head)?;

    let total_len: u64 = envelope_head.len() as u64
        + emits
            .iter()
            .map(|(header, range)| header.len() as u64 + range.as_ref().map(|r| r.len).unwrap_or(0))
            .sum::<u64>();

    stream.write_all(&(total_len as i32).to_be_bytes()).await?;
    stream.write_all(&envelope_head).await?;

    for (header_bytes, range) in emits {
        stream.write_all(&header_bytes).await?;
        if let Some(range) = range {
            let bytes = read_range_blocking(&ctx.fd_cache, range)?;
            stream.write_all(&bytes).await?;
        }
    }

    Ok(())
}

fn read_range_blocking(fd_cache: &FdCache, range: crate::storage::FetchRange) -> Result<Vec<u8>, Error> {
    let file = fd_cache.open(&range.log_path)?;
    let mut buf = vec![0u8; range.len as usize];
    file.read_exact_at(&mut buf, range.position)?;
    Ok(buf)
}

fn handle_metadata(ctx: &ConnectionContext, request: MetadataRequest) -> MetadataResponse {
    let mut nodes = Vec::new();
    let mut topics = Vec::new();
    let mut node_id_of = std::collections::HashMap::new();

    for entry in ctx.chain_map.entries() {
        let head_id = *node_id_of.entry(entry.head).or_insert_with(|| {
            let id = nodes.len() as i32;
            nodes.push(MetadataNode {
                node_id: id,
                host: entry.head.ip().to_string(),
                port: entry.head.port() as i32,
            });
            id
        });
        let tail_id = if entry.is_solo() {
            head_id
        } else {
            *node_id_of.entry(entry.tail).or_insert_with(|| {
                let id = nodes.len() as i32;
                nodes.push(MetadataNode {
                    node_id: id,
                    host: entry.tail.ip().to_string(),
                    port: entry.tail.port() as i32,
                });
                id
            })
        };

        for topic_name in &request.topics {
            if entry.covers(topic_name)
                && ctx
                    .supervisor
                    .registry()
                    .list()
                    .iter()
                    .any(|(t, _)| t == topic_name)
            {
                topics.push(MetadataTopic {
                    topic: topic_name.clone(),
                    head_node_id: head_id,
                    tail_node_id: tail_id,
                });
            }
        }
    }

    MetadataResponse { nodes, topics }
}

fn handle_topics(ctx: &ConnectionContext) -> TopicsResponse {
    TopicsResponse {
        topics: ctx
            .supervisor
            .registry()
            .list()
            .into_iter()
            .map(|(topic, partitions)| TopicsResponseEntry { topic, partitions })
            .collect(),
    }
}

fn handle_ensure(ctx: &ConnectionContext, request: EnsureRequest) -> EnsureResponse {
    match ctx.supervisor.ensure_topic(&request.topic, request.partitions) {
        Ok(()) => EnsureResponse {
            error_code: ErrorCode::NoError.code(),
        },
        Err(_) => EnsureResponse {
            error_code: ErrorCode::Timeout.code(),
        },
    }
}

async fn handle_delete_topic(ctx: &ConnectionContext, request: DeleteTopicRequest) -> DeleteTopicResponse {
    match ctx.supervisor.delete_topic(&request.topic).await {
        Ok(()) => {
            info!(topic = %request.topic, "topic deleted");
            DeleteTopicResponse {
                error_code: ErrorCode::NoError.code(),
            }
        }
        Err(_) => DeleteTopicResponse {
            error_code: ErrorCode::Timeout.code(),
        },
    }
}

async fn handle_replicate(ctx: &ConnectionContext, request: ReplicateRequest) -> ReplicateResponse {
    if !matches!(ctx.role, Role::Middle | Role::Tail) {
        return ReplicateResponse {
            partition: request.partition,
            error_code: ErrorCode::ReplicateDisallowed.code(),
            offset: -1,
            repair_records: Records::default(),
        };
    }

    let Records(records) = request.records;
    match ctx
        .supervisor
        .replicate(
            &request.topic,
            request.partition,
            request.expected_start_offset,
            records,
        )
        .await
    {
        Ok(ReplicatedAppendOutcome::Ok { last_offset }) => ReplicateResponse {
            partition: request.partition,
            error_code: ErrorCode::NoError.code(),
            offset: last_offset,
            repair_records: Records::default(),
        },
        Ok(ReplicatedAppendOutcome::WriteRepair { records }) => ReplicateResponse {
            partition: request.partition,
            error_code: ErrorCode::WriteRepair.code(),
            offset: -1,
            repair_records: Records(records),
        },
        Err(supervisor::Error::Partition(crate::storage::partition::Error::ReplicaBehind {
            ..
        })) => ReplicateResponse {
            partition: request.partition,
            error_code: ErrorCode::Timeout.code(),
            offset: -1,
            repair_records: Records::default(),
        },
        // Not-found gets offset 0, not the -1 timeout sentinel (spec §7b).
        Err(supervisor::Error::UnknownTopicOrPartition { .. }) => ReplicateResponse {
            partition: request.partition,
            error_code: ErrorCode::UnknownTopicOrPartition.code(),
            offset: 0,
            repair_records: Records::default(),
        },
        Err(_) => ReplicateResponse {
            partition: request.partition,
            error_code: ErrorCode::Timeout.code(),
            offset: -1,
            repair_records: Records::default(),
        },
    }
}
