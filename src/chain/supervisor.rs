//! Role/chain supervisor (component G): topic lifecycle on top of the
//! registry, and the produce-path orchestration that drives a batch down
//! the chain, absorbing write-repair along the way.

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::chain::client::{self, ChainClient};
use crate::chain::map::Role;
use crate::codec::error_code::ErrorCode;
use crate::codec::messages::delete_topic::DeleteTopicRequest;
use crate::codec::messages::replicate::ReplicateRequest;
use crate::codec::record::{Record, Records};
use crate::storage::{self, PartitionLog, ReplicatedAppendOutcome, TopicRegistry};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] storage::Error),

    #[error(transparent)]
    Partition(#[from] storage::partition::Error),

    #[error("downstream replication failed: {0}")]
    Downstream(#[from] client::Error),

    #[error("downstream reported an unexpected error code {0}")]
    UnexpectedDownstreamError(i16),

    #[error("unknown topic or partition: {topic}-{partition}")]
    UnknownTopicOrPartition { topic: String, partition: i32 },
}

/// The outcome of a fully chain-replicated produce: the offset of the
/// last record once the tail has acknowledged.
pub struct ProduceOutcome {
    pub last_offset: i64,
}

pub struct Supervisor {
    registry: Arc<TopicRegistry>,
    role: Role,
    downstream: Option<Arc<ChainClient>>,
}

impl Supervisor {
    pub fn new(registry: Arc<TopicRegistry>, role: Role, downstream: Option<Arc<ChainClient>>) -> Self {
        Self {
            registry,
            role,
            downstream,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn registry(&self) -> &TopicRegistry {
        &self.registry
    }

    fn partition(&self, topic: &str, partition: i32) -> Result<Arc<PartitionLog>, Error> {
        self.registry
            .get(topic, partition)
            .ok_or_else(|| Error::UnknownTopicOrPartition {
                topic: topic.to_string(),
                partition,
            })
    }

    /// Appends `payloads` locally and, unless this node is the tail or
    /// solo, drives them down the chain, absorbing any write-repair
    /// surplus the downstream reports before retrying.
    pub async fn produce(
        &self,
        topic: &str,
        partition: i32,
        payloads: Vec<Vec<u8>>,
    ) -> Result<ProduceOutcome, Error> {
        let log = self.partition(topic, partition)?;
        let first_offset = log.next_offset();
        let last_offset = log.append(&payloads)?;

        let Some(downstream) = &self.downstream else {
            return Ok(ProduceOutcome { last_offset });
        };

        let records: Vec<Record> = payloads
            .into_iter()
            .enumerate()
            .map(|(i, payload)| Record::new(first_offset + i as i64, payload))
            .collect();

        let acked = self
            .forward(&log, downstream, topic, partition, first_offset, records)
            .await?;
        Ok(ProduceOutcome { last_offset: acked })
    }

    /// Applies an inbound `replicate` request at a middle or tail: local
    /// `replicated_append`, then (if not the tail) forwards onward with
    /// the same write-repair absorption loop.
    pub async fn replicate(
        &self,
        topic: &str,
        partition: i32,
        expected_start_offset: i64,
        records: Vec<Record>,
    ) -> Result<ReplicatedAppendOutcome, Error> {
        let log = self.partition(topic, partition)?;
        let outcome = log.replicated_append(expected_start_offset, &records)?;

        let ReplicatedAppendOutcome::Ok { last_offset } = outcome else {
            return Ok(outcome);
        };

        let Some(downstream) = &self.downstream else {
            return Ok(ReplicatedAppendOutcome::Ok { last_offset });
        };

        let acked = self
            .forward(&log, downstream, topic, partition, expected_start_offset, records)
            .await?;
        Ok(ReplicatedAppendOutcome::Ok { last_offset: acked })
    }

    async fn forward(
        &self,
        log: &PartitionLog,
        downstream: &ChainClient,
        topic: &str,
        partition: i32,
        mut start_offset: i64,
        records: Vec<Record>,
    ) -> Result<i64, Error> {
        loop {
            let request = ReplicateRequest {
                topic: topic.to_string(),
                partition,
                expected_start_offset: start_offset,
                records: Records(records.clone()),
            };

            let response = downstream.replicate(&request).await?;

            match ErrorCode::from_code(response.error_code) {
                ErrorCode::NoError => return Ok(response.offset),
                ErrorCode::WriteRepair => {
                    let repair = response.repair_records.0;
                    warn!(
                        topic,
                        partition,
                        count = repair.len(),
                        "absorbing write-repair surplus from downstream"
                    );
                    if !repair.is_empty() {
                        let repair_start = repair[0].offset;
                        log.replicated_append(repair_start, &repair)?;
                        start_offset = repair.last().map(|r| r.offset + 1).unwrap_or(start_offset);
                    }
                }
                other => return Err(Error::UnexpectedDownstreamError(other.code())),
            }
        }
    }

    pub fn ensure_topic(&self, topic: &str, partitions: i32) -> Result<(), Error> {
        self.registry.ensure(topic, partitions)?;
        Ok(())
    }

    /// Deletes `topic` locally, then pushes the deletion one hop
    /// downstream so the rest of the chain converges.
    pub async fn delete_topic(&self, topic: &str) -> Result<(), Error> {
        self.registry.delete(topic)?;

        if let Some(downstream) = &self.downstream {
            let response = downstream
                .delete_topic(&DeleteTopicRequest {
                    topic: topic.to_string(),
                })
                .await?;
            if ErrorCode::from_code(response.error_code) != ErrorCode::NoError {
                return Err(Error::UnexpectedDownstreamError(response.error_code));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TopicRegistry;
    use tempfile::tempdir;

    fn solo_supervisor(root: &std::path::Path) -> Supervisor {
        let registry = Arc::new(TopicRegistry::new(vec![root.to_path_buf()], u64::MAX, 4096));
        Supervisor::new(registry, Role::Solo, None)
    }

    #[tokio::test]
    async fn solo_produce_appends_without_a_downstream() {
        let root = tempdir().unwrap();
        let sup = solo_supervisor(root.path());
        sup.ensure_topic("t", 1).unwrap();

        let outcome = sup.produce("t", 0, vec![b"hello".to_vec()]).await.unwrap();
        assert_eq!(outcome.last_offset, 0);
    }

    #[tokio::test]
    async fn produce_on_unknown_partition_is_an_error() {
        let root = tempdir().unwrap();
        let sup = solo_supervisor(root.path());
        let err = sup.produce("missing", 0, vec![b"x".to_vec()]).await.unwrap_err();
        assert!(matches!(err, Error::UnknownTopicOrPartition { .. }));
    }

    #[tokio::test]
    async fn delete_topic_removes_it_from_the_registry() {
        let root = tempdir().unwrap();
        let sup = solo_supervisor(root.path());
        sup.ensure_topic("t", 1).unwrap();
        sup.delete_topic("t").await.unwrap();
        assert!(sup.registry().get("t", 0).is_none());
    }
}
