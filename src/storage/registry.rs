//! Topic registry (component C): the map from `(topic, partition)` to its
//! partition log, plus topic lifecycle (`create`/`ensure`/`delete`).

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use super::partition::PartitionLog;
use super::Error;

pub struct TopicRegistry {
    log_dirs: Vec<PathBuf>,
    segment_bytes: u64,
    index_interval_bytes: u64,
    partitions: RwLock<HashMap<(String, i32), Arc<PartitionLog>>>,
    topics: RwLock<HashMap<String, i32>>,
}

impl TopicRegistry {
    pub fn new(log_dirs: Vec<PathBuf>, segment_bytes: u64, index_interval_bytes: u64) -> Self {
        assert!(!log_dirs.is_empty(), "at least one log_dir is required");
        Self {
            log_dirs,
            segment_bytes,
            index_interval_bytes,
            partitions: RwLock::new(HashMap::new()),
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// Rebuilds the registry from whatever topic directories already
    /// exist under the configured `log_dirs`, recovering each partition's
    /// active segment. Called once at startup.
    pub fn recover(&self) -> Result<(), Error> {
        for root in &self.log_dirs {
            if !root.is_dir() {
                continue;
            }
            for entry in std::fs::read_dir(root)? {
                let entry = entry?;
                let name = entry.file_name();
                let name = name.to_string_lossy();
                let Some((topic, partition)) = name.rsplit_once('-') else {
                    continue;
                };
                let Ok(partition) = partition.parse::<i32>() else {
                    continue;
                };
                self.ensure_one(topic, partition)?;
            }
        }
        Ok(())
    }

    fn root_for(&self, topic: &str, partition: i32) -> &PathBuf {
        let mut hasher = DefaultHasher::new();
        topic.hash(&mut hasher);
        partition.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.log_dirs.len();
        &self.log_dirs[index]
    }

    fn ensure_one(&self, topic: &str, partition: i32) -> Result<Arc<PartitionLog>, Error> {
        if let Some(existing) = self.partitions.read().get(&(topic.to_string(), partition)) {
            return Ok(Arc::clone(existing));
        }

        let root = self.root_for(topic, partition).clone();
        let log = Arc::new(PartitionLog::open_or_create(
            &root,
            topic,
            partition,
            self.segment_bytes,
            self.index_interval_bytes,
        )?);

        self.partitions
            .write()
            .insert((topic.to_string(), partition), Arc::clone(&log));
        Ok(log)
    }

    /// Idempotent: creates every partition `0..partitions` for `topic`
    /// that does not already exist, and records the topic's partition
    /// count. Calling this again with the same count is a no-op.
    pub fn ensure(&self, topic: &str, partitions: i32) -> Result<(), Error> {
        for partition in 0..partitions {
            self.ensure_one(topic, partition)?;
        }
        let mut topics = self.topics.write();
        topics
            .entry(topic.to_string())
            .and_modify(|existing| *existing = (*existing).max(partitions))
            .or_insert(partitions);
        Ok(())
    }

    /// `create_topic` on an already-registered topic is a no-op success,
    /// per spec.
    pub fn create(&self, topic: &str, partitions: i32) -> Result<(), Error> {
        if self.topics.read().contains_key(topic) {
            return Ok(());
        }
        self.ensure(topic, partitions)
    }

    pub fn delete(&self, topic: &str) -> Result<(), Error> {
        let removed: Vec<Arc<PartitionLog>> = {
            let mut partitions = self.partitions.write();
            let keys: Vec<(String, i32)> = partitions
                .keys()
                .filter(|(t, _)| t == topic)
                .cloned()
                .collect();
            keys.iter().filter_map(|k| partitions.remove(k)).collect()
        };
        self.topics.write().remove(topic);

        for log in removed {
            log.delete()?;
        }
        info!(topic, "topic deleted");
        Ok(())
    }

    pub fn get(&self, topic: &str, partition: i32) -> Option<Arc<PartitionLog>> {
        self.partitions
            .read()
            .get(&(topic.to_string(), partition))
            .cloned()
    }

    pub fn list(&self) -> Vec<(String, i32)> {
        let mut out: Vec<(String, i32)> = self
            .topics
            .read()
            .iter()
            .map(|(t, p)| (t.clone(), *p))
            .collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn registry(root: &std::path::Path) -> TopicRegistry {
        TopicRegistry::new(vec![root.to_path_buf()], u64::MAX, 4096)
    }

    #[test]
    fn create_then_recreate_is_a_no_op() {
        let root = tempdir().unwrap();
        let reg = registry(root.path());
        reg.create("t", 1).unwrap();
        reg.create("t", 1).unwrap();
        assert_eq!(reg.list(), vec![("t".to_string(), 1)]);
    }

    #[test]
    fn ensure_is_idempotent_on_disk() {
        let root = tempdir().unwrap();
        let reg = registry(root.path());
        reg.ensure("t", 2).unwrap();
        reg.ensure("t", 2).unwrap();
        assert!(root.path().join("t-0").is_dir());
        assert!(root.path().join("t-1").is_dir());
    }

    #[test]
    fn get_returns_none_for_unknown_partition() {
        let root = tempdir().unwrap();
        let reg = registry(root.path());
        assert!(reg.get("missing", 0).is_none());
    }
}
