//! Configuration loading: a TOML file named on the command line
//! (`--config <path>`), parsed into a typed, validated structure.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::chain::map::{Bound, ChainEntry, Role};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("reading config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("config has no log_dirs entries")]
    NoLogDirs,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Root directories partitions are assigned to; one partition lives
    /// entirely within a single root.
    pub log_dirs: Vec<PathBuf>,

    #[serde(default = "default_segment_bytes")]
    pub segment_bytes: u64,

    #[serde(default = "default_index_interval_bytes")]
    pub index_interval_bytes: u64,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub fd_cache_capacity: Option<usize>,

    /// This node's position in its chain; gates which opcodes it accepts
    /// (spec §4.2). Defaults to `solo`, the natural single-node shape.
    #[serde(default)]
    pub role: NodeRole,

    #[serde(default)]
    pub chain: ChainConfig,

    #[serde(default)]
    pub client: ClientConfig,

    /// This node's view of the full chain topology, used to answer
    /// `metadata` queries. Every node in a deployment is expected to
    /// carry the same table.
    #[serde(default)]
    pub chains: Vec<ChainMapEntryConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Head,
    Middle,
    Tail,
    Solo,
}

impl Default for NodeRole {
    fn default() -> Self {
        Self::Solo
    }
}

impl From<NodeRole> for Role {
    fn from(role: NodeRole) -> Self {
        match role {
            NodeRole::Head => Role::Head,
            NodeRole::Middle => Role::Middle,
            NodeRole::Tail => Role::Tail,
            NodeRole::Solo => Role::Solo,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainMapEntryConfig {
    pub name: String,
    pub head: SocketAddr,
    pub tail: SocketAddr,
    #[serde(default)]
    pub topics_start: Option<String>,
    #[serde(default)]
    pub topics_end: Option<String>,
}

impl From<ChainMapEntryConfig> for ChainEntry {
    fn from(entry: ChainMapEntryConfig) -> Self {
        ChainEntry {
            name: entry.name,
            head: entry.head,
            tail: entry.tail,
            topics_start: entry.topics_start.map(Bound::Value).unwrap_or(Bound::Unbounded),
            topics_end: entry.topics_end.map(Bound::Value).unwrap_or(Bound::Unbounded),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ChainConfig {
    /// This node has no downstream; it is the tail (or solo) of its chain.
    Tail,
    /// This node forwards replicate traffic to `next`.
    Forward { next: SocketAddr },
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self::Tail
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Addresses of this chain's head and tail, for the bundled client.
    #[serde(default)]
    pub endpoints: Vec<SocketAddr>,

    #[serde(default = "default_replicate_timeout_ms")]
    pub replicate_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            replicate_timeout_ms: default_replicate_timeout_ms(),
        }
    }
}

impl ClientConfig {
    pub fn replicate_timeout(&self) -> Duration {
        Duration::from_millis(self.replicate_timeout_ms)
    }
}

fn default_segment_bytes() -> u64 {
    1024 * 1024 * 1024
}

fn default_index_interval_bytes() -> u64 {
    4096
}

fn default_port() -> u16 {
    5555
}

fn default_replicate_timeout_ms() -> u64 {
    5_000
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&text).map_err(|source| Error::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if config.log_dirs.is_empty() {
            return Err(Error::NoLogDirs);
        }
        Ok(config)
    }

    pub fn fd_cache_capacity(&self) -> usize {
        self.fd_cache_capacity.unwrap_or(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let toml = r#"
            log_dirs = ["/var/lib/vonnegut/data"]
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.segment_bytes, default_segment_bytes());
        assert_eq!(config.port, 5555);
        assert!(matches!(config.chain, ChainConfig::Tail));
        assert_eq!(config.role, NodeRole::Solo);
        assert!(config.chains.is_empty());
    }

    #[test]
    fn parses_chain_map_entries() {
        let toml = r#"
            log_dirs = ["/data"]
            role = "head"

            [[chains]]
            name = "a"
            head = "127.0.0.1:5555"
            tail = "127.0.0.1:5556"
            topics_end = "m"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.role, NodeRole::Head);
        assert_eq!(config.chains.len(), 1);
        let entry: ChainEntry = config.chains[0].clone().into();
        assert!(entry.covers("apple"));
        assert!(!entry.covers("zebra"));
    }

    #[test]
    fn parses_forwarding_chain() {
        let toml = r#"
            log_dirs = ["/data"]
            port = 6000

            [chain]
            mode = "forward"
            next = "127.0.0.1:5556"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(matches!(config.chain, ChainConfig::Forward { .. }));
    }

    #[test]
    fn rejects_empty_log_dirs() {
        let dir = std::env::temp_dir().join("vonnegut-config-test-empty.toml");
        std::fs::write(&dir, "log_dirs = []\n").unwrap();
        let err = Config::load(&dir).unwrap_err();
        assert!(matches!(err, Error::NoLogDirs));
        let _ = std::fs::remove_file(&dir);
    }
}
