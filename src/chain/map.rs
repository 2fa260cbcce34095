//! Chain map: the process-wide, read-mostly table of which chain a topic
//! belongs to and who that chain's head and tail are (spec §3, §5).

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::RwLock;

/// A topic's lexicographic half-open range endpoint. `Unbounded` means
/// "open" at that side (`start_space`/`end_space` in spec terms).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bound {
    Unbounded,
    Value(String),
}

impl Bound {
    fn covers_start(&self, topic: &str) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Value(v) => v.as_str() <= topic,
        }
    }

    fn covers_end(&self, topic: &str) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Value(v) => topic < v.as_str(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Head,
    Middle,
    Tail,
    Solo,
}

impl Role {
    pub fn accepts_client_connections(self) -> bool {
        !matches!(self, Role::Middle)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEntry {
    pub name: String,
    pub head: SocketAddr,
    pub tail: SocketAddr,
    pub topics_start: Bound,
    pub topics_end: Bound,
}

impl ChainEntry {
    pub fn covers(&self, topic: &str) -> bool {
        self.topics_start.covers_start(topic) && self.topics_end.covers_end(topic)
    }

    pub fn is_solo(&self) -> bool {
        self.head == self.tail
    }
}

/// A point-in-time view of the chain map, cheap to clone and safe to hold
/// across a connection's lifetime without blocking concurrent updates.
#[derive(Debug, Clone, Default)]
pub struct ChainMapSnapshot {
    entries: Arc<Vec<ChainEntry>>,
}

impl ChainMapSnapshot {
    pub fn get_chain(&self, topic: &str) -> Option<&ChainEntry> {
        self.entries.iter().find(|e| e.covers(topic))
    }

    pub fn entries(&self) -> &[ChainEntry] {
        &self.entries
    }
}

pub struct ChainMap {
    current: RwLock<ChainMapSnapshot>,
}

impl ChainMap {
    pub fn new(entries: Vec<ChainEntry>) -> Self {
        Self {
            current: RwLock::new(ChainMapSnapshot {
                entries: Arc::new(entries),
            }),
        }
    }

    pub fn snapshot(&self) -> ChainMapSnapshot {
        self.current.read().clone()
    }

    pub fn replace(&self, entries: Vec<ChainEntry>) {
        *self.current.write() = ChainMapSnapshot {
            entries: Arc::new(entries),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn covers_respects_half_open_bounds() {
        let entry = ChainEntry {
            name: "a".to_string(),
            head: addr(1),
            tail: addr(2),
            topics_start: Bound::Value("m".to_string()),
            topics_end: Bound::Value("z".to_string()),
        };
        assert!(entry.covers("m"));
        assert!(entry.covers("n"));
        assert!(!entry.covers("z"));
        assert!(!entry.covers("a"));
    }

    #[test]
    fn unbounded_sides_cover_everything_on_that_side() {
        let entry = ChainEntry {
            name: "a".to_string(),
            head: addr(1),
            tail: addr(2),
            topics_start: Bound::Unbounded,
            topics_end: Bound::Unbounded,
        };
        assert!(entry.covers(""));
        assert!(entry.covers("anything"));
    }

    #[test]
    fn snapshot_is_stable_across_replace() {
        let map = ChainMap::new(vec![]);
        let snapshot = map.snapshot();
        map.replace(vec![ChainEntry {
            name: "a".to_string(),
            head: addr(1),
            tail: addr(1),
            topics_start: Bound::Unbounded,
            topics_end: Bound::Unbounded,
        }]);
        assert!(snapshot.entries().is_empty());
        assert_eq!(map.snapshot().entries().len(), 1);
    }
}
