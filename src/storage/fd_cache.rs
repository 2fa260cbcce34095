//! LRU cache of open file descriptors for closed (non-active) segments.
//!
//! A partition keeps its active segment's files open for the lifetime of
//! the segment, but closed segments are opened on demand to satisfy a
//! fetch and would otherwise leak descriptors under a long-running
//! service with many small segments. This cache bounds that count; an
//! evicted entry simply gets reopened on next use.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

struct State {
    files: HashMap<PathBuf, Arc<File>>,
    /// Most-recently-used at the back.
    recency: VecDeque<PathBuf>,
    capacity: usize,
}

pub struct FdCache {
    state: Mutex<State>,
}

impl FdCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                files: HashMap::new(),
                recency: VecDeque::new(),
                capacity,
            }),
        }
    }

    /// Returns a shared handle for `path`, opening it read-only if it is
    /// not already cached, and evicting the least-recently-used entry if
    /// the cache is at capacity.
    pub fn open(&self, path: &Path) -> io::Result<Arc<File>> {
        let mut state = self.state.lock();

        if let Some(file) = state.files.get(path).cloned() {
            state.touch(path);
            return Ok(file);
        }

        let file = Arc::new(File::open(path)?);

        if state.files.len() >= state.capacity {
            if let Some(lru) = state.recency.pop_front() {
                state.files.remove(&lru);
            }
        }

        state.files.insert(path.to_path_buf(), Arc::clone(&file));
        state.recency.push_back(path.to_path_buf());
        Ok(file)
    }

    pub fn evict(&self, path: &Path) {
        let mut state = self.state.lock();
        state.files.remove(path);
        state.recency.retain(|p| p != path);
    }

    pub fn len(&self) -> usize {
        self.state.lock().files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl State {
    fn touch(&mut self, path: &Path) {
        if let Some(pos) = self.recency.iter().position(|p| p == path) {
            self.recency.remove(pos);
        }
        self.recency.push_back(path.to_path_buf());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn opens_and_reuses() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a");
        std::fs::File::create(&path).unwrap().write_all(b"x").unwrap();

        let cache = FdCache::new(2);
        let a = cache.open(&path).unwrap();
        let b = cache.open(&path).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn evicts_least_recently_used() {
        let dir = tempdir().unwrap();
        let paths: Vec<_> = (0..3)
            .map(|i| {
                let p = dir.path().join(format!("{i}"));
                std::fs::File::create(&p).unwrap();
                p
            })
            .collect();

        let cache = FdCache::new(2);
        cache.open(&paths[0]).unwrap();
        cache.open(&paths[1]).unwrap();
        cache.open(&paths[2]).unwrap();

        assert_eq!(cache.len(), 2);
        assert!(!cache.is_empty());
    }
}
