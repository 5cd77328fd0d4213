//! Thumbnail cache
//!
//! In-memory map from an absolute path to its encoded thumbnail, bounded by a
//! total byte ceiling. Eviction is first-in-first-out by insertion; reading an
//! entry does not move it.

use bytes::Bytes;
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

struct CacheEntry {
    data: Bytes,
    seq: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<PathBuf, CacheEntry>,
    // Insertion sequence -> key, oldest first
    order: BTreeMap<u64, PathBuf>,
    next_seq: u64,
    total_bytes: usize,
}

impl CacheState {
    fn insert(&mut self, key: PathBuf, data: Bytes) {
        self.take(&key);

        let seq = self.next_seq;
        self.next_seq += 1;
        self.total_bytes += data.len();
        self.order.insert(seq, key.clone());
        self.entries.insert(key, CacheEntry { data, seq });
    }

    fn take(&mut self, key: &Path) -> Option<Bytes> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.seq);
        self.total_bytes -= entry.data.len();
        Some(entry.data)
    }

    fn trim(&mut self, max_bytes: usize) {
        while self.total_bytes > max_bytes {
            let Some((_, key)) = self.order.pop_first() else {
                break;
            };
            if let Some(entry) = self.entries.remove(&key) {
                self.total_bytes -= entry.data.len();
                debug!("Evicted thumbnail for {} ({} bytes)", key.display(), entry.data.len());
            }
        }
    }

    fn keys_under(&self, prefix: &Path) -> Vec<PathBuf> {
        self.entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect()
    }
}

/// Size-bounded thumbnail cache, safe to share between tasks.
pub struct ThumbnailCache {
    max_bytes: usize,
    state: Mutex<CacheState>,
}

impl ThumbnailCache {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            state: Mutex::new(CacheState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &Path) -> Option<Bytes> {
        self.state().entries.get(key).map(|entry| entry.data.clone())
    }

    /// Store `data` under `key`, then evict the oldest entries until the
    /// cache is back under its ceiling. Replacing a key counts as a new insertion.
    pub fn put(&self, key: &Path, data: Bytes) {
        let mut state = self.state();
        state.insert(key.to_path_buf(), data);
        state.trim(self.max_bytes);
    }

    pub fn remove(&self, key: &Path) {
        self.state().take(key);
    }

    /// Drop `prefix` and every key beneath it.
    pub fn remove_under(&self, prefix: &Path) {
        let mut state = self.state();
        for key in state.keys_under(prefix) {
            state.take(&key);
        }
    }

    /// Move the entry for `from`, and those of any paths beneath it, to the
    /// matching keys under `to`. Returns the number of entries moved.
    pub fn rename(&self, from: &Path, to: &Path) -> usize {
        let mut state = self.state();
        let keys = state.keys_under(from);

        let mut moved = 0;
        for key in keys {
            let Ok(rest) = key.strip_prefix(from) else {
                continue;
            };
            let target = if rest.as_os_str().is_empty() {
                to.to_path_buf()
            } else {
                to.join(rest)
            };
            if let Some(data) = state.take(&key) {
                state.insert(target, data);
                moved += 1;
            }
        }

        state.trim(self.max_bytes);
        moved
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_bytes(&self) -> usize {
        self.state().total_bytes
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}
