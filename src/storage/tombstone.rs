//! Module `tombstone`
//!
//! Tracks paths that were deleted moments ago. Some filesystems (network
//! mounts, virtualized volumes) keep a removed entry visible to directory
//! reads for a short while; a tombstone hides the path from this store's
//! own listings until its window elapses, and tells a fresh upload to the
//! same path to overwrite instead of reporting a conflict.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Registry of recently deleted absolute paths, each with an expiry deadline.
///
/// Expired entries are dropped on every call, so no background task is needed.
pub struct TombstoneRegistry {
    window: Duration,
    entries: Mutex<HashMap<PathBuf, Instant>>,
}

impl TombstoneRegistry {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Lock the map and purge entries whose window has elapsed.
    fn live_entries(&self) -> MutexGuard<'_, HashMap<PathBuf, Instant>> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        entries.retain(|_, deadline| *deadline > now);
        entries
    }

    /// Record `path` as deleted. Marking a path that is already present
    /// restarts its window.
    pub fn mark_deleted(&self, path: &Path) {
        let deadline = Instant::now() + self.window;
        self.live_entries().insert(path.to_path_buf(), deadline);
    }

    pub fn is_tombstoned(&self, path: &Path) -> bool {
        self.live_entries().contains_key(path)
    }

    /// Remove the tombstone for `path`. Returns whether one was present.
    pub fn clear(&self, path: &Path) -> bool {
        self.live_entries().remove(path).is_some()
    }

    /// Clear `path` and every tombstoned ancestor of it, used when an entry
    /// is created again beneath a directory that was just deleted.
    ///
    /// Returns whether `path` itself was tombstoned.
    pub fn revive(&self, path: &Path) -> bool {
        let mut entries = self.live_entries();
        let was_tombstoned = entries.remove(path).is_some();
        for ancestor in path.ancestors().skip(1) {
            entries.remove(ancestor);
        }
        was_tombstoned
    }

    pub fn len(&self) -> usize {
        self.live_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
