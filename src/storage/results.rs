//! Storage result types
//!
//! Defines the values returned by listing, metadata and usage operations.

use std::fs::Metadata;
use std::path::PathBuf;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// A file or directory under the storage root
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub name: String,
    pub path: PathBuf,
    pub kind: EntryKind,
    /// Byte size; 0 for directories
    pub size: u64,
    /// Birth time, or modification time where the platform has none
    pub created: Option<SystemTime>,
    pub modified: Option<SystemTime>,
}

impl StoredEntry {
    /// Build an entry from filesystem metadata. Returns `None` for anything
    /// that is neither a regular file nor a directory.
    pub(crate) fn from_metadata(path: PathBuf, metadata: &Metadata) -> Option<Self> {
        let kind = if metadata.is_file() {
            EntryKind::File
        } else if metadata.is_dir() {
            EntryKind::Directory
        } else {
            return None;
        };

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let modified = metadata.modified().ok();

        Some(Self {
            name,
            path,
            kind,
            size: if kind == EntryKind::File { metadata.len() } else { 0 },
            created: metadata.created().ok().or(modified),
            modified,
        })
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Capacity of the filesystem holding the storage root
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StorageUsage {
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub used_bytes: u64,
    pub used_percent: f64,
}

impl StorageUsage {
    pub fn new(total_bytes: u64, free_bytes: u64) -> Self {
        let used_bytes = total_bytes.saturating_sub(free_bytes);
        let used_percent = if total_bytes == 0 {
            0.0
        } else {
            used_bytes as f64 * 100.0 / total_bytes as f64
        };

        Self {
            total_bytes,
            free_bytes,
            used_bytes,
            used_percent,
        }
    }
}
