//! Storage operations
//!
//! The `FileStore` engine and its lifecycle operations: metadata lookup,
//! directory listing and creation, rename and delete. Transfers live in
//! `crate::transfer` and thumbnails in `crate::thumbnail`.

use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

use crate::config::StoreConfig;
use crate::error::{StoreError, handle_error};
use crate::storage::filesystem::{
    directory_exists, is_staging_name, metadata_if_present, path_exists, remove_entry,
};
use crate::storage::results::{StorageUsage, StoredEntry};
use crate::storage::tombstone::TombstoneRegistry;
use crate::storage::validation::resolve;
use crate::thumbnail::{MediaRenderer, ThumbnailCache, ThumbnailRenderer};

/// File storage engine rooted at a single directory.
///
/// Every operation takes the target as path segments relative to the root
/// and validates them first. Share one instance between tasks with `Arc`.
pub struct FileStore {
    pub(crate) config: StoreConfig,
    pub(crate) root: PathBuf,
    pub(crate) tombstones: TombstoneRegistry,
    pub(crate) thumbnails: ThumbnailCache,
    pub(crate) renderer: Arc<dyn ThumbnailRenderer>,
}

impl FileStore {
    pub fn new(config: StoreConfig) -> Self {
        Self::with_renderer(config, Arc::new(MediaRenderer))
    }

    /// Build a store that renders thumbnails with `renderer`
    pub fn with_renderer(config: StoreConfig, renderer: Arc<dyn ThumbnailRenderer>) -> Self {
        Self {
            root: config.storage_root_path(),
            tombstones: TombstoneRegistry::new(config.tombstone_window()),
            thumbnails: ThumbnailCache::new(config.thumbnail_cache_bytes),
            renderer,
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn tombstones(&self) -> &TombstoneRegistry {
        &self.tombstones
    }

    pub fn thumbnails(&self) -> &ThumbnailCache {
        &self.thumbnails
    }

    pub(crate) fn resolve<S: AsRef<str>>(&self, segments: &[S]) -> Result<PathBuf, StoreError> {
        resolve(&self.root, segments)
    }

    /// Whether `path` exists as far as this store is concerned: present on
    /// disk and not recently deleted.
    pub(crate) async fn entry_exists(&self, path: &Path) -> bool {
        !self.tombstones.is_tombstoned(path) && path_exists(path).await
    }

    /// Check that the storage root is readable.
    ///
    /// An unavailable root only warns: it may be mounted later.
    pub async fn verify_root(&self) -> bool {
        match fs::read_dir(&self.root).await {
            Ok(_) => {
                info!("Storage root: {}", self.root.display());
                true
            }
            Err(e) => {
                warn!("Storage root {} not available: {}", self.root.display(), e);
                false
            }
        }
    }

    /// Metadata for the entry at `segments`
    pub async fn stat<S: AsRef<str>>(&self, segments: &[S]) -> Option<StoredEntry> {
        let path = self.resolve(segments).ok()?;
        if self.tombstones.is_tombstoned(&path) {
            return None;
        }

        let metadata = metadata_if_present(&path).await?;
        StoredEntry::from_metadata(path, &metadata)
    }

    /// Lists the contents of a directory, hiding recently deleted entries
    /// and uploads still in flight.
    ///
    /// Anything that is not a readable directory lists as empty.
    pub async fn list_directory<S: AsRef<str>>(&self, segments: &[S]) -> Vec<StoredEntry> {
        let path = match self.resolve(segments) {
            Ok(path) => path,
            Err(e) => {
                handle_error("list", &e);
                return Vec::new();
            }
        };

        if self.tombstones.is_tombstoned(&path) || !directory_exists(&path).await {
            return Vec::new();
        }

        let mut reader = match fs::read_dir(&path).await {
            Ok(reader) => reader,
            Err(e) => {
                error!("Failed to list directory {}: {}", path.display(), e);
                return Vec::new();
            }
        };

        let mut entries = Vec::new();
        loop {
            let entry = match reader.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read entry in {}: {}", path.display(), e);
                    break;
                }
            };

            if entry.file_name().to_str().is_some_and(is_staging_name) {
                continue;
            }
            let entry_path = entry.path();
            if self.tombstones.is_tombstoned(&entry_path) {
                continue;
            }

            // The entry may vanish between readdir and stat
            match fs::metadata(&entry_path).await {
                Ok(metadata) => {
                    if let Some(stored) = StoredEntry::from_metadata(entry_path, &metadata) {
                        entries.push(stored);
                    }
                }
                Err(e) => debug!("Skipping {}: {}", entry_path.display(), e),
            }
        }

        debug!("Listed directory {} - {} entries", path.display(), entries.len());
        entries
    }

    /// Create a directory and any missing ancestors
    pub async fn create_directory<S: AsRef<str>>(&self, segments: &[S]) -> Result<(), StoreError> {
        self.try_create_directory(segments)
            .await
            .inspect_err(|e| handle_error("create directory", e))
    }

    async fn try_create_directory<S: AsRef<str>>(&self, segments: &[S]) -> Result<(), StoreError> {
        let path = self.resolve(segments)?;
        if self.entry_exists(&path).await {
            return Err(StoreError::Conflict(format!(
                "{} already exists",
                path.display()
            )));
        }

        fs::create_dir_all(&path).await?;
        self.tombstones.revive(&path);
        info!("Created directory {}", path.display());
        Ok(())
    }

    /// Rename or move an entry.
    ///
    /// Cached thumbnails follow the entry to its new path before the
    /// filesystem rename, and move back if the rename fails.
    pub async fn rename<S: AsRef<str>, T: AsRef<str>>(
        &self,
        old_segments: &[S],
        new_segments: &[T],
        overwrite: bool,
    ) -> Result<(), StoreError> {
        self.try_rename(old_segments, new_segments, overwrite)
            .await
            .inspect_err(|e| handle_error("rename", e))
    }

    async fn try_rename<S: AsRef<str>, T: AsRef<str>>(
        &self,
        old_segments: &[S],
        new_segments: &[T],
        overwrite: bool,
    ) -> Result<(), StoreError> {
        if old_segments.is_empty() || new_segments.is_empty() {
            return Err(StoreError::InvalidPath(
                "the storage root cannot be renamed".into(),
            ));
        }

        let old_path = self.resolve(old_segments)?;
        let new_path = self.resolve(new_segments)?;

        if old_path == new_path {
            return Err(StoreError::Conflict(
                "new name is the same as the old name".into(),
            ));
        }
        if !self.entry_exists(&old_path).await {
            return Err(StoreError::NotFound(old_path.display().to_string()));
        }
        if !overwrite && self.entry_exists(&new_path).await {
            return Err(StoreError::Conflict(format!(
                "{} already exists",
                new_path.display()
            )));
        }

        if let Some(parent) = new_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Thumbnails of a replaced target must not outlive it
        self.thumbnails.remove_under(&new_path);
        let moved = self.thumbnails.rename(&old_path, &new_path);
        if let Err(e) = fs::rename(&old_path, &new_path).await {
            if moved > 0 {
                self.thumbnails.rename(&new_path, &old_path);
            }
            return Err(e.into());
        }

        self.tombstones.revive(&new_path);
        info!(
            "Renamed {} -> {} ({} cached thumbnails moved)",
            old_path.display(),
            new_path.display(),
            moved
        );
        Ok(())
    }

    /// Delete a file or directory tree and tombstone its path
    pub async fn delete<S: AsRef<str>>(&self, segments: &[S]) -> Result<(), StoreError> {
        self.try_delete(segments)
            .await
            .inspect_err(|e| handle_error("delete", e))
    }

    async fn try_delete<S: AsRef<str>>(&self, segments: &[S]) -> Result<(), StoreError> {
        if segments.is_empty() {
            return Err(StoreError::InvalidPath(
                "refusing to delete the storage root".into(),
            ));
        }

        let path = self.resolve(segments)?;
        if !self.entry_exists(&path).await {
            return Err(StoreError::NotFound(path.display().to_string()));
        }

        remove_entry(&path).await?;
        self.thumbnails.remove_under(&path);
        self.tombstones.mark_deleted(&path);

        info!("Deleted {}", path.display());
        Ok(())
    }

    /// Capacity of the filesystem that holds the storage root
    #[cfg(unix)]
    pub fn storage_usage(&self) -> Option<StorageUsage> {
        match nix::sys::statvfs::statvfs(&self.root) {
            Ok(stats) => {
                let fragment = stats.fragment_size() as u64;
                Some(StorageUsage::new(
                    stats.blocks() as u64 * fragment,
                    stats.blocks_available() as u64 * fragment,
                ))
            }
            Err(e) => {
                warn!("Failed to read usage of {}: {}", self.root.display(), e);
                None
            }
        }
    }

    #[cfg(not(unix))]
    pub fn storage_usage(&self) -> Option<StorageUsage> {
        None
    }
}
