//! Configuration management for the RAX cloud store
//!
//! Settings come from an optional `cloud.toml` with `RAX_CLOUD_*` environment
//! overrides. Every field has a default so the store runs without a file.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Complete store configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    // ═══ STORAGE (Environment Override Supported) ═══
    /// Directory every resolvable path is confined to
    /// Environment: RAX_CLOUD_STORAGE_ROOT
    pub storage_root: String,

    // ═══ TRANSFER ═══
    /// Chunk size for streamed uploads and downloads
    pub buffer_size: usize,

    /// Maximum upload size in MB, 0 disables the limit
    /// Environment: RAX_CLOUD_MAX_UPLOAD_SIZE_MB
    pub max_upload_size_mb: u64,

    /// Deflate level used for directory archives (0-9)
    pub archive_compression_level: i64,

    // ═══ THUMBNAILS ═══
    /// Byte ceiling of the in-memory thumbnail cache
    pub thumbnail_cache_bytes: usize,

    pub thumbnail_width: u32,
    pub thumbnail_height: u32,

    /// External tools used to grab a video frame
    pub ffmpeg_path: String,
    pub ffprobe_path: String,

    // ═══ LIFECYCLE ═══
    /// How long a deleted path stays hidden from listings
    pub tombstone_window_secs: u64,

    /// Default log filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage_root: "./cloud".to_string(),
            buffer_size: 256 * 1024,
            max_upload_size_mb: 0,
            archive_compression_level: 9,
            thumbnail_cache_bytes: 10 * 1024 * 1024,
            thumbnail_width: 200,
            thumbnail_height: 200,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            tombstone_window_secs: 60,
            log_level: "info".to_string(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from cloud.toml with environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        // Docker production layout first, then the working directory
        let config_paths = ["rax-cloud-store/cloud", "cloud"];

        let mut builder = Config::builder();
        for config_path in &config_paths {
            builder = builder.add_source(File::with_name(config_path).required(false));
        }

        let settings = builder
            .add_source(Environment::with_prefix("RAX_CLOUD").try_parsing(true))
            .build()?;

        let config: StoreConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit file, still honouring environment overrides
    pub fn load_from(path: &str) -> Result<Self, config::ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("RAX_CLOUD").try_parsing(true))
            .build()?;

        let config: StoreConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Build a default configuration rooted at `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: root.into().to_string_lossy().into_owned(),
            ..Self::default()
        }
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.storage_root.is_empty() {
            return Err(config::ConfigError::Message(
                "storage_root cannot be empty".into(),
            ));
        }

        if self.buffer_size == 0 {
            return Err(config::ConfigError::Message(
                "buffer_size must be greater than 0".into(),
            ));
        }

        if !(0..=9).contains(&self.archive_compression_level) {
            return Err(config::ConfigError::Message(
                "archive_compression_level must be between 0 and 9".into(),
            ));
        }

        if self.thumbnail_width == 0 || self.thumbnail_height == 0 {
            return Err(config::ConfigError::Message(
                "thumbnail dimensions must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Get storage root as PathBuf
    pub fn storage_root_path(&self) -> PathBuf {
        PathBuf::from(&self.storage_root)
    }

    pub fn tombstone_window(&self) -> Duration {
        Duration::from_secs(self.tombstone_window_secs)
    }

    /// Upload limit in bytes, if one is configured
    pub fn max_upload_size_bytes(&self) -> Option<u64> {
        match self.max_upload_size_mb {
            0 => None,
            mb => Some(mb * 1024 * 1024),
        }
    }
}
