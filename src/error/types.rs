//! Error types
//!
//! Defines the error taxonomy of the storage engine and of thumbnail rendering.

use std::io;
use thiserror::Error;

/// Errors produced by file store operations.
///
/// Raw filesystem errors never leave the engine as-is: they are logged at the
/// operation boundary and carried here as a message.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("I/O failure: {0}")]
    Io(String),

    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),

    #[error("Upload too large: {received} bytes exceeds limit of {limit} bytes")]
    TooLarge { received: u64, limit: u64 },

    #[error("Range not satisfiable for size {size}")]
    RangeNotSatisfiable { size: u64 },
}

impl From<io::Error> for StoreError {
    fn from(error: io::Error) -> Self {
        if error.kind() == io::ErrorKind::NotFound {
            StoreError::NotFound(error.to_string())
        } else {
            StoreError::Io(error.to_string())
        }
    }
}

/// Errors produced while decoding or encoding a thumbnail.
///
/// These degrade to "no thumbnail" at the engine boundary.
#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Resize error: {0}")]
    Resize(#[from] fast_image_resize::ResizeError),

    #[error("Invalid thumbnail size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("{tool} failed: {message}")]
    Process { tool: String, message: String },

    #[error("Could not read video duration: {0}")]
    InvalidDuration(String),

    #[error("Video produced no frame")]
    EmptyFrame,

    #[error("Render task failed: {0}")]
    Task(String),
}
