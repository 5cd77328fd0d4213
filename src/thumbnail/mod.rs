//! Thumbnail module for the file store
//!
//! Detects media by extension, renders previews of images and video frames,
//! and memoizes them in a size-bounded cache.

pub mod cache;
pub mod media;
pub mod operations;
pub mod render;
pub mod video;

// Re-export key types
pub use cache::ThumbnailCache;
pub use media::MediaKind;
pub use render::{MediaRenderer, RenderSource, ThumbnailRenderer};
