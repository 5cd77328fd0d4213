//! Transfer module for the file store
//!
//! Handles streamed uploads, full and ranged downloads, and directory
//! archives.

pub mod archive;
pub mod file_ops;
pub mod range;
pub mod results;

// Re-export key types
pub use range::ByteRange;
pub use results::{ByteStream, Download};
