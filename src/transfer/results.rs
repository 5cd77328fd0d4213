//! Transfer result types
//!
//! Defines the byte streams and download descriptors returned by transfer
//! operations.

use bytes::Bytes;
use futures::Stream;
use std::fmt;
use std::io;
use std::pin::Pin;

/// Lazy, single-pass stream of byte chunks. Dropping it releases whatever
/// file handle or worker feeds it.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// A file download over an inclusive byte range
pub struct Download {
    pub stream: ByteStream,
    pub start: u64,
    pub end: u64,
    /// Total size of the file, not of the range
    pub size: u64,
}

impl Download {
    pub fn content_length(&self) -> u64 {
        if self.size == 0 {
            0
        } else {
            self.end - self.start + 1
        }
    }

    /// Whether the range covers less than the whole file
    pub fn is_partial(&self) -> bool {
        self.size > 0 && (self.start != 0 || self.end != self.size - 1)
    }

    /// 206 for a partial range, 200 otherwise
    pub fn status(&self) -> u16 {
        if self.is_partial() { 206 } else { 200 }
    }

    /// Value of the `Content-Range` header
    pub fn content_range(&self) -> String {
        if self.size == 0 {
            "bytes */0".to_string()
        } else {
            format!("bytes {}-{}/{}", self.start, self.end, self.size)
        }
    }

    pub fn into_stream(self) -> ByteStream {
        self.stream
    }
}

impl fmt::Debug for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Download")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
