//! Byte ranges
//!
//! Inclusive `start-end` offsets as carried by an HTTP `Range: bytes=` header.
//! A missing or unparsable bound falls back to the start or end of the file.

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ByteRange {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn from_start(start: u64) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// Parse a `bytes=start-end` header value.
    ///
    /// Returns `None` for values that are not byte ranges at all.
    pub fn parse_header(value: &str) -> Option<Self> {
        let bounds = value.trim().strip_prefix("bytes=")?;
        let (start, end) = bounds.split_once('-').unwrap_or((bounds, ""));

        Some(Self {
            start: start.trim().parse().ok(),
            end: end.trim().parse().ok(),
        })
    }

    /// Clamp to a file of `size` bytes, yielding inclusive `(start, end)`.
    ///
    /// Only the end is clamped to the last byte. A start past the end is not
    /// pulled back into the file; it fails with `RangeNotSatisfiable`, the
    /// way an HTTP server answers 416. An empty file has no addressable bytes
    /// and yields `None`.
    pub fn clamp(&self, size: u64) -> Result<Option<(u64, u64)>, StoreError> {
        if size == 0 {
            return Ok(None);
        }

        let last = size - 1;
        let start = self.start.unwrap_or(0);
        let end = self.end.map_or(last, |end| end.min(last));

        if start > end {
            return Err(StoreError::RangeNotSatisfiable { size });
        }
        Ok(Some((start, end)))
    }
}
