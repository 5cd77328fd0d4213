//! Replies
//!
//! Status code, headers and body handed back to the web layer.

use bytes::Bytes;
use std::fmt;

use crate::error::{StoreError, error_to_status_code};
use crate::storage::StoredEntry;
use crate::transfer::{ByteStream, Download};

pub const OK: u16 = 200;
pub const PARTIAL_CONTENT: u16 = 206;
pub const BAD_REQUEST: u16 = 400;
pub const NOT_FOUND: u16 = 404;

const OCTET_STREAM: &str = "application/octet-stream";

pub enum ReplyBody {
    /// Human-readable outcome message
    Text(String),
    Bytes(Bytes),
    Stream(ByteStream),
}

pub struct Reply {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: ReplyBody,
}

impl Reply {
    pub fn success(message: impl Into<String>) -> Self {
        Self::text(OK, message)
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self::text(status, message)
    }

    /// Error reply carrying `message`, with the status `err` maps to
    pub fn from_error(err: &StoreError, message: impl Into<String>) -> Self {
        Self::text(error_to_status_code(err), message)
    }

    fn text(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: ReplyBody::Text(message.into()),
        }
    }

    /// 200/206 file download with range headers
    pub fn download(download: Download) -> Self {
        let headers = vec![
            ("Content-Type", OCTET_STREAM.to_string()),
            ("Content-Range", download.content_range()),
            ("Content-Length", download.content_length().to_string()),
            ("Accept-Ranges", "bytes".to_string()),
        ];

        Self {
            status: download.status(),
            headers,
            body: ReplyBody::Stream(download.into_stream()),
        }
    }

    /// Streamed zip archive of a directory; its length is not known up front
    pub fn archive(stream: ByteStream) -> Self {
        Self {
            status: OK,
            headers: vec![("Content-Type", OCTET_STREAM.to_string())],
            body: ReplyBody::Stream(stream),
        }
    }

    pub fn thumbnail(data: Bytes) -> Self {
        Self {
            status: OK,
            headers: vec![("Content-Length", data.len().to_string())],
            body: ReplyBody::Bytes(data),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Text body, if the reply carries one
    pub fn message(&self) -> Option<&str> {
        match &self.body {
            ReplyBody::Text(message) => Some(message),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match &self.body {
            ReplyBody::Text(message) => format!("{message:?}"),
            ReplyBody::Bytes(data) => format!("{} bytes", data.len()),
            ReplyBody::Stream(_) => "stream".to_string(),
        };

        f.debug_struct("Reply")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &body)
            .finish()
    }
}

/// What a browser page shows for a path: the entry itself and the contents
/// of the directory it lives in (or is)
#[derive(Debug, Clone)]
pub struct Listing {
    pub entry: StoredEntry,
    /// Segments of the listed directory
    pub directory: Vec<String>,
    pub files: Vec<String>,
    pub folders: Vec<String>,
}
