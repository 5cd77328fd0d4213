//! Module `requests`
//!
//! Request-shaped inputs for the file store: the path string, header flags and
//! query values the web layer receives, plus the helpers that turn them into
//! engine arguments.

use std::fmt;
use tokio::io::AsyncRead;

/// Upload body read by the store chunk by chunk
pub type RequestBody = Box<dyn AsyncRead + Send + Unpin>;

/// A request against `/api/file/<path>`.
pub enum Request {
    /// Download a file or archive a directory
    Get {
        path: String,
        /// `Range` header
        range: Option<String>,
        /// `thumbnail` query flag
        thumbnail: bool,
        /// `files` query value, comma separated
        files: Option<String>,
        /// `folders` query value, comma separated
        folders: Option<String>,
    },
    /// Upload a file, or create a folder when `is_folder` is set
    Post {
        path: String,
        /// `X-Overwrite` header
        overwrite: bool,
        /// `X-Is-Folder` header
        is_folder: bool,
        body: RequestBody,
    },
    /// Rename or move to `X-New-Path`
    Put {
        path: String,
        new_path: Option<String>,
        overwrite: bool,
    },
    Delete {
        path: String,
    },
}

impl Request {
    pub fn method(&self) -> &'static str {
        match self {
            Request::Get { .. } => "GET",
            Request::Post { .. } => "POST",
            Request::Put { .. } => "PUT",
            Request::Delete { .. } => "DELETE",
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Request::Get { path, .. }
            | Request::Post { path, .. }
            | Request::Put { path, .. }
            | Request::Delete { path } => path,
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} /{}", self.method(), self.path())
    }
}

/// Interpret a `true|false` header; anything but `true` is false.
pub fn parse_flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}

/// Split a comma separated selection, trimming each name and dropping empties.
pub fn parse_selection(value: Option<&str>) -> Option<Vec<String>> {
    value.map(|v| {
        v.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    })
}

/// Final extension of a name, if it has one
fn extension(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(_, ext)| ext)
}

/// Keep the file type across a rename: when the new name does not end with
/// the old name's extension, that extension is appended.
pub fn preserve_extension(old: &[String], new: &mut [String]) {
    let (Some(old_name), Some(new_name)) = (old.last(), new.last_mut()) else {
        return;
    };
    let Some(old_ext) = extension(old_name) else {
        return;
    };

    if extension(new_name) != Some(old_ext) {
        new_name.push('.');
        new_name.push_str(old_ext);
    }
}
