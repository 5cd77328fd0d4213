//! Path validation
//!
//! Turns caller-supplied path segments into absolute paths under the storage
//! root. A segment is a name made of letters, digits, `_`, `-`, `(`, `)` and
//! spaces, optionally followed by `.`-separated extensions that carry no
//! spaces. Anything else is rejected before it reaches the filesystem, so
//! `.`, `..`, separators and NUL can never form part of a resolved path.

use crate::error::StoreError;
use std::path::{Path, PathBuf};

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '(' | ')')
}

/// Check a single segment against the name grammar.
pub fn is_valid_segment(segment: &str) -> bool {
    let mut parts = segment.split('.');

    let stem = parts.next().unwrap_or_default();
    if stem.is_empty() || !stem.chars().all(|c| is_name_char(c) || c == ' ') {
        return false;
    }

    parts.all(|ext| !ext.is_empty() && ext.chars().all(is_name_char))
}

/// Resolve `segments` against `root`.
///
/// The empty sequence denotes the root itself.
pub fn resolve<S: AsRef<str>>(root: &Path, segments: &[S]) -> Result<PathBuf, StoreError> {
    let mut resolved = root.to_path_buf();

    for segment in segments {
        let segment = segment.as_ref();
        if !is_valid_segment(segment) {
            return Err(StoreError::InvalidPath(format!("{segment:?}")));
        }
        resolved.push(segment);
    }

    Ok(resolved)
}

/// Split a `/`-joined request path into validated segments.
///
/// Returns `Some(vec![])` for the empty string (the root) and `None` when
/// any segment is invalid, including empty segments from `//` or a trailing `/`.
pub fn parse_path(path: &str) -> Option<Vec<String>> {
    if path.is_empty() {
        return Some(Vec::new());
    }

    path.split('/')
        .map(|segment| is_valid_segment(segment).then(|| segment.to_string()))
        .collect()
}

/// Segments of the parent directory; the root is its own parent.
pub fn parent_segments<S: AsRef<str>>(segments: &[S]) -> Vec<String> {
    let keep = segments.len().saturating_sub(1);
    segments[..keep]
        .iter()
        .map(|s| s.as_ref().to_string())
        .collect()
}
