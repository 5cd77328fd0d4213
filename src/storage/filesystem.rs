//! File system helpers
//!
//! Thin async wrappers over `tokio::fs` used by the store operations. An
//! entry that cannot be stat'ed is treated as absent.

use std::fs::Metadata;
use std::io;
use std::path::Path;
use tempfile::TempPath;
use tokio::{fs, task};

/// Metadata for `path`, or `None` when it is missing or inaccessible
pub async fn metadata_if_present(path: &Path) -> Option<Metadata> {
    fs::metadata(path).await.ok()
}

/// Check if an entry exists and can be stat'ed
pub async fn path_exists(path: &Path) -> bool {
    metadata_if_present(path).await.is_some()
}

/// Check if file exists
pub async fn file_exists(path: &Path) -> bool {
    metadata_if_present(path)
        .await
        .is_some_and(|metadata| metadata.is_file())
}

/// Check if directory exists
pub async fn directory_exists(path: &Path) -> bool {
    metadata_if_present(path)
        .await
        .is_some_and(|metadata| metadata.is_dir())
}

/// Remove a file or a whole directory tree
pub async fn remove_entry(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path).await?;
    if metadata.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    }
}

/// Suffix of files that hold an upload in flight
const STAGING_SUFFIX: &str = ".upload";

/// Create a uniquely named staging file next to `target`.
///
/// Staging names start with a dot, which no valid path segment does, so
/// they never collide with stored entries. Dropping the returned `TempPath`
/// removes the file unless it was moved into place.
pub async fn create_staging_file(target: &Path) -> io::Result<(fs::File, TempPath)> {
    let dir = target.parent().map(Path::to_path_buf).unwrap_or_default();
    let prefix = format!(
        ".{}.",
        target
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default()
    );

    let staged = task::spawn_blocking(move || {
        tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(STAGING_SUFFIX)
            .tempfile_in(dir)
    })
    .await
    .map_err(io::Error::other)??;

    let (file, path) = staged.into_parts();
    Ok((fs::File::from_std(file), path))
}

/// Whether `name` is an upload staging file rather than a stored entry
pub fn is_staging_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(STAGING_SUFFIX)
}
