//! Request handlers for the file store.
//!
//! This module maps request-shaped inputs (path strings, range and flag
//! headers, selection query values) onto store operations and turns their
//! outcome into replies the web layer can send as-is.

use log::{debug, info};

use crate::error::{StoreError, handle_error};
use crate::protocol::requests::{Request, RequestBody, parse_selection, preserve_extension};
use crate::protocol::responses::{BAD_REQUEST, Listing, NOT_FOUND, Reply};
use crate::storage::{FileStore, parent_segments, parse_path};
use crate::transfer::ByteRange;

/// Dispatches a request to its handler.
pub async fn handle_request(store: &FileStore, request: Request) -> Reply {
    debug!("Handling {request:?}");

    match request {
        Request::Get {
            path,
            range,
            thumbnail,
            files,
            folders,
        } => {
            handle_get(
                store,
                &path,
                range.as_deref(),
                thumbnail,
                files.as_deref(),
                folders.as_deref(),
            )
            .await
        }
        Request::Post {
            path,
            overwrite,
            is_folder,
            body,
        } => handle_post(store, &path, overwrite, is_folder, body).await,
        Request::Put {
            path,
            new_path,
            overwrite,
        } => handle_put(store, &path, new_path.as_deref(), overwrite).await,
        Request::Delete { path } => handle_delete(store, &path).await,
    }
}

/// Handles GET: a thumbnail, a (ranged) file download, or a directory archive.
async fn handle_get(
    store: &FileStore,
    path: &str,
    range: Option<&str>,
    thumbnail: bool,
    files: Option<&str>,
    folders: Option<&str>,
) -> Reply {
    let Some(segments) = parse_path(path) else {
        return Reply::error(BAD_REQUEST, "Invalid path");
    };
    let Some(entry) = store.stat(&segments).await else {
        return Reply::error(NOT_FOUND, "File not found");
    };

    if thumbnail {
        let (width, height) = (store.config().thumbnail_width, store.config().thumbnail_height);
        return match store.thumbnail_result(&segments, width, height).await {
            Ok(data) => Reply::thumbnail(data),
            Err(e) => {
                handle_error("thumbnail", &e);
                Reply::from_error(&e, "Failed to generate thumbnail")
            }
        };
    }

    if entry.is_dir() {
        let files = parse_selection(files);
        let folders = parse_selection(folders);
        return match store
            .archive_directory(&segments, files.as_deref(), folders.as_deref())
            .await
        {
            Ok(stream) => Reply::archive(stream),
            Err(e) => Reply::from_error(&e, "Failed to download file"),
        };
    }

    let range = range.and_then(ByteRange::parse_header);
    match store.download(&segments, range).await {
        Ok(download) => Reply::download(download),
        Err(StoreError::RangeNotSatisfiable { size }) => {
            let mut reply = Reply::from_error(
                &StoreError::RangeNotSatisfiable { size },
                "Range not satisfiable",
            );
            reply.headers.push(("Content-Range", format!("bytes */{size}")));
            reply
        }
        Err(e) => Reply::from_error(&e, "Failed to download file"),
    }
}

/// Handles POST: creates a folder or uploads the request body as a file.
async fn handle_post(
    store: &FileStore,
    path: &str,
    overwrite: bool,
    is_folder: bool,
    body: RequestBody,
) -> Reply {
    let Some(segments) = parse_path(path) else {
        return Reply::error(BAD_REQUEST, "Invalid path");
    };

    if is_folder {
        return match store.create_directory(&segments).await {
            Ok(()) => Reply::success("Folder created"),
            Err(e @ StoreError::Conflict(_)) => Reply::from_error(&e, "File already exists"),
            Err(e) => Reply::from_error(&e, "Failed to create folder"),
        };
    }

    match store.upload(&segments, body, overwrite).await {
        Ok(bytes) => {
            info!("Stored {path} ({bytes} bytes)");
            Reply::success("File uploaded")
        }
        Err(e @ StoreError::Conflict(_)) => Reply::from_error(&e, "File already exists"),
        Err(e) => Reply::from_error(&e, "Failed to upload file"),
    }
}

/// Handles PUT: renames `path` to `new_path`, keeping the file extension.
///
/// On success the reply message is the new path.
async fn handle_put(
    store: &FileStore,
    path: &str,
    new_path: Option<&str>,
    overwrite: bool,
) -> Reply {
    let old_segments = match parse_path(path) {
        Some(segments) if !segments.is_empty() => segments,
        _ => return Reply::error(BAD_REQUEST, "Invalid old path"),
    };
    let mut new_segments = match new_path.map(str::trim).and_then(parse_path) {
        Some(segments) if !segments.is_empty() => segments,
        _ => return Reply::error(BAD_REQUEST, "Invalid new path"),
    };

    preserve_extension(&old_segments, &mut new_segments);
    if old_segments == new_segments {
        return Reply::error(BAD_REQUEST, "New name is the same as the old name");
    }

    match store.rename(&old_segments, &new_segments, overwrite).await {
        Ok(()) => Reply::success(new_segments.join("/")),
        Err(e @ StoreError::Conflict(_)) => Reply::from_error(&e, "New Filename already exists"),
        Err(e @ StoreError::NotFound(_)) => Reply::from_error(&e, "File not found"),
        Err(e @ StoreError::InvalidPath(_)) => Reply::from_error(&e, "Invalid new path"),
        Err(e) => Reply::from_error(&e, "Failed to rename file"),
    }
}

/// Handles DELETE: removes a file or a whole directory.
async fn handle_delete(store: &FileStore, path: &str) -> Reply {
    let Some(segments) = parse_path(path) else {
        return Reply::error(BAD_REQUEST, "Invalid path");
    };

    match store.delete(&segments).await {
        Ok(()) => Reply::success("File deleted"),
        Err(e) => Reply::from_error(&e, "Failed to delete file"),
    }
}

/// Loads what a browser page shows for `path`.
///
/// For a directory the listing is its own content; for a file it is the
/// content of the directory holding it.
pub async fn browse(store: &FileStore, path: &str) -> Result<Listing, StoreError> {
    let segments =
        parse_path(path).ok_or_else(|| StoreError::InvalidPath(format!("{path:?}")))?;
    let entry = store
        .stat(&segments)
        .await
        .ok_or_else(|| StoreError::NotFound(path.to_string()))?;

    let directory = if entry.is_dir() {
        segments
    } else {
        parent_segments(&segments)
    };

    let (folders, files): (Vec<_>, Vec<_>) = store
        .list_directory(&directory)
        .await
        .into_iter()
        .partition(|child| child.is_dir());

    Ok(Listing {
        entry,
        directory,
        files: files.into_iter().map(|child| child.name).collect(),
        folders: folders.into_iter().map(|child| child.name).collect(),
    })
}
