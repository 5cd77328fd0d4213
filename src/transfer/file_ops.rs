//! Module `file_ops`
//!
//! Streamed file upload and (ranged) download for the file store. Uploads
//! are written chunk by chunk into a hidden sibling staging file that
//! replaces the target only once every byte has landed; downloads are lazy streams
//! over an open file handle.

use futures::StreamExt;
use log::{debug, error, info, warn};
use std::io::{ErrorKind, SeekFrom};
use std::path::Path;
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;

use crate::error::{StoreError, handle_error};
use crate::storage::FileStore;
use crate::storage::filesystem::{create_staging_file, file_exists, metadata_if_present};
use crate::transfer::range::ByteRange;
use crate::transfer::results::Download;

impl FileStore {
    /// Upload `reader` to the file at `segments`, returning the bytes written.
    ///
    /// Parent directories are created as needed. An existing file is only
    /// replaced when `overwrite` is set, or when the path was deleted within
    /// the tombstone window. On failure the partial upload is removed and any
    /// previous content stays in place.
    pub async fn upload<S, R>(
        &self,
        segments: &[S],
        reader: R,
        overwrite: bool,
    ) -> Result<u64, StoreError>
    where
        S: AsRef<str>,
        R: AsyncRead + Unpin,
    {
        self.try_upload(segments, reader, overwrite)
            .await
            .inspect_err(|e| handle_error("upload", e))
    }

    async fn try_upload<S, R>(
        &self,
        segments: &[S],
        reader: R,
        mut overwrite: bool,
    ) -> Result<u64, StoreError>
    where
        S: AsRef<str>,
        R: AsyncRead + Unpin,
    {
        if segments.is_empty() {
            return Err(StoreError::InvalidPath(
                "cannot upload to the storage root".into(),
            ));
        }

        let target = self.resolve(segments)?;

        if self.tombstones.revive(&target) {
            debug!("{} was just deleted, overwriting", target.display());
            overwrite = true;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        if let Some(metadata) = metadata_if_present(&target).await {
            if metadata.is_dir() {
                return Err(StoreError::Conflict(format!(
                    "{} is a directory",
                    target.display()
                )));
            }
            if !overwrite {
                return Err(StoreError::Conflict(format!(
                    "{} already exists",
                    target.display()
                )));
            }
        }

        // Dropping `temp_path` removes the staging file if this upload is cancelled
        let (temp_file, temp_path) = create_staging_file(&target).await?;

        info!(
            "Starting upload: {} -> {}",
            temp_path.display(),
            target.display()
        );

        let written = match self.write_chunks(reader, temp_file).await {
            Ok(written) => written,
            Err(e) => {
                discard_partial(&temp_path).await;
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&temp_path, &target).await {
            error!(
                "Failed to move {} to {}: {}",
                temp_path.display(),
                target.display(),
                e
            );
            discard_partial(&temp_path).await;
            return Err(StoreError::Io(e.to_string()));
        }
        // The staging file is now the target; nothing left to clean up
        let _ = temp_path.keep();

        // Whatever was cached for the replaced content is stale
        self.thumbnails.remove(&target);

        info!(
            "Upload completed: {} ({} bytes)",
            target.display(),
            written
        );
        Ok(written)
    }

    /// Copy `reader` into `file` one buffer at a time, enforcing the upload limit
    async fn write_chunks<R>(&self, mut reader: R, mut file: File) -> Result<u64, StoreError>
    where
        R: AsyncRead + Unpin,
    {
        let limit = self.config.max_upload_size_bytes();
        let mut buffer = vec![0u8; self.config.buffer_size];
        let mut total_bytes_received = 0u64;

        loop {
            let n = reader
                .read(&mut buffer)
                .await
                .map_err(|e| StoreError::Io(format!("upload stream failed: {e}")))?;
            if n == 0 {
                break;
            }

            // Check the size limit before writing (fail fast)
            total_bytes_received += n as u64;
            if let Some(limit) = limit {
                if total_bytes_received > limit {
                    return Err(StoreError::TooLarge {
                        received: total_bytes_received,
                        limit,
                    });
                }
            }

            file.write_all(&buffer[..n])
                .await
                .map_err(|e| StoreError::Io(format!("write failed: {e}")))?;
        }

        // Wait for in-flight writes before the file is renamed
        file.flush()
            .await
            .map_err(|e| StoreError::Io(format!("flush failed: {e}")))?;

        Ok(total_bytes_received)
    }

    /// Stream the file at `segments`, optionally restricted to `range`.
    pub async fn download<S: AsRef<str>>(
        &self,
        segments: &[S],
        range: Option<ByteRange>,
    ) -> Result<Download, StoreError> {
        self.try_download(segments, range)
            .await
            .inspect_err(|e| handle_error("download", e))
    }

    async fn try_download<S: AsRef<str>>(
        &self,
        segments: &[S],
        range: Option<ByteRange>,
    ) -> Result<Download, StoreError> {
        let path = self.resolve(segments)?;
        if self.tombstones.is_tombstoned(&path) {
            return Err(StoreError::NotFound(path.display().to_string()));
        }

        let mut file = File::open(&path).await?;
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(StoreError::NotFound(format!(
                "{} is not a file",
                path.display()
            )));
        }

        let size = metadata.len();
        let (start, end) = range.unwrap_or_default().clamp(size)?.unwrap_or((0, 0));
        let length = if size == 0 { 0 } else { end - start + 1 };

        if start > 0 {
            file.seek(SeekFrom::Start(start)).await?;
        }
        debug!(
            "Download {} bytes {}-{} of {}",
            path.display(),
            start,
            end,
            size
        );

        let label = path.display().to_string();
        let stream = ReaderStream::with_capacity(file.take(length), self.config.buffer_size)
            .inspect(move |chunk| {
                if let Err(e) = chunk {
                    error!("Read error on {label}: {e}");
                }
            });

        Ok(Download {
            stream: Box::pin(stream),
            start,
            end,
            size,
        })
    }

    /// Read a whole file into memory
    pub async fn read_file<S: AsRef<str>>(&self, segments: &[S]) -> Result<Vec<u8>, StoreError> {
        let result = async {
            let path = self.resolve(segments)?;
            if self.tombstones.is_tombstoned(&path) || !file_exists(&path).await {
                return Err(StoreError::NotFound(path.display().to_string()));
            }
            Ok::<_, StoreError>(fs::read(&path).await?)
        }
        .await;

        result.inspect_err(|e| handle_error("read", e))
    }
}

/// Best-effort removal of a partially written upload
async fn discard_partial(temp_path: &Path) {
    match fs::remove_file(temp_path).await {
        Ok(()) => debug!("Removed partial upload {}", temp_path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(
            "Failed to remove partial upload {}: {}",
            temp_path.display(),
            e
        ),
    }
}
