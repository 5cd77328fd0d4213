//! Thumbnail operations of the file store

use bytes::Bytes;
use log::{debug, info};
use std::path::Path;
use std::sync::Arc;
use tokio::task;

use crate::error::{StoreError, ThumbnailError, handle_error};
use crate::storage::FileStore;
use crate::storage::filesystem::file_exists;
use crate::thumbnail::media::MediaKind;
use crate::thumbnail::render::RenderSource;
use crate::thumbnail::video::extract_frame;

impl FileStore {
    /// Thumbnail for the image or video at `segments`, fitted within
    /// `width x height`.
    ///
    /// Results are cached by path; the cached buffer is returned as-is on
    /// later requests. Any failure means "no thumbnail".
    pub async fn thumbnail<S: AsRef<str>>(
        &self,
        segments: &[S],
        width: u32,
        height: u32,
    ) -> Option<Bytes> {
        self.thumbnail_result(segments, width, height)
            .await
            .inspect_err(|e| handle_error("thumbnail", e))
            .ok()
    }

    /// Thumbnail at the configured default size
    pub async fn default_thumbnail<S: AsRef<str>>(&self, segments: &[S]) -> Option<Bytes> {
        self.thumbnail(
            segments,
            self.config.thumbnail_width,
            self.config.thumbnail_height,
        )
        .await
    }

    /// Like [`FileStore::thumbnail`], but says why no thumbnail was produced.
    pub async fn thumbnail_result<S: AsRef<str>>(
        &self,
        segments: &[S],
        width: u32,
        height: u32,
    ) -> Result<Bytes, StoreError> {
        let path = self.resolve(segments)?;
        if self.tombstones.is_tombstoned(&path) || !file_exists(&path).await {
            return Err(StoreError::NotFound(path.display().to_string()));
        }

        let Some(kind) = MediaKind::from_path(&path) else {
            return Err(StoreError::UnsupportedMedia(format!(
                "{} is neither an image nor a video",
                path.display()
            )));
        };

        if let Some(cached) = self.thumbnails.get(&path) {
            debug!("Thumbnail cache hit for {}", path.display());
            return Ok(cached);
        }

        let source = match kind {
            MediaKind::Image => RenderSource::File(path.clone()),
            MediaKind::Video => {
                let frame = extract_frame(&self.config.ffprobe_path, &self.config.ffmpeg_path, &path)
                    .await
                    .map_err(|e| thumbnail_failure(&path, e))?;
                RenderSource::Encoded(frame)
            }
        };

        let renderer = Arc::clone(&self.renderer);
        let rendered = task::spawn_blocking(move || renderer.render(&source, width, height))
            .await
            .map_err(|e| ThumbnailError::Task(e.to_string()))
            .and_then(|result| result)
            .map_err(|e| thumbnail_failure(&path, e))?;

        let data = Bytes::from(rendered);
        self.thumbnails.put(&path, data.clone());
        info!(
            "Generated thumbnail for {} ({} bytes)",
            path.display(),
            data.len()
        );
        Ok(data)
    }
}

fn thumbnail_failure(path: &Path, err: ThumbnailError) -> StoreError {
    StoreError::UnsupportedMedia(format!(
        "failed to generate thumbnail for {}: {err}",
        path.display()
    ))
}
