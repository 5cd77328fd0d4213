//! Module `archive`
//!
//! Streams a directory as a zip archive. The archive is written on a
//! blocking worker into a bounded channel; the caller pulls chunks from the
//! other end, so the worker never runs more than a few chunks ahead and
//! stops at its next write once the stream is dropped.

use bytes::{Bytes, BytesMut};
use log::{debug, error, info, warn};
use std::fs::File;
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task;
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{StoreError, handle_error};
use crate::storage::FileStore;
use crate::storage::filesystem::{directory_exists, is_staging_name, metadata_if_present};
use crate::storage::validation::{parse_path, resolve};
use crate::transfer::results::ByteStream;

/// Chunks buffered between the archive worker and the consumer
const ARCHIVE_CHANNEL_DEPTH: usize = 4;

/// One item to put in the archive
#[derive(Debug)]
enum ArchiveSource {
    /// A single file stored under `name`
    File { path: PathBuf, name: String },
    /// A directory tree, entries named relative to it behind `prefix`
    Tree { path: PathBuf, prefix: Option<String> },
}

impl FileStore {
    /// Stream the directory at `segments` as a zip archive.
    ///
    /// With a selection, only the named files and folders (relative to the
    /// directory) are archived, each under its given name. Without one, the
    /// whole directory is archived under names relative to it.
    pub async fn archive_directory<S: AsRef<str>>(
        &self,
        segments: &[S],
        selected_files: Option<&[String]>,
        selected_folders: Option<&[String]>,
    ) -> Result<ByteStream, StoreError> {
        self.try_archive_directory(segments, selected_files, selected_folders)
            .await
            .inspect_err(|e| handle_error("archive", e))
    }

    async fn try_archive_directory<S: AsRef<str>>(
        &self,
        segments: &[S],
        selected_files: Option<&[String]>,
        selected_folders: Option<&[String]>,
    ) -> Result<ByteStream, StoreError> {
        let dir = self.resolve(segments)?;
        if self.tombstones.is_tombstoned(&dir) || !directory_exists(&dir).await {
            return Err(StoreError::NotFound(dir.display().to_string()));
        }

        let sources = if selected_files.is_none() && selected_folders.is_none() {
            vec![ArchiveSource::Tree {
                path: dir.clone(),
                prefix: None,
            }]
        } else {
            self.selected_sources(
                &dir,
                selected_files.unwrap_or_default(),
                selected_folders.unwrap_or_default(),
            )
            .await
        };

        let (tx, rx) = mpsc::channel::<io::Result<Bytes>>(ARCHIVE_CHANNEL_DEPTH);
        let level = self.config.archive_compression_level;
        let chunk_size = self.config.buffer_size;
        let label = dir.display().to_string();

        task::spawn_blocking(move || {
            let sink = ChannelWriter::new(tx.clone(), chunk_size);
            match write_archive(sink, &sources, level) {
                Ok(entries) => info!("Archived {label} ({entries} entries)"),
                Err(e) if tx.is_closed() => debug!("Archive of {label} abandoned: {e}"),
                Err(e) => {
                    error!("Archive of {label} failed: {e}");
                    let _ = tx.blocking_send(Err(e));
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (chunk, rx))
        });
        Ok(Box::pin(stream))
    }

    /// Resolve the selected names, skipping any that are invalid or missing
    async fn selected_sources(
        &self,
        dir: &Path,
        files: &[String],
        folders: &[String],
    ) -> Vec<ArchiveSource> {
        let mut sources = Vec::new();

        let selections = files
            .iter()
            .map(|name| (name, false))
            .chain(folders.iter().map(|name| (name, true)));

        for (name, is_folder) in selections {
            let Some(path) = parse_path(name).and_then(|segments| resolve(dir, &segments).ok())
            else {
                warn!("Skipping invalid archive selection {name:?}");
                continue;
            };
            if self.tombstones.is_tombstoned(&path) {
                continue;
            }

            let metadata = metadata_if_present(&path).await;
            let source = match (is_folder, metadata) {
                (true, Some(metadata)) if metadata.is_dir() => ArchiveSource::Tree {
                    path,
                    prefix: Some(name.clone()),
                },
                (false, Some(metadata)) if metadata.is_file() => ArchiveSource::File {
                    path,
                    name: name.clone(),
                },
                _ => {
                    warn!("Skipping missing archive selection {name:?}");
                    continue;
                }
            };
            sources.push(source);
        }

        sources
    }
}

fn zip_error(err: ZipError) -> io::Error {
    match err {
        ZipError::Io(e) => e,
        other => io::Error::other(other),
    }
}

/// Write every source into a zip on `sink`, returning the number of entries
fn write_archive(sink: ChannelWriter, sources: &[ArchiveSource], level: i64) -> io::Result<usize> {
    let mut zip = ZipWriter::new_stream(sink);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(level));

    let mut entries = 0;
    for source in sources {
        entries += match source {
            ArchiveSource::File { path, name } => {
                add_file(&mut zip, path, name, options)?;
                1
            }
            ArchiveSource::Tree { path, prefix } => {
                add_tree(&mut zip, path, prefix.as_deref(), options)?
            }
        };
    }

    zip.finish().map_err(zip_error)?;
    Ok(entries)
}

fn add_file<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    path: &Path,
    name: &str,
    options: SimpleFileOptions,
) -> io::Result<()> {
    let mut file = File::open(path)?;
    let large = file.metadata()?.len() >= u64::from(u32::MAX);

    zip.start_file(name, options.large_file(large))
        .map_err(zip_error)?;
    io::copy(&mut file, zip)?;
    Ok(())
}

/// Add `dir` recursively; entry names are relative to it, behind `prefix`.
/// Directory entries are stored, so they take default options.
fn add_tree<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    dir: &Path,
    prefix: Option<&str>,
    options: SimpleFileOptions,
) -> io::Result<usize> {
    let mut entries = 0;

    if let Some(prefix) = prefix {
        zip.add_directory(format!("{prefix}/"), SimpleFileOptions::default())
            .map_err(zip_error)?;
        entries += 1;
    }

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !entry.file_name().to_str().is_some_and(is_staging_name));

    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        let Ok(relative) = entry.path().strip_prefix(dir) else {
            continue;
        };

        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let name = match prefix {
            Some(prefix) => format!("{prefix}/{relative}"),
            None => relative,
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            zip.add_directory(format!("{name}/"), SimpleFileOptions::default())
                .map_err(zip_error)?;
        } else if file_type.is_file() {
            add_file(zip, entry.path(), &name, options)?;
        } else {
            continue;
        }
        entries += 1;
    }

    Ok(entries)
}

/// `Write` adapter that forwards fixed-size chunks into the archive channel.
///
/// Sending blocks while the channel is full; it fails once the receiving
/// stream has been dropped, which aborts the archive.
struct ChannelWriter {
    tx: mpsc::Sender<io::Result<Bytes>>,
    buffer: BytesMut,
    chunk_size: usize,
}

impl ChannelWriter {
    fn new(tx: mpsc::Sender<io::Result<Bytes>>, chunk_size: usize) -> Self {
        Self {
            tx,
            buffer: BytesMut::with_capacity(chunk_size),
            chunk_size,
        }
    }

    fn send_buffered(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let chunk = self.buffer.split().freeze();
        self.tx
            .blocking_send(Ok(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "archive stream closed"))
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(data);
        if self.buffer.len() >= self.chunk_size {
            self.send_buffered()?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_buffered()
    }
}

impl Drop for ChannelWriter {
    fn drop(&mut self) {
        // The zip trailer may still sit in the buffer after finish()
        let _ = self.send_buffered();
    }
}
