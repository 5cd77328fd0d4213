use std::collections::BTreeSet;
use std::io::{Cursor, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::StreamExt;
use image::{DynamicImage, GenericImageView, ImageFormat, RgbImage};
use tempfile::TempDir;

use rax_cloud_store::error::ThumbnailError;
use rax_cloud_store::storage::EntryKind;
use rax_cloud_store::thumbnail::{RenderSource, ThumbnailRenderer};
use rax_cloud_store::transfer::{ByteRange, ByteStream};
use rax_cloud_store::{FileStore, StoreConfig, StoreError};

fn setup_with(configure: impl FnOnce(&mut StoreConfig)) -> (TempDir, FileStore) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = StoreConfig::with_root(dir.path());
    configure(&mut config);
    (dir, FileStore::new(config))
}

fn setup() -> (TempDir, FileStore) {
    setup_with(|_| {})
}

async fn collect(mut stream: ByteStream) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(chunk) = stream.next().await {
        out.extend_from_slice(&chunk.unwrap());
    }
    out
}

async fn put(store: &FileStore, path: &[&str], data: &[u8]) {
    store.upload(path, data, true).await.unwrap();
}

async fn read_range(store: &FileStore, path: &[&str], start: u64, end: u64) -> Vec<u8> {
    let download = store
        .download(path, Some(ByteRange::new(start, end)))
        .await
        .unwrap();
    collect(download.into_stream()).await
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }));
    let mut out = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}

/// Names on disk in `dir`, sorted
fn dir_names(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn zip_names(bytes: Vec<u8>) -> (zip::ZipArchive<Cursor<Vec<u8>>>, BTreeSet<String>) {
    let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let names = archive.file_names().map(str::to_string).collect();
    (archive, names)
}

/// Renderer that counts invocations and returns a fixed buffer
#[derive(Default)]
struct CountingRenderer {
    calls: AtomicUsize,
}

impl ThumbnailRenderer for CountingRenderer {
    fn render(
        &self,
        _source: &RenderSource,
        _width: u32,
        _height: u32,
    ) -> Result<Vec<u8>, ThumbnailError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("thumb-{call}").into_bytes())
    }
}

fn counting_store() -> (TempDir, FileStore, Arc<CountingRenderer>) {
    let dir = tempfile::tempdir().unwrap();
    let renderer = Arc::new(CountingRenderer::default());
    let store = FileStore::with_renderer(StoreConfig::with_root(dir.path()), renderer.clone());
    (dir, store, renderer)
}

// ═══ Upload / download ═══

#[tokio::test]
async fn test_upload_download_round_trip() {
    let (_dir, store) = setup();
    let data: Vec<u8> = (0..5000u32).map(|i| (i * 7 % 251) as u8).collect();

    let written = store.upload(&["docs", "data.bin"], &data[..], false).await.unwrap();
    assert_eq!(written, data.len() as u64);

    let download = store.download(&["docs", "data.bin"], None).await.unwrap();
    assert_eq!(download.status(), 200);
    assert_eq!(download.content_length(), data.len() as u64);
    assert_eq!(collect(download.into_stream()).await, data);
}

#[tokio::test]
async fn test_ranges_concatenate() {
    let (_dir, store) = setup_with(|config| config.buffer_size = 64);
    let data: Vec<u8> = (0..1000u32).map(|i| (i % 256) as u8).collect();
    put(&store, &["range.bin"], &data).await;

    for (a, b, c) in [(0, 0, 999), (0, 499, 999), (10, 63, 64), (998, 998, 999), (3, 200, 700)] {
        let mut joined = read_range(&store, &["range.bin"], a, b).await;
        joined.extend(read_range(&store, &["range.bin"], b + 1, c).await);

        let direct = read_range(&store, &["range.bin"], a, c).await;
        assert_eq!(joined, direct, "[{a},{b}] ++ [{},{c}]", b + 1);
        assert_eq!(direct, data[a as usize..=c as usize]);
    }
}

#[tokio::test]
async fn test_partial_download_metadata() {
    let (_dir, store) = setup();
    put(&store, &["f.txt"], b"0123456789").await;

    let download = store
        .download(&["f.txt"], Some(ByteRange::new(2, 500)))
        .await
        .unwrap();
    assert_eq!((download.start, download.end, download.size), (2, 9, 10));
    assert_eq!(download.status(), 206);
    assert_eq!(download.content_range(), "bytes 2-9/10");
    assert_eq!(collect(download.into_stream()).await, b"23456789");
}

#[tokio::test]
async fn test_range_past_end_not_satisfiable() {
    let (_dir, store) = setup();
    put(&store, &["f.txt"], b"abc").await;

    let err = store
        .download(&["f.txt"], Some(ByteRange::from_start(3)))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::RangeNotSatisfiable { size: 3 }));
}

#[tokio::test]
async fn test_empty_file_download() {
    let (_dir, store) = setup();
    put(&store, &["empty.txt"], b"").await;

    let download = store.download(&["empty.txt"], None).await.unwrap();
    assert_eq!(download.status(), 200);
    assert_eq!(download.content_length(), 0);
    assert!(collect(download.into_stream()).await.is_empty());
}

#[tokio::test]
async fn test_download_missing_or_directory() {
    let (_dir, store) = setup();
    store.create_directory(&["folder"]).await.unwrap();

    assert!(matches!(
        store.download(&["nope.txt"], None).await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        store.download(&["folder"], None).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_upload_conflict_then_overwrite() {
    let (_dir, store) = setup();

    store.upload(&["a", "b.txt"], &b"hi"[..], false).await.unwrap();
    let err = store
        .upload(&["a", "b.txt"], &b"again"[..], false)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    assert_eq!(store.read_file(&["a", "b.txt"]).await.unwrap(), b"hi");

    store.upload(&["a", "b.txt"], &b"replaced"[..], true).await.unwrap();
    assert_eq!(store.read_file(&["a", "b.txt"]).await.unwrap(), b"replaced");
}

#[tokio::test]
async fn test_upload_onto_directory_conflicts() {
    let (_dir, store) = setup();
    store.create_directory(&["photos"]).await.unwrap();

    let err = store.upload(&["photos"], &b"x"[..], true).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[tokio::test]
async fn test_upload_rejects_invalid_paths() {
    let (dir, store) = setup();

    let paths: [&[&str]; 4] = [&["..", "escape.txt"], &["a/b.txt"], &["bad;name"], &[]];
    for path in paths {
        let err = store.upload(path, &b"x"[..], true).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidPath(_)), "{path:?}");
    }
    assert!(!dir.path().parent().unwrap().join("escape.txt").exists());
}

#[tokio::test]
async fn test_upload_limit_cleans_up() {
    let (dir, store) = setup_with(|config| {
        config.max_upload_size_mb = 1;
        config.buffer_size = 64 * 1024;
    });
    put(&store, &["big.bin"], b"previous").await;

    let data = vec![1u8; 1024 * 1024 + 1];
    let err = store.upload(&["big.bin"], &data[..], true).await.unwrap_err();
    assert!(matches!(err, StoreError::TooLarge { .. }));

    // The old content survives and no staging file is left behind
    assert_eq!(store.read_file(&["big.bin"]).await.unwrap(), b"previous");
    assert_eq!(dir_names(dir.path()), vec!["big.bin".to_string()]);
}

#[tokio::test]
async fn test_upload_ignores_lookalike_siblings() {
    let (dir, store) = setup();
    put(&store, &["b.txt.tmp"], b"mine").await;
    put(&store, &["b.txt.upload"], b"also mine").await;

    store.upload(&["b.txt"], &b"hi"[..], false).await.unwrap();
    store.upload(&["b.txt"], &b"hello"[..], true).await.unwrap();

    assert_eq!(store.read_file(&["b.txt"]).await.unwrap(), b"hello");
    assert_eq!(store.read_file(&["b.txt.tmp"]).await.unwrap(), b"mine");
    assert_eq!(
        dir_names(dir.path()),
        vec!["b.txt", "b.txt.tmp", "b.txt.upload"]
    );
}

#[tokio::test]
async fn test_stale_staging_file_is_hidden() {
    let (dir, store) = setup();
    put(&store, &["album", "a.txt"], b"a").await;
    // Left behind by a process that died mid-upload
    std::fs::write(dir.path().join("album/.busy.txt.x1Y2z3.upload"), b"partial").unwrap();

    store.upload(&["album", "busy.txt"], &b"done"[..], false).await.unwrap();
    assert_eq!(store.read_file(&["album", "busy.txt"]).await.unwrap(), b"done");

    let mut names: Vec<_> = store
        .list_directory(&["album"])
        .await
        .into_iter()
        .map(|entry| entry.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["a.txt", "busy.txt"]);

    let archive = store.archive_directory(&["album"], None, None).await.unwrap();
    let (_, zipped) = zip_names(collect(archive).await);
    assert_eq!(zipped, BTreeSet::from(["a.txt".to_string(), "busy.txt".to_string()]));
}

#[tokio::test]
async fn test_dropping_download_releases_file() {
    let (_dir, store) = setup_with(|config| config.buffer_size = 16);
    put(&store, &["long.txt"], &[b'x'; 4096]).await;

    let download = store.download(&["long.txt"], None).await.unwrap();
    let mut stream = download.into_stream();
    let first = stream.next().await.unwrap().unwrap();
    assert!(!first.is_empty() && first.len() <= 16);
    drop(stream);

    store.delete(&["long.txt"]).await.unwrap();
    assert!(store.stat(&["long.txt"]).await.is_none());
}

// ═══ Delete / tombstones ═══

#[tokio::test]
async fn test_delete_hides_entry_and_reupload_overwrites() {
    let (dir, store) = setup();
    put(&store, &["a", "b.txt"], b"first").await;
    put(&store, &["a", "c.txt"], b"other").await;

    store.delete(&["a", "b.txt"]).await.unwrap();
    let target = dir.path().join("a").join("b.txt");
    assert!(store.tombstones().is_tombstoned(&target));

    let names: Vec<String> = store
        .list_directory(&["a"])
        .await
        .into_iter()
        .map(|entry| entry.name)
        .collect();
    assert_eq!(names, vec!["c.txt".to_string()]);

    // overwrite=false still succeeds on a just-deleted path
    store.upload(&["a", "b.txt"], &b"second"[..], false).await.unwrap();
    assert!(!store.tombstones().is_tombstoned(&target));
    assert_eq!(store.read_file(&["a", "b.txt"]).await.unwrap(), b"second");
}

#[tokio::test]
async fn test_delete_twice_is_not_found() {
    let (dir, store) = setup();
    put(&store, &["once.txt"], b"x").await;

    store.delete(&["once.txt"]).await.unwrap();
    let err = store.delete(&["once.txt"]).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
    assert!(store.tombstones().is_tombstoned(&dir.path().join("once.txt")));
}

#[tokio::test]
async fn test_delete_directory_recursively() {
    let (dir, store) = setup();
    put(&store, &["tree", "a.txt"], b"a").await;
    put(&store, &["tree", "sub", "b.txt"], b"b").await;

    store.delete(&["tree"]).await.unwrap();
    assert!(!dir.path().join("tree").exists());
    assert!(store.list_directory(&["tree"]).await.is_empty());

    // Creating beneath the deleted directory brings it back
    put(&store, &["tree", "new.txt"], b"n").await;
    assert!(store.stat(&["tree"]).await.is_some_and(|entry| entry.is_dir()));
}

#[tokio::test]
async fn test_delete_root_refused() {
    let (_dir, store) = setup();
    let root: [&str; 0] = [];
    assert!(matches!(
        store.delete(&root).await,
        Err(StoreError::InvalidPath(_))
    ));
}

// ═══ Rename / directories / metadata ═══

#[tokio::test]
async fn test_rename_rules() {
    let (_dir, store) = setup();
    put(&store, &["old.txt"], b"content").await;
    put(&store, &["taken.txt"], b"taken").await;

    assert!(matches!(
        store.rename(&["missing.txt"], &["x.txt"], false).await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        store.rename(&["old.txt"], &["old.txt"], true).await,
        Err(StoreError::Conflict(_))
    ));
    assert!(matches!(
        store.rename(&["old.txt"], &["taken.txt"], false).await,
        Err(StoreError::Conflict(_))
    ));

    store.rename(&["old.txt"], &["moved", "new.txt"], false).await.unwrap();
    assert!(store.stat(&["old.txt"]).await.is_none());
    assert_eq!(store.read_file(&["moved", "new.txt"]).await.unwrap(), b"content");

    store.rename(&["moved", "new.txt"], &["taken.txt"], true).await.unwrap();
    assert_eq!(store.read_file(&["taken.txt"]).await.unwrap(), b"content");
}

#[tokio::test]
async fn test_create_directory() {
    let (_dir, store) = setup();

    store.create_directory(&["x", "y", "z"]).await.unwrap();
    assert!(store.stat(&["x", "y"]).await.is_some_and(|entry| entry.is_dir()));

    let err = store.create_directory(&["x", "y", "z"]).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[tokio::test]
async fn test_stat_and_list() {
    let (_dir, store) = setup();
    put(&store, &["dir", "file.txt"], b"12345").await;
    store.create_directory(&["dir", "child"]).await.unwrap();

    let entry = store.stat(&["dir", "file.txt"]).await.unwrap();
    assert_eq!(entry.kind, EntryKind::File);
    assert_eq!(entry.size, 5);
    assert_eq!(entry.name, "file.txt");
    assert!(entry.created.is_some());

    let mut listing: Vec<(String, EntryKind)> = store
        .list_directory(&["dir"])
        .await
        .into_iter()
        .map(|entry| (entry.name, entry.kind))
        .collect();
    listing.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        listing,
        vec![
            ("child".to_string(), EntryKind::Directory),
            ("file.txt".to_string(), EntryKind::File),
        ]
    );

    assert!(store.stat(&["dir", "nope"]).await.is_none());
    assert!(store.stat(&[".."]).await.is_none());
    assert!(store.list_directory(&["dir", "file.txt"]).await.is_empty());
}

#[tokio::test]
async fn test_storage_usage() {
    let (_dir, store) = setup();
    if let Some(usage) = store.storage_usage() {
        assert!(usage.total_bytes >= usage.free_bytes);
        assert!((0.0..=100.0).contains(&usage.used_percent));
    }
}

// ═══ Archives ═══

#[tokio::test]
async fn test_archive_whole_directory() {
    let (_dir, store) = setup();
    put(&store, &["album", "a.txt"], b"alpha").await;
    put(&store, &["album", "sub", "b.txt"], b"beta").await;

    let stream = store.archive_directory(&["album"], None, None).await.unwrap();
    let (mut archive, names) = zip_names(collect(stream).await);

    let expected: BTreeSet<String> = ["a.txt", "sub/", "sub/b.txt"]
        .into_iter()
        .map(str::to_string)
        .collect();
    assert_eq!(names, expected);

    let mut content = String::new();
    archive
        .by_name("sub/b.txt")
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    assert_eq!(content, "beta");
}

#[tokio::test]
async fn test_archive_selection() {
    let (_dir, store) = setup();
    put(&store, &["album", "a.txt"], b"alpha").await;
    put(&store, &["album", "skip.txt"], b"skip").await;
    put(&store, &["album", "sub", "b.txt"], b"beta").await;
    put(&store, &["album", "other", "c.txt"], b"gamma").await;

    // A folder named as a file and a file named as a folder are both skipped
    let files = vec![
        "a.txt".to_string(),
        "missing.txt".to_string(),
        "../x".to_string(),
        "other".to_string(),
    ];
    let folders = vec!["sub".to_string(), "skip.txt".to_string()];
    let stream = store
        .archive_directory(&["album"], Some(&files), Some(&folders))
        .await
        .unwrap();
    let (_, names) = zip_names(collect(stream).await);

    let expected: BTreeSet<String> = ["a.txt", "sub/", "sub/b.txt"]
        .into_iter()
        .map(str::to_string)
        .collect();
    assert_eq!(names, expected);
}

#[tokio::test]
async fn test_archive_missing_directory() {
    let (_dir, store) = setup();
    put(&store, &["file.txt"], b"x").await;

    assert!(matches!(
        store.archive_directory(&["nope"], None, None).await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        store.archive_directory(&["file.txt"], None, None).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_dropping_archive_stops_worker() {
    let (_dir, store) = setup_with(|config| config.buffer_size = 1024);
    let noise: Vec<u8> = (0..512 * 1024u32).map(|i| (i.wrapping_mul(2654435761) >> 13) as u8).collect();
    put(&store, &["big", "noise.bin"], &noise).await;

    let mut stream = store.archive_directory(&["big"], None, None).await.unwrap();
    assert!(stream.next().await.unwrap().is_ok());
    drop(stream);

    // The store stays usable and the tree can be removed
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    store.delete(&["big"]).await.unwrap();
}

// ═══ Thumbnails ═══

#[tokio::test]
async fn test_image_thumbnail_fits_and_is_cached() {
    let (_dir, store) = setup();
    put(&store, &["photo.png"], &png(400, 300)).await;

    let first = store.default_thumbnail(&["photo.png"]).await.unwrap();
    let image = image::load_from_memory(&first).unwrap();
    assert_eq!(image.dimensions(), (200, 150));
    assert_eq!(store.thumbnails().len(), 1);

    let second = store.default_thumbnail(&["photo.png"]).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_thumbnail_cache_hit_skips_renderer() {
    let (_dir, store, renderer) = counting_store();
    put(&store, &["photo.png"], b"not decoded by the mock").await;

    let first = store.thumbnail(&["photo.png"], 200, 200).await.unwrap();
    let second = store.thumbnail(&["photo.png"], 200, 200).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_thumbnail_follows_rename() {
    let (_dir, store, renderer) = counting_store();
    put(&store, &["old.png"], b"img").await;

    let before = store.default_thumbnail(&["old.png"]).await.unwrap();
    store.rename(&["old.png"], &["new.png"], false).await.unwrap();

    let after = store.default_thumbnail(&["new.png"]).await.unwrap();
    assert_eq!(before, after);
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_overwrite_upload_refreshes_thumbnail() {
    let (_dir, store, renderer) = counting_store();
    put(&store, &["p.png"], &png(10, 10)).await;
    let first = store.thumbnail(&["p.png"], 200, 200).await.unwrap();

    put(&store, &["p.png"], &png(20, 20)).await;
    let second = store.thumbnail(&["p.png"], 200, 200).await.unwrap();

    assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_rename_over_cached_target_refreshes_thumbnail() {
    let (_dir, store, renderer) = counting_store();
    put(&store, &["p.png"], &png(10, 10)).await;
    put(&store, &["q.png"], &png(20, 20)).await;
    let stale = store.thumbnail(&["p.png"], 200, 200).await.unwrap();

    store.rename(&["q.png"], &["p.png"], true).await.unwrap();
    assert!(store.thumbnails().is_empty());

    let fresh = store.thumbnail(&["p.png"], 200, 200).await.unwrap();
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
    assert_ne!(stale, fresh);
}

#[tokio::test]
async fn test_thumbnails_of_renamed_directory() {
    let (dir, store, renderer) = counting_store();
    put(&store, &["album", "a.png"], b"img").await;

    store.default_thumbnail(&["album", "a.png"]).await.unwrap();
    store.rename(&["album"], &["photos"], false).await.unwrap();

    assert!(store.thumbnails().get(&dir.path().join("photos").join("a.png")).is_some());
    store.default_thumbnail(&["photos", "a.png"]).await.unwrap();
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_delete_drops_thumbnails() {
    let (_dir, store, _renderer) = counting_store();
    put(&store, &["album", "a.png"], b"img").await;
    put(&store, &["album", "b.jpg"], b"img").await;

    store.default_thumbnail(&["album", "a.png"]).await.unwrap();
    store.default_thumbnail(&["album", "b.jpg"]).await.unwrap();
    assert_eq!(store.thumbnails().len(), 2);

    store.delete(&["album"]).await.unwrap();
    assert!(store.thumbnails().is_empty());
}

#[tokio::test]
async fn test_thumbnail_failures_degrade() {
    let (_dir, store) = setup();
    put(&store, &["notes.txt"], b"text").await;
    put(&store, &["broken.png"], b"not a png").await;

    assert!(store.default_thumbnail(&["notes.txt"]).await.is_none());
    assert!(store.default_thumbnail(&["broken.png"]).await.is_none());
    assert!(store.default_thumbnail(&["missing.png"]).await.is_none());

    assert!(matches!(
        store.thumbnail_result(&["notes.txt"], 200, 200).await,
        Err(StoreError::UnsupportedMedia(_))
    ));
    assert!(matches!(
        store.thumbnail_result(&["missing.png"], 200, 200).await,
        Err(StoreError::NotFound(_))
    ));
    assert!(store.thumbnails().is_empty());
}

#[tokio::test]
async fn test_video_thumbnail_without_ffmpeg() {
    let (_dir, store) = setup_with(|config| {
        config.ffprobe_path = "/nonexistent/ffprobe".to_string();
        config.ffmpeg_path = "/nonexistent/ffmpeg".to_string();
    });
    put(&store, &["clip.mp4"], b"not really a video").await;

    assert!(store.default_thumbnail(&["clip.mp4"]).await.is_none());
}
