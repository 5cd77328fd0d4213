//! Video frame extraction through ffprobe/ffmpeg

use log::debug;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::ThumbnailError;

/// Fraction of the duration at which the preview frame is taken
const FRAME_POSITION: f64 = 0.1;

/// Grab one frame from the video at `path`, encoded as PNG.
pub async fn extract_frame(
    ffprobe: &str,
    ffmpeg: &str,
    path: &Path,
) -> Result<Vec<u8>, ThumbnailError> {
    let duration = probe_duration(ffprobe, path).await?;
    let position = format!("{:.3}", duration * FRAME_POSITION);
    debug!("Extracting frame at {position}s from {}", path.display());

    let output = Command::new(ffmpeg)
        .args(["-v", "error", "-ss", &position, "-i"])
        .arg(path)
        .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "-"])
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await?;

    if !output.status.success() {
        return Err(ThumbnailError::Process {
            tool: ffmpeg.to_string(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    if output.stdout.is_empty() {
        return Err(ThumbnailError::EmptyFrame);
    }

    Ok(output.stdout)
}

/// Duration of the video in seconds
async fn probe_duration(ffprobe: &str, path: &Path) -> Result<f64, ThumbnailError> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await?;

    if !output.status.success() {
        return Err(ThumbnailError::Process {
            tool: ffprobe.to_string(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    parse_duration(&String::from_utf8_lossy(&output.stdout))
}

fn parse_duration(raw: &str) -> Result<f64, ThumbnailError> {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds >= 0.0 => Ok(seconds),
        _ => Err(ThumbnailError::InvalidDuration(trimmed.to_string())),
    }
}
