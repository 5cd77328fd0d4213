//! Thumbnail rendering
//!
//! Decodes an image (or a video frame already extracted to an encoded
//! image), shrinks it to fit a bounding box and re-encodes it.

use fast_image_resize::{FilterType, ResizeAlg, ResizeOptions, Resizer};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::metadata::Orientation;
use image::{DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, ImageFormat, ImageReader};
use log::debug;
use std::io::Cursor;
use std::path::PathBuf;

use crate::error::ThumbnailError;

const JPEG_QUALITY: u8 = 85;

/// Input handed to a renderer
#[derive(Debug, Clone)]
pub enum RenderSource {
    /// An image file on disk
    File(PathBuf),
    /// Encoded image bytes, e.g. a frame grabbed from a video
    Encoded(Vec<u8>),
}

/// Produces encoded thumbnail bytes. Runs on a blocking thread.
pub trait ThumbnailRenderer: Send + Sync {
    fn render(
        &self,
        source: &RenderSource,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, ThumbnailError>;
}

/// Default renderer built on the `image` crate.
///
/// JPEG sources stay JPEG; everything else is written as PNG. EXIF
/// orientation is applied and the ICC profile carried over when present.
#[derive(Debug, Default, Clone, Copy)]
pub struct MediaRenderer;

impl ThumbnailRenderer for MediaRenderer {
    fn render(
        &self,
        source: &RenderSource,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, ThumbnailError> {
        let loaded;
        let bytes: &[u8] = match source {
            RenderSource::File(path) => {
                loaded = std::fs::read(path)?;
                &loaded
            }
            RenderSource::Encoded(bytes) => bytes,
        };

        let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
        let format = reader.format();
        let mut decoder = reader.into_decoder()?;

        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
        let icc_profile = decoder.icc_profile().ok().flatten();

        let mut image = DynamicImage::from_decoder(decoder)?;
        image.apply_orientation(orientation);

        let thumbnail = fit_within(image, width, height)?;
        encode(&thumbnail, format, icc_profile)
    }
}

/// Shrink `image` to fit `width x height`, keeping its aspect ratio.
/// Images that already fit are returned unchanged.
pub fn fit_within(
    image: DynamicImage,
    width: u32,
    height: u32,
) -> Result<DynamicImage, ThumbnailError> {
    if width == 0 || height == 0 {
        return Err(ThumbnailError::InvalidSize { width, height });
    }

    let (src_width, src_height) = (image.width(), image.height());
    if src_width <= width && src_height <= height {
        return Ok(image);
    }

    let scale = (width as f32 / src_width as f32).min(height as f32 / src_height as f32);
    let dst_width = ((src_width as f32 * scale).round() as u32).clamp(1, width);
    let dst_height = ((src_height as f32 * scale).round() as u32).clamp(1, height);

    let mut resized = DynamicImage::new(dst_width, dst_height, image.color());
    let mut resizer = Resizer::new();
    resizer.resize(
        &image,
        &mut resized,
        Some(&ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Lanczos3))),
    )?;

    Ok(resized)
}

fn encode(
    image: &DynamicImage,
    format: Option<ImageFormat>,
    icc_profile: Option<Vec<u8>>,
) -> Result<Vec<u8>, ThumbnailError> {
    let mut out = Vec::new();

    if format == Some(ImageFormat::Jpeg) {
        let rgb = image.to_rgb8();
        let mut encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
        attach_icc_profile(&mut encoder, icc_profile);
        encoder.write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)?;
    } else {
        let rgba = image.to_rgba8();
        let mut encoder = PngEncoder::new(&mut out);
        attach_icc_profile(&mut encoder, icc_profile);
        encoder.write_image(
            rgba.as_raw(),
            rgba.width(),
            rgba.height(),
            ExtendedColorType::Rgba8,
        )?;
    }

    Ok(out)
}

fn attach_icc_profile<E: ImageEncoder>(encoder: &mut E, icc_profile: Option<Vec<u8>>) {
    if let Some(profile) = icc_profile {
        if let Err(e) = encoder.set_icc_profile(profile) {
            debug!("Dropping ICC profile: {e}");
        }
    }
}
