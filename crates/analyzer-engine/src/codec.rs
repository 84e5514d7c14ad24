use std::path::Path;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbImage, RgbaImage};

/// Every image leaving the pipeline is JPEG at this quality, so the client,
/// the store and the report all decode the same bytes.
pub const JPEG_QUALITY: u8 = 90;

pub fn encode(image: &DynamicImage) -> Result<String> {
    Ok(BASE64.encode(encode_jpeg(image)?))
}

pub fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>> {
    let rgb = image.to_rgb8();
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
    encoder
        .encode_image(&DynamicImage::ImageRgb8(rgb))
        .context("failed to encode image as JPEG")?;
    Ok(bytes)
}

pub fn decode(encoded: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(encoded.trim())
        .context("invalid base64 image payload")
}

/// Builds an image from a packed row-major pixel buffer (RGB or RGBA).
pub fn from_pixels(width: u32, height: u32, channels: u8, buffer: Vec<u8>) -> Result<DynamicImage> {
    let image = match channels {
        3 => RgbImage::from_raw(width, height, buffer).map(DynamicImage::ImageRgb8),
        4 => RgbaImage::from_raw(width, height, buffer).map(DynamicImage::ImageRgba8),
        other => bail!("unsupported channel count {other}; expected 3 or 4"),
    };
    image.with_context(|| format!("pixel buffer does not match {width}x{height}x{channels}"))
}

pub fn load(path: &Path) -> Result<DynamicImage> {
    image::open(path).with_context(|| format!("failed to open image {}", path.display()))
}
