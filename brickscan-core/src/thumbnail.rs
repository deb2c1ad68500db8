//! JPEG thumbnails for history records.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use thiserror::Error;

/// Longest side of a stored thumbnail, in pixels.
pub const THUMBNAIL_MAX_SIDE: u32 = 256;

/// JPEG quality used for stored thumbnails.
pub const THUMBNAIL_QUALITY: u8 = 60;

#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode thumbnail: {0}")]
    Encode(String),
}

/// Downscale an encoded image (any format `image` can read) to a JPEG whose
/// longest side is at most `max_side`. Aspect ratio is preserved and small
/// images are not upscaled.
pub fn make_thumbnail(image_data: &[u8], max_side: u32) -> Result<Vec<u8>, ThumbnailError> {
    let img = image::load_from_memory(image_data)
        .map_err(|e| ThumbnailError::Decode(e.to_string()))?;

    let rgb = if img.width() > max_side || img.height() > max_side {
        img.thumbnail(max_side, max_side).to_rgb8()
    } else {
        img.to_rgb8()
    };

    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, THUMBNAIL_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| ThumbnailError::Encode(e.to_string()))?;

    Ok(buffer.into_inner())
}
