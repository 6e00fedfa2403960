//! Image intake: gallery files from disk and login snapshots from data URLs.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed data URL: missing ',' between header and payload")]
    MissingSeparator,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("image decode failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Decode a `data:<mime>;base64,<payload>` URL into an RGB frame.
///
/// Everything up to the first `,` is treated as the header and ignored; the
/// image format is sniffed from the decoded bytes.
pub fn decode_data_url(data_url: &str) -> Result<RgbImage, DecodeError> {
    let (_header, payload) = data_url
        .split_once(',')
        .ok_or(DecodeError::MissingSeparator)?;

    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD.decode(compact.as_bytes())?;

    decode_bytes(&bytes)
}

/// Decode encoded image bytes (JPEG, PNG, ...) into an RGB frame.
pub fn decode_bytes(bytes: &[u8]) -> Result<RgbImage, DecodeError> {
    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgb8())
}

/// Load an image file from disk into an RGB frame.
pub fn load_image_file(path: &Path) -> Result<RgbImage, DecodeError> {
    let img = image::open(path)?;
    Ok(img.to_rgb8())
}
