//! Clipboard image handling: fingerprints, PNG data URLs and thumbnails.

use std::io::Cursor;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use image::{DynamicImage, ImageFormat, RgbaImage};
use sha2::{Digest, Sha256};

use crate::{CoreError, MIN_IMAGE_BYTES};

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Raw RGBA pixels as read from or written to the clipboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub width: usize,
    pub height: usize,
    pub rgba: Vec<u8>,
}

impl RawImage {
    /// Content hash used as the image channel fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update((self.width as u64).to_le_bytes());
        hasher.update((self.height as u64).to_le_bytes());
        hasher.update(&self.rgba);
        hex::encode(hasher.finalize())
    }

    fn has_consistent_buffer(&self) -> bool {
        self.width
            .checked_mul(self.height)
            .and_then(|px| px.checked_mul(4))
            .is_some_and(|len| len == self.rgba.len())
    }

    /// False for empty or undersized buffers, which some apps leave on the
    /// pasteboard as placeholders.
    pub fn is_significant(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.rgba.len() >= MIN_IMAGE_BYTES
            && self.has_consistent_buffer()
    }

    fn to_rgba_image(&self) -> Result<RgbaImage, CoreError> {
        let invalid = || CoreError::InvalidImageBuffer {
            width: self.width,
            height: self.height,
        };
        let width = u32::try_from(self.width).map_err(|_| invalid())?;
        let height = u32::try_from(self.height).map_err(|_| invalid())?;
        RgbaImage::from_raw(width, height, self.rgba.clone()).ok_or_else(invalid)
    }
}

/// Encodes the image as a self-describing `data:image/png;base64,...` URL.
pub fn encode_data_url(image: &RawImage) -> Result<String, CoreError> {
    let rgba = image.to_rgba_image()?;
    png_data_url(&DynamicImage::ImageRgba8(rgba))
}

/// Downscales the image to fit within a `max_edge` square, keeping its
/// aspect ratio. Images already inside the box are encoded as-is.
pub fn thumbnail_data_url(image: &RawImage, max_edge: u32) -> Result<String, CoreError> {
    let rgba = DynamicImage::ImageRgba8(image.to_rgba_image()?);
    if rgba.width() <= max_edge && rgba.height() <= max_edge {
        return png_data_url(&rgba);
    }
    png_data_url(&rgba.thumbnail(max_edge, max_edge))
}

/// Decodes a PNG data URL produced by [`encode_data_url`].
pub fn decode_data_url(data_url: &str) -> Result<RawImage, CoreError> {
    let encoded = data_url
        .strip_prefix(PNG_DATA_URL_PREFIX)
        .ok_or_else(|| CoreError::ImageDecode("not a PNG data URL".to_owned()))?;
    let png = BASE64
        .decode(encoded)
        .map_err(|err| CoreError::ImageDecode(err.to_string()))?;
    let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png)
        .map_err(|err| CoreError::ImageDecode(err.to_string()))?
        .to_rgba8();
    Ok(RawImage {
        width: decoded.width() as usize,
        height: decoded.height() as usize,
        rgba: decoded.into_raw(),
    })
}

fn png_data_url(image: &DynamicImage) -> Result<String, CoreError> {
    let mut png = Cursor::new(Vec::new());
    image
        .write_to(&mut png, ImageFormat::Png)
        .map_err(|err| CoreError::ImageEncode(err.to_string()))?;
    Ok(format!("{PNG_DATA_URL_PREFIX}{}", BASE64.encode(png.into_inner())))
}
