//! ImageFormat - 画像形式の判定と PNG への再エンコード
//!
//! デコードは CPU バウンドなので、async 側からは blocking pool で呼ぶ。

use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

use crate::domain::errors::StoreError;

/// Served when the bytes do not identify themselves.
pub const DEFAULT_MIME: &str = "image/png";

/// Format every persisted image is re-encoded to.
pub const CANONICAL_FORMAT: ImageFormat = ImageFormat::Png;

/// A successfully decoded payload.
#[derive(Debug)]
pub struct ProbedImage {
    pub format: ImageFormat,
    pub image: DynamicImage,
}

impl ProbedImage {
    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    pub fn extension(&self) -> &'static str {
        extension_of(self.format)
    }
}

/// Detects the encoding from magic bytes and decodes the full image.
pub fn probe(bytes: &[u8]) -> Result<ProbedImage, StoreError> {
    if bytes.is_empty() {
        return Err(StoreError::Decode("empty payload".to_string()));
    }
    let format = image::guess_format(bytes)?;
    let image = image::load_from_memory_with_format(bytes, format)?;
    Ok(ProbedImage { format, image })
}

/// Re-encodes a decoded image as PNG.
pub fn canonical_png(image: &DynamicImage) -> Result<Vec<u8>, StoreError> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, CANONICAL_FORMAT)?;
    Ok(out.into_inner())
}

/// MIME type for stored bytes, falling back to `image/png`.
pub fn mime_for(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or(DEFAULT_MIME)
}

pub fn extension_of(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("img")
}
