//! Image loading for texture uploads

use std::path::Path;
use thiserror::Error;

/// Image loading errors
#[derive(Error, Debug)]
pub enum ImageError {
    /// Decoding failed or the file could not be read
    #[error("image load error: {0}")]
    Decode(#[from] image::ImageError),
}

/// Decoded RGBA8 pixel data ready for GPU upload.
#[derive(Debug, Clone)]
pub struct RgbaImage {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Tightly packed RGBA8 bytes, row-major
    pub pixels: Vec<u8>,
}

impl RgbaImage {
    /// A single-pixel opaque white image, the fallback texture.
    pub fn white() -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: vec![255, 255, 255, 255],
        }
    }

    /// Size of the pixel data in bytes.
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

/// Load an image file and convert it to RGBA8.
pub fn load_rgba8<P: AsRef<Path>>(path: P) -> Result<RgbaImage, ImageError> {
    let image = image::open(path)?.to_rgba8();
    let (width, height) = image.dimensions();
    Ok(RgbaImage {
        width,
        height,
        pixels: image.into_raw(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn white_fallback_is_one_opaque_pixel() {
        let image = RgbaImage::white();
        assert_eq!(image.width, 1);
        assert_eq!(image.height, 1);
        assert_eq!(image.pixels, vec![255u8; 4]);
        assert_eq!(image.byte_len(), 4);
    }
}
