//! Owned RGBA raster plus its canonical serialized form (PNG in a data URI).

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, Rgba, RgbaImage};

use crate::error::TransformError;

/// 2-D grid of 8-bit RGBA pixels. Row-major, non-premultiplied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterImage {
    pixels: RgbaImage,
}

impl RasterImage {
    /// Fully transparent image.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
        }
    }

    pub fn filled(width: u32, height: u32, color: [u8; 4]) -> Self {
        Self {
            pixels: RgbaImage::from_pixel(width, height, Rgba(color)),
        }
    }

    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn from_raw(width: u32, height: u32, raw: Vec<u8>) -> Result<Self, TransformError> {
        RgbaImage::from_raw(width, height, raw)
            .map(Self::from_rgba)
            .ok_or(TransformError::Dimensions { width, height })
    }

    /// Decode any supported container (PNG, JPEG, WebP, BMP) into RGBA.
    pub fn decode(bytes: &[u8]) -> Result<Self, TransformError> {
        let img = image::load_from_memory(bytes)?;
        Ok(Self::from_rgba(img.into_rgba8()))
    }

    pub fn from_data_uri(uri: &str) -> Result<Self, TransformError> {
        let (_, payload) = split_data_uri(uri)
            .ok_or_else(|| TransformError::Decode("not a base64 data URI".to_string()))?;
        let bytes = STANDARD.decode(payload)?;
        Self::decode(&bytes)
    }

    /// Lossless PNG encoding of the full buffer.
    pub fn encode_png(&self) -> Result<Vec<u8>, TransformError> {
        let mut out = Vec::new();
        PngEncoder::new(&mut out)
            .write_image(
                self.pixels.as_raw(),
                self.pixels.width(),
                self.pixels.height(),
                ColorType::Rgba8,
            )
            .map_err(|e| TransformError::Encode(e.to_string()))?;
        Ok(out)
    }

    pub fn to_data_uri(&self) -> Result<String, TransformError> {
        Ok(data_uri("image/png", &self.encode_png()?))
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut RgbaImage {
        &mut self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels.get_pixel(x, y).0
    }

    /// Bytes held by the pixel buffer.
    pub fn memory_size(&self) -> usize {
        self.pixels.as_raw().len()
    }
}

/// Build a `data:{mime};base64,...` URI.
pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Split a base64 data URI into `(mime, payload)`.
pub fn split_data_uri(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header.strip_suffix(";base64")?;
    Some((mime, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_preserves_pixels_exactly() {
        let mut img = RasterImage::filled(3, 2, [255, 255, 255, 255]);
        img.pixels_mut().put_pixel(1, 1, Rgba([12, 34, 56, 78]));
        let uri = img.to_data_uri().unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));
        assert_eq!(RasterImage::from_data_uri(&uri).unwrap(), img);
    }

    #[test]
    fn split_rejects_non_base64_uris() {
        assert_eq!(split_data_uri("data:image/png;base64,QUJD"), Some(("image/png", "QUJD")));
        assert_eq!(split_data_uri("data:text/plain,hello"), None);
        assert_eq!(split_data_uri("image/png;base64,QUJD"), None);
    }

    #[test]
    fn garbage_bytes_are_a_decode_error() {
        let err = RasterImage::decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, TransformError::Decode(_)));
    }

    #[test]
    fn from_raw_checks_length() {
        assert!(RasterImage::from_raw(2, 2, vec![0; 16]).is_ok());
        assert_eq!(
            RasterImage::from_raw(2, 2, vec![0; 15]),
            Err(TransformError::Dimensions { width: 2, height: 2 })
        );
    }
}
