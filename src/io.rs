//! File intake and PNG export.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, ImageFormat};

use crate::error::{StencilError, TransformError, ValidationError};
use crate::raster::{RasterImage, data_uri};

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// A validated upload, kept in its original encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Upload {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub name: Option<String>,
}

impl Upload {
    /// Validate raw bytes. `declared_mime` is what the picker or OS claims; when
    /// absent the type is sniffed from the content.
    pub fn from_bytes(
        bytes: Vec<u8>,
        declared_mime: Option<&str>,
        name: Option<String>,
    ) -> Result<Self, ValidationError> {
        let mime = match declared_mime {
            Some(m) => m.trim().to_lowercase(),
            None => sniff_mime(&bytes).unwrap_or_default().to_string(),
        };
        if !mime.starts_with("image/") {
            return Err(ValidationError::NotAnImage);
        }
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(ValidationError::TooLarge { size: bytes.len() });
        }
        Ok(Self { bytes, mime, name })
    }

    /// Read and validate a file from disk. The type comes from the extension,
    /// falling back to content sniffing.
    pub fn read(path: &Path) -> Result<Self, ValidationError> {
        let bytes = std::fs::read(path).map_err(|e| ValidationError::Unreadable(e.to_string()))?;
        let declared = mime_from_path(path).or_else(|| sniff_mime(&bytes));
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        Self::from_bytes(bytes, Some(declared.unwrap_or("application/octet-stream")), name)
    }

    pub fn decode(&self) -> Result<RasterImage, TransformError> {
        RasterImage::decode(&self.bytes)
    }

    pub fn to_data_uri(&self) -> String {
        data_uri(&self.mime, &self.bytes)
    }
}

fn mime_for(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Bmp => Some("image/bmp"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::Tiff => Some("image/tiff"),
        _ => None,
    }
}

/// MIME type from the file's magic bytes.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes).ok().and_then(mime_for)
}

pub fn mime_from_path(path: &Path) -> Option<&'static str> {
    ImageFormat::from_path(path).ok().and_then(mime_for)
}

// ============================================================================
// EXPORT
// ============================================================================

/// `stencil-{unix millis}.png`
pub fn export_file_name(millis: i64) -> String {
    format!("stencil-{}.png", millis)
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Encode as PNG and write to `path`.
pub fn write_png(image: &RasterImage, path: &Path) -> Result<(), TransformError> {
    let file = File::create(path).map_err(|e| TransformError::Encode(e.to_string()))?;
    let mut writer = BufWriter::new(file);
    let pixels = image.pixels();
    PngEncoder::new(&mut writer)
        .write_image(pixels.as_raw(), pixels.width(), pixels.height(), ColorType::Rgba8)
        .map_err(|e| TransformError::Encode(e.to_string()))?;
    Ok(())
}

/// Write the stencil into `dir` under a timestamped name. Returns the written path.
pub fn export_png(image: &RasterImage, dir: &Path) -> Result<PathBuf, StencilError> {
    let path = dir.join(export_file_name(now_millis()));
    write_png(image, &path)?;
    crate::log_info!("Exported stencil to {}", path.display());
    Ok(path)
}
