//! Still-image encoding.
//!
//! [`FrameCodec`] writes one decoded frame to disk as JPEG or PNG. The image
//! is encoded in memory first and written in a single call; if the write
//! fails the partial file is removed, so a failed encode never leaves a
//! truncated image behind.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    path::Path,
    str::FromStr,
};

use image::{
    DynamicImage,
    codecs::{jpeg::JpegEncoder, png::PngEncoder},
};

use crate::error::FrameGrabError;

/// Default JPEG quality.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Output image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageFormat {
    /// Lossy JPEG (`.jpg`). This is the default.
    #[default]
    Jpeg,
    /// Lossless PNG (`.png`).
    Png,
}

impl ImageFormat {
    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
        }
    }
}

impl Display for ImageFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageFormat {
    type Err = FrameGrabError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
            "png" => Ok(ImageFormat::Png),
            other => Err(FrameGrabError::UnsupportedImageFormat(other.to_string())),
        }
    }
}

/// Encodes frames to image files.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    jpeg_quality: u8,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl FrameCodec {
    /// Create a codec with the given JPEG quality, clamped to `1..=100`.
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    /// JPEG quality in use.
    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    /// Encode `image` as `format` and write it to `path`, replacing any
    /// existing file.
    ///
    /// # Errors
    ///
    /// [`FrameGrabError::EncodeError`] naming `path` when encoding or writing
    /// fails.
    pub fn encode(
        &self,
        image: &DynamicImage,
        format: ImageFormat,
        path: &Path,
    ) -> Result<(), FrameGrabError> {
        let encode_error = |reason: String| FrameGrabError::EncodeError {
            path: path.to_path_buf(),
            reason,
        };

        let mut buffer = Vec::new();
        let result = match format {
            ImageFormat::Jpeg => {
                let encoder = JpegEncoder::new_with_quality(&mut buffer, self.jpeg_quality);
                if image.color().has_alpha() {
                    DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)
                } else {
                    image.write_with_encoder(encoder)
                }
            }
            ImageFormat::Png => image.write_with_encoder(PngEncoder::new(&mut buffer)),
        };
        result.map_err(|error| encode_error(error.to_string()))?;

        if let Err(error) = fs::write(path, &buffer) {
            let _ = fs::remove_file(path);
            return Err(encode_error(error.to_string()));
        }

        log::debug!("Wrote {} ({} bytes)", path.display(), buffer.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases() {
        assert_eq!("JPEG".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert_eq!(".png".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert!(matches!(
            "bmp".parse::<ImageFormat>(),
            Err(FrameGrabError::UnsupportedImageFormat(_))
        ));
    }

    #[test]
    fn quality_is_clamped() {
        assert_eq!(FrameCodec::new(0).jpeg_quality(), 1);
        assert_eq!(FrameCodec::new(250).jpeg_quality(), 100);
    }
}
