// SPDX-License-Identifier: GPL-3.0-only

//! JPEG encoding for photos

use super::processing::ProcessedImage;
use crate::errors::{StorageError, StorageResult};
use image::RgbImage;
use tracing::debug;

/// Encoded image data ready for saving
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Photo encoder
#[derive(Debug, Clone, Copy)]
pub struct PhotoEncoder {
    quality: u8,
}

impl PhotoEncoder {
    /// JPEG quality is clamped to 1-100
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode a processed image
    pub fn encode(&self, processed: ProcessedImage) -> StorageResult<EncodedImage> {
        let data = Self::encode_jpeg(&processed.image, self.quality)?;
        debug!(
            size = data.len(),
            width = processed.width,
            height = processed.height,
            quality = self.quality,
            "JPEG encoding complete"
        );
        Ok(EncodedImage {
            data,
            width: processed.width,
            height: processed.height,
        })
    }

    fn encode_jpeg(image: &RgbImage, quality: u8) -> StorageResult<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);

        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
        encoder.encode(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )?;

        if buffer.is_empty() {
            return Err(StorageError::EmptyArtifact);
        }
        Ok(buffer)
    }
}

impl Default for PhotoEncoder {
    fn default() -> Self {
        Self::new(crate::constants::output::JPEG_QUALITY)
    }
}
