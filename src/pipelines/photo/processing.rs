// SPDX-License-Identifier: GPL-3.0-only

//! Post-processing for photos
//!
//! Runs on RGBA data so the watermark can be alpha-blended, then drops the
//! alpha channel for JPEG encoding.

use crate::backends::camera::types::CameraFrame;
use crate::errors::{StorageError, StorageResult};
use crate::media::frame_to_rgba;
use crate::pipelines::watermark::Watermark;
use image::{DynamicImage, RgbImage, imageops};
use std::sync::Arc;
use tracing::debug;

/// Post-processing configuration
#[derive(Debug, Clone, Default)]
pub struct PostProcessingConfig {
    /// Output size, `None` keeps the camera size
    pub target_size: Option<(u32, u32)>,
    /// Logo blended into the bottom-right corner
    pub watermark: Option<Arc<Watermark>>,
}

/// Processed image data
pub struct ProcessedImage {
    pub image: RgbImage,
    pub width: u32,
    pub height: u32,
}

/// Post-processor for captured frames
#[derive(Debug, Clone)]
pub struct PostProcessor {
    config: PostProcessingConfig,
}

impl PostProcessor {
    pub fn new(config: PostProcessingConfig) -> Self {
        Self { config }
    }

    /// Resize and watermark a frame
    pub fn process(&self, frame: &CameraFrame) -> StorageResult<ProcessedImage> {
        let mut rgba = frame_to_rgba(frame).ok_or_else(|| {
            StorageError::Encoding(format!(
                "frame buffer too small for {}x{} {:?}",
                frame.width, frame.height, frame.format
            ))
        })?;

        if let Some((width, height)) = self.config.target_size
            && (width, height) != rgba.dimensions()
            && width > 0
            && height > 0
        {
            debug!(
                from_width = rgba.width(),
                from_height = rgba.height(),
                width,
                height,
                "Resizing photo"
            );
            rgba = imageops::resize(&rgba, width, height, imageops::FilterType::Triangle);
        }

        if let Some(watermark) = &self.config.watermark {
            watermark.apply(&mut rgba);
        }

        let (width, height) = rgba.dimensions();
        Ok(ProcessedImage {
            image: DynamicImage::ImageRgba8(rgba).to_rgb8(),
            width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn white_frame(width: u32, height: u32) -> CameraFrame {
        CameraFrame::from_rgba(width, height, vec![255; (width * height * 4) as usize])
    }

    #[test]
    fn test_keeps_size_without_target() {
        let processor = PostProcessor::new(PostProcessingConfig::default());
        let processed = processor.process(&white_frame(8, 6)).unwrap();
        assert_eq!((processed.width, processed.height), (8, 6));
        assert_eq!(processed.image.get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn test_resizes_to_target() {
        let processor = PostProcessor::new(PostProcessingConfig {
            target_size: Some((16, 10)),
            watermark: None,
        });
        let processed = processor.process(&white_frame(8, 6)).unwrap();
        assert_eq!(processed.image.dimensions(), (16, 10));
    }

    #[test]
    fn test_watermark_after_resize() {
        let logo = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 255, 255]));
        let processor = PostProcessor::new(PostProcessingConfig {
            target_size: Some((40, 40)),
            watermark: Some(Arc::new(Watermark::new(logo, 0.25, 2))),
        });
        let processed = processor.process(&white_frame(10, 10)).unwrap();
        assert_eq!(processed.image.get_pixel(35, 35).0, [0, 0, 255]);
        assert_eq!(processed.image.get_pixel(5, 5).0, [255, 255, 255]);
    }
}
