// SPDX-License-Identifier: GPL-3.0-only

//! Photo output pipeline
//!
//! ```text
//! Camera Frame → Post-Processing → JPEG Encoding → Disk I/O
//!                (resize, logo)
//! ```

pub mod encoding;
pub mod processing;

pub use encoding::{EncodedImage, PhotoEncoder};
pub use processing::{PostProcessingConfig, PostProcessor, ProcessedImage};

use crate::backends::camera::types::CameraFrame;
use crate::errors::{StorageError, StorageResult};
use std::path::Path;
use tracing::info;

/// Process, encode and write a single photo
#[derive(Debug, Clone)]
pub struct PhotoPipeline {
    post_processor: PostProcessor,
    encoder: PhotoEncoder,
}

impl PhotoPipeline {
    pub fn new(processing: PostProcessingConfig, encoder: PhotoEncoder) -> Self {
        Self {
            post_processor: PostProcessor::new(processing),
            encoder,
        }
    }

    /// Encode a frame to JPEG bytes
    pub fn encode(&self, frame: &CameraFrame) -> StorageResult<EncodedImage> {
        let processed = self.post_processor.process(frame)?;
        self.encoder.encode(processed)
    }

    /// Encode a frame and write it to `path`
    ///
    /// Blocking; run it off the event loop.
    pub fn write(&self, frame: &CameraFrame, path: &Path) -> StorageResult<()> {
        let encoded = self.encode(frame)?;
        std::fs::write(path, &encoded.data).map_err(|e| StorageError::io(path, e))?;
        info!(
            path = %path.display(),
            width = encoded.width,
            height = encoded.height,
            size = encoded.data.len(),
            "Photo saved"
        );
        Ok(())
    }
}

impl Default for PhotoPipeline {
    fn default() -> Self {
        Self::new(PostProcessingConfig::default(), PhotoEncoder::default())
    }
}
