// SPDX-License-Identifier: GPL-3.0-only

//! Output pipelines for accepted media
//!
//! ```text
//! ┌───────────────┐     ┌────────────────────┐     ┌──────────────┐
//! │ Image         │ ──▶ │ Photo Pipeline     │ ──▶ │  N.jpeg      │
//! │               │     │ resize, logo, JPEG │     │              │
//! ├───────────────┤     ├────────────────────┤     ├──────────────┤
//! │ Looped clip   │ ──▶ │ Boomerang Encoder  │ ──▶ │  N.gif       │
//! │               │     │ logo, GIF          │     │              │
//! ├───────────────┤     ├────────────────────┤     ├──────────────┤
//! │ Clip          │ ──▶ │ Video Writer       │ ──▶ │  N.mp4       │
//! │               │     │ logo, H.264        │     │              │
//! └───────────────┘     └────────────────────┘     └──────────────┘
//! ```
//!
//! Everything here blocks; storage runs it on tokio's blocking pool.
//!
//! # Modules
//!
//! - [`photo`]: Photo post-processing and JPEG encoding
//! - [`boomerang`]: Looping GIF output
//! - [`video`]: Encoder selection and MP4 writing
//! - [`watermark`]: Logo and caption overlay

pub mod boomerang;
pub mod photo;
pub mod video;
pub mod watermark;

pub use boomerang::BoomerangEncoder;
pub use photo::{PhotoEncoder, PhotoPipeline, PostProcessingConfig};
pub use video::VideoWriter;
pub use watermark::{Caption, Watermark};

use crate::backends::camera::types::CameraFrame;
use crate::config::{Config, WatermarkConfig};
use crate::errors::StorageResult;
use crate::media::{MediaArtifact, MediaKind, frame_to_rgba};
use image::{RgbaImage, imageops};
use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Writes any artifact kind to disk
#[derive(Debug, Clone, Default)]
pub struct MediaWriter {
    photo: PhotoPipeline,
    boomerang: BoomerangEncoder,
    video: VideoWriter,
    /// Stamped onto clip frames; photos carry theirs in the pipeline
    watermark: Option<Arc<Watermark>>,
}

impl MediaWriter {
    pub fn new(photo: PhotoPipeline, boomerang: BoomerangEncoder, video: VideoWriter) -> Self {
        Self {
            photo,
            boomerang,
            video,
            watermark: None,
        }
    }

    /// Stamp `watermark` onto boomerangs and videos
    pub fn with_clip_watermark(mut self, watermark: Arc<Watermark>) -> Self {
        self.watermark = Some(watermark);
        self
    }

    /// Build the writers from configuration
    ///
    /// A watermark that fails to load is logged and left out.
    pub fn from_config(config: &Config) -> Self {
        let watermark = load_watermark(&config.watermark);

        let processing = PostProcessingConfig {
            target_size: config.output.photo_size(),
            watermark: watermark.clone(),
        };

        let writer = Self::new(
            PhotoPipeline::new(processing, PhotoEncoder::new(config.output.jpeg_quality)),
            BoomerangEncoder::default(),
            VideoWriter::new(config.output.bitrate_preset),
        );
        match watermark {
            Some(watermark) => writer.with_clip_watermark(watermark),
            None => writer,
        }
    }

    /// Copy of `frames` with the watermark on every frame
    ///
    /// Frames that can't be read are passed through unchanged.
    fn stamp_clip<'a>(&self, frames: &'a [CameraFrame]) -> Cow<'a, [CameraFrame]> {
        let Some(watermark) = &self.watermark else {
            return Cow::Borrowed(frames);
        };

        let mut layer: Option<((u32, u32), Option<RgbaImage>)> = None;
        let stamped = frames
            .iter()
            .map(|frame| {
                let size = (frame.width, frame.height);
                if layer.as_ref().is_none_or(|(rendered, _)| *rendered != size) {
                    layer = Some((size, watermark.render(size.0, size.1)));
                }
                let Some((_, Some(overlay))) = &layer else {
                    return frame.clone();
                };
                let Some(mut rgba) = frame_to_rgba(frame) else {
                    return frame.clone();
                };
                imageops::overlay(&mut rgba, overlay, 0, 0);
                let mut stamped = CameraFrame::from_rgba(frame.width, frame.height, rgba.into_raw());
                stamped.captured_at = frame.captured_at;
                stamped
            })
            .collect::<Vec<_>>();
        debug!(frames = stamped.len(), "Clip watermarked");
        Cow::Owned(stamped)
    }

    /// Encode an artifact to `path`
    pub fn write(&self, artifact: &MediaArtifact, path: &Path) -> StorageResult<()> {
        match artifact.kind() {
            MediaKind::Image => self.photo.write(artifact.first_frame(), path),
            MediaKind::LoopedClip => {
                let frames = self.stamp_clip(artifact.frames());
                self.boomerang.write(&frames, artifact.framerate(), path)
            }
            MediaKind::Clip => {
                let frames = self.stamp_clip(artifact.frames());
                self.video.write(&frames, artifact.framerate(), path).map(|_| ())
            }
        }
    }
}

/// Load the configured logo and caption
fn load_watermark(config: &WatermarkConfig) -> Option<Arc<Watermark>> {
    let path = config.image.as_deref()?;
    let mut watermark = match Watermark::load(path, config.width_fraction, config.margin) {
        Ok(watermark) => watermark,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Watermark disabled");
            return None;
        }
    };

    if let Some(text) = config.text.as_deref().filter(|text| !text.trim().is_empty()) {
        match config.font.clone().or_else(Caption::find_system_font) {
            Some(font) => match Caption::load(text, &font) {
                Ok(caption) => watermark = watermark.with_caption(caption),
                Err(e) => warn!(font = %font.display(), error = %e, "Caption disabled"),
            },
            None => warn!("No font found for the watermark caption, caption disabled"),
        }
    }

    info!(
        path = %path.display(),
        caption = ?watermark.caption().map(Caption::text),
        "Watermark enabled"
    );
    Some(Arc::new(watermark))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::CameraFrame;
    use chrono::Local;
    use uuid::Uuid;

    #[test]
    fn test_missing_watermark_is_skipped() {
        let mut config = Config::default();
        config.watermark.image = Some("/nonexistent/logo.png".into());
        config.output.photo_size = [32, 24];
        let writer = MediaWriter::from_config(&config);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1.jpeg");
        let frame = CameraFrame::from_rgba(8, 6, vec![200; 8 * 6 * 4]);
        let artifact = MediaArtifact::image(frame, Local::now(), Uuid::new_v4());
        writer.write(&artifact, &path).unwrap();

        let saved = image::open(&path).unwrap();
        assert_eq!((saved.width(), saved.height()), (32, 24));
    }

    fn red_logo_writer() -> MediaWriter {
        let logo = RgbaImage::from_pixel(4, 4, image::Rgba([255, 0, 0, 255]));
        MediaWriter::default().with_clip_watermark(Arc::new(Watermark::new(logo, 0.25, 2)))
    }

    fn black_frames(count: usize) -> Vec<CameraFrame> {
        (0..count)
            .map(|_| CameraFrame::from_rgba(40, 40, [0, 0, 0, 255].repeat(40 * 40)))
            .collect()
    }

    #[test]
    fn test_boomerang_frames_carry_watermark() {
        use image::AnimationDecoder;
        use image::codecs::gif::GifDecoder;

        let writer = red_logo_writer();
        let artifact = MediaArtifact::new(
            MediaKind::LoopedClip,
            black_frames(3),
            crate::backends::camera::types::Framerate::from_int(10),
            Local::now(),
            Uuid::new_v4(),
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1.gif");
        writer.write(&artifact, &path).unwrap();

        let file = std::io::BufReader::new(std::fs::File::open(&path).unwrap());
        let frames = GifDecoder::new(file).unwrap().into_frames().collect_frames().unwrap();
        assert_eq!(frames.len(), 3);
        for frame in &frames {
            let buffer = frame.buffer();
            // 10x10 logo ending 2px from the corner
            let logo = buffer.get_pixel(33, 33).0;
            assert!(logo[0] > 200 && logo[1] < 50 && logo[2] < 50, "{:?}", logo);
            let background = buffer.get_pixel(5, 5).0;
            assert!(background[0] < 50, "{:?}", background);
        }
    }

    #[test]
    fn test_clip_stamping_keeps_timing() {
        let writer = red_logo_writer();
        let frames = black_frames(2);
        let stamped = writer.stamp_clip(&frames);
        assert_eq!(stamped.len(), 2);
        for (original, stamped) in frames.iter().zip(stamped.iter()) {
            assert_eq!(stamped.captured_at, original.captured_at);
            assert_eq!(&stamped.data[..4], &[0, 0, 0, 255]);
            let corner = ((33 * 40 + 33) * 4) as usize;
            assert_eq!(&stamped.data[corner..corner + 4], &[255, 0, 0, 255]);
        }

        // No watermark: frames pass through untouched
        assert!(matches!(
            MediaWriter::default().stamp_clip(&frames),
            Cow::Borrowed(_)
        ));
    }
}
