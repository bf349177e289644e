// SPDX-License-Identifier: GPL-3.0-only

//! Encode captured frames to an MP4 file
//!
//! ```text
//! appsrc (RGBA) → videoconvert → H.264 encoder → h264parse → mp4mux → filesink
//! ```
//!
//! Frames are timestamped from their index and the clip framerate, so the
//! file plays at the rate the clip was measured at.

use super::encoder_selection::{SelectedEncoder, make_element, select_encoder};
use crate::backends::camera::types::{CameraFrame, Framerate};
use crate::constants::{BitratePreset, capture, timing};
use crate::errors::{StorageError, StorageResult};
use crate::media::frame_to_rgba;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app::AppSrc;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Writes clip frames as H.264 in MP4
#[derive(Debug, Clone, Copy, Default)]
pub struct VideoWriter {
    preset: BitratePreset,
}

impl VideoWriter {
    pub fn new(preset: BitratePreset) -> Self {
        Self { preset }
    }

    /// Encode `frames` to `path`
    ///
    /// Blocks until the muxer has finalized the file. A partially written
    /// file is removed on failure.
    pub fn write(
        &self,
        frames: &[CameraFrame],
        framerate: Framerate,
        path: &Path,
    ) -> StorageResult<usize> {
        let result = self.encode(frames, framerate, path);
        if result.is_err()
            && path.exists()
            && let Err(e) = std::fs::remove_file(path)
        {
            warn!(path = %path.display(), error = %e, "Failed to remove partial video");
        }
        result
    }

    fn encode(
        &self,
        frames: &[CameraFrame],
        framerate: Framerate,
        path: &Path,
    ) -> StorageResult<usize> {
        let first = frames.first().ok_or(StorageError::EmptyArtifact)?;
        let (width, height) = (first.width, first.height);
        let framerate = if framerate.num == 0 || framerate.denom == 0 {
            Framerate::from_int(capture::FALLBACK_FRAMERATE)
        } else {
            framerate
        };

        let encoder = select_encoder(self.preset, width)?;
        let pipeline = EncodePipeline::new(encoder, width, height, framerate, path)?;
        pipeline.start()?;

        let frame_ns = framerate.frame_duration().as_nanos() as u64;
        let mut pushed: u64 = 0;
        for (index, frame) in frames.iter().enumerate() {
            if (frame.width, frame.height) != (width, height) {
                warn!(
                    index,
                    width = frame.width,
                    height = frame.height,
                    "Skipping frame with different size"
                );
                continue;
            }
            let Some(rgba) = frame_to_rgba(frame) else {
                warn!(index, "Skipping unreadable frame");
                continue;
            };

            let mut buffer = gst::Buffer::from_mut_slice(rgba.into_raw());
            {
                let buffer_ref = buffer.get_mut().ok_or_else(|| {
                    StorageError::Encoding("Failed to get mutable buffer reference".into())
                })?;
                buffer_ref.set_pts(gst::ClockTime::from_nseconds(frame_ns * pushed));
                buffer_ref.set_duration(gst::ClockTime::from_nseconds(frame_ns));
            }

            if let Err(e) = pipeline.appsrc.push_buffer(buffer) {
                let reason = pipeline
                    .bus_error()
                    .unwrap_or_else(|| format!("Failed to push frame: {:?}", e));
                return Err(StorageError::Encoding(reason));
            }
            pushed += 1;
        }

        if pushed == 0 {
            return Err(StorageError::EmptyArtifact);
        }

        pipeline.finish()?;
        info!(
            path = %path.display(),
            frames = pushed,
            fps = %framerate,
            width,
            height,
            "Video saved"
        );
        Ok(pushed as usize)
    }
}

/// An appsrc-fed encoding pipeline, set to Null on drop
struct EncodePipeline {
    pipeline: gst::Pipeline,
    appsrc: AppSrc,
}

impl EncodePipeline {
    fn new(
        selected: SelectedEncoder,
        width: u32,
        height: u32,
        framerate: Framerate,
        path: &Path,
    ) -> StorageResult<Self> {
        let pipeline = gst::Pipeline::new();

        let appsrc = make_element("appsrc")?
            .downcast::<AppSrc>()
            .map_err(|_| StorageError::Encoding("Failed to downcast to AppSrc".into()))?;

        let caps = gst::Caps::builder("video/x-raw")
            .field("format", "RGBA")
            .field("width", width as i32)
            .field("height", height as i32)
            .field(
                "framerate",
                gst::Fraction::new(framerate.num as i32, framerate.denom as i32),
            )
            .build();
        appsrc.set_caps(Some(&caps));
        appsrc.set_format(gst::Format::Time);
        appsrc.set_is_live(false);
        // Wait for the encoder instead of queueing the whole clip
        appsrc.set_property("block", true);

        let videoconvert = make_element("videoconvert")?;
        let filesink = gst::ElementFactory::make("filesink")
            .property("location", path.to_string_lossy().to_string())
            .build()
            .map_err(|e| StorageError::Encoding(format!("Failed to create filesink: {}", e)))?;

        let elements = [
            appsrc.upcast_ref(),
            &videoconvert,
            &selected.encoder,
            &selected.parser,
            &selected.muxer,
            &filesink,
        ];
        pipeline
            .add_many(elements)
            .map_err(|e| StorageError::Encoding(format!("Failed to add elements: {}", e)))?;
        gst::Element::link_many(elements)
            .map_err(|e| StorageError::Encoding(format!("Failed to link elements: {}", e)))?;

        debug!(
            encoder = selected.info.element_name,
            width,
            height,
            fps = %framerate,
            "Encode pipeline created"
        );

        Ok(Self { pipeline, appsrc })
    }

    fn start(&self) -> StorageResult<()> {
        self.pipeline.set_state(gst::State::Playing).map_err(|e| {
            let reason = self
                .bus_error()
                .unwrap_or_else(|| format!("Failed to start encoder: {}", e));
            StorageError::Encoding(reason)
        })?;
        Ok(())
    }

    /// Send EOS and wait for the muxer to write the file trailer
    fn finish(&self) -> StorageResult<()> {
        self.appsrc
            .end_of_stream()
            .map_err(|e| StorageError::Encoding(format!("Failed to send EOS: {:?}", e)))?;

        let bus = self
            .pipeline
            .bus()
            .ok_or_else(|| StorageError::Encoding("No bus available".into()))?;
        let message = bus.timed_pop_filtered(
            gst::ClockTime::from_seconds(timing::ENCODE_EOS_TIMEOUT_SECS),
            &[gst::MessageType::Eos, gst::MessageType::Error],
        );

        match message.as_ref().map(|msg| msg.view()) {
            Some(gst::MessageView::Eos(..)) => Ok(()),
            Some(gst::MessageView::Error(err)) => {
                error!(
                    error = %err.error(),
                    debug = ?err.debug(),
                    source = ?err.src().map(|s| s.name()),
                    "GStreamer error while encoding"
                );
                Err(StorageError::Encoding(err.error().to_string()))
            }
            _ => Err(StorageError::Encoding(format!(
                "Encoder did not finish within {}s",
                timing::ENCODE_EOS_TIMEOUT_SECS
            ))),
        }
    }

    fn bus_error(&self) -> Option<String> {
        let bus = self.pipeline.bus()?;
        let msg = bus.pop_filtered(&[gst::MessageType::Error])?;
        match msg.view() {
            gst::MessageView::Error(err) => Some(err.error().to_string()),
            _ => None,
        }
    }
}

impl Drop for EncodePipeline {
    fn drop(&mut self) {
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            error!(?e, "Failed to set encode pipeline to Null on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_clip_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1.mp4");
        let result = VideoWriter::default().write(&[], Framerate::from_int(20), &path);
        assert!(matches!(result, Err(StorageError::EmptyArtifact)));
        assert!(!path.exists());
    }
}
