// SPDX-License-Identifier: GPL-3.0-only

//! Boomerang output as a looping GIF

use crate::backends::camera::types::{CameraFrame, Framerate};
use crate::errors::{StorageError, StorageResult};
use crate::media::frame_to_rgba;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

/// Writes already-arranged boomerang frames as an endlessly looping GIF
#[derive(Debug, Clone, Copy)]
pub struct BoomerangEncoder {
    speed: i32,
}

impl BoomerangEncoder {
    /// `speed` trades palette quality for encode time (1-30)
    pub fn new(speed: i32) -> Self {
        Self {
            speed: speed.clamp(1, 30),
        }
    }

    /// Encode frames into `writer`
    ///
    /// Frames that don't match the first frame's size are skipped.
    pub fn encode<W: Write>(
        &self,
        frames: &[CameraFrame],
        framerate: Framerate,
        writer: W,
    ) -> StorageResult<usize> {
        let first = frames.first().ok_or(StorageError::EmptyArtifact)?;
        let size = (first.width, first.height);
        let delay = frame_delay(framerate);

        let mut encoder = GifEncoder::new_with_speed(writer, self.speed);
        encoder.set_repeat(Repeat::Infinite)?;

        let mut written = 0;
        for (index, frame) in frames.iter().enumerate() {
            if (frame.width, frame.height) != size {
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
            encoder.encode_frame(Frame::from_parts(rgba, 0, 0, delay))?;
            written += 1;
        }

        if written == 0 {
            return Err(StorageError::EmptyArtifact);
        }
        Ok(written)
    }

    /// Encode frames to a GIF file
    ///
    /// A partially written file is removed on failure.
    pub fn write(
        &self,
        frames: &[CameraFrame],
        framerate: Framerate,
        path: &Path,
    ) -> StorageResult<()> {
        let result = self.write_file(frames, framerate, path);
        if result.is_err()
            && path.exists()
            && let Err(e) = std::fs::remove_file(path)
        {
            warn!(path = %path.display(), error = %e, "Failed to remove partial boomerang");
        }
        result
    }

    fn write_file(
        &self,
        frames: &[CameraFrame],
        framerate: Framerate,
        path: &Path,
    ) -> StorageResult<()> {
        let file = std::fs::File::create(path).map_err(|e| StorageError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        let written = self.encode(frames, framerate, &mut writer)?;
        writer.flush().map_err(|e| StorageError::io(path, e))?;
        info!(path = %path.display(), frames = written, fps = %framerate, "Boomerang saved");
        Ok(())
    }
}

impl Default for BoomerangEncoder {
    fn default() -> Self {
        Self::new(crate::constants::output::GIF_SPEED)
    }
}

/// Display time of one GIF frame
fn frame_delay(framerate: Framerate) -> Delay {
    if framerate.num == 0 {
        return Delay::from_numer_denom_ms(1000, crate::constants::capture::FALLBACK_FRAMERATE);
    }
    Delay::from_numer_denom_ms(1000 * framerate.denom.max(1), framerate.num)
}
