// SPDX-License-Identifier: GPL-3.0-only

//! Captured media
//!
//! A capture session ends in a [`MediaArtifact`]: the frames of a photo,
//! boomerang or video together with the rate they play back at. The review
//! screen owns it until the user accepts, retakes or cancels.
//!
//! # Modules
//!
//! - [`boomerang`]: Forward/reverse arrangement of a burst
//! - [`frame`]: Frame to `image` buffer conversion

pub mod boomerang;
pub mod frame;

pub use frame::{frame_to_rgb, frame_to_rgba, sample_pixel_rgb};

use crate::backends::camera::types::{CameraFrame, Framerate};
use chrono::{DateTime, Local};
use std::time::Duration;
use uuid::Uuid;

/// Kind of captured media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// A single still frame
    Image,
    /// A short clip that plays in a loop (boomerang)
    LoopedClip,
    /// A clip that plays once (video)
    Clip,
}

impl MediaKind {
    /// Human readable name
    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Image => "photo",
            MediaKind::LoopedClip => "boomerang",
            MediaKind::Clip => "video",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Finalized output of a capture session
///
/// Always holds at least one frame; an image holds exactly one.
#[derive(Debug, Clone)]
pub struct MediaArtifact {
    kind: MediaKind,
    frames: Vec<CameraFrame>,
    framerate: Framerate,
    captured_at: DateTime<Local>,
    session_id: Uuid,
}

impl MediaArtifact {
    /// Build an artifact, or `None` if the frames don't fit the kind
    pub fn new(
        kind: MediaKind,
        frames: Vec<CameraFrame>,
        framerate: Framerate,
        captured_at: DateTime<Local>,
        session_id: Uuid,
    ) -> Option<Self> {
        let valid = match kind {
            MediaKind::Image => frames.len() == 1,
            MediaKind::LoopedClip | MediaKind::Clip => !frames.is_empty(),
        };
        valid.then_some(Self {
            kind,
            frames,
            framerate,
            captured_at,
            session_id,
        })
    }

    /// A still image from one frame
    pub fn image(frame: CameraFrame, captured_at: DateTime<Local>, session_id: Uuid) -> Self {
        Self {
            kind: MediaKind::Image,
            frames: vec![frame],
            framerate: Framerate::from_int(1),
            captured_at,
            session_id,
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn frames(&self) -> &[CameraFrame] {
        &self.frames
    }

    /// First frame, used as the still for images
    pub fn first_frame(&self) -> &CameraFrame {
        // Constructors guarantee at least one frame
        &self.frames[0]
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Playback rate
    pub fn framerate(&self) -> Framerate {
        self.framerate
    }

    /// Wall-clock time the session started
    pub fn captured_at(&self) -> DateTime<Local> {
        self.captured_at
    }

    /// Id of the session that produced this artifact
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Playback length of one run through the frames
    pub fn duration(&self) -> Duration {
        match self.kind {
            MediaKind::Image => Duration::ZERO,
            _ => self.framerate.frame_duration() * self.frames.len() as u32,
        }
    }

    /// Frame dimensions
    pub fn dimensions(&self) -> (u32, u32) {
        let frame = self.first_frame();
        (frame.width, frame.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> CameraFrame {
        CameraFrame::from_rgba(2, 2, vec![0; 16])
    }

    #[test]
    fn test_image_needs_exactly_one_frame() {
        let now = Local::now();
        let id = Uuid::new_v4();
        let fps = Framerate::from_int(1);
        assert!(MediaArtifact::new(MediaKind::Image, vec![], fps, now, id).is_none());
        assert!(MediaArtifact::new(MediaKind::Image, vec![frame(), frame()], fps, now, id).is_none());
        assert!(MediaArtifact::new(MediaKind::Image, vec![frame()], fps, now, id).is_some());
    }

    #[test]
    fn test_clip_needs_a_frame() {
        let now = Local::now();
        let id = Uuid::new_v4();
        let fps = Framerate::from_int(20);
        assert!(MediaArtifact::new(MediaKind::Clip, vec![], fps, now, id).is_none());

        let clip = MediaArtifact::new(MediaKind::LoopedClip, vec![frame(); 10], fps, now, id).unwrap();
        assert_eq!(clip.duration(), Duration::from_millis(500));
        assert_eq!(clip.dimensions(), (2, 2));
        assert_eq!(clip.session_id(), id);
    }
}
