// SPDX-License-Identifier: GPL-3.0-only

//! Review of a captured artifact
//!
//! The review screen owns the artifact until the user decides what happens
//! to it. Every decision consumes the screen, so an artifact is reviewed once.

use crate::backends::camera::types::CameraFrame;
use crate::capture::CaptureMode;
use crate::media::{MediaArtifact, MediaKind};
use std::time::Duration;
use tracing::info;

/// What the user decided to do with a reviewed artifact
#[derive(Debug)]
pub enum Disposition {
    /// Keep it; the shell persists the artifact
    Accepted(MediaArtifact),
    /// Throw it away and capture again in the same mode
    Retake { mode: CaptureMode },
    /// Throw it away and go back to the start
    Cancelled,
}

/// Holds one artifact while it is played back for review
#[derive(Debug)]
pub struct ReviewScreen {
    artifact: MediaArtifact,
    mode: CaptureMode,
}

impl ReviewScreen {
    /// Show an artifact for review
    pub fn show(artifact: MediaArtifact) -> Self {
        let mode = match artifact.kind() {
            MediaKind::Image => CaptureMode::Photo,
            MediaKind::LoopedClip => CaptureMode::Boomerang,
            MediaKind::Clip => CaptureMode::Video,
        };
        info!(
            kind = %artifact.kind(),
            session = %artifact.session_id(),
            frames = artifact.frame_count(),
            "Reviewing artifact"
        );
        Self { artifact, mode }
    }

    pub fn artifact(&self) -> &MediaArtifact {
        &self.artifact
    }

    /// Mode that produced the artifact
    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    /// Frame to display `elapsed` after review started
    ///
    /// Stills show their frame, boomerangs loop, videos play once and hold
    /// their last frame.
    pub fn frame_at(&self, elapsed: Duration) -> &CameraFrame {
        let frames = self.artifact.frames();
        let frame_duration = self.artifact.framerate().frame_duration();
        if frames.len() == 1 || frame_duration.is_zero() {
            return self.artifact.first_frame();
        }

        let index = (elapsed.as_nanos() / frame_duration.as_nanos()) as usize;
        let index = match self.artifact.kind() {
            MediaKind::LoopedClip => index % frames.len(),
            MediaKind::Image | MediaKind::Clip => index.min(frames.len() - 1),
        };
        &frames[index]
    }

    /// Keep the artifact
    pub fn accept(self) -> Disposition {
        info!(session = %self.artifact.session_id(), "Artifact accepted");
        Disposition::Accepted(self.artifact)
    }

    /// Drop the artifact and capture again
    pub fn retake(self) -> Disposition {
        info!(session = %self.artifact.session_id(), mode = %self.mode, "Retake requested");
        Disposition::Retake { mode: self.mode }
    }

    /// Drop the artifact
    pub fn cancel(self) -> Disposition {
        info!(session = %self.artifact.session_id(), "Review cancelled");
        Disposition::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::Framerate;
    use chrono::Local;
    use uuid::Uuid;

    fn numbered(count: u8) -> Vec<CameraFrame> {
        (0..count)
            .map(|i| CameraFrame::from_rgba(1, 1, vec![i, 0, 0, 255]))
            .collect()
    }

    fn clip(kind: MediaKind, count: u8) -> MediaArtifact {
        MediaArtifact::new(
            kind,
            numbered(count),
            Framerate::from_int(10),
            Local::now(),
            Uuid::new_v4(),
        )
        .unwrap()
    }

    fn red(frame: &CameraFrame) -> u8 {
        frame.data[0]
    }

    #[test]
    fn test_boomerang_loops() {
        let review = ReviewScreen::show(clip(MediaKind::LoopedClip, 4));
        assert_eq!(red(review.frame_at(Duration::from_millis(250))), 2);
        assert_eq!(red(review.frame_at(Duration::from_millis(450))), 0);
    }

    #[test]
    fn test_video_holds_last_frame() {
        let review = ReviewScreen::show(clip(MediaKind::Clip, 4));
        assert_eq!(red(review.frame_at(Duration::from_millis(150))), 1);
        assert_eq!(red(review.frame_at(Duration::from_secs(10))), 3);
    }

    #[test]
    fn test_still_shows_its_frame() {
        let frame = CameraFrame::from_rgba(1, 1, vec![42, 0, 0, 255]);
        let review = ReviewScreen::show(MediaArtifact::image(frame, Local::now(), Uuid::new_v4()));
        assert_eq!(review.mode(), CaptureMode::Photo);
        assert_eq!(red(review.frame_at(Duration::from_secs(3))), 42);
    }

    #[test]
    fn test_dispositions() {
        let artifact = clip(MediaKind::Clip, 2);
        let id = artifact.session_id();
        match ReviewScreen::show(artifact).accept() {
            Disposition::Accepted(artifact) => assert_eq!(artifact.session_id(), id),
            other => panic!("unexpected disposition {:?}", other),
        }

        assert!(matches!(
            ReviewScreen::show(clip(MediaKind::LoopedClip, 2)).retake(),
            Disposition::Retake {
                mode: CaptureMode::Boomerang
            }
        ));
        assert!(matches!(
            ReviewScreen::show(clip(MediaKind::Clip, 2)).cancel(),
            Disposition::Cancelled
        ));
    }
}
