// SPDX-License-Identifier: GPL-3.0-only

//! Capture sessions
//!
//! A session runs a countdown (lead-in) and then a recording window. Frames
//! delivered by the camera are fed in with [`CaptureSession::record`]; photos
//! keep only the newest frame, clips keep every frame inside the window.

use crate::backends::camera::types::{CameraFrame, Framerate};
use crate::config::TimingConfig;
use crate::errors::{CaptureError, CaptureResult};
use crate::media::boomerang::arrange_boomerang;
use crate::media::{MediaArtifact, MediaKind};
use chrono::{DateTime, Local};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Identifies a capture session
pub type SessionId = Uuid;

/// What the booth is capturing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureMode {
    Photo,
    Boomerang,
    Video,
}

impl CaptureMode {
    pub const ALL: [CaptureMode; 3] = [
        CaptureMode::Photo,
        CaptureMode::Boomerang,
        CaptureMode::Video,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CaptureMode::Photo => "Photo",
            CaptureMode::Boomerang => "Boomerang",
            CaptureMode::Video => "Video",
        }
    }

    /// Kind of artifact a session of this mode produces
    pub fn media_kind(&self) -> MediaKind {
        match self {
            CaptureMode::Photo => MediaKind::Image,
            CaptureMode::Boomerang => MediaKind::LoopedClip,
            CaptureMode::Video => MediaKind::Clip,
        }
    }

    /// Countdown and recording window for this mode
    pub fn timing(&self, config: &TimingConfig) -> CaptureTiming {
        let ms = Duration::from_millis;
        match self {
            CaptureMode::Photo => CaptureTiming {
                lead_in: ms(config.photo_lead_in_ms),
                window: Duration::ZERO,
            },
            CaptureMode::Boomerang => CaptureTiming {
                lead_in: ms(config.boomerang_lead_in_ms),
                window: ms(config.boomerang_window_ms),
            },
            CaptureMode::Video => CaptureTiming {
                lead_in: ms(config.video_lead_in_ms),
                window: ms(config.video_window_ms).min(config.max_video()),
            },
        }
    }
}

impl std::fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Countdown and recording window of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTiming {
    pub lead_in: Duration,
    pub window: Duration,
}

impl CaptureTiming {
    pub fn total(&self) -> Duration {
        self.lead_in + self.window
    }
}

/// Where a session is on its timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Countdown { remaining: Duration },
    Recording { remaining: Duration },
    Finished,
}

/// Snapshot of a running session for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureProgress {
    pub session_id: SessionId,
    pub mode: CaptureMode,
    pub phase: SessionPhase,
    /// Frames kept so far
    pub frames: usize,
}

impl CaptureProgress {
    pub fn is_finished(&self) -> bool {
        self.phase == SessionPhase::Finished
    }

    /// Whole seconds left on the countdown, rounded up
    pub fn countdown_secs(&self) -> Option<u64> {
        match self.phase {
            SessionPhase::Countdown { remaining } => Some(ceil_secs(remaining)),
            _ => None,
        }
    }

    /// Whole seconds left to record, rounded up
    pub fn recording_secs(&self) -> Option<u64> {
        match self.phase {
            SessionPhase::Recording { remaining } => Some(ceil_secs(remaining)),
            _ => None,
        }
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_millis().div_ceil(1000) as u64
}

/// A capture in progress
#[derive(Debug)]
pub struct CaptureSession {
    id: SessionId,
    mode: CaptureMode,
    timing: CaptureTiming,
    started_at: Instant,
    timestamp: DateTime<Local>,
    frames: Vec<CameraFrame>,
    latest: Option<CameraFrame>,
}

impl CaptureSession {
    pub fn new(mode: CaptureMode, timing: CaptureTiming) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            timing,
            started_at: Instant::now(),
            timestamp: Local::now(),
            frames: Vec::new(),
            latest: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn timing(&self) -> CaptureTiming {
        self.timing
    }

    /// Wall-clock start time
    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    fn recording_start(&self) -> Instant {
        self.started_at + self.timing.lead_in
    }

    fn deadline(&self) -> Instant {
        self.recording_start() + self.timing.window
    }

    /// Phase at a given instant
    pub fn phase_at(&self, now: Instant) -> SessionPhase {
        let recording_start = self.recording_start();
        let deadline = self.deadline();
        if now < recording_start {
            SessionPhase::Countdown {
                remaining: recording_start - now,
            }
        } else if now < deadline {
            SessionPhase::Recording {
                remaining: deadline - now,
            }
        } else {
            SessionPhase::Finished
        }
    }

    /// Feed camera frames into the session
    pub fn record(&mut self, frames: Vec<CameraFrame>) {
        let recording_start = self.recording_start();
        let deadline = self.deadline();

        for frame in frames {
            if self.mode != CaptureMode::Photo
                && frame.captured_at >= recording_start
                && frame.captured_at <= deadline
            {
                self.frames.push(frame.clone());
            }
            self.latest = Some(frame);
        }
    }

    /// Frames kept so far
    pub fn frame_count(&self) -> usize {
        match self.mode {
            CaptureMode::Photo => usize::from(self.latest.is_some()),
            _ => self.frames.len(),
        }
    }

    pub fn progress(&self, now: Instant) -> CaptureProgress {
        CaptureProgress {
            session_id: self.id,
            mode: self.mode,
            phase: self.phase_at(now),
            frames: self.frame_count(),
        }
    }

    /// Turn the session into an artifact
    ///
    /// Boomerang bursts are arranged into `boomerang_passes` alternating
    /// passes. Clip playback rate is measured from frame timestamps and falls
    /// back to `fallback_fps`.
    pub fn finish(
        self,
        fallback_fps: u32,
        boomerang_passes: u32,
    ) -> CaptureResult<MediaArtifact> {
        let kind = self.mode.media_kind();

        if kind == MediaKind::Image {
            let still = self.latest.ok_or(CaptureError::NoFrameCaptured)?;
            return Ok(MediaArtifact::image(still, self.timestamp, self.id));
        }

        let framerate = measure_framerate(&self.frames)
            .unwrap_or_else(|| Framerate::from_int(fallback_fps.max(1)));
        let frames = if kind == MediaKind::LoopedClip {
            arrange_boomerang(&self.frames, boomerang_passes)
        } else {
            self.frames
        };

        MediaArtifact::new(kind, frames, framerate, self.timestamp, self.id)
            .ok_or(CaptureError::NoFrameCaptured)
    }

    /// Build an artifact from frames captured outside of [`Self::record`]
    pub fn finish_with(
        self,
        frames: Vec<CameraFrame>,
        framerate: Framerate,
    ) -> CaptureResult<MediaArtifact> {
        MediaArtifact::new(self.mode.media_kind(), frames, framerate, self.timestamp, self.id)
            .ok_or(CaptureError::NoFrameCaptured)
    }
}

/// Average delivery rate of a run of frames, rounded to whole fps
///
/// Needs at least two frames with distinct timestamps.
pub fn measure_framerate(frames: &[CameraFrame]) -> Option<Framerate> {
    let (first, last) = (frames.first()?, frames.last()?);
    let span = last.captured_at.checked_duration_since(first.captured_at)?;
    if frames.len() < 2 || span.is_zero() {
        return None;
    }

    let fps = ((frames.len() - 1) as f64 / span.as_secs_f64()).round() as u32;
    (1..=240).contains(&fps).then(|| Framerate::from_int(fps))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_at(at: Instant) -> CameraFrame {
        let mut frame = CameraFrame::from_rgba(1, 1, vec![0, 0, 0, 255]);
        frame.captured_at = at;
        frame
    }

    fn timing(lead_ms: u64, window_ms: u64) -> CaptureTiming {
        CaptureTiming {
            lead_in: Duration::from_millis(lead_ms),
            window: Duration::from_millis(window_ms),
        }
    }

    #[test]
    fn test_default_timings() {
        let config = TimingConfig::default();
        assert_eq!(CaptureMode::Photo.timing(&config), timing(3000, 0));
        assert_eq!(CaptureMode::Boomerang.timing(&config), timing(0, 2000));
        assert_eq!(CaptureMode::Video.timing(&config).total(), Duration::from_secs(10));
    }

    #[test]
    fn test_video_window_capped() {
        let config = TimingConfig {
            video_window_ms: 90_000,
            max_video_ms: 30_000,
            ..TimingConfig::default()
        };
        assert_eq!(
            CaptureMode::Video.timing(&config).window,
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_phases() {
        let session = CaptureSession::new(CaptureMode::Video, timing(1000, 2000));
        let start = session.started_at;
        assert_eq!(
            session.phase_at(start + Duration::from_millis(400)),
            SessionPhase::Countdown {
                remaining: Duration::from_millis(600)
            }
        );
        assert_eq!(
            session.phase_at(start + Duration::from_millis(1500)),
            SessionPhase::Recording {
                remaining: Duration::from_millis(1500)
            }
        );
        assert_eq!(
            session.phase_at(start + Duration::from_secs(3)),
            SessionPhase::Finished
        );
    }

    #[test]
    fn test_countdown_rounds_up() {
        let session = CaptureSession::new(CaptureMode::Photo, timing(3000, 0));
        let progress = session.progress(session.started_at + Duration::from_millis(100));
        assert_eq!(progress.countdown_secs(), Some(3));
        assert_eq!(progress.frames, 0);
    }

    #[test]
    fn test_video_keeps_frames_inside_window() {
        let mut session = CaptureSession::new(CaptureMode::Video, timing(100, 100));
        let start = session.started_at;
        session.record(vec![
            frame_at(start + Duration::from_millis(50)),
            frame_at(start + Duration::from_millis(120)),
            frame_at(start + Duration::from_millis(150)),
            frame_at(start + Duration::from_millis(250)),
        ]);
        assert_eq!(session.frame_count(), 2);
    }

    #[test]
    fn test_photo_keeps_latest_frame() {
        let mut session = CaptureSession::new(CaptureMode::Photo, timing(10, 0));
        let start = session.started_at;
        session.record(vec![frame_at(start), frame_at(start + Duration::from_millis(5))]);
        assert_eq!(session.frame_count(), 1);

        let artifact = session.finish(20, 3).unwrap();
        assert_eq!(artifact.kind(), MediaKind::Image);
        assert_eq!(artifact.frame_count(), 1);
        assert_eq!(
            artifact.first_frame().captured_at,
            start + Duration::from_millis(5)
        );
    }

    #[test]
    fn test_photo_without_frame_fails() {
        let session = CaptureSession::new(CaptureMode::Photo, timing(0, 0));
        assert_eq!(session.finish(20, 3).unwrap_err(), CaptureError::NoFrameCaptured);
    }

    #[test]
    fn test_boomerang_arranged_and_measured() {
        let mut session = CaptureSession::new(CaptureMode::Boomerang, timing(0, 1000));
        let start = session.started_at;
        // 5 frames 100 ms apart: 10 fps
        session.record(
            (0..5)
                .map(|i| frame_at(start + Duration::from_millis(i * 100)))
                .collect(),
        );

        let artifact = session.finish(20, 3).unwrap();
        assert_eq!(artifact.kind(), MediaKind::LoopedClip);
        assert_eq!(artifact.frame_count(), 15);
        assert_eq!(artifact.framerate(), Framerate::from_int(10));
        let frames = artifact.frames();
        assert_eq!(frames[4].captured_at, frames[5].captured_at);
    }

    #[test]
    fn test_single_frame_clip_uses_fallback_rate() {
        let mut session = CaptureSession::new(CaptureMode::Video, timing(0, 1000));
        let start = session.started_at;
        session.record(vec![frame_at(start + Duration::from_millis(10))]);
        let artifact = session.finish(20, 3).unwrap();
        assert_eq!(artifact.framerate(), Framerate::from_int(20));
    }

    #[test]
    fn test_measure_framerate_needs_span() {
        let now = Instant::now();
        assert!(measure_framerate(&[]).is_none());
        assert!(measure_framerate(&[frame_at(now), frame_at(now)]).is_none());
        assert_eq!(
            measure_framerate(&[frame_at(now), frame_at(now + Duration::from_millis(50))]),
            Some(Framerate::from_int(20))
        );
    }
}
