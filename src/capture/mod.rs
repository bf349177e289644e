// SPDX-License-Identifier: GPL-3.0-only

//! Media capture controller
//!
//! Opens the camera for a session, feeds it frames and turns it into a
//! [`MediaArtifact`]. Only one session can be active; the camera is released
//! whenever a session ends, however it ends.

pub mod session;

pub use session::{
    CaptureMode, CaptureProgress, CaptureSession, CaptureTiming, SessionId, SessionPhase,
    measure_framerate,
};

use crate::backends::camera::CameraBackendManager;
use crate::backends::camera::manager::OpenOptions;
use crate::backends::camera::types::{BackendError, CameraFrame, Framerate};
use crate::config::{Config, TimingConfig};
use crate::constants::timing;
use crate::errors::{CaptureError, CaptureResult};
use crate::media::MediaArtifact;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Runs capture sessions against a camera
pub struct CaptureController {
    camera: CameraBackendManager,
    open_options: OpenOptions,
    timing: TimingConfig,
    fallback_framerate: u32,
    video_until_stop: bool,
    active: Option<CaptureSession>,
}

impl CaptureController {
    pub fn new(camera: CameraBackendManager, config: &Config) -> Self {
        Self {
            camera,
            open_options: OpenOptions::from(&config.camera),
            timing: config.timing.clone(),
            fallback_framerate: config.output.fallback_framerate,
            video_until_stop: false,
            active: None,
        }
    }

    /// Let blocking video captures run until `stop` instead of their window
    pub fn record_video_until_stop(&mut self, enabled: bool) {
        self.video_until_stop = enabled;
    }

    /// The camera this controller drives
    pub fn camera(&self) -> &CameraBackendManager {
        &self.camera
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Phase of the running session, read from the clock
    pub fn phase(&self) -> Option<SessionPhase> {
        self.active.as_ref().map(|s| s.phase_at(Instant::now()))
    }

    /// Open the camera and start a session
    ///
    /// Fails with [`CaptureError::SessionActive`] while another session runs
    /// and with [`CaptureError::DeviceUnavailable`] if the camera can't be
    /// opened.
    pub fn start_capture(&mut self, mode: CaptureMode) -> CaptureResult<SessionId> {
        if self.active.is_some() {
            warn!(mode = %mode, "Capture requested while a session is active");
            return Err(CaptureError::SessionActive);
        }

        let (device, format) = self
            .camera
            .open_camera(&self.open_options)
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;

        let session = CaptureSession::new(mode, mode.timing(&self.timing));
        let id = session.id();
        info!(
            session = %id,
            mode = %mode,
            device = %device.name,
            format = %format,
            "Capture session started"
        );
        self.active = Some(session);
        Ok(id)
    }

    /// Pull new camera frames into the running session
    ///
    /// A camera that stopped delivering ends the session with
    /// [`CaptureError::CaptureInterrupted`] and releases the device.
    pub fn poll(&mut self) -> CaptureResult<CaptureProgress> {
        if self.active.is_none() {
            return Err(CaptureError::NoActiveSession);
        }

        let frames = match self.camera.drain_frames() {
            Ok(frames) => frames,
            Err(e) => return Err(self.interrupt(e.to_string())),
        };

        let session = self.active.as_mut().ok_or(CaptureError::NoActiveSession)?;
        session.record(frames);
        Ok(session.progress(Instant::now()))
    }

    /// Latest camera frame while a session runs
    pub fn preview_frame(&self) -> Option<CameraFrame> {
        self.active.as_ref()?;
        self.camera.preview_frame()
    }

    /// End the session and hand back its artifact
    ///
    /// Stopping a video before its window ends keeps what was recorded so far.
    pub fn stop_capture(&mut self, id: SessionId) -> CaptureResult<MediaArtifact> {
        match &self.active {
            None => return Err(CaptureError::NoActiveSession),
            Some(session) if session.id() != id => {
                return Err(CaptureError::SessionMismatch(id.to_string()));
            }
            Some(_) => {}
        }

        let frames = match self.camera.drain_frames() {
            Ok(frames) => frames,
            Err(e) => return Err(self.interrupt(e.to_string())),
        };

        let mut session = self.active.take().ok_or(CaptureError::NoActiveSession)?;
        session.record(frames);
        let mode = session.mode();
        let native = match mode {
            CaptureMode::Photo => self.camera.capture_native_still(),
            _ => None,
        };
        self.release_camera();

        let artifact = match native {
            Some(Ok(frame)) => session.finish_with(vec![frame], Framerate::from_int(1))?,
            Some(Err(e)) => {
                warn!(error = %e, "Camera shutter failed, using the preview frame");
                session.finish(self.fallback_framerate, self.timing.boomerang_passes)?
            }
            None => session.finish(self.fallback_framerate, self.timing.boomerang_passes)?,
        };
        info!(
            session = %id,
            mode = %mode,
            frames = artifact.frame_count(),
            fps = %artifact.framerate(),
            "Capture session finished"
        );
        Ok(artifact)
    }

    /// Discard the running session and release the camera
    ///
    /// Returns whether a session was running.
    pub fn abort(&mut self) -> bool {
        match self.active.take() {
            Some(session) => {
                info!(session = %session.id(), "Capture session aborted");
                self.release_camera();
                true
            }
            None => false,
        }
    }

    /// Run a whole session on the calling thread
    ///
    /// Counts down through [`Self::poll`], then records through the camera's
    /// blocking capture calls. `stop` ends a video early or aborts the
    /// countdown. A video never runs past `timing.max_video_ms`, even when
    /// recording until stopped.
    pub fn capture_blocking(
        &mut self,
        mode: CaptureMode,
        stop: &AtomicBool,
        mut on_progress: impl FnMut(&CaptureProgress),
    ) -> CaptureResult<MediaArtifact> {
        let id = self.start_capture(mode)?;

        loop {
            let progress = self.poll()?;
            on_progress(&progress);
            if !matches!(progress.phase, SessionPhase::Countdown { .. }) {
                break;
            }
            if stop.load(Ordering::SeqCst) {
                self.abort();
                return Err(CaptureError::CaptureInterrupted("stopped during countdown".to_string()));
            }
            std::thread::sleep(Duration::from_millis(timing::UI_POLL_MS));
        }

        let window = mode.timing(&self.timing).window;
        let video_limit = if self.video_until_stop {
            self.timing.max_video()
        } else {
            window
        };
        let passes = self.timing.boomerang_passes.max(1);
        let captured = match mode {
            CaptureMode::Photo => self.camera.capture_still().map(|frame| {
                let framerate = Framerate::from_int(1);
                (vec![frame], framerate)
            }),
            CaptureMode::Boomerang => self
                .camera
                .capture_boomerang(window, passes)
                .map(|frames| {
                    // The first pass is the burst in capture order
                    let burst = frames.len() / passes as usize;
                    let framerate = self.measured_or_fallback(&frames[..burst]);
                    (frames, framerate)
                }),
            CaptureMode::Video => self
                .camera
                .capture_video(video_limit, stop)
                .map(|frames| {
                    let framerate = self.measured_or_fallback(&frames);
                    (frames, framerate)
                }),
        };

        let (frames, framerate) = match captured {
            Ok(captured) => captured,
            Err(BackendError::NoFrame(waited)) => {
                warn!(session = %id, waited_secs = waited.as_secs(), "Camera delivered no frame");
                self.abort();
                return Err(CaptureError::NoFrameCaptured);
            }
            Err(e) => return Err(self.interrupt(e.to_string())),
        };

        let session = self.active.take().ok_or(CaptureError::NoActiveSession)?;
        self.release_camera();
        debug!(session = %id, frames = frames.len(), "Blocking capture finished");
        session.finish_with(frames, framerate)
    }

    fn measured_or_fallback(&self, frames: &[CameraFrame]) -> Framerate {
        measure_framerate(frames).unwrap_or_else(|| Framerate::from_int(self.fallback_framerate.max(1)))
    }

    fn interrupt(&mut self, reason: String) -> CaptureError {
        if let Some(session) = self.active.take() {
            warn!(session = %session.id(), reason = %reason, "Capture interrupted");
        }
        self.release_camera();
        CaptureError::CaptureInterrupted(reason)
    }

    fn release_camera(&self) {
        if let Err(e) = self.camera.close() {
            warn!(error = %e, "Camera did not shut down cleanly");
        }
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.abort();
    }
}
