// SPDX-License-Identifier: GPL-3.0-only

//! Booth core, independent of any front end
//!
//! [`Booth`] turns [`Message`]s into state transitions: it starts capture
//! sessions, moves finished artifacts into review and hands accepted ones to
//! storage. Front ends render [`Booth::state`] and feed it input plus a
//! steady stream of [`Message::Tick`].
//!
//! # Architecture
//!
//! - `state`: [`AppState`], [`Message`] and [`SaveStatus`]

mod state;

pub use state::{AppState, Message, SaveStatus};

use crate::backends::camera::CameraBackendManager;
use crate::backends::camera::types::CameraFrame;
use crate::capture::{CaptureController, CaptureMode, SessionId, SessionPhase};
use crate::config::Config;
use crate::errors::{AppError, AppResult, CaptureError, StorageResult};
use crate::media::MediaArtifact;
use crate::review::{Disposition, ReviewScreen};
use crate::storage::MediaStore;
use std::path::PathBuf;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// The photo booth
pub struct Booth {
    controller: CaptureController,
    store: MediaStore,
    runtime: tokio::runtime::Runtime,
    state: AppState,
    pending_save: Option<JoinHandle<StorageResult<PathBuf>>>,
    save_status: Option<SaveStatus>,
    mirror: bool,
}

impl Booth {
    /// Booth with the configured camera backend and output directory
    pub fn new(config: &Config) -> AppResult<Self> {
        let camera = CameraBackendManager::new(config.camera.backend);
        let controller = CaptureController::new(camera, config);
        let store = MediaStore::from_config(config);
        Self::with_parts(controller, store, config.camera.mirror)
    }

    /// Booth around an existing controller and store
    pub fn with_parts(
        controller: CaptureController,
        store: MediaStore,
        mirror: bool,
    ) -> AppResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("selfie-zone-save")
            .enable_all()
            .build()
            .map_err(|e| AppError::Other(format!("Failed to start background runtime: {}", e)))?;

        Ok(Self {
            controller,
            store,
            runtime,
            state: AppState::Idle,
            pending_save: None,
            save_status: None,
            mirror,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Result of the most recent save, if any
    pub fn save_status(&self) -> Option<&SaveStatus> {
        self.save_status.as_ref()
    }

    pub fn store(&self) -> &MediaStore {
        &self.store
    }

    pub fn camera(&self) -> &CameraBackendManager {
        self.controller.camera()
    }

    /// Whether the live preview is shown mirrored
    pub fn mirror(&self) -> bool {
        self.mirror
    }

    /// Frame to draw: live preview while capturing, playback while reviewing
    pub fn display_frame(&self) -> Option<CameraFrame> {
        match &self.state {
            AppState::Capturing { .. } => self.controller.preview_frame(),
            AppState::Reviewing { review, since } => {
                Some(review.frame_at(since.elapsed()).clone())
            }
            _ => None,
        }
    }

    /// Apply one message
    pub fn update(&mut self, message: Message) {
        debug!(state = self.state.name(), ?message, "Booth message");
        match message {
            Message::SelectMode(mode) => self.select_mode(mode),
            Message::Tick => self.tick(),
            Message::StopCapture => self.stop_capture(),
            Message::Accept => self.review_action(ReviewScreen::accept),
            Message::Retake => self.review_action(ReviewScreen::retake),
            Message::Cancel => self.cancel(),
            Message::Dismiss => self.dismiss(),
        }
    }

    /// Block until the pending save finishes
    pub fn wait_for_save(&mut self) -> Option<&SaveStatus> {
        if let Some(handle) = self.pending_save.take() {
            let result = self.runtime.block_on(handle);
            self.record_save(result);
        }
        self.save_status.as_ref()
    }

    fn select_mode(&mut self, mode: CaptureMode) {
        if !matches!(self.state, AppState::Idle | AppState::Saved { .. }) {
            debug!(state = self.state.name(), mode = %mode, "Mode selection ignored");
            return;
        }

        match self.controller.start_capture(mode) {
            Ok(session) => {
                self.state = AppState::Capturing {
                    session,
                    mode,
                    progress: None,
                };
            }
            Err(e) => self.fail(e),
        }
    }

    fn tick(&mut self) {
        self.check_pending_save();

        let AppState::Capturing { session, .. } = self.state else {
            return;
        };

        match self.controller.poll() {
            Ok(progress) if progress.is_finished() => self.finish_capture(session),
            Ok(progress) => {
                if let AppState::Capturing { progress: slot, .. } = &mut self.state {
                    *slot = Some(progress);
                }
            }
            Err(e) => self.fail(e),
        }
    }

    /// End a video early; other modes finish on their own
    fn stop_capture(&mut self) {
        let AppState::Capturing {
            session,
            mode: CaptureMode::Video,
            ..
        } = self.state
        else {
            return;
        };

        // Read the clock rather than the last tick, which may not have run yet
        if matches!(self.controller.phase(), Some(SessionPhase::Countdown { .. })) {
            debug!("Stop ignored during countdown");
            return;
        }
        self.finish_capture(session);
    }

    fn finish_capture(&mut self, session: SessionId) {
        match self.controller.stop_capture(session) {
            Ok(artifact) => self.show_review(artifact),
            Err(e) => self.fail(e),
        }
    }

    fn show_review(&mut self, artifact: MediaArtifact) {
        self.state = AppState::Reviewing {
            review: ReviewScreen::show(artifact),
            since: Instant::now(),
        };
    }

    fn review_action(&mut self, action: fn(ReviewScreen) -> Disposition) {
        let state = std::mem::take(&mut self.state);
        let AppState::Reviewing { review, .. } = state else {
            self.state = state;
            return;
        };

        match action(review) {
            Disposition::Accepted(artifact) => self.persist(artifact),
            Disposition::Retake { mode } => {
                // Passes through Idle into a fresh session
                self.state = AppState::Idle;
                self.select_mode(mode);
            }
            Disposition::Cancelled => self.state = AppState::Idle,
        }
    }

    fn persist(&mut self, artifact: MediaArtifact) {
        if let Some(previous) = self.pending_save.take() {
            // Saves run one at a time
            let result = self.runtime.block_on(previous);
            self.record_save(result);
        }

        let kind = artifact.kind();
        let store = self.store.clone();
        self.pending_save = Some(self.runtime.spawn(async move { store.persist(artifact).await }));
        self.save_status = Some(SaveStatus::Saving);
        self.state = AppState::Saved { kind };
        info!(kind = %kind, "Saving in background");
    }

    fn check_pending_save(&mut self) {
        if self
            .pending_save
            .as_ref()
            .is_some_and(|handle| handle.is_finished())
            && let Some(handle) = self.pending_save.take()
        {
            let result = self.runtime.block_on(handle);
            self.record_save(result);
        }
    }

    fn record_save(&mut self, result: Result<StorageResult<PathBuf>, tokio::task::JoinError>) {
        let status = match result {
            Ok(Ok(path)) => SaveStatus::Saved(path),
            Ok(Err(e)) => {
                error!(error = %e, "Saving failed");
                SaveStatus::Failed(e.to_string())
            }
            Err(e) => {
                error!(error = %e, "Save task failed");
                SaveStatus::Failed(e.to_string())
            }
        };
        self.save_status = Some(status);
    }

    fn cancel(&mut self) {
        match std::mem::take(&mut self.state) {
            AppState::Capturing { session, .. } => {
                info!(session = %session, "Capture cancelled");
                self.controller.abort();
            }
            AppState::Reviewing { review, .. } => {
                review.cancel();
            }
            _ => {}
        }
    }

    fn dismiss(&mut self) {
        if matches!(self.state, AppState::Error { .. } | AppState::Saved { .. }) {
            self.state = AppState::Idle;
        }
    }

    fn fail(&mut self, error: CaptureError) {
        warn!(error = %error, "Capture failed");
        self.state = AppState::Error {
            message: error.user_message(),
        };
    }
}

impl Drop for Booth {
    fn drop(&mut self) {
        self.controller.abort();
        if self.pending_save.is_some() {
            self.wait_for_save();
        }
    }
}
