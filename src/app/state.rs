// SPDX-License-Identifier: GPL-3.0-only

//! Booth state and messages

use crate::capture::{CaptureMode, CaptureProgress, SessionId};
use crate::media::MediaKind;
use crate::review::ReviewScreen;
use std::path::PathBuf;
use std::time::Instant;

/// Booth state machine
///
/// ```text
/// Idle ──SelectMode──▶ Capturing ──finished──▶ Reviewing ──Accept──▶ Saved
///  ▲                      │                       │
///  └──────Cancel──────────┘◀────Retake/Cancel─────┘
/// ```
#[derive(Debug, Default)]
pub enum AppState {
    /// Waiting for the user to pick a mode
    #[default]
    Idle,
    /// A capture session is running
    Capturing {
        session: SessionId,
        mode: CaptureMode,
        /// Latest progress, `None` until the first tick
        progress: Option<CaptureProgress>,
    },
    /// The artifact is played back for accept, retake or cancel
    Reviewing {
        review: ReviewScreen,
        /// Playback start
        since: Instant,
    },
    /// The artifact was accepted and handed to storage
    Saved { kind: MediaKind },
    /// A camera failure shown until dismissed
    Error { message: String },
}

impl AppState {
    /// Short name for logs and the status bar
    pub fn name(&self) -> &'static str {
        match self {
            AppState::Idle => "idle",
            AppState::Capturing { .. } => "capturing",
            AppState::Reviewing { .. } => "reviewing",
            AppState::Saved { .. } => "saved",
            AppState::Error { .. } => "error",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, AppState::Idle)
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self, AppState::Capturing { .. })
    }

    pub fn is_reviewing(&self) -> bool {
        matches!(self, AppState::Reviewing { .. })
    }
}

/// Outcome of the most recent save
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    /// Encoding and writing in the background
    Saving,
    /// Written to this path
    Saved(PathBuf),
    /// Failed with this message
    Failed(String),
}

/// Everything the booth reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// Start capturing in a mode
    SelectMode(CaptureMode),
    /// Periodic update: drain frames, advance timers, check saves
    Tick,
    /// End a video early
    StopCapture,
    /// Keep the reviewed artifact
    Accept,
    /// Discard the reviewed artifact and capture again
    Retake,
    /// Discard whatever is in progress and go back to idle
    Cancel,
    /// Close an error or saved notice
    Dismiss,
}
