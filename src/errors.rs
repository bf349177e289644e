// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the booth

use crate::backends::camera::types::BackendError;
use crate::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result type for capture controller operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Result type for persistence and encoding
pub type StorageResult<T> = Result<T, StorageError>;

/// Main application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Camera error: {0}")]
    Camera(#[from] BackendError),
    #[error("{0}")]
    Other(String),
}

/// Capture session errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    /// A session is already running
    #[error("A capture session is already active")]
    SessionActive,
    /// Stop or poll without a running session
    #[error("No capture session is active")]
    NoActiveSession,
    /// Stop was called with an id that is not the running session
    #[error("Capture session {0} is not the active session")]
    SessionMismatch(String),
    /// The camera could not be opened
    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),
    /// The camera went away while a session was running
    #[error("Capture interrupted: {0}")]
    CaptureInterrupted(String),
    /// The session ended without a usable frame
    #[error("No frame was captured")]
    NoFrameCaptured,
}

impl CaptureError {
    /// Text shown to the user for camera failures
    pub fn user_message(&self) -> String {
        match self {
            CaptureError::DeviceUnavailable(msg) | CaptureError::CaptureInterrupted(msg) => {
                format!(
                    "Camera error: {}\nPlease check your camera connection.",
                    msg
                )
            }
            other => other.to_string(),
        }
    }
}

/// Persistence and encoding errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Media counter file error: {0}")]
    Counters(#[from] serde_json::Error),
    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("Encoding failed: {0}")]
    Encoding(String),
    #[error(
        "No video encoder available. Please install gstreamer1-plugins-ugly (x264enc) or gstreamer1-plugin-openh264"
    )]
    NoEncoder,
    #[error("Artifact has no frames")]
    EmptyArtifact,
    #[error("Background task failed: {0}")]
    Task(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}
