// SPDX-License-Identifier: GPL-3.0-only

//! Selfie Zone - A photo booth for pictures, boomerangs and short videos
//!
//! This library provides the core functionality for the Selfie Zone booth:
//! camera access, timed capture sessions, review of the captured media and
//! persistence of accepted items.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`app`]: Booth state machine driven by messages
//! - [`backends`]: Camera backend abstraction
//! - [`capture`]: Capture sessions and the capture controller
//! - [`review`]: Accept, retake or cancel a captured artifact
//! - [`media`]: Frame conversion and the captured artifact type
//! - [`pipelines`]: Photo, boomerang and video encoding
//! - [`storage`]: Numbered output folders and the media counter file
//! - [`config`]: User configuration handling
//! - [`terminal`]: Terminal front end
//!
//! # Example
//!
//! ```ignore
//! // Run the booth in the terminal:
//! // selfie-zone
//! ```

pub mod app;
pub mod backends;
pub mod capture;
pub mod config;
pub mod constants;
pub mod errors;
pub mod media;
pub mod pipelines;
pub mod review;
pub mod storage;
pub mod terminal;

// Re-export commonly used types
pub use app::{AppState, Booth, Message, SaveStatus};
pub use capture::{CaptureController, CaptureMode};
pub use config::Config;
pub use constants::BitratePreset;
pub use errors::{AppError, AppResult, CaptureError, StorageError};
pub use media::{MediaArtifact, MediaKind};
pub use review::{Disposition, ReviewScreen};
pub use storage::MediaStore;
