// SPDX-License-Identifier: GPL-3.0-only

//! Configuration file handling
//!
//! Loads `~/.config/selfie-zone/config.toml` or a path given with `--config`.
//! Every key is optional; missing keys fall back to the booth defaults.

use crate::backends::camera::types::CameraBackendType;
use crate::constants::{self, BitratePreset};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub camera: CameraConfig,
    pub timing: TimingConfig,
    pub output: OutputConfig,
    pub watermark: WatermarkConfig,
}

/// Camera selection and open behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Backend used to talk to the camera
    pub backend: CameraBackendType,
    /// Index into the enumerated camera list
    pub device: usize,
    /// Preferred capture width
    pub width: u32,
    /// Preferred capture height
    pub height: u32,
    pub open_attempts: u32,
    pub retry_delay_ms: u64,
    /// Show the live preview like a mirror
    pub mirror: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            backend: CameraBackendType::default(),
            device: 0,
            width: constants::camera::PREFERRED_WIDTH,
            height: constants::camera::PREFERRED_HEIGHT,
            open_attempts: constants::camera::OPEN_ATTEMPTS,
            retry_delay_ms: constants::camera::RETRY_DELAY_MS,
            mirror: true,
        }
    }
}

impl CameraConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Countdown and recording windows, in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub photo_lead_in_ms: u64,
    pub boomerang_lead_in_ms: u64,
    pub boomerang_window_ms: u64,
    pub video_lead_in_ms: u64,
    pub video_window_ms: u64,
    /// Hard cap on any video, also when recording until stopped
    pub max_video_ms: u64,
    /// Number of alternating passes in a boomerang (forward, reverse, ...)
    pub boomerang_passes: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        use constants::capture::*;
        Self {
            photo_lead_in_ms: PHOTO_LEAD_IN.as_millis() as u64,
            boomerang_lead_in_ms: BOOMERANG_LEAD_IN.as_millis() as u64,
            boomerang_window_ms: BOOMERANG_WINDOW.as_millis() as u64,
            video_lead_in_ms: VIDEO_LEAD_IN.as_millis() as u64,
            video_window_ms: VIDEO_WINDOW.as_millis() as u64,
            max_video_ms: MAX_VIDEO.as_millis() as u64,
            boomerang_passes: BOOMERANG_PASSES,
        }
    }
}

impl TimingConfig {
    /// Longest video a session may record
    pub fn max_video(&self) -> Duration {
        Duration::from_millis(self.max_video_ms)
    }
}

/// Where and how accepted media is written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output directory; defaults to `<Pictures>/Selfie Zone`
    pub directory: Option<PathBuf>,
    /// Resize saved photos to `photo_size`
    pub resize_photos: bool,
    pub photo_size: [u32; 2],
    pub jpeg_quality: u8,
    pub bitrate_preset: BitratePreset,
    /// Playback rate used when a clip's rate cannot be measured
    pub fallback_framerate: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: None,
            resize_photos: true,
            photo_size: constants::output::PHOTO_SIZE,
            jpeg_quality: constants::output::JPEG_QUALITY,
            bitrate_preset: BitratePreset::default(),
            fallback_framerate: constants::capture::FALLBACK_FRAMERATE,
        }
    }
}

impl OutputConfig {
    /// Resolved output directory
    pub fn directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(default_output_dir)
    }

    /// Target size for saved photos, if resizing is enabled
    pub fn photo_size(&self) -> Option<(u32, u32)> {
        let [w, h] = self.photo_size;
        (self.resize_photos && w > 0 && h > 0).then_some((w, h))
    }
}

/// Logo and caption stamped onto saved photos, boomerangs and videos
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkConfig {
    /// Image file to overlay; no watermark when unset
    pub image: Option<PathBuf>,
    /// Watermark width relative to the photo width
    pub width_fraction: f32,
    /// Distance from the bottom-right corner in pixels
    pub margin: u32,
    /// Caption written at the left edge, e.g. an event hashtag
    pub text: Option<String>,
    /// Font for the caption; a system sans-serif when unset
    pub font: Option<PathBuf>,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            image: None,
            width_fraction: constants::output::WATERMARK_WIDTH_FRACTION,
            margin: constants::output::WATERMARK_MARGIN,
            text: None,
            font: None,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            source: e,
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.clone(),
            source: e,
        })?;
        config.validate(&path)?;

        tracing::info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        if self.timing.boomerang_passes == 0 {
            return Err(invalid("timing.boomerang_passes must be at least 1"));
        }
        if self.timing.boomerang_window_ms == 0 || self.timing.video_window_ms == 0 {
            return Err(invalid("recording windows must be longer than 0 ms"));
        }
        if self.timing.max_video_ms == 0 {
            return Err(invalid("timing.max_video_ms must be longer than 0 ms"));
        }
        if !(1..=100).contains(&self.output.jpeg_quality) {
            return Err(invalid("output.jpeg_quality must be between 1 and 100"));
        }
        if !(self.watermark.width_fraction > 0.0 && self.watermark.width_fraction <= 1.0) {
            return Err(invalid("watermark.width_fraction must be in (0, 1]"));
        }
        Ok(())
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid config file '{}': {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
    #[error("Failed to serialize config: {0}")]
    Serialize(String),
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("selfie-zone")
        .join("config.toml")
}

/// `<Pictures>/Selfie Zone`, falling back to the home directory
pub fn default_output_dir() -> PathBuf {
    dirs::picture_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(constants::output::DEFAULT_FOLDER)
}
