// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Video encoder bitrate presets
///
/// These presets define the target bitrate for video encoding based on resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BitratePreset {
    /// Low bitrate - smaller files, reduced quality
    Low,
    /// Medium bitrate - balanced quality and file size (default)
    #[default]
    Medium,
    /// High bitrate - larger files, better quality
    High,
}

impl BitratePreset {
    /// Get all preset variants for iteration
    pub const ALL: [BitratePreset; 3] = [
        BitratePreset::Low,
        BitratePreset::Medium,
        BitratePreset::High,
    ];

    /// Get display name for the preset
    pub fn display_name(&self) -> &'static str {
        match self {
            BitratePreset::Low => "Low",
            BitratePreset::Medium => "Medium",
            BitratePreset::High => "High",
        }
    }

    /// Get bitrate in kbps for a given frame width
    ///
    /// - SD (640x480): Low=1, Medium=2, High=4 Mbps
    /// - HD (1280x720): Low=2.5, Medium=5, High=10 Mbps
    /// - Full HD (1920x1080) and above: Low=4, Medium=8, High=16 Mbps
    pub fn bitrate_kbps(&self, width: u32) -> u32 {
        match (get_resolution_tier(width), self) {
            (ResolutionTier::SD, BitratePreset::Low) => 1_000,
            (ResolutionTier::SD, BitratePreset::Medium) => 2_000,
            (ResolutionTier::SD, BitratePreset::High) => 4_000,
            (ResolutionTier::HD, BitratePreset::Low) => 2_500,
            (ResolutionTier::HD, BitratePreset::Medium) => 5_000,
            (ResolutionTier::HD, BitratePreset::High) => 10_000,
            (ResolutionTier::FullHD, BitratePreset::Low) => 4_000,
            (ResolutionTier::FullHD, BitratePreset::Medium) => 8_000,
            (ResolutionTier::FullHD, BitratePreset::High) => 16_000,
        }
    }
}

/// Resolution tiers for bitrate calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    /// SD: 640x480 and below
    SD,
    /// HD: 1280x720
    HD,
    /// Full HD: 1920x1080 and above
    FullHD,
}

/// Get the resolution tier for a given width
pub fn get_resolution_tier(width: u32) -> ResolutionTier {
    match width {
        w if w >= 1920 => ResolutionTier::FullHD,
        w if w >= 1280 => ResolutionTier::HD,
        _ => ResolutionTier::SD,
    }
}

/// Capture timing defaults
///
/// A photo is taken at the end of its countdown. A boomerang records a short
/// burst straight away. A video counts down and then records for the rest of
/// its window.
pub mod capture {
    use super::Duration;

    /// Countdown before a photo is taken
    pub const PHOTO_LEAD_IN: Duration = Duration::from_secs(3);

    /// Boomerangs start recording immediately
    pub const BOOMERANG_LEAD_IN: Duration = Duration::ZERO;

    /// Length of the boomerang burst
    pub const BOOMERANG_WINDOW: Duration = Duration::from_secs(2);

    /// Countdown before video recording starts
    pub const VIDEO_LEAD_IN: Duration = Duration::from_secs(3);

    /// Length of the recorded video (10 s on the on-screen timer in total)
    pub const VIDEO_WINDOW: Duration = Duration::from_secs(7);

    /// Longest video ever recorded, including videos that run until stopped
    pub const MAX_VIDEO: Duration = Duration::from_secs(60);

    /// Forward, reverse, forward
    pub const BOOMERANG_PASSES: u32 = 3;

    /// Playback rate used when a clip's rate cannot be measured
    pub const FALLBACK_FRAMERATE: u32 = 20;
}

/// Camera defaults
pub mod camera {
    /// Preferred preview/capture width
    pub const PREFERRED_WIDTH: u32 = 640;

    /// Preferred preview/capture height
    pub const PREFERRED_HEIGHT: u32 = 480;

    /// Attempts made to open the camera before giving up
    pub const OPEN_ATTEMPTS: u32 = 3;

    /// Delay between open attempts in milliseconds
    pub const RETRY_DELAY_MS: u64 = 1000;

    /// Frame channel capacity between capture thread and booth
    pub const FRAME_CHANNEL_CAPACITY: usize = 10;

    /// Live view size most DSLRs deliver over USB
    pub const LIVE_VIEW_WIDTH: u32 = 960;
    pub const LIVE_VIEW_HEIGHT: u32 = 640;

    /// Where a DSLR stores shots taken with its own shutter
    pub const DSLR_CAPTURE_TARGET: &str = "Memory card";

    /// How long a DSLR may take to shoot and hand over a still
    pub const DSLR_STILL_TIMEOUT_SECS: u64 = 30;
}

/// Output defaults
pub mod output {
    /// Folder created under the user's pictures directory
    pub const DEFAULT_FOLDER: &str = "Selfie Zone";

    /// Saved photos are resized to this size
    pub const PHOTO_SIZE: [u32; 2] = [1280, 853];

    /// Counter file kept in the output directory
    pub const COUNTS_FILE: &str = "media_counts.json";

    /// Watermark width relative to the image width
    pub const WATERMARK_WIDTH_FRACTION: f32 = 0.25;

    /// Distance between the watermark and the image edges in pixels
    pub const WATERMARK_MARGIN: u32 = 10;

    /// Caption height relative to the logo height
    pub const CAPTION_SIZE_DIVISOR: u32 = 7;

    /// Width of the dark outline around the caption in pixels
    pub const CAPTION_OUTLINE: i32 = 2;

    /// Fonts tried for the caption when none is configured
    pub const CAPTION_FONTS: &[&str] = &[
        "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
        "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
        "/usr/share/fonts/liberation-sans/LiberationSans-Bold.ttf",
    ];

    /// JPEG quality for saved photos
    pub const JPEG_QUALITY: u8 = 92;

    /// GIF quantizer speed (1 best quality, 30 fastest)
    pub const GIF_SPEED: i32 = 10;
}

/// GStreamer pipeline constants
pub mod pipeline {
    /// Maximum buffer queue size (keep small for low latency)
    pub const MAX_BUFFERS: u32 = 2;

    /// Output pixel format for appsink
    pub const OUTPUT_FORMAT: &str = "RGBA";
}

/// Timing constants
pub mod timing {
    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 30;

    /// Pipeline state change timeout on stop
    pub const STOP_TIMEOUT_SECS: u64 = 2;

    /// Pipeline playing state timeout on start
    pub const START_TIMEOUT_SECS: u64 = 5;

    /// How long the encoder may take to drain after end-of-stream
    pub const ENCODE_EOS_TIMEOUT_SECS: u64 = 30;

    /// Event loop poll interval (~60 Hz)
    pub const UI_POLL_MS: u64 = 16;
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_tiers() {
        assert_eq!(get_resolution_tier(3840), ResolutionTier::FullHD);
        assert_eq!(get_resolution_tier(1280), ResolutionTier::HD);
        assert_eq!(get_resolution_tier(640), ResolutionTier::SD);
    }

    #[test]
    fn test_video_timer_totals_ten_seconds() {
        assert_eq!(
            capture::VIDEO_LEAD_IN + capture::VIDEO_WINDOW,
            Duration::from_secs(10)
        );
    }
}
