// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use selfie_zone::constants::{BitratePreset, capture, output};
use std::time::Duration;

#[test]
fn test_bitrate_preset_values() {
    // Test that all presets exist (Low, Medium, High)
    assert_eq!(BitratePreset::ALL.len(), 3);
}

#[test]
fn test_bitrate_preset_ordering() {
    // Presets are ordered from lowest to highest quality
    let mut prev_bitrate = 0u32;
    for preset in BitratePreset::ALL {
        let bitrate = preset.bitrate_kbps(640);
        assert!(
            bitrate >= prev_bitrate,
            "Presets should be ordered from lowest to highest"
        );
        prev_bitrate = bitrate;
    }
}

#[test]
fn test_bitrate_scales_with_resolution() {
    let sd_bitrate = BitratePreset::Medium.bitrate_kbps(640);
    let hd_bitrate = BitratePreset::Medium.bitrate_kbps(1280);
    let fhd_bitrate = BitratePreset::Medium.bitrate_kbps(1920);

    assert!(sd_bitrate < hd_bitrate);
    assert!(hd_bitrate < fhd_bitrate);
}

#[test]
fn test_bitrate_preset_display_names() {
    for preset in BitratePreset::ALL {
        let name = preset.display_name();
        assert!(!name.is_empty(), "Preset {:?} has empty display name", preset);
    }
}

#[test]
fn test_capture_timings() {
    assert_eq!(capture::PHOTO_LEAD_IN, Duration::from_secs(3));
    assert_eq!(capture::BOOMERANG_LEAD_IN, Duration::ZERO);
    assert_eq!(capture::BOOMERANG_WINDOW, Duration::from_secs(2));
    assert_eq!(
        capture::VIDEO_LEAD_IN + capture::VIDEO_WINDOW,
        Duration::from_secs(10)
    );
}

#[test]
fn test_output_defaults() {
    assert_eq!(output::PHOTO_SIZE, [1280, 853]);
    assert_eq!(output::COUNTS_FILE, "media_counts.json");
    assert!((1..=100).contains(&output::JPEG_QUALITY));
}

#[test]
fn test_version_is_embedded() {
    let version = selfie_zone::constants::app_info::version();
    assert!(!version.is_empty());
    assert!(!version.starts_with('v'));
}
