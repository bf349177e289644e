// SPDX-License-Identifier: GPL-3.0-only

//! H.264 encoder selection for saved videos

use crate::constants::BitratePreset;
use crate::errors::{StorageError, StorageResult};
use gstreamer as gst;
use gstreamer::prelude::*;
use tracing::{debug, info};

/// An H.264 encoder element the writer knows how to configure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderInfo {
    /// GStreamer element name
    pub element_name: &'static str,
    /// Display name for listings
    pub display_name: &'static str,
    /// Whether this is hardware accelerated
    pub is_hardware: bool,
}

/// Encoders in the order they are tried
///
/// Clips are encoded after capture, so deterministic software encoders come
/// before hardware ones that may exist without a usable device.
pub const H264_ENCODERS: [EncoderInfo; 5] = [
    EncoderInfo {
        element_name: "x264enc",
        display_name: "x264 H.264 (SW)",
        is_hardware: false,
    },
    EncoderInfo {
        element_name: "openh264enc",
        display_name: "OpenH264 H.264 (SW)",
        is_hardware: false,
    },
    EncoderInfo {
        element_name: "vah264enc",
        display_name: "VA-API H.264 (HW)",
        is_hardware: true,
    },
    EncoderInfo {
        element_name: "vaapih264enc",
        display_name: "VA-API H.264 (HW)",
        is_hardware: true,
    },
    EncoderInfo {
        element_name: "nvh264enc",
        display_name: "NVIDIA H.264 (HW)",
        is_hardware: true,
    },
];

/// Elements that turn raw video into an MP4 stream
pub struct SelectedEncoder {
    pub info: EncoderInfo,
    pub encoder: gst::Element,
    pub parser: gst::Element,
    pub muxer: gst::Element,
}

/// Encoders installed on this system, in priority order
pub fn available_encoders() -> Vec<EncoderInfo> {
    if gst::init().is_err() {
        return Vec::new();
    }
    H264_ENCODERS
        .iter()
        .filter(|info| gst::ElementFactory::find(info.element_name).is_some())
        .copied()
        .collect()
}

/// Create and configure the first available encoder
pub fn select_encoder(preset: BitratePreset, width: u32) -> StorageResult<SelectedEncoder> {
    gst::init()
        .map_err(|e| StorageError::Encoding(format!("Failed to initialize GStreamer: {}", e)))?;

    let (info, encoder) = H264_ENCODERS
        .iter()
        .find_map(|info| {
            gst::ElementFactory::make(info.element_name)
                .build()
                .ok()
                .map(|encoder| (*info, encoder))
        })
        .ok_or(StorageError::NoEncoder)?;

    configure_video_encoder(&encoder, info.element_name, preset, width);
    info!(
        encoder = info.element_name,
        hardware = info.is_hardware,
        preset = preset.display_name(),
        "Selected video encoder"
    );

    let parser = make_element("h264parse")?;
    let muxer = make_element("mp4mux")?;

    Ok(SelectedEncoder {
        info,
        encoder,
        parser,
        muxer,
    })
}

pub(crate) fn make_element(name: &str) -> StorageResult<gst::Element> {
    gst::ElementFactory::make(name)
        .build()
        .map_err(|e| StorageError::Encoding(format!("Failed to create {}: {}", name, e)))
}

/// x264 speed preset for a bitrate preset
pub fn x264_preset(preset: BitratePreset) -> &'static str {
    match preset {
        BitratePreset::Low => "veryfast",
        BitratePreset::Medium => "fast",
        BitratePreset::High => "medium",
    }
}

fn configure_video_encoder(
    encoder: &gst::Element,
    encoder_name: &str,
    preset: BitratePreset,
    width: u32,
) {
    let bitrate = preset.bitrate_kbps(width);

    match encoder_name {
        "x264enc" => {
            encoder.set_property_from_str("speed-preset", x264_preset(preset));
            encoder.set_property_from_str("tune", "zerolatency");
            encoder.set_property("bitrate", bitrate);
            debug!(
                preset = x264_preset(preset),
                bitrate_kbps = bitrate,
                "Configured x264enc"
            );
        }

        "openh264enc" => {
            encoder.set_property_from_str("rate-control", "bitrate");
            // Bits per second
            encoder.set_property("bitrate", bitrate * 1000);
            encoder.set_property_from_str("usage-type", "camera");
            debug!(bitrate_bps = bitrate * 1000, "Configured openh264enc");
        }

        "vah264enc" | "vaapih264enc" => {
            encoder.set_property_from_str("rate-control", "cbr");
            encoder.set_property("bitrate", bitrate);
            debug!(bitrate_kbps = bitrate, "Configured VA-API encoder");
        }

        "nvh264enc" => {
            encoder.set_property("bitrate", bitrate);
            debug!(bitrate_kbps = bitrate, "Configured NVIDIA encoder");
        }

        _ => {
            debug!(encoder = encoder_name, "Using encoder defaults");
        }
    }
}
