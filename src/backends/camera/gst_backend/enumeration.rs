// SPDX-License-Identifier: GPL-3.0-only

//! Camera discovery and format detection through the GStreamer device monitor

use super::super::types::{CameraBackendType, CameraDevice, CameraFormat, Framerate};
use crate::constants;
use gstreamer::prelude::*;
use tracing::{debug, info, warn};

/// Source element used for a backend type
pub(crate) fn source_element(backend: CameraBackendType) -> &'static str {
    match backend {
        CameraBackendType::V4l2 => "v4l2src",
        _ => "pipewiresrc",
    }
}

/// Provider name reported in `device.api` for a backend type
fn device_api(backend: CameraBackendType) -> &'static str {
    match backend {
        CameraBackendType::V4l2 => "v4l2",
        _ => "pipewire",
    }
}

/// Check whether GStreamer and the backend's source element are present
pub fn is_source_available(backend: CameraBackendType) -> bool {
    if gstreamer::init().is_err() {
        warn!("GStreamer init failed");
        return false;
    }
    gstreamer::ElementFactory::find(source_element(backend)).is_some()
}

/// Enumerate cameras reachable through a backend's source element
///
/// Falls back to a single "default camera" entry with an empty path, which
/// lets the source pick whatever camera the system prefers.
pub fn enumerate_cameras(backend: CameraBackendType) -> Vec<CameraDevice> {
    if !is_source_available(backend) {
        debug!(element = source_element(backend), "Source element not available");
        return Vec::new();
    }

    let cameras: Vec<CameraDevice> = monitor_devices()
        .into_iter()
        .filter(|d| device_property(d, "device.api").as_deref() == Some(device_api(backend)))
        .filter_map(|d| device_entry(backend, &d))
        .collect();

    if !cameras.is_empty() {
        info!(count = cameras.len(), backend = %backend, "Cameras enumerated");
        return cameras;
    }

    info!(backend = %backend, "No cameras listed, using default camera");
    vec![CameraDevice {
        name: format!("Default Camera ({})", backend),
        path: String::new(),
    }]
}

/// Formats advertised by a device
///
/// The default camera (empty path) advertises nothing; it gets the preferred
/// size without a framerate and lets caps negotiation do the rest.
pub fn get_formats(backend: CameraBackendType, device: &CameraDevice) -> Vec<CameraFormat> {
    let formats = if device.path.is_empty() {
        Vec::new()
    } else {
        monitor_devices()
            .into_iter()
            .find(|d| device_entry(backend, d).is_some_and(|entry| entry.path == device.path))
            .and_then(|d| d.caps())
            .map(|caps| formats_from_caps(&caps))
            .unwrap_or_default()
    };

    if formats.is_empty() {
        debug!(device = %device.name, "No advertised formats, using preferred size");
        return vec![CameraFormat {
            width: constants::camera::PREFERRED_WIDTH,
            height: constants::camera::PREFERRED_HEIGHT,
            framerate: None,
            pixel_format: String::new(),
        }];
    }

    formats
}

fn monitor_devices() -> Vec<gstreamer::Device> {
    let monitor = gstreamer::DeviceMonitor::new();
    monitor.add_filter(Some("Video/Source"), None);

    if let Err(e) = monitor.start() {
        warn!(error = %e, "Failed to start device monitor");
        return Vec::new();
    }
    let devices: Vec<gstreamer::Device> = monitor.devices().into_iter().collect();
    monitor.stop();

    debug!(count = devices.len(), "Device monitor results");
    devices
}

fn device_property(device: &gstreamer::Device, key: &str) -> Option<String> {
    let props = device.properties()?;
    if let Ok(value) = props.get::<String>(key) {
        return Some(value);
    }
    // PipeWire reports some ids as integers
    props.get::<i32>(key).ok().map(|v| v.to_string())
}

fn device_entry(backend: CameraBackendType, device: &gstreamer::Device) -> Option<CameraDevice> {
    let name = device.display_name().to_string();

    let path = match backend {
        CameraBackendType::V4l2 => device_property(device, "device.path")
            .or_else(|| device_property(device, "api.v4l2.path"))?,
        _ => {
            let serial = device_property(device, "object.serial")?;
            format!("pipewire-serial-{}", serial)
        }
    };

    debug!(name = %name, path = %path, "Found camera");
    Some(CameraDevice { name, path })
}

/// Flatten a device's caps into concrete formats
///
/// Structures with ranges instead of fixed sizes are skipped.
pub(crate) fn formats_from_caps(caps: &gstreamer::CapsRef) -> Vec<CameraFormat> {
    let mut formats = Vec::new();

    for structure in caps.iter() {
        let pixel_format = match structure.name().as_str() {
            "image/jpeg" => "MJPG".to_string(),
            "video/x-raw" => match structure.get::<String>("format") {
                Ok(fmt) => fmt,
                Err(_) => continue,
            },
            _ => continue,
        };

        let (Ok(width), Ok(height)) = (
            structure.get::<i32>("width"),
            structure.get::<i32>("height"),
        ) else {
            continue;
        };

        let framerate = structure
            .get::<gstreamer::Fraction>("framerate")
            .ok()
            .filter(|f| f.numer() > 0)
            .map(|f| Framerate::new(f.numer() as u32, f.denom() as u32));

        let format = CameraFormat {
            width: width as u32,
            height: height as u32,
            framerate,
            pixel_format,
        };
        if !formats.contains(&format) {
            formats.push(format);
        }
    }

    formats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_element() {
        assert_eq!(source_element(CameraBackendType::PipeWire), "pipewiresrc");
        assert_eq!(source_element(CameraBackendType::V4l2), "v4l2src");
    }

    #[test]
    fn test_formats_from_caps() {
        if gstreamer::init().is_err() {
            return;
        }
        let caps: gstreamer::Caps = "video/x-raw, format=(string)YUY2, width=(int)640, height=(int)480, framerate=(fraction)30/1; \
             image/jpeg, width=(int)1280, height=(int)720, framerate=(fraction)30/1; \
             video/x-raw, format=(string)YUY2, width=(int)[ 1, 100 ], height=(int)[ 1, 100 ]"
            .parse()
            .unwrap();

        let formats = formats_from_caps(&caps);
        assert_eq!(formats.len(), 2);
        assert_eq!(formats[0].pixel_format, "YUY2");
        assert_eq!(formats[0].framerate, Some(Framerate::from_int(30)));
        assert_eq!(formats[1].pixel_format, "MJPG");
        assert_eq!(formats[1].width, 1280);
    }
}
