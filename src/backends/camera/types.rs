// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Camera backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackendType {
    /// PipeWire backend (modern Linux standard)
    #[default]
    PipeWire,
    /// Direct V4L2 device access through `v4l2src`
    V4l2,
    /// Generated test pattern, no hardware required
    Synthetic,
    /// DSLR over libgphoto2 (live view preview, shutter stills)
    #[cfg(feature = "gphoto2")]
    Gphoto2,
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraBackendType::PipeWire => write!(f, "PipeWire"),
            CameraBackendType::V4l2 => write!(f, "V4L2"),
            CameraBackendType::Synthetic => write!(f, "synthetic"),
            #[cfg(feature = "gphoto2")]
            CameraBackendType::Gphoto2 => write!(f, "gphoto2"),
        }
    }
}

impl std::str::FromStr for CameraBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pipewire" => Ok(CameraBackendType::PipeWire),
            "v4l2" => Ok(CameraBackendType::V4l2),
            "synthetic" | "test" => Ok(CameraBackendType::Synthetic),
            #[cfg(feature = "gphoto2")]
            "gphoto2" | "dslr" => Ok(CameraBackendType::Gphoto2),
            other => Err(format!("unknown backend '{}' (expected {})", other, BACKEND_NAMES)),
        }
    }
}

#[cfg(not(feature = "gphoto2"))]
const BACKEND_NAMES: &str = "pipewire, v4l2 or synthetic";
#[cfg(feature = "gphoto2")]
const BACKEND_NAMES: &str = "pipewire, v4l2, synthetic or gphoto2";

/// Represents a camera device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    pub name: String,
    pub path: String, // Node serial, /dev/videoN, or empty for the default camera
}

/// Framerate as a fraction (numerator/denominator)
/// Stores exact framerate to handle NTSC rates like 59.94fps (60000/1001)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Framerate {
    pub num: u32,
    pub denom: u32,
}

impl Framerate {
    /// Create a new framerate from numerator and denominator
    pub fn new(num: u32, denom: u32) -> Self {
        Self {
            num,
            denom: if denom == 0 { 1 } else { denom },
        }
    }

    /// Create a framerate from an integer (e.g., 30 becomes 30/1)
    pub fn from_int(fps: u32) -> Self {
        Self { num: fps, denom: 1 }
    }

    /// Get the framerate as a floating point value
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.denom as f64
    }

    /// Get the rounded-down integer framerate
    pub fn as_int(&self) -> u32 {
        self.num / self.denom
    }

    /// Duration of a single frame
    pub fn frame_duration(&self) -> std::time::Duration {
        if self.num == 0 {
            return std::time::Duration::ZERO;
        }
        std::time::Duration::from_nanos(1_000_000_000u64 * self.denom as u64 / self.num as u64)
    }
}

impl std::fmt::Display for Framerate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show decimal for non-integer framerates (NTSC)
        if self.denom != 1 {
            write!(f, "{:.2}", self.as_f64())
        } else {
            write!(f, "{}", self.num)
        }
    }
}

impl Default for Framerate {
    fn default() -> Self {
        Self { num: 30, denom: 1 }
    }
}

/// Camera format specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraFormat {
    pub width: u32,
    pub height: u32,
    pub framerate: Option<Framerate>,
    pub pixel_format: String, // FourCC code (e.g., "MJPG", "YUYV")
}

impl std::fmt::Display for CameraFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(fps) = &self.framerate {
            write!(f, "{}x{} @ {}fps", self.width, self.height, fps)
        } else {
            write!(f, "{}x{}", self.width, self.height)
        }
    }
}

/// Pixel format for camera frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    /// This is what every backend delivers after conversion
    RGBA,
    /// RGB24 - 24-bit RGB (3 bytes per pixel, no alpha)
    RGB24,
    /// Gray8 - 8-bit grayscale (single channel)
    Gray8,
}

impl PixelFormat {
    /// Bytes used by one pixel
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            Self::RGBA => 4,
            Self::RGB24 => 3,
            Self::Gray8 => 1,
        }
    }

    /// Parse format from GStreamer format string
    pub fn from_gst_format(format: &str) -> Option<Self> {
        match format {
            "RGBA" | "RGBx" => Some(Self::RGBA),
            "RGB" => Some(Self::RGB24),
            "GRAY8" | "GREY" | "Y8" => Some(Self::Gray8),
            _ => None,
        }
    }
}

/// A single frame from the camera
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// Pixel data, copied out of the capture buffer
    pub data: Arc<[u8]>,
    /// Pixel format of the data
    pub format: PixelFormat,
    /// Row stride (bytes per row, may include padding)
    pub stride: u32,
    /// When the frame arrived from the device
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Build a tightly packed RGBA frame
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data.into_boxed_slice()),
            format: PixelFormat::RGBA,
            stride: width * 4,
            captured_at: Instant::now(),
        }
    }

    /// Pixel data as a byte slice
    pub fn data_slice(&self) -> &[u8] {
        &self.data
    }
}

/// Frame receiver type for preview streams
pub type FrameReceiver = futures::channel::mpsc::Receiver<CameraFrame>;

/// Frame sender type for preview streams
pub type FrameSender = futures::channel::mpsc::Sender<CameraFrame>;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Backend is not available on this system
    #[error("Backend not available: {0}")]
    NotAvailable(String),
    /// Failed to initialize backend
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),
    /// Camera device not found
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
    /// Format not supported
    #[error("Format not supported: {0}")]
    FormatNotSupported(String),
    /// Camera is already held by another session
    #[error("Camera is busy")]
    Busy,
    /// Camera stopped delivering (unplugged, driver error, end of stream)
    #[error("Camera disconnected: {0}")]
    Disconnected(String),
    /// Camera is open but no frame arrived in time
    #[error("No frame received from camera within {0:?}")]
    NoFrame(std::time::Duration),
    /// Operation needs an open camera
    #[error("Camera is not open")]
    NotInitialized,
    /// Other errors
    #[error("Error: {0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framerate_display() {
        assert_eq!(Framerate::from_int(30).to_string(), "30");
        assert_eq!(Framerate::new(60000, 1001).to_string(), "59.94");
        assert_eq!(Framerate::new(30, 0).denom, 1);
    }

    #[test]
    fn test_frame_duration() {
        assert_eq!(
            Framerate::from_int(20).frame_duration(),
            std::time::Duration::from_millis(50)
        );
        assert_eq!(Framerate::from_int(0).frame_duration(), std::time::Duration::ZERO);
    }

    #[test]
    fn test_backend_type_parse() {
        assert_eq!(
            "PipeWire".parse::<CameraBackendType>(),
            Ok(CameraBackendType::PipeWire)
        );
        assert_eq!("v4l2".parse::<CameraBackendType>(), Ok(CameraBackendType::V4l2));
        assert!("gphoto".parse::<CameraBackendType>().is_err());
    }

    #[test]
    fn test_from_rgba_stride() {
        let frame = CameraFrame::from_rgba(4, 2, vec![0; 32]);
        assert_eq!(frame.stride, 16);
        assert_eq!(frame.data_slice().len(), 32);
    }
}
