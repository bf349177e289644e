// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! ```text
//! ┌─────────────────────┐
//! │ Capture controller  │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CameraBackendManager│  ← Open/close, exclusive hold, frame draining
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  CameraBackend Trait│  ← Common interface
//! └──────────┬──────────┘
//!            │
//!      ┌─────┴──────┬───────────┬────────────┐
//!      ▼            ▼           ▼            ▼
//!  ┌────────┐  ┌────────┐  ┌─────────┐  ┌─────────┐
//!  │PipeWire│  │  V4L2  │  │Synthetic│  │ gphoto2 │
//!  └────────┘  └────────┘  └─────────┘  └─────────┘
//! ```
//!
//! PipeWire and V4L2 share one GStreamer implementation that only differs in
//! the source element. The synthetic camera generates a test pattern and is
//! what the test-suite runs against. The gphoto2 backend drives a DSLR over
//! USB and is only built with the `gphoto2` feature.

#[cfg(feature = "gphoto2")]
pub mod gphoto;
pub mod gst_backend;
pub mod manager;
pub mod synthetic;
pub mod types;

pub use manager::CameraBackendManager;
pub use types::*;

/// Camera backend trait
///
/// All camera backends provide:
/// - Device enumeration and format detection
/// - Lifecycle management (initialization, shutdown)
/// - A stream of RGBA frames while initialized
/// - Health reporting so a disconnect can end a capture session
pub trait CameraBackend: Send {
    // ===== Enumeration =====

    /// Enumerate available cameras on this backend
    fn enumerate_cameras(&self) -> Vec<CameraDevice>;

    /// Get supported formats for a specific camera device
    fn get_formats(&self, device: &CameraDevice) -> Vec<CameraFormat>;

    // ===== Lifecycle =====

    /// Initialize the backend with a specific camera and format
    ///
    /// Starts frame delivery. The frame stream is picked up with
    /// [`CameraBackend::take_frame_receiver`].
    fn initialize(&mut self, device: &CameraDevice, format: &CameraFormat) -> BackendResult<()>;

    /// Shutdown the backend and release the device
    ///
    /// After shutdown, the backend must be reinitialized before use.
    fn shutdown(&mut self) -> BackendResult<()>;

    /// Check if the backend is currently initialized and operational
    fn is_initialized(&self) -> bool;

    // ===== Frames =====

    /// Hand out the receiving end of the frame stream
    ///
    /// Returns `None` when not initialized or when the receiver was already
    /// taken for the current initialization.
    fn take_frame_receiver(&mut self) -> Option<FrameReceiver>;

    /// Report whether the device is still delivering
    ///
    /// Returns [`BackendError::Disconnected`] once the device went away.
    fn check_health(&self) -> BackendResult<()>;

    /// Take a still with the camera's own shutter
    ///
    /// `None` means the camera has no shutter of its own and stills come from
    /// the frame stream.
    fn capture_native_still(&mut self) -> Option<BackendResult<CameraFrame>> {
        None
    }

    // ===== Metadata =====

    /// Get the backend type identifier
    fn backend_type(&self) -> CameraBackendType;

    /// Check if this backend is available on the current system
    fn is_available(&self) -> bool;
}

/// Get a concrete backend instance
pub fn get_backend_for_type(backend_type: CameraBackendType) -> Box<dyn CameraBackend> {
    match backend_type {
        CameraBackendType::PipeWire | CameraBackendType::V4l2 => {
            Box::new(gst_backend::GStreamerBackend::new(backend_type))
        }
        CameraBackendType::Synthetic => Box::new(synthetic::SyntheticBackend::new()),
        #[cfg(feature = "gphoto2")]
        CameraBackendType::Gphoto2 => Box::new(gphoto::GphotoBackend::new()),
    }
}

/// Pick the format closest to the requested size
///
/// Formats that advertise a framerate win over ones that don't.
pub fn select_format(formats: &[CameraFormat], width: u32, height: u32) -> Option<CameraFormat> {
    let target_pixels = width as i64 * height as i64;

    formats
        .iter()
        .min_by_key(|f| {
            let pixels = f.width as i64 * f.height as i64;
            let diff = (pixels - target_pixels).abs();
            let fps_penalty = if f.framerate.is_some() { 0 } else { 1_000_000_000 };
            // Among equal sizes prefer the higher framerate
            let fps_bonus = f.framerate.map(|fps| fps.as_int() as i64).unwrap_or(0);
            (diff + fps_penalty, -fps_bonus)
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(width: u32, height: u32, fps: Option<u32>) -> CameraFormat {
        CameraFormat {
            width,
            height,
            framerate: fps.map(Framerate::from_int),
            pixel_format: "YUYV".to_string(),
        }
    }

    #[test]
    fn test_select_format_nearest_size() {
        let formats = vec![
            fmt(1920, 1080, Some(30)),
            fmt(640, 480, Some(30)),
            fmt(320, 240, Some(30)),
        ];
        let selected = select_format(&formats, 640, 480).unwrap();
        assert_eq!((selected.width, selected.height), (640, 480));
    }

    #[test]
    fn test_select_format_prefers_framerate() {
        let formats = vec![fmt(640, 480, None), fmt(800, 600, Some(15))];
        let selected = select_format(&formats, 640, 480).unwrap();
        assert_eq!(selected.width, 800);
    }

    #[test]
    fn test_select_format_higher_fps_on_tie() {
        let formats = vec![fmt(640, 480, Some(15)), fmt(640, 480, Some(30))];
        let selected = select_format(&formats, 640, 480).unwrap();
        assert_eq!(selected.framerate, Some(Framerate::from_int(30)));
    }

    #[test]
    fn test_select_format_empty() {
        assert!(select_format(&[], 640, 480).is_none());
    }
}
