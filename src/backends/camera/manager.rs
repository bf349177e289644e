// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend lifecycle manager
//!
//! The manager provides:
//! - Opening a camera with retries and an exclusive hold on the device
//! - Draining the frame stream and keeping the newest frame for preview
//! - Still, video and boomerang capture on top of the frame stream
//! - Thread-safe backend access

use super::types::*;
use super::{CameraBackend, get_backend_for_type, select_format};
use crate::config::CameraConfig;
use crate::constants::timing;
use crate::media::boomerang::arrange_boomerang;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Devices currently held by any manager in this process
static HELD_DEVICES: LazyLock<Mutex<HashSet<String>>> =
    LazyLock::new(|| Mutex::new(HashSet::new()));

/// Exclusive hold on a camera device, released on drop
#[derive(Debug)]
struct DeviceLease {
    key: String,
}

impl DeviceLease {
    fn acquire(backend: CameraBackendType, device: &CameraDevice) -> BackendResult<Self> {
        let key = format!("{}:{}", backend, device.path);
        let mut held = HELD_DEVICES
            .lock()
            .map_err(|_| BackendError::Other("device registry poisoned".to_string()))?;
        if !held.insert(key.clone()) {
            warn!(device = %key, "Camera already held");
            return Err(BackendError::Busy);
        }
        Ok(Self { key })
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        if let Ok(mut held) = HELD_DEVICES.lock() {
            held.remove(&self.key);
        }
        debug!(device = %self.key, "Camera released");
    }
}

/// How to pick and open a camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOptions {
    /// Index into the enumerated camera list, falls back to the first camera
    pub device_index: usize,
    pub width: u32,
    pub height: u32,
    pub attempts: u32,
    pub retry_delay: Duration,
}

impl From<&CameraConfig> for OpenOptions {
    fn from(config: &CameraConfig) -> Self {
        Self {
            device_index: config.device,
            width: config.width,
            height: config.height,
            attempts: config.open_attempts,
            retry_delay: config.retry_delay(),
        }
    }
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self::from(&CameraConfig::default())
    }
}

/// Internal manager state
struct ManagerState {
    backend: Box<dyn CameraBackend>,
    backend_type: CameraBackendType,
    receiver: Option<FrameReceiver>,
    latest: Option<CameraFrame>,
    lease: Option<DeviceLease>,
}

impl ManagerState {
    fn drain(&mut self) -> Vec<CameraFrame> {
        let mut frames = Vec::new();
        if let Some(receiver) = self.receiver.as_mut() {
            while let Ok(frame) = receiver.try_recv() {
                frames.push(frame);
            }
        }
        if let Some(last) = frames.last() {
            self.latest = Some(last.clone());
        }
        frames
    }
}

/// Camera backend manager
///
/// Thread-safe and can be shared across threads.
#[derive(Clone)]
pub struct CameraBackendManager {
    state: Arc<Mutex<ManagerState>>,
}

impl CameraBackendManager {
    /// Create a manager for a backend type
    pub fn new(backend_type: CameraBackendType) -> Self {
        info!(backend = %backend_type, "Creating camera backend manager");
        Self::with_backend(get_backend_for_type(backend_type))
    }

    /// Create a manager around an existing backend instance
    pub fn with_backend(backend: Box<dyn CameraBackend>) -> Self {
        let backend_type = backend.backend_type();
        Self {
            state: Arc::new(Mutex::new(ManagerState {
                backend,
                backend_type,
                receiver: None,
                latest: None,
                lease: None,
            })),
        }
    }

    fn lock(&self) -> BackendResult<MutexGuard<'_, ManagerState>> {
        self.state
            .lock()
            .map_err(|_| BackendError::Other("camera manager lock poisoned".to_string()))
    }

    /// Check if the backend is available on this system
    pub fn is_available(&self) -> bool {
        self.lock().is_ok_and(|s| s.backend.is_available())
    }

    /// Enumerate available cameras
    pub fn enumerate_cameras(&self) -> BackendResult<Vec<CameraDevice>> {
        let cameras = self.lock()?.backend.enumerate_cameras();
        if cameras.is_empty() {
            Err(BackendError::DeviceNotFound("No cameras found".to_string()))
        } else {
            Ok(cameras)
        }
    }

    /// Get supported formats for a camera
    pub fn get_formats(&self, device: &CameraDevice) -> BackendResult<Vec<CameraFormat>> {
        Ok(self.lock()?.backend.get_formats(device))
    }

    /// Open a camera and take an exclusive hold on it
    ///
    /// Initialization is retried `options.attempts` times. Fails with
    /// [`BackendError::Busy`] while this or another manager holds the device.
    pub fn open_camera(&self, options: &OpenOptions) -> BackendResult<(CameraDevice, CameraFormat)> {
        let mut state = self.lock()?;
        if state.lease.is_some() {
            return Err(BackendError::Busy);
        }

        let cameras = state.backend.enumerate_cameras();
        let device = match cameras.get(options.device_index) {
            Some(device) => device.clone(),
            None => {
                let first = cameras
                    .first()
                    .cloned()
                    .ok_or_else(|| BackendError::DeviceNotFound("No cameras found".to_string()))?;
                warn!(
                    index = options.device_index,
                    count = cameras.len(),
                    fallback = %first.name,
                    "Camera index out of range"
                );
                first
            }
        };

        let formats = state.backend.get_formats(&device);
        let format = select_format(&formats, options.width, options.height).ok_or_else(|| {
            BackendError::FormatNotSupported(format!("{} advertises no formats", device.name))
        })?;

        let lease = DeviceLease::acquire(state.backend_type, &device)?;

        let attempts = options.attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            match state.backend.initialize(&device, &format) {
                Ok(()) => {
                    state.receiver = state.backend.take_frame_receiver();
                    state.latest = None;
                    state.lease = Some(lease);
                    info!(device = %device.name, format = %format, attempt, "Camera opened");
                    return Ok((device, format));
                }
                Err(e) => {
                    warn!(attempt, max_attempts = attempts, error = %e, "Failed to open camera");
                    last_error = Some(e);
                    if attempt < attempts {
                        std::thread::sleep(options.retry_delay);
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| BackendError::InitializationFailed("Camera did not open".to_string())))
    }

    /// Whether this manager currently holds a camera
    pub fn is_open(&self) -> bool {
        self.lock().is_ok_and(|s| s.lease.is_some())
    }

    /// Release the camera
    ///
    /// The hold is dropped even if the backend reports an error while
    /// shutting down.
    pub fn close(&self) -> BackendResult<()> {
        let mut state = self.lock()?;
        state.receiver = None;
        state.latest = None;
        let result = if state.backend.is_initialized() {
            state.backend.shutdown()
        } else {
            Ok(())
        };
        if state.lease.take().is_some() {
            info!("Camera closed");
        }
        result
    }

    /// Take every frame delivered since the last call
    ///
    /// Fails with [`BackendError::Disconnected`] once the device went away.
    pub fn drain_frames(&self) -> BackendResult<Vec<CameraFrame>> {
        let mut state = self.lock()?;
        if state.lease.is_none() {
            return Err(BackendError::NotInitialized);
        }
        let frames = state.drain();
        state.backend.check_health()?;
        Ok(frames)
    }

    /// Newest frame for live preview, without consuming the stream
    pub fn preview_frame(&self) -> Option<CameraFrame> {
        self.lock().ok().and_then(|s| s.latest.clone())
    }

    /// Check if the open camera is still delivering
    pub fn check_health(&self) -> BackendResult<()> {
        let state = self.lock()?;
        if state.lease.is_none() {
            return Err(BackendError::NotInitialized);
        }
        state.backend.check_health()
    }

    /// Take a still with the camera's own shutter
    ///
    /// `None` when the camera has no shutter of its own.
    pub fn capture_native_still(&self) -> Option<BackendResult<CameraFrame>> {
        let mut state = match self.lock() {
            Ok(state) => state,
            Err(e) => return Some(Err(e)),
        };
        if state.lease.is_none() {
            return Some(Err(BackendError::NotInitialized));
        }
        let result = state.backend.capture_native_still()?;
        if result.is_ok() {
            debug!("Still taken with the camera shutter");
        }
        Some(result)
    }

    /// Capture a still image
    ///
    /// Uses the camera's own shutter when it has one, otherwise the latest
    /// frame. Waits for the first frame if none arrived yet and fails with
    /// [`BackendError::NoFrame`] if the camera stays silent.
    pub fn capture_still(&self) -> BackendResult<CameraFrame> {
        if let Some(result) = self.capture_native_still() {
            return result;
        }

        let wait = Duration::from_secs(timing::START_TIMEOUT_SECS);
        let deadline = Instant::now() + wait;
        loop {
            self.drain_frames()?;
            if let Some(frame) = self.preview_frame() {
                return Ok(frame);
            }
            if Instant::now() >= deadline {
                warn!(waited_secs = wait.as_secs(), "No frame received from camera");
                return Err(BackendError::NoFrame(wait));
            }
            std::thread::sleep(Duration::from_millis(timing::UI_POLL_MS));
        }
    }

    /// Record frames for `duration`, or until `stop` is set
    ///
    /// Frames queued before the call are discarded.
    pub fn capture_video(
        &self,
        duration: Duration,
        stop: &AtomicBool,
    ) -> BackendResult<Vec<CameraFrame>> {
        self.drain_frames()?;
        let started = Instant::now();
        let mut frames = Vec::new();

        loop {
            frames.extend(self.drain_frames()?);
            if stop.load(Ordering::SeqCst) {
                debug!(frames = frames.len(), "Recording stopped");
                break;
            }
            if started.elapsed() >= duration {
                debug!(frames = frames.len(), "Recording reached its limit");
                break;
            }
            std::thread::sleep(Duration::from_millis(timing::UI_POLL_MS));
        }

        info!(
            frames = frames.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Recording finished"
        );
        Ok(frames)
    }

    /// Record a short burst and arrange it as a looping clip
    pub fn capture_boomerang(&self, window: Duration, passes: u32) -> BackendResult<Vec<CameraFrame>> {
        let burst = self.capture_video(window, &AtomicBool::new(false))?;
        Ok(arrange_boomerang(&burst, passes))
    }
}

impl std::fmt::Debug for CameraBackendManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_struct("CameraBackendManager");
        if let Ok(state) = self.state.lock() {
            dbg.field("backend_type", &state.backend_type)
                .field("open", &state.lease.is_some());
        }
        dbg.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::synthetic::SyntheticBackend;

    fn fast_options() -> OpenOptions {
        OpenOptions {
            device_index: 0,
            width: 16,
            height: 12,
            attempts: 2,
            retry_delay: Duration::ZERO,
        }
    }

    fn synthetic_manager() -> CameraBackendManager {
        CameraBackendManager::with_backend(Box::new(SyntheticBackend::with_format(16, 12, 100)))
    }

    #[test]
    fn test_open_twice_is_busy() {
        let manager = synthetic_manager();
        manager.open_camera(&fast_options()).unwrap();
        assert_eq!(manager.open_camera(&fast_options()), Err(BackendError::Busy));

        manager.close().unwrap();
        assert!(!manager.is_open());
        manager.open_camera(&fast_options()).unwrap();
        manager.close().unwrap();
    }

    #[test]
    fn test_shared_device_is_exclusive() {
        let a = CameraBackendManager::with_backend(Box::new(
            SyntheticBackend::with_format(16, 12, 100).with_device_path("synthetic:shared-lease"),
        ));
        let b = CameraBackendManager::with_backend(Box::new(
            SyntheticBackend::with_format(16, 12, 100).with_device_path("synthetic:shared-lease"),
        ));

        a.open_camera(&fast_options()).unwrap();
        assert_eq!(b.open_camera(&fast_options()), Err(BackendError::Busy));
        a.close().unwrap();
        b.open_camera(&fast_options()).unwrap();
        b.close().unwrap();
    }

    #[test]
    fn test_unavailable_camera_fails_to_open() {
        let manager = CameraBackendManager::with_backend(Box::new(SyntheticBackend::unavailable()));
        assert!(matches!(
            manager.open_camera(&fast_options()),
            Err(BackendError::DeviceNotFound(_))
        ));
        assert!(!manager.is_open());
    }

    #[test]
    fn test_capture_still_returns_frame() {
        let manager = synthetic_manager();
        manager.open_camera(&fast_options()).unwrap();
        let frame = manager.capture_still().unwrap();
        assert_eq!((frame.width, frame.height), (16, 12));
        manager.close().unwrap();
    }

    #[test]
    fn test_capture_video_honours_stop_flag() {
        let manager = synthetic_manager();
        manager.open_camera(&fast_options()).unwrap();
        let stop = AtomicBool::new(true);
        let started = Instant::now();
        manager
            .capture_video(Duration::from_secs(60), &stop)
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        manager.close().unwrap();
    }

    #[test]
    fn test_capture_video_stops_at_limit() {
        let manager = synthetic_manager();
        manager.open_camera(&fast_options()).unwrap();
        let stop = AtomicBool::new(false);
        let started = Instant::now();
        let frames = manager
            .capture_video(Duration::from_millis(100), &stop)
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!frames.is_empty());
        manager.close().unwrap();
    }

    #[test]
    fn test_capture_still_times_out_without_frames() {
        let manager = CameraBackendManager::with_backend(Box::new(
            SyntheticBackend::with_format(16, 12, 100).without_frames(),
        ));
        manager.open_camera(&fast_options()).unwrap();
        assert!(matches!(
            manager.capture_still(),
            Err(BackendError::NoFrame(_))
        ));
        // Still open; releasing is up to the caller
        assert!(manager.is_open());
        manager.close().unwrap();
    }

    #[test]
    fn test_capture_still_prefers_shutter() {
        let manager = CameraBackendManager::with_backend(Box::new(
            SyntheticBackend::with_format(16, 12, 100).with_shutter(),
        ));
        assert!(matches!(
            manager.capture_native_still(),
            Some(Err(BackendError::NotInitialized))
        ));
        manager.open_camera(&fast_options()).unwrap();
        let frame = manager.capture_still().unwrap();
        assert!(frame.data.iter().all(|&b| b == 255));
        manager.close().unwrap();
    }

    #[test]
    fn test_boomerang_is_palindromic_burst() {
        let manager = synthetic_manager();
        manager.open_camera(&fast_options()).unwrap();
        let frames = manager
            .capture_boomerang(Duration::from_millis(150), 2)
            .unwrap();
        manager.close().unwrap();

        assert!(!frames.is_empty());
        let first = &frames[0];
        let last = &frames[frames.len() - 1];
        assert_eq!(first.data, last.data);
    }

    #[test]
    fn test_drain_requires_open_camera() {
        let manager = synthetic_manager();
        assert_eq!(manager.drain_frames().err(), Some(BackendError::NotInitialized));
    }
}
