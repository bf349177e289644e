// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic camera backend
//!
//! A background thread paints a moving gradient and sends it on the frame
//! channel at the format's framerate. Used by the test-suite and for trying
//! the booth on machines without a camera.

use super::CameraBackend;
use super::types::*;
use crate::constants;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info};

static NEXT_DEVICE_ID: AtomicU32 = AtomicU32::new(0);

/// Switch that simulates unplugging a synthetic camera
#[derive(Debug, Clone, Default)]
pub struct DisconnectSwitch(Arc<AtomicBool>);

impl DisconnectSwitch {
    /// Stop frame delivery and report the camera as disconnected
    pub fn disconnect(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Plug the camera back in
    pub fn reconnect(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_disconnected(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Running generator thread
struct Generator {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Synthetic camera backend implementation
pub struct SyntheticBackend {
    device: CameraDevice,
    format: CameraFormat,
    available: bool,
    switch: DisconnectSwitch,
    silent: bool,
    shutter: bool,
    generator: Option<Generator>,
    frame_receiver: Option<FrameReceiver>,
}

impl SyntheticBackend {
    /// A 320x240 camera at 30 fps
    pub fn new() -> Self {
        Self::with_format(320, 240, 30)
    }

    /// A camera advertising a single format
    pub fn with_format(width: u32, height: u32, fps: u32) -> Self {
        let id = NEXT_DEVICE_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            device: CameraDevice {
                name: "Synthetic Camera".to_string(),
                path: format!("synthetic:{}", id),
            },
            format: CameraFormat {
                width,
                height,
                framerate: Some(Framerate::from_int(fps)),
                pixel_format: "RGBA".to_string(),
            },
            available: true,
            switch: DisconnectSwitch::default(),
            silent: false,
            shutter: false,
            generator: None,
            frame_receiver: None,
        }
    }

    /// A backend whose camera cannot be opened
    pub fn unavailable() -> Self {
        let mut backend = Self::new();
        backend.available = false;
        backend
    }

    /// A camera that opens and stays healthy but never delivers a frame
    pub fn without_frames(mut self) -> Self {
        self.silent = true;
        self
    }

    /// A camera with its own shutter: native stills are solid white
    pub fn with_shutter(mut self) -> Self {
        self.shutter = true;
        self
    }

    /// Use a fixed device path, e.g. to have two backends share one device
    pub fn with_device_path(mut self, path: impl Into<String>) -> Self {
        self.device.path = path.into();
        self
    }

    /// Handle for simulating a disconnect while the camera is open
    pub fn disconnect_switch(&self) -> DisconnectSwitch {
        self.switch.clone()
    }

    fn stop_generator(&mut self) {
        if let Some(generator) = self.generator.take() {
            generator.stop.store(true, Ordering::SeqCst);
            if generator.handle.join().is_err() {
                debug!("Synthetic generator thread panicked");
            }
        }
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SyntheticBackend {
    fn drop(&mut self) {
        self.stop_generator();
    }
}

impl CameraBackend for SyntheticBackend {
    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        if self.available {
            vec![self.device.clone()]
        } else {
            Vec::new()
        }
    }

    fn get_formats(&self, device: &CameraDevice) -> Vec<CameraFormat> {
        if device.path == self.device.path {
            vec![self.format.clone()]
        } else {
            Vec::new()
        }
    }

    fn initialize(&mut self, device: &CameraDevice, format: &CameraFormat) -> BackendResult<()> {
        if !self.available {
            return Err(BackendError::NotAvailable(
                "synthetic camera is switched off".to_string(),
            ));
        }
        if device.path != self.device.path {
            return Err(BackendError::DeviceNotFound(device.path.clone()));
        }
        if self.switch.is_disconnected() {
            return Err(BackendError::Disconnected("camera unplugged".to_string()));
        }

        self.stop_generator();
        info!(device = %device.name, format = %format, "Starting synthetic camera");

        let (sender, receiver) =
            futures::channel::mpsc::channel(constants::camera::FRAME_CHANNEL_CAPACITY);
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let stop = Arc::clone(&stop);
            let switch = self.switch.clone();
            let format = format.clone();
            let silent = self.silent;
            std::thread::spawn(move || run_generator(format, sender, stop, switch, silent))
        };

        self.generator = Some(Generator { stop, handle });
        self.frame_receiver = Some(receiver);
        Ok(())
    }

    fn shutdown(&mut self) -> BackendResult<()> {
        info!("Shutting down synthetic camera");
        self.stop_generator();
        self.frame_receiver = None;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.generator.is_some()
    }

    fn take_frame_receiver(&mut self) -> Option<FrameReceiver> {
        self.frame_receiver.take()
    }

    fn check_health(&self) -> BackendResult<()> {
        if !self.is_initialized() {
            return Err(BackendError::NotInitialized);
        }
        if self.switch.is_disconnected() {
            return Err(BackendError::Disconnected("camera unplugged".to_string()));
        }
        Ok(())
    }

    fn capture_native_still(&mut self) -> Option<BackendResult<CameraFrame>> {
        if !self.shutter {
            return None;
        }
        if let Err(e) = self.check_health() {
            return Some(Err(e));
        }
        let pixels = (self.format.width * self.format.height) as usize;
        let data = [255u8; 4].repeat(pixels);
        Some(Ok(CameraFrame::from_rgba(
            self.format.width,
            self.format.height,
            data,
        )))
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::Synthetic
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

fn run_generator(
    format: CameraFormat,
    mut sender: FrameSender,
    stop: Arc<AtomicBool>,
    switch: DisconnectSwitch,
    silent: bool,
) {
    let interval = format
        .framerate
        .map(|fps| fps.frame_duration())
        .filter(|d| !d.is_zero())
        .unwrap_or(Duration::from_millis(33));

    let mut frame_num: u32 = 0;
    while !stop.load(Ordering::SeqCst) {
        if !switch.is_disconnected() && !silent {
            let frame = CameraFrame::from_rgba(
                format.width,
                format.height,
                paint_pattern(format.width, format.height, frame_num),
            );
            if let Err(e) = sender.try_send(frame)
                && e.is_disconnected()
            {
                break;
            }
            frame_num = frame_num.wrapping_add(1);
        }
        std::thread::sleep(interval);
    }
    debug!(frames = frame_num, "Synthetic generator stopped");
}

/// Horizontal red ramp, vertical green ramp, blue cycling per frame
fn paint_pattern(width: u32, height: u32, frame_num: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    let blue = (frame_num.wrapping_mul(8) % 256) as u8;
    for y in 0..height {
        let green = (y * 255 / height.max(1)) as u8;
        for x in 0..width {
            let red = (x * 255 / width.max(1)) as u8;
            data.extend_from_slice(&[red, green, blue, 255]);
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_size_and_corners() {
        let data = paint_pattern(4, 2, 1);
        assert_eq!(data.len(), 4 * 2 * 4);
        assert_eq!(&data[0..4], &[0, 0, 8, 255]);
        // Bottom-right pixel has the highest red
        let last = &data[data.len() - 4..];
        assert_eq!(last[0], (3 * 255 / 4) as u8);
        assert_eq!(last[1], 127);
    }

    #[test]
    fn test_unavailable_refuses_initialize() {
        let mut backend = SyntheticBackend::unavailable();
        assert!(backend.enumerate_cameras().is_empty());
        let device = backend.device.clone();
        let format = backend.format.clone();
        assert!(matches!(
            backend.initialize(&device, &format),
            Err(BackendError::NotAvailable(_))
        ));
    }

    #[test]
    fn test_frames_flow_and_disconnect_reported() {
        let mut backend = SyntheticBackend::with_format(8, 6, 100);
        let device = backend.enumerate_cameras().remove(0);
        let format = backend.get_formats(&device).remove(0);
        backend.initialize(&device, &format).unwrap();

        let mut receiver = backend.take_frame_receiver().unwrap();
        assert!(backend.take_frame_receiver().is_none());

        let frame = futures::executor::block_on(futures::StreamExt::next(&mut receiver)).unwrap();
        assert_eq!((frame.width, frame.height), (8, 6));
        assert!(backend.check_health().is_ok());

        backend.disconnect_switch().disconnect();
        assert!(matches!(
            backend.check_health(),
            Err(BackendError::Disconnected(_))
        ));

        backend.shutdown().unwrap();
        assert!(!backend.is_initialized());
    }

    #[test]
    fn test_silent_camera_stays_healthy() {
        let mut backend = SyntheticBackend::with_format(8, 6, 100).without_frames();
        let device = backend.enumerate_cameras().remove(0);
        let format = backend.get_formats(&device).remove(0);
        backend.initialize(&device, &format).unwrap();
        let mut receiver = backend.take_frame_receiver().unwrap();

        std::thread::sleep(Duration::from_millis(50));
        assert!(receiver.try_next().is_err());
        assert!(backend.check_health().is_ok());
        backend.shutdown().unwrap();
    }

    #[test]
    fn test_native_still_only_with_shutter() {
        let mut plain = SyntheticBackend::with_format(8, 6, 100);
        assert!(plain.capture_native_still().is_none());

        let mut backend = SyntheticBackend::with_format(8, 6, 100).with_shutter();
        // Not open yet
        assert!(matches!(
            backend.capture_native_still(),
            Some(Err(BackendError::NotInitialized))
        ));
        let device = backend.enumerate_cameras().remove(0);
        let format = backend.get_formats(&device).remove(0);
        backend.initialize(&device, &format).unwrap();
        let frame = backend.capture_native_still().unwrap().unwrap();
        assert_eq!((frame.width, frame.height), (8, 6));
        assert!(frame.data.iter().all(|&b| b == 255));
        backend.shutdown().unwrap();
    }
}
