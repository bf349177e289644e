// SPDX-License-Identifier: GPL-3.0-only

//! DSLR backend over libgphoto2
//!
//! A worker thread owns the gphoto2 context and camera. While open it pulls
//! live view previews (JPEG), decodes them and sends RGBA frames on the
//! frame channel. Stills use the camera's own shutter: the shot lands on the
//! memory card and is downloaded at full resolution.
//!
//! Only built with the `gphoto2` feature, which links against the system
//! libgphoto2.

use super::CameraBackend;
use super::types::*;
use crate::constants::camera;
use gphoto2::widget::RadioWidget;
use gphoto2::{Camera, Context};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Requests handled by the worker between previews
enum Command {
    Still(Sender<BackendResult<CameraFrame>>),
    Stop,
}

struct Worker {
    commands: Sender<Command>,
    handle: JoinHandle<()>,
}

/// gphoto2 backend implementation
pub struct GphotoBackend {
    worker: Option<Worker>,
    failed: Arc<AtomicBool>,
    frame_receiver: Option<FrameReceiver>,
}

impl GphotoBackend {
    pub fn new() -> Self {
        Self {
            worker: None,
            failed: Arc::new(AtomicBool::new(false)),
            frame_receiver: None,
        }
    }

    fn stop_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.commands.send(Command::Stop);
            if worker.handle.join().is_err() {
                error!("gphoto2 worker thread panicked");
            }
        }
    }
}

impl Default for GphotoBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for GphotoBackend {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

impl CameraBackend for GphotoBackend {
    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        let context = match Context::new() {
            Ok(context) => context,
            Err(e) => {
                warn!(error = %e, "libgphoto2 unavailable");
                return Vec::new();
            }
        };
        match context.list_cameras().wait() {
            Ok(cameras) => cameras
                .map(|descriptor| CameraDevice {
                    name: descriptor.model,
                    path: descriptor.port,
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, "Failed to list gphoto2 cameras");
                Vec::new()
            }
        }
    }

    fn get_formats(&self, _device: &CameraDevice) -> Vec<CameraFormat> {
        // Live view size is fixed by the body; the decoder reports the real one
        vec![CameraFormat {
            width: camera::LIVE_VIEW_WIDTH,
            height: camera::LIVE_VIEW_HEIGHT,
            framerate: None,
            pixel_format: "JPEG".to_string(),
        }]
    }

    fn initialize(&mut self, device: &CameraDevice, format: &CameraFormat) -> BackendResult<()> {
        info!(
            device = %device.name,
            port = %device.path,
            format = %format,
            "Initializing gphoto2 backend"
        );
        self.stop_worker();
        self.failed.store(false, Ordering::SeqCst);

        let (sender, receiver) = futures::channel::mpsc::channel(camera::FRAME_CHANNEL_CAPACITY);
        let (commands, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let handle = {
            let port = device.path.clone();
            let failed = Arc::clone(&self.failed);
            std::thread::Builder::new()
                .name("gphoto2-camera".to_string())
                .spawn(move || run_worker(port, sender, command_rx, ready_tx, failed))
                .map_err(|e| BackendError::InitializationFailed(e.to_string()))?
        };

        // The worker reports once the camera is open
        let ready = ready_rx.recv().unwrap_or_else(|_| {
            Err(BackendError::InitializationFailed(
                "gphoto2 worker exited during startup".to_string(),
            ))
        });
        if let Err(e) = ready {
            let _ = handle.join();
            return Err(e);
        }

        self.worker = Some(Worker { commands, handle });
        self.frame_receiver = Some(receiver);
        Ok(())
    }

    fn shutdown(&mut self) -> BackendResult<()> {
        info!("Shutting down gphoto2 backend");
        self.frame_receiver = None;
        self.stop_worker();
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.worker.is_some()
    }

    fn take_frame_receiver(&mut self) -> Option<FrameReceiver> {
        self.frame_receiver.take()
    }

    fn check_health(&self) -> BackendResult<()> {
        let Some(worker) = &self.worker else {
            return Err(BackendError::NotInitialized);
        };
        if self.failed.load(Ordering::SeqCst) || worker.handle.is_finished() {
            return Err(BackendError::Disconnected("camera stopped responding".to_string()));
        }
        Ok(())
    }

    fn capture_native_still(&mut self) -> Option<BackendResult<CameraFrame>> {
        let Some(worker) = &self.worker else {
            return Some(Err(BackendError::NotInitialized));
        };

        let (reply, result) = mpsc::channel();
        if worker.commands.send(Command::Still(reply)).is_err() {
            return Some(Err(BackendError::Disconnected(
                "camera worker is gone".to_string(),
            )));
        }
        let timeout = Duration::from_secs(camera::DSLR_STILL_TIMEOUT_SECS);
        Some(result.recv_timeout(timeout).unwrap_or_else(|e| {
            Err(BackendError::Other(format!("camera shutter: {}", e)))
        }))
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::Gphoto2
    }

    fn is_available(&self) -> bool {
        Context::new().is_ok()
    }
}

/// Open camera owned by the worker thread
struct Session {
    context: Context,
    camera: Camera,
}

impl Session {
    fn open(port: &str) -> BackendResult<Self> {
        let context = Context::new().map_err(|e| BackendError::NotAvailable(e.to_string()))?;
        let descriptor = context
            .list_cameras()
            .wait()
            .map_err(|e| BackendError::InitializationFailed(e.to_string()))?
            .find(|descriptor| descriptor.port == port)
            .ok_or_else(|| BackendError::DeviceNotFound(port.to_string()))?;
        let camera = context
            .get_camera(&descriptor)
            .wait()
            .map_err(|e| BackendError::InitializationFailed(e.to_string()))?;

        let session = Self { context, camera };
        session.keep_shots_on_card();
        Ok(session)
    }

    /// Store shots on the memory card rather than in camera RAM
    fn keep_shots_on_card(&self) {
        let result = self
            .camera
            .config_key::<RadioWidget>("capturetarget")
            .wait()
            .and_then(|target| {
                target.set_choice(camera::DSLR_CAPTURE_TARGET)?;
                self.camera.set_config(&target).wait()
            });
        match result {
            Ok(()) => debug!(capture_target = camera::DSLR_CAPTURE_TARGET, "Capture target set"),
            Err(e) => warn!(error = %e, "Could not set capture target"),
        }
    }

    fn preview(&self) -> BackendResult<CameraFrame> {
        let file = self
            .camera
            .capture_preview()
            .wait()
            .map_err(|e| BackendError::Disconnected(e.to_string()))?;
        let data = file
            .get_data(&self.context)
            .wait()
            .map_err(|e| BackendError::Disconnected(e.to_string()))?;
        decode_jpeg(&data)
    }

    fn still(&self) -> BackendResult<CameraFrame> {
        let path = self
            .camera
            .capture_image()
            .wait()
            .map_err(|e| BackendError::Other(format!("capture failed: {}", e)))?;
        info!(folder = %path.folder(), name = %path.name(), "Still taken");
        let file = self
            .camera
            .fs()
            .download(&path.folder(), &path.name())
            .wait()
            .map_err(|e| BackendError::Other(format!("download failed: {}", e)))?;
        let data = file
            .get_data(&self.context)
            .wait()
            .map_err(|e| BackendError::Other(format!("download failed: {}", e)))?;
        decode_jpeg(&data)
    }
}

fn decode_jpeg(data: &[u8]) -> BackendResult<CameraFrame> {
    let rgba = image::load_from_memory(data)
        .map_err(|e| BackendError::Other(format!("undecodable camera image: {}", e)))?
        .to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(CameraFrame::from_rgba(width, height, rgba.into_raw()))
}

fn run_worker(
    port: String,
    mut sender: FrameSender,
    commands: Receiver<Command>,
    ready: Sender<BackendResult<()>>,
    failed: Arc<AtomicBool>,
) {
    let session = match Session::open(&port) {
        Ok(session) => session,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        return;
    }

    let mut previews: u64 = 0;
    loop {
        match commands.try_recv() {
            Ok(Command::Still(reply)) => {
                let _ = reply.send(session.still());
            }
            Ok(Command::Stop) | Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {}
        }

        match session.preview() {
            Ok(frame) => {
                if let Err(e) = sender.try_send(frame)
                    && e.is_disconnected()
                {
                    break;
                }
                previews += 1;
            }
            Err(BackendError::Disconnected(reason)) => {
                error!(reason = %reason, "Camera stopped delivering live view");
                failed.store(true, Ordering::SeqCst);
                break;
            }
            Err(e) => warn!(error = %e, "Dropped live view frame"),
        }
    }
    debug!(previews, port = %port, "gphoto2 worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_jpeg_preview() {
        let image = image::RgbImage::from_pixel(6, 4, image::Rgb([10, 200, 30]));
        let mut jpeg = Vec::new();
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut std::io::Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
            .unwrap();

        let frame = decode_jpeg(&jpeg).unwrap();
        assert_eq!((frame.width, frame.height), (6, 4));
        assert_eq!(frame.data.len(), 6 * 4 * 4);
    }

    #[test]
    fn test_garbage_preview_rejected() {
        assert!(matches!(decode_jpeg(b"nope"), Err(BackendError::Other(_))));
    }

    #[test]
    fn test_not_open_reports_state() {
        let mut backend = GphotoBackend::new();
        assert!(!backend.is_initialized());
        assert_eq!(backend.check_health(), Err(BackendError::NotInitialized));
        assert!(matches!(
            backend.capture_native_still(),
            Some(Err(BackendError::NotInitialized))
        ));
        let device = CameraDevice {
            name: "EOS".to_string(),
            path: "usb:001,004".to_string(),
        };
        assert_eq!(backend.get_formats(&device).len(), 1);
    }
}
