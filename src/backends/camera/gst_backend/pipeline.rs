// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer capture pipeline
//!
//! `source ! [decode] ! videoconvert ! RGBA ! appsink`. Every sample is copied
//! out of the mapped buffer and pushed on the frame channel without blocking;
//! frames are dropped when the channel is full.

use super::super::types::*;
use super::enumeration::source_element;
use crate::constants::{pipeline, timing};
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Live camera pipeline feeding RGBA frames to a channel
pub struct CapturePipeline {
    pipeline: gstreamer::Pipeline,
    appsink: AppSink,
    description: String,
}

impl CapturePipeline {
    /// Build and start a pipeline for a device and format
    pub fn new(
        backend: CameraBackendType,
        device: &CameraDevice,
        format: &CameraFormat,
        frame_sender: FrameSender,
    ) -> BackendResult<Self> {
        gstreamer::init().map_err(|e| BackendError::InitializationFailed(e.to_string()))?;

        let element = source_element(backend);
        gstreamer::ElementFactory::find(element)
            .ok_or_else(|| BackendError::NotAvailable(format!("{} not available", element)))?;

        let description = build_pipeline_string(backend, device, format);
        info!(pipeline = %description, "Creating capture pipeline");

        let pipeline = gstreamer::parse::launch(&description)
            .map_err(|e| BackendError::InitializationFailed(e.to_string()))?
            .dynamic_cast::<gstreamer::Pipeline>()
            .map_err(|_| {
                BackendError::InitializationFailed("Launch did not produce a pipeline".to_string())
            })?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| BackendError::InitializationFailed("Failed to get appsink".to_string()))?
            .dynamic_cast::<AppSink>()
            .map_err(|_| {
                BackendError::InitializationFailed("Failed to cast appsink".to_string())
            })?;

        appsink.set_property("sync", false);
        appsink.set_property("max-buffers", pipeline::MAX_BUFFERS);
        appsink.set_property("drop", true);
        appsink.set_property("enable-last-sample", false);

        let frame_counter = Arc::new(AtomicU64::new(0));
        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let frame_num = frame_counter.fetch_add(1, Ordering::Relaxed);
                    let sample = appsink
                        .pull_sample()
                        .map_err(|_| gstreamer::FlowError::Eos)?;

                    let frame = match frame_from_sample(&sample) {
                        Some(frame) => frame,
                        None => {
                            if frame_num % timing::FRAME_LOG_INTERVAL == 0 {
                                warn!(frame = frame_num, "Unreadable sample, skipping");
                            }
                            return Ok(gstreamer::FlowSuccess::Ok);
                        }
                    };

                    let mut sender = frame_sender.clone();
                    if let Err(e) = sender.try_send(frame) {
                        if e.is_disconnected() {
                            return Err(gstreamer::FlowError::Flushing);
                        }
                        if frame_num % timing::FRAME_LOG_INTERVAL == 0 {
                            debug!(frame = frame_num, "Frame dropped (channel full)");
                        }
                    } else if frame_num % timing::FRAME_LOG_INTERVAL == 0 {
                        debug!(frame = frame_num, "Frames flowing");
                    }

                    Ok(gstreamer::FlowSuccess::Ok)
                })
                .build(),
        );

        let capture = Self {
            pipeline,
            appsink,
            description,
        };
        capture.start()?;
        Ok(capture)
    }

    fn start(&self) -> BackendResult<()> {
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Playing) {
            let detail = self.pop_bus_error().unwrap_or_else(|| e.to_string());
            return Err(classify_start_error(detail));
        }

        let (result, state, pending) = self.pipeline.state(gstreamer::ClockTime::from_seconds(
            timing::START_TIMEOUT_SECS,
        ));
        debug!(result = ?result, state = ?state, pending = ?pending, "Pipeline state");

        if result.is_err() {
            let detail = self
                .pop_bus_error()
                .unwrap_or_else(|| "Pipeline failed to start".to_string());
            let _ = self.pipeline.set_state(gstreamer::State::Null);
            return Err(classify_start_error(detail));
        }
        if state != gstreamer::State::Playing {
            warn!("Pipeline is not in PLAYING state yet");
        }

        info!("Capture pipeline running");
        Ok(())
    }

    /// Text of the first pending bus error, if any
    fn pop_bus_error(&self) -> Option<String> {
        let bus = self.pipeline.bus()?;
        let msg = bus.pop_filtered(&[gstreamer::MessageType::Error])?;
        match msg.view() {
            gstreamer::MessageView::Error(err) => {
                let text = match err.debug() {
                    Some(debug) => format!("{} ({})", err.error(), debug),
                    None => err.error().to_string(),
                };
                error!(error = %text, "Pipeline error");
                Some(text)
            }
            _ => None,
        }
    }

    /// Check the bus for errors or end-of-stream
    pub fn check_health(&self) -> BackendResult<()> {
        let Some(bus) = self.pipeline.bus() else {
            return Ok(());
        };
        let Some(msg) = bus.pop_filtered(&[
            gstreamer::MessageType::Error,
            gstreamer::MessageType::Eos,
        ]) else {
            return Ok(());
        };

        match msg.view() {
            gstreamer::MessageView::Error(err) => {
                error!(error = %err.error(), "Camera pipeline error");
                Err(BackendError::Disconnected(err.error().to_string()))
            }
            gstreamer::MessageView::Eos(..) => {
                warn!("Camera stream ended");
                Err(BackendError::Disconnected("end of stream".to_string()))
            }
            _ => Ok(()),
        }
    }

    /// The launch line this pipeline was built from
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Stop the pipeline and release the device
    pub fn stop(self) -> BackendResult<()> {
        info!("Stopping capture pipeline");
        self.appsink
            .set_callbacks(gstreamer_app::AppSinkCallbacks::builder().build());

        self.pipeline
            .set_state(gstreamer::State::Null)
            .map_err(|e| BackendError::Other(format!("Failed to stop pipeline: {}", e)))?;

        let (result, state, _) = self.pipeline.state(gstreamer::ClockTime::from_seconds(
            timing::STOP_TIMEOUT_SECS,
        ));
        if let Err(e) = result {
            debug!(error = ?e, state = ?state, "Pipeline state change had issues");
        }
        Ok(())
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.appsink
            .set_callbacks(gstreamer_app::AppSinkCallbacks::builder().build());
        // Release the device immediately
        let _ = self.pipeline.set_state(gstreamer::State::Null);
    }
}

/// Copy a sample into a [`CameraFrame`]
fn frame_from_sample(sample: &gstreamer::Sample) -> Option<CameraFrame> {
    let buffer = sample.buffer()?;
    if buffer.flags().contains(gstreamer::BufferFlags::CORRUPTED) {
        return None;
    }
    let info = VideoInfo::from_caps(sample.caps()?).ok()?;
    let format = PixelFormat::from_gst_format(&info.format().to_string())?;
    let map = buffer.map_readable().ok()?;

    Some(CameraFrame {
        width: info.width(),
        height: info.height(),
        data: Arc::from(map.as_slice()),
        format,
        stride: info.stride()[0] as u32,
        captured_at: Instant::now(),
    })
}

fn classify_start_error(detail: String) -> BackendError {
    let lower = detail.to_lowercase();
    if lower.contains("busy") {
        BackendError::Busy
    } else if lower.contains("not found") || lower.contains("no such") {
        BackendError::DeviceNotFound(detail)
    } else {
        BackendError::InitializationFailed(detail)
    }
}

/// Source element with its device selection property
fn source_fragment(backend: CameraBackendType, device: &CameraDevice) -> String {
    let element = source_element(backend);
    let path = device.path.as_str();

    let property = match backend {
        CameraBackendType::V4l2 if !path.is_empty() => format!(" device={}", path),
        CameraBackendType::V4l2 => String::new(),
        _ => {
            if path.is_empty() {
                String::new()
            } else if let Some(serial) = path.strip_prefix("pipewire-serial-") {
                format!(" target-object={}", serial)
            } else if path.starts_with("/dev/video") {
                format!(" path=v4l2:{}", path)
            } else {
                format!(" path={}", path)
            }
        }
    };

    format!("{}{} do-timestamp=true", element, property)
}

/// Caps and decoder between the source and `videoconvert`
fn format_fragment(format: &CameraFormat) -> String {
    let mut size = format!("width=(int){},height=(int){}", format.width, format.height);
    if let Some(fps) = format.framerate {
        size.push_str(&format!(",framerate=(fraction){}/{}", fps.num, fps.denom));
    }

    match format.pixel_format.as_str() {
        "" => String::new(),
        "MJPG" | "MJPEG" => format!("image/jpeg,{} ! jpegdec ! ", size),
        "YUYV" => format!("video/x-raw,format=YUY2,{} ! ", size),
        raw => format!("video/x-raw,format={},{} ! ", raw, size),
    }
}

/// Full launch line for a capture pipeline
pub(crate) fn build_pipeline_string(
    backend: CameraBackendType,
    device: &CameraDevice,
    format: &CameraFormat,
) -> String {
    let scale = if format.pixel_format.is_empty() {
        // Default camera: scale whatever it negotiates to the preferred size
        format!(
            "videoscale ! video/x-raw,width=(int){},height=(int){} ! ",
            format.width, format.height
        )
    } else {
        String::new()
    };

    format!(
        "{} ! {}queue max-size-buffers={} leaky=downstream ! videoconvert ! {}video/x-raw,format={} ! appsink name=sink",
        source_fragment(backend, device),
        format_fragment(format),
        pipeline::MAX_BUFFERS,
        scale,
        pipeline::OUTPUT_FORMAT,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(path: &str) -> CameraDevice {
        CameraDevice {
            name: "Webcam".to_string(),
            path: path.to_string(),
        }
    }

    fn format(pixel_format: &str) -> CameraFormat {
        CameraFormat {
            width: 640,
            height: 480,
            framerate: Some(Framerate::from_int(30)),
            pixel_format: pixel_format.to_string(),
        }
    }

    #[test]
    fn test_pipewire_serial_target() {
        let line = build_pipeline_string(
            CameraBackendType::PipeWire,
            &device("pipewire-serial-42"),
            &format("YUYV"),
        );
        assert!(line.starts_with("pipewiresrc target-object=42 do-timestamp=true"));
        assert!(line.contains("video/x-raw,format=YUY2,width=(int)640,height=(int)480"));
        assert!(line.ends_with("video/x-raw,format=RGBA ! appsink name=sink"));
    }

    #[test]
    fn test_v4l2_mjpeg_decodes() {
        let line = build_pipeline_string(
            CameraBackendType::V4l2,
            &device("/dev/video2"),
            &format("MJPG"),
        );
        assert!(line.starts_with("v4l2src device=/dev/video2"));
        assert!(line.contains("image/jpeg,width=(int)640,height=(int)480,framerate=(fraction)30/1 ! jpegdec"));
    }

    #[test]
    fn test_default_camera_scales() {
        let mut fmt = format("");
        fmt.framerate = None;
        let line = build_pipeline_string(CameraBackendType::PipeWire, &device(""), &fmt);
        assert!(line.starts_with("pipewiresrc do-timestamp=true ! queue"));
        assert!(line.contains("videoscale ! video/x-raw,width=(int)640,height=(int)480"));
    }

    #[test]
    fn test_busy_error_is_classified() {
        assert_eq!(
            classify_start_error("Device '/dev/video0' is busy".to_string()),
            BackendError::Busy
        );
        assert!(matches!(
            classify_start_error("Could not negotiate".to_string()),
            BackendError::InitializationFailed(_)
        ));
    }
}
