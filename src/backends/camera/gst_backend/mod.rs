// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer camera backend
//!
//! Serves both [`CameraBackendType::PipeWire`] (`pipewiresrc`) and
//! [`CameraBackendType::V4l2`] (`v4l2src`).

mod enumeration;
mod pipeline;

pub use enumeration::{enumerate_cameras, get_formats, is_source_available};
pub use pipeline::CapturePipeline;

use super::CameraBackend;
use super::types::*;
use crate::constants;
use tracing::info;

/// GStreamer backend implementation
pub struct GStreamerBackend {
    backend_type: CameraBackendType,
    current_device: Option<CameraDevice>,
    pipeline: Option<CapturePipeline>,
    frame_receiver: Option<FrameReceiver>,
}

impl GStreamerBackend {
    pub fn new(backend_type: CameraBackendType) -> Self {
        Self {
            backend_type,
            current_device: None,
            pipeline: None,
            frame_receiver: None,
        }
    }
}

impl CameraBackend for GStreamerBackend {
    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        enumerate_cameras(self.backend_type)
    }

    fn get_formats(&self, device: &CameraDevice) -> Vec<CameraFormat> {
        info!(device_path = %device.path, backend = %self.backend_type, "Getting formats");
        get_formats(self.backend_type, device)
    }

    fn initialize(&mut self, device: &CameraDevice, format: &CameraFormat) -> BackendResult<()> {
        info!(
            device = %device.name,
            format = %format,
            backend = %self.backend_type,
            "Initializing GStreamer backend"
        );

        if self.is_initialized() {
            self.shutdown()?;
        }

        let (sender, receiver) =
            futures::channel::mpsc::channel(constants::camera::FRAME_CHANNEL_CAPACITY);
        let pipeline = CapturePipeline::new(self.backend_type, device, format, sender)?;
        info!(pipeline = pipeline.description(), "GStreamer backend initialized successfully");

        self.current_device = Some(device.clone());
        self.pipeline = Some(pipeline);
        self.frame_receiver = Some(receiver);
        Ok(())
    }

    fn shutdown(&mut self) -> BackendResult<()> {
        info!(backend = %self.backend_type, "Shutting down GStreamer backend");

        self.frame_receiver = None;
        self.current_device = None;
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.stop()?;
        }
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.pipeline.is_some() && self.current_device.is_some()
    }

    fn take_frame_receiver(&mut self) -> Option<FrameReceiver> {
        self.frame_receiver.take()
    }

    fn check_health(&self) -> BackendResult<()> {
        match &self.pipeline {
            Some(pipeline) => pipeline.check_health(),
            None => Err(BackendError::NotInitialized),
        }
    }

    fn backend_type(&self) -> CameraBackendType {
        self.backend_type
    }

    fn is_available(&self) -> bool {
        is_source_available(self.backend_type)
    }
}
