// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for camera capture
//!
//! The backend layer abstracts hardware access, providing a consistent API
//! regardless of the underlying capture method:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                     Capture controller                    │
//! └─────────────────────────────┬─────────────────────────────┘
//!                               │
//! ┌─────────────────────────────┴─────────────────────────────┐
//! │                    CameraBackendManager                   │
//! │  ┌───────────┐ ┌───────────┐ ┌───────────┐ ┌───────────┐  │
//! │  │  PipeWire │ │    V4L2   │ │ Synthetic │ │  gphoto2  │  │
//! │  │(GStreamer)│ │(GStreamer)│ │  (tests)  │ │   (DSLR)  │  │
//! │  └───────────┘ └───────────┘ └───────────┘ └───────────┘  │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Camera backend with device enumeration and frame capture

pub mod camera;
