// SPDX-License-Identifier: GPL-3.0-only

//! Camera frame to image conversion

use crate::backends::camera::types::{CameraFrame, PixelFormat};
use image::{RgbImage, RgbaImage};

/// Read one pixel as RGB, clamping coordinates to the frame
pub fn sample_pixel_rgb(frame: &CameraFrame, x: u32, y: u32) -> (u8, u8, u8) {
    if frame.width == 0 || frame.height == 0 {
        return (0, 0, 0);
    }
    let x = x.min(frame.width - 1);
    let y = y.min(frame.height - 1);
    let data = frame.data_slice();
    let idx = (y * frame.stride + x * frame.format.bytes_per_pixel()) as usize;

    match frame.format {
        PixelFormat::RGBA | PixelFormat::RGB24 => {
            if idx + 2 < data.len() {
                (data[idx], data[idx + 1], data[idx + 2])
            } else {
                (0, 0, 0)
            }
        }
        PixelFormat::Gray8 => match data.get(idx) {
            Some(&v) => (v, v, v),
            None => (0, 0, 0),
        },
    }
}

/// Copy a frame into an RGBA image
///
/// Tightly packed RGBA frames are copied in one go; anything else is
/// converted pixel by pixel. Returns `None` for frames whose buffer is
/// shorter than their dimensions claim.
pub fn frame_to_rgba(frame: &CameraFrame) -> Option<RgbaImage> {
    let bpp = frame.format.bytes_per_pixel();
    let needed = frame.stride as usize * frame.height.saturating_sub(1) as usize
        + (frame.width * bpp) as usize;
    if frame.width == 0 || frame.height == 0 || frame.data.len() < needed {
        return None;
    }

    if frame.format == PixelFormat::RGBA && frame.stride == frame.width * 4 {
        let len = (frame.width * frame.height * 4) as usize;
        return RgbaImage::from_raw(frame.width, frame.height, frame.data[..len].to_vec());
    }

    Some(RgbaImage::from_fn(frame.width, frame.height, |x, y| {
        let (r, g, b) = sample_pixel_rgb(frame, x, y);
        image::Rgba([r, g, b, 255])
    }))
}

/// Copy a frame into an RGB image, dropping alpha
pub fn frame_to_rgb(frame: &CameraFrame) -> Option<RgbImage> {
    frame_to_rgba(frame).map(|rgba| image::DynamicImage::ImageRgba8(rgba).to_rgb8())
}
