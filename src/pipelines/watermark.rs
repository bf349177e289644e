// SPDX-License-Identifier: GPL-3.0-only

//! Logo and caption overlay for saved media
//!
//! The logo is scaled to a fraction of the image width, keeps its aspect
//! ratio, and sits in the bottom-right corner with a fixed margin. An
//! optional caption is written in white with a dark outline at the left
//! edge, vertically centred on the logo row. Photos, boomerangs and videos
//! are all stamped the same way.

use crate::constants::output;
use crate::errors::{StorageError, StorageResult};
use ab_glyph::{Font, FontArc, GlyphId, PxScale, ScaleFont, point};
use image::{Rgba, RgbaImage, imageops};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Position and size of the overlay on a photo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Text drawn next to the logo
#[derive(Clone)]
pub struct Caption {
    text: String,
    font: FontArc,
}

impl std::fmt::Debug for Caption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Caption").field("text", &self.text).finish()
    }
}

impl Caption {
    pub fn new(text: impl Into<String>, font: FontArc) -> Self {
        Self {
            text: text.into(),
            font,
        }
    }

    /// Load the caption font from a TrueType/OpenType file
    pub fn load(text: impl Into<String>, font_path: &Path) -> StorageResult<Self> {
        let bytes = std::fs::read(font_path).map_err(|e| StorageError::io(font_path, e))?;
        let font = FontArc::try_from_vec(bytes).map_err(|e| {
            StorageError::Encoding(format!("invalid font '{}': {}", font_path.display(), e))
        })?;
        debug!(font = %font_path.display(), "Caption font loaded");
        Ok(Self::new(text, font))
    }

    /// First system font from the built-in list that exists
    pub fn find_system_font() -> Option<PathBuf> {
        output::CAPTION_FONTS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.is_file())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Height of a line of text at `px`
    fn line_height(&self, px: f32) -> f32 {
        let scaled = self.font.as_scaled(PxScale::from(px));
        scaled.ascent() - scaled.descent()
    }

    /// Paint the text with its top-left corner at `origin`
    fn draw(&self, layer: &mut RgbaImage, px: f32, origin: (f32, f32), color: [u8; 3]) {
        let scale = PxScale::from(px);
        let scaled = self.font.as_scaled(scale);
        let baseline = origin.1 + scaled.ascent();
        let (width, height) = layer.dimensions();

        let mut caret = origin.0;
        let mut previous: Option<GlyphId> = None;
        for ch in self.text.chars() {
            let id = scaled.glyph_id(ch);
            if let Some(previous) = previous {
                caret += scaled.kern(previous, id);
            }
            let glyph = id.with_scale_and_position(scale, point(caret, baseline));
            caret += scaled.h_advance(id);
            previous = Some(id);

            let Some(outlined) = self.font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let x = bounds.min.x as i64 + gx as i64;
                let y = bounds.min.y as i64 + gy as i64;
                if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
                    return;
                }
                blend_over(layer.get_pixel_mut(x as u32, y as u32), color, coverage);
            });
        }
    }
}

/// Composite `color` at `alpha` over a possibly transparent pixel
fn blend_over(pixel: &mut Rgba<u8>, color: [u8; 3], alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    if alpha <= 0.0 {
        return;
    }
    let dst_alpha = pixel[3] as f32 / 255.0;
    let out_alpha = alpha + dst_alpha * (1.0 - alpha);
    for channel in 0..3 {
        let src = color[channel] as f32 * alpha;
        let dst = pixel[channel] as f32 * dst_alpha * (1.0 - alpha);
        pixel[channel] = ((src + dst) / out_alpha).round().clamp(0.0, 255.0) as u8;
    }
    pixel[3] = (out_alpha * 255.0).round() as u8;
}

/// A loaded watermark image with an optional caption
#[derive(Debug, Clone)]
pub struct Watermark {
    logo: RgbaImage,
    width_fraction: f32,
    margin: u32,
    caption: Option<Caption>,
}

impl Watermark {
    pub fn new(logo: RgbaImage, width_fraction: f32, margin: u32) -> Self {
        Self {
            logo,
            width_fraction,
            margin,
            caption: None,
        }
    }

    /// Load a logo from an image file
    pub fn load(path: &Path, width_fraction: f32, margin: u32) -> StorageResult<Self> {
        let logo = image::open(path)
            .map_err(|e| match e {
                image::ImageError::IoError(io) => StorageError::io(path, io),
                other => StorageError::Image(other),
            })?
            .to_rgba8();
        debug!(
            path = %path.display(),
            width = logo.width(),
            height = logo.height(),
            "Watermark loaded"
        );
        Ok(Self::new(logo, width_fraction, margin))
    }

    /// Write `caption` next to the logo
    pub fn with_caption(mut self, caption: Caption) -> Self {
        self.caption = Some(caption);
        self
    }

    pub fn caption(&self) -> Option<&Caption> {
        self.caption.as_ref()
    }

    /// Where the logo goes on a photo of the given size
    ///
    /// `None` when the photo is too small to hold it.
    pub fn placement(&self, photo_width: u32, photo_height: u32) -> Option<Placement> {
        if self.logo.width() == 0 || self.logo.height() == 0 {
            return None;
        }

        let width = (photo_width as f32 * self.width_fraction).round() as u32;
        let height = (width as u64 * self.logo.height() as u64 / self.logo.width() as u64) as u32;
        if width == 0 || height == 0 {
            return None;
        }

        let x = photo_width.checked_sub(width + self.margin)?;
        let y = photo_height.checked_sub(height + self.margin)?;
        Some(Placement {
            x,
            y,
            width,
            height,
        })
    }

    /// Transparent layer holding the logo and caption for an image size
    ///
    /// Clips render this once and overlay it on every frame.
    pub fn render(&self, width: u32, height: u32) -> Option<RgbaImage> {
        let Some(placement) = self.placement(width, height) else {
            debug!(width, height, "Image too small for watermark");
            return None;
        };

        let mut layer = RgbaImage::new(width, height);
        let scaled = imageops::resize(
            &self.logo,
            placement.width,
            placement.height,
            imageops::FilterType::Triangle,
        );
        imageops::replace(&mut layer, &scaled, placement.x as i64, placement.y as i64);

        if let Some(caption) = &self.caption {
            self.draw_caption(caption, &mut layer, placement);
        }
        Some(layer)
    }

    fn draw_caption(&self, caption: &Caption, layer: &mut RgbaImage, placement: Placement) {
        let px = (placement.height / output::CAPTION_SIZE_DIVISOR) as f32;
        if px < 1.0 {
            warn!(logo_height = placement.height, "Logo too small for caption");
            return;
        }

        let text_height = caption.line_height(px);
        let x = self.margin as f32;
        let y = placement.y as f32 + (placement.height as f32 - text_height) / 2.0;

        let outline = output::CAPTION_OUTLINE;
        for dx in -outline..=outline {
            for dy in -outline..=outline {
                caption.draw(layer, px, (x + dx as f32, y + dy as f32), [0, 0, 0]);
            }
        }
        caption.draw(layer, px, (x, y), [255, 255, 255]);
    }

    /// Blend the logo and caption onto an image
    pub fn apply(&self, photo: &mut RgbaImage) {
        if let Some(layer) = self.render(photo.width(), photo.height()) {
            imageops::overlay(photo, &layer, 0, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logo(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 255]))
    }

    fn pixels(
        image: &RgbaImage,
        xs: std::ops::Range<u32>,
        ys: std::ops::Range<u32>,
    ) -> Vec<[u8; 4]> {
        xs.flat_map(|x| ys.clone().map(move |y| (x, y)))
            .map(|(x, y)| image.get_pixel(x, y).0)
            .collect()
    }

    #[test]
    fn test_bottom_right_placement() {
        let watermark = Watermark::new(logo(200, 100), 0.25, 10);
        let placement = watermark.placement(1280, 853).unwrap();
        assert_eq!(
            placement,
            Placement {
                x: 1280 - 320 - 10,
                y: 853 - 160 - 10,
                width: 320,
                height: 160,
            }
        );
    }

    #[test]
    fn test_too_small_photo() {
        let watermark = Watermark::new(logo(10, 100), 0.5, 10);
        assert!(watermark.placement(40, 40).is_none());
    }

    #[test]
    fn test_apply_paints_corner_only() {
        let watermark = Watermark::new(logo(4, 4), 0.25, 2);
        let mut photo = RgbaImage::from_pixel(40, 40, Rgba([0, 0, 0, 255]));
        watermark.apply(&mut photo);

        // 10x10 logo ending 2px from the corner
        assert_eq!(photo.get_pixel(37, 37).0, [255, 0, 0, 255]);
        assert_eq!(photo.get_pixel(28, 28).0, [255, 0, 0, 255]);
        assert_eq!(photo.get_pixel(27, 27).0, [0, 0, 0, 255]);
        assert_eq!(photo.get_pixel(39, 39).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_blend_over_transparent() {
        let mut pixel = Rgba([0, 0, 0, 0]);
        blend_over(&mut pixel, [255, 255, 255], 1.0);
        assert_eq!(pixel.0, [255, 255, 255, 255]);

        let mut pixel = Rgba([0, 0, 0, 0]);
        blend_over(&mut pixel, [200, 100, 0], 0.5);
        assert_eq!(pixel.0, [200, 100, 0, 128]);
    }

    #[test]
    fn test_invalid_font_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"not a font").unwrap();
        assert!(matches!(
            Caption::load("#booth", &path),
            Err(StorageError::Encoding(_))
        ));
        assert!(matches!(
            Caption::load("#booth", &dir.path().join("missing.ttf")),
            Err(StorageError::Io { .. })
        ));
    }

    #[test]
    fn test_caption_outlined_at_left_edge() {
        let Some(font) = Caption::find_system_font() else {
            eprintln!("no system font found, skipping caption rendering test");
            return;
        };
        let caption = Caption::load("#RushClaremont", &font).unwrap();
        // 800 px wide: 200x100 logo at y 490, 14 px caption
        let watermark = Watermark::new(logo(2, 1), 0.25, 10).with_caption(caption);
        let mut photo = RgbaImage::from_pixel(800, 600, Rgba([128, 128, 128, 255]));
        watermark.apply(&mut photo);

        let caption_area = pixels(&photo, 8..300, 490..590);
        assert!(caption_area.iter().any(|p| p[0] > 230 && p[1] > 230 && p[2] > 230));
        assert!(caption_area.iter().any(|p| p[0] < 40 && p[1] < 40 && p[2] < 40));
        // Nothing between the caption and the logo
        let gap = pixels(&photo, 400..580, 490..590);
        assert!(gap.iter().all(|p| *p == [128, 128, 128, 255]));
        // Nothing above the logo row
        assert_eq!(photo.get_pixel(20, 100).0, [128, 128, 128, 255]);
    }
}
