//! Per-frame geometry and packing helpers for the export loop.
//!
//! Crop clamping, aspect-preserving even-rounded resize, stacked
//! RGB/alpha packing, and the transparent-pixel RGB zeroing that helps
//! downstream compressors.

use image::{GrayImage, imageops};
use kirinuki_pipeline::{BoundingBox, RgbImage, RgbaImage};

/// Clamp a crop rectangle into frame bounds.
///
/// The origin is clamped inside the frame and the extent to at least
/// 1x1 within the remainder, so the result is always a usable
/// rectangle.
#[must_use]
pub fn clamp_crop(crop: BoundingBox, frame_width: u32, frame_height: u32) -> BoundingBox {
    let x = crop.x.min(frame_width.saturating_sub(1));
    let y = crop.y.min(frame_height.saturating_sub(1));
    let width = crop.width.clamp(1, (frame_width - x).max(1));
    let height = crop.height.clamp(1, (frame_height - y).max(1));
    BoundingBox::new(x, y, width, height)
}

/// Compute the resize target for an output of `width x height`.
///
/// Returns `None` unless `resize_width` is strictly smaller than the
/// current width (upscaling is never performed). The height scales to
/// preserve aspect ratio and both dimensions are rounded down to even
/// numbers, which video codecs prefer. Degenerate results (a zero
/// dimension) yield `None`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn resize_target(width: u32, height: u32, resize_width: u32) -> Option<(u32, u32)> {
    if resize_width >= width {
        return None;
    }

    let scale = f64::from(resize_width) / f64::from(width);
    let mut target_width = resize_width;
    let mut target_height = (f64::from(height) * scale) as u32;

    if target_width % 2 != 0 {
        target_width -= 1;
    }
    if target_height % 2 != 0 {
        target_height -= 1;
    }

    (target_width > 0 && target_height > 0).then_some((target_width, target_height))
}

/// Downscale an RGBA frame to the target size.
///
/// Uses triangle (bilinear) filtering, the standard area-averaging
/// choice for downscaling.
#[must_use]
pub fn resize_rgba(frame: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    imageops::resize(frame, width, height, imageops::FilterType::Triangle)
}

/// Crop an RGB frame to a rectangle.
#[must_use]
pub fn crop_rgb(frame: &RgbImage, rect: BoundingBox) -> RgbImage {
    imageops::crop_imm(frame, rect.x, rect.y, rect.width, rect.height).to_image()
}

/// Crop a single-channel plane to a rectangle.
#[must_use]
pub fn crop_gray(plane: &GrayImage, rect: BoundingBox) -> GrayImage {
    imageops::crop_imm(plane, rect.x, rect.y, rect.width, rect.height).to_image()
}

/// Merge a stabilization border-alpha plane into the keyed frame's
/// alpha channel (bitwise AND, matching the binary border plane).
pub fn merge_border_alpha(frame: &mut RgbaImage, border: &GrayImage) {
    for (x, y, pixel) in frame.enumerate_pixels_mut() {
        pixel.0[3] &= border.get_pixel(x, y).0[0];
    }
}

/// Zero the RGB channels of fully transparent pixels.
///
/// Fully transparent pixels carry arbitrary color that downstream
/// encoders would waste bits on; zeroing them significantly improves
/// compression of the transparent output.
pub fn zero_transparent(frame: &mut RgbaImage) {
    for pixel in frame.pixels_mut() {
        if pixel.0[3] == 0 {
            pixel.0 = [0, 0, 0, 0];
        }
    }
}

/// Pack an RGBA frame into the stacked 3-channel layout: top half RGB
/// premultiplied by alpha (matted against black), bottom half the
/// alpha replicated across all three channels. Output height is twice
/// the input's.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn pack_stacked(frame: &RgbaImage) -> RgbImage {
    let (width, height) = frame.dimensions();
    RgbImage::from_fn(width, height * 2, |x, y| {
        if y < height {
            let [r, g, b, a] = frame.get_pixel(x, y).0;
            let factor = f32::from(a) / 255.0;
            image::Rgb([
                (f32::from(r) * factor) as u8,
                (f32::from(g) * factor) as u8,
                (f32::from(b) * factor) as u8,
            ])
        } else {
            let a = frame.get_pixel(x, y - height).0[3];
            image::Rgb([a, a, a])
        }
    })
}
