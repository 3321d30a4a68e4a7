//! Edge-localized key color spill suppression.
//!
//! Subjects filmed against a colored screen pick up reflected key
//! light along their edges. This pass isolates the ring of pixels
//! straddling the foreground/background boundary of the mask and pulls
//! excess green out of them, compensating red and blue slightly so the
//! correction does not read as a magenta shift.

use image::GrayImage;
use imageproc::morphology::{Mask, grayscale_dilate, grayscale_erode};

use crate::types::{ChromaKeySettings, RgbImage};

/// Radius of the disk kernel used to build the edge band (a 5x5
/// elliptical kernel).
const EDGE_KERNEL_RADIUS: u8 = 2;

/// Iterations of dilation/erosion when building the edge band.
const EDGE_ITERATIONS: u32 = 2;

/// Fraction of the removed green added back to red and blue to
/// compensate the color shift. Empirically tuned, not derived.
const SPILL_COMPENSATION: f32 = 0.3;

/// Remove key color spill from subject edges.
///
/// The edge band is `dilate(mask) - erode(mask)`, each applied
/// [`EDGE_ITERATIONS`] times with a disk of radius
/// [`EDGE_KERNEL_RADIUS`]: the ring of pixels where the mask
/// transitions and spill is most visible. Within the band, the spill
/// amount is `max(0, G - (R + B) / 2)`, scaled by
/// `spill_suppression` and the band intensity, subtracted from green;
/// [`SPILL_COMPENSATION`] of the subtracted amount is added back to
/// red and blue.
///
/// Returns the frame unchanged (bit-identical) when
/// `spill_suppression <= 0`.
#[must_use = "returns the corrected frame"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn suppress_spill(
    frame: &RgbImage,
    mask: &GrayImage,
    settings: &ChromaKeySettings,
) -> RgbImage {
    if settings.spill_suppression <= 0.0 {
        return frame.clone();
    }

    let edge = edge_band(mask);
    let strength = settings.spill_suppression;

    RgbImage::from_fn(frame.width(), frame.height(), |x, y| {
        let [r, g, b] = frame.get_pixel(x, y).0;
        let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));

        let avg_rb = (r + b) / 2.0;
        let spill = (g - avg_rb).max(0.0);

        let edge_weight = f32::from(edge.get_pixel(x, y).0[0]) / 255.0;
        let suppression = spill * strength * edge_weight;

        let compensation = suppression * SPILL_COMPENSATION;

        image::Rgb([
            (r + compensation).clamp(0.0, 255.0) as u8,
            (g - suppression).clamp(0.0, 255.0) as u8,
            (b + compensation).clamp(0.0, 255.0) as u8,
        ])
    })
}

/// Band of pixels straddling the mask's foreground/background
/// boundary: dilated minus eroded, saturating.
fn edge_band(mask: &GrayImage) -> GrayImage {
    let kernel = Mask::disk(EDGE_KERNEL_RADIUS.into());

    let mut dilated = mask.clone();
    let mut eroded = mask.clone();
    for _ in 0..EDGE_ITERATIONS {
        dilated = grayscale_dilate(&dilated, &kernel);
        eroded = grayscale_erode(&eroded, &kernel);
    }

    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        let hi = dilated.get_pixel(x, y).0[0];
        let lo = eroded.get_pixel(x, y).0[0];
        image::Luma([hi.saturating_sub(lo)])
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Frame with a hard vertical mask boundary at x = 10.
    fn half_mask(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| {
            image::Luma([if x < 10 { 0 } else { 255 }])
        })
    }

    #[test]
    fn zero_strength_is_bit_identical() {
        let frame = RgbImage::from_pixel(8, 8, image::Rgb([120, 200, 90]));
        let mask = half_mask(8, 8);
        let settings = ChromaKeySettings {
            spill_suppression: 0.0,
            ..ChromaKeySettings::default()
        };
        assert_eq!(suppress_spill(&frame, &mask, &settings), frame);
    }

    #[test]
    fn pixels_far_from_edge_are_unchanged() {
        // Greenish frame; the edge band spans roughly x = 6..14, so
        // columns 0 and 20 sit well outside it (and away from any
        // border effects of the morphology kernels).
        let frame = RgbImage::from_pixel(30, 20, image::Rgb([100, 220, 80]));
        let mask = half_mask(30, 20);
        let settings = ChromaKeySettings::default();

        let corrected = suppress_spill(&frame, &mask, &settings);
        for y in 5..15 {
            assert_eq!(corrected.get_pixel(0, y), frame.get_pixel(0, y));
            assert_eq!(corrected.get_pixel(20, y), frame.get_pixel(20, y));
        }
    }

    #[test]
    fn edge_pixels_lose_green_and_gain_red_blue() {
        let frame = RgbImage::from_pixel(20, 20, image::Rgb([100, 220, 80]));
        let mask = half_mask(20, 20);
        let settings = ChromaKeySettings::default();

        let corrected = suppress_spill(&frame, &mask, &settings);
        // x = 10 sits at the center of the edge band.
        let [r, g, b] = corrected.get_pixel(10, 10).0;
        assert!(g < 220, "expected green reduced on the edge, got {g}");
        assert!(r >= 100, "expected red not reduced, got {r}");
        assert!(b >= 80, "expected blue not reduced, got {b}");
    }

    #[test]
    fn pixels_without_spill_are_unchanged() {
        // Green does not exceed the red/blue average anywhere, so even
        // edge-band pixels have nothing to suppress.
        let frame = RgbImage::from_pixel(20, 20, image::Rgb([200, 100, 200]));
        let mask = half_mask(20, 20);
        let corrected = suppress_spill(&frame, &mask, &ChromaKeySettings::default());
        assert_eq!(corrected, frame);
    }

    #[test]
    fn uniform_mask_has_no_edge_band() {
        // A fully-foreground mask has no transition, so nothing changes
        // even for a strongly green frame. Checked away from the frame
        // border, where kernel clipping is implementation-defined.
        let frame = RgbImage::from_pixel(12, 12, image::Rgb([50, 250, 50]));
        let mask = GrayImage::from_pixel(12, 12, image::Luma([255]));
        let corrected = suppress_spill(&frame, &mask, &ChromaKeySettings::default());
        for y in 4..8 {
            for x in 4..8 {
                assert_eq!(corrected.get_pixel(x, y), frame.get_pixel(x, y));
            }
        }
    }
}
