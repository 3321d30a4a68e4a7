//! Alpha mask creation and refinement.
//!
//! [`create_mask`] thresholds a frame in HSV space to separate the key
//! color from the subject, producing a binary 8-bit mask (0 =
//! background, 255 = foreground). [`refine_mask`] cleans the binary
//! mask with morphological erosion and dilation, and
//! [`apply_feathering`] softens the hard cutoff into a smooth alpha
//! ramp with a Gaussian blur.
//!
//! Masks are produced fresh for every frame and never persisted across
//! frames.

use image::GrayImage;
use imageproc::morphology::{Mask, grayscale_dilate, grayscale_erode};

use crate::hsv::rgb_to_hsv;
use crate::types::{ChromaKeySettings, PipelineError, RgbImage};

/// Create an alpha mask from a frame based on the HSV key color band.
///
/// Pixels whose HSV value lies inside the literal inclusive band
/// `[h_min, h_max] x [s_min, s_max] x [v_min, v_max]` are background
/// (0); everything else is foreground (255). The output is binary;
/// intermediate alpha values only appear after
/// [`apply_feathering`].
///
/// # Errors
///
/// Returns [`PipelineError::InvalidFrame`] if the frame has zero width
/// or height.
pub fn create_mask(
    frame: &RgbImage,
    settings: &ChromaKeySettings,
) -> Result<GrayImage, PipelineError> {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return Err(PipelineError::InvalidFrame { width, height });
    }

    Ok(GrayImage::from_fn(width, height, |x, y| {
        let [h, s, v] = rgb_to_hsv(frame.get_pixel(x, y).0);
        let keyed = (settings.h_min..=settings.h_max).contains(&h)
            && (settings.s_min..=settings.s_max).contains(&s)
            && (settings.v_min..=settings.v_max).contains(&v);
        image::Luma([if keyed { 0 } else { 255 }])
    }))
}

/// Clean up a mask with morphological erosion then dilation.
///
/// Erosion (disk radius `erode_size`, the elliptical kernel of size
/// `erode_size * 2 + 1`) removes key-colored fringe pixels
/// misclassified as foreground at subject edges; the following
/// dilation (radius `dilate_size`) recovers subject edge pixels lost
/// to the erosion. The order is fixed. A radius of 0 skips that step.
#[must_use = "returns the refined mask"]
pub fn refine_mask(mask: &GrayImage, settings: &ChromaKeySettings) -> GrayImage {
    let mut refined = mask.clone();

    if settings.erode_size > 0 {
        refined = grayscale_erode(&refined, &Mask::disk(settings.erode_size.into()));
    }
    if settings.dilate_size > 0 {
        refined = grayscale_dilate(&refined, &Mask::disk(settings.dilate_size.into()));
    }

    refined
}

/// Feather the mask edges with a Gaussian blur.
///
/// Produces smooth 0-255 alpha transitions at mask edges instead of a
/// hard cutoff. The blur kernel has size `feather * 2 + 1`, with sigma
/// derived by the conventional automatic rule for that kernel size:
/// `0.3 * ((k - 1) * 0.5 - 1) + 0.8`. `feather == 0` returns the mask
/// unchanged.
#[must_use = "returns the feathered mask"]
pub fn apply_feathering(mask: &GrayImage, settings: &ChromaKeySettings) -> GrayImage {
    if settings.feather == 0 {
        return mask.clone();
    }

    let sigma = 0.3f32.mul_add(f32::from(settings.feather) - 1.0, 0.8);
    imageproc::filter::gaussian_blur_f32(mask, sigma)
}
