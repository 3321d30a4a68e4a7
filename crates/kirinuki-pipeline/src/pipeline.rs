//! Per-frame chroma key orchestration.
//!
//! [`process_frame`] runs the full mask + color chain and returns an
//! RGBA frame for export; [`preview_frame`] runs the same chain and
//! composites over a display background instead of emitting raw alpha.
//!
//! Both are pure, deterministic functions of the frame and settings:
//! no state is carried between frames, so callers are free to process
//! independent frames from multiple threads with a shared settings
//! value.

use image::GrayImage;

use crate::composite::{self, CHECKER_TILE, PreviewBackground, checkerboard};
use crate::types::{ChromaKeySettings, PipelineError, RgbImage, RgbaImage};
use crate::{defringe, mask, spill};

/// Build the final alpha mask for a frame: threshold, refine, feather.
fn build_mask(frame: &RgbImage, settings: &ChromaKeySettings) -> Result<GrayImage, PipelineError> {
    let raw = mask::create_mask(frame, settings)?;
    let refined = mask::refine_mask(&raw, settings);
    Ok(mask::apply_feathering(&refined, settings))
}

/// Run both color correction passes: spill suppression, then
/// transparent-area defringe.
fn correct_color(frame: &RgbImage, alpha: &GrayImage, settings: &ChromaKeySettings) -> RgbImage {
    let suppressed = spill::suppress_spill(frame, alpha, settings);
    defringe::defringe_transparent_areas(&suppressed, alpha, settings)
}

/// Remove the chroma key background from a frame.
///
/// # Pipeline steps
///
/// 1. HSV threshold mask ([`mask::create_mask`])
/// 2. Morphological refinement ([`mask::refine_mask`])
/// 3. Edge feathering ([`mask::apply_feathering`])
/// 4. Spill suppression ([`spill::suppress_spill`])
/// 5. Transparent-area defringe
///    ([`defringe::defringe_transparent_areas`])
/// 6. Merge corrected color with the mask as the alpha channel
///
/// # Errors
///
/// Returns [`PipelineError::InvalidFrame`] for a zero-size frame.
pub fn process_frame(
    frame: &RgbImage,
    settings: &ChromaKeySettings,
) -> Result<RgbaImage, PipelineError> {
    let alpha = build_mask(frame, settings)?;
    let color = correct_color(frame, &alpha, settings);

    Ok(RgbaImage::from_fn(frame.width(), frame.height(), |x, y| {
        let [r, g, b] = color.get_pixel(x, y).0;
        image::Rgba([r, g, b, alpha.get_pixel(x, y).0[0]])
    }))
}

/// Produce a 3-channel preview of the keyed frame for display.
///
/// Runs the same mask and color chain as [`process_frame`], then
/// composites over the requested [`PreviewBackground`]. Not used for
/// export.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidFrame`] for a zero-size frame.
pub fn preview_frame(
    frame: &RgbImage,
    settings: &ChromaKeySettings,
    background: PreviewBackground,
) -> Result<RgbImage, PipelineError> {
    let alpha = build_mask(frame, settings)?;
    let color = correct_color(frame, &alpha, settings);

    Ok(match background {
        PreviewBackground::Solid(rgb) => {
            let bg = RgbImage::from_pixel(frame.width(), frame.height(), rgb);
            composite::composite_over(&color, &alpha, &bg)
        }
        PreviewBackground::Checkerboard => {
            let bg = checkerboard(frame.width(), frame.height(), CHECKER_TILE);
            composite::composite_over(&color, &alpha, &bg)
        }
        PreviewBackground::Cutout => composite::cutout(&color, &alpha),
    })
}
