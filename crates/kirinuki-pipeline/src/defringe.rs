//! Color decontamination for semi-transparent areas.
//!
//! Hair, glass, and fins key to partial alpha, and the key color
//! bleeds through those pixels. This pass estimates the green
//! contamination (`max(0, G - max(R, B))`; in properly
//! decontaminated footage green never exceeds both red and blue) and
//! removes it, weighting the correction toward semi-transparent
//! alpha where the screen shows through most.
//!
//! The weighting and compensation constants below are empirically
//! tuned for natural-looking output; none of them derives from a
//! physical model.

use image::GrayImage;

use crate::types::{ChromaKeySettings, RgbImage};

/// Multiplier on the alpha-weighted extra removal.
const EXTRA_REMOVAL_GAIN: f32 = 2.0;

/// Fraction of the removed green fed back as warm compensation.
const COMPENSATION_RATIO: f32 = 0.4;

/// Red share of the compensation term.
const COMPENSATION_RED_SHARE: f32 = 0.6;

/// Blue share of the compensation term.
const COMPENSATION_BLUE_SHARE: f32 = 0.4;

/// Peak coefficient of the semi-transparency bell curve
/// (`4 * a * (1 - a)` is 1.0 at 50% alpha).
const BELL_COEFFICIENT: f32 = 4.0;

/// Alpha interval treated as semi-transparent by the bell curve.
const SEMI_TRANSPARENT_RANGE: (f32, f32) = (0.02, 0.98);

/// Slope of the linear ramp for nearly-transparent pixels.
const RAMP_COEFFICIENT: f32 = 3.0;

/// Alpha below which the linear ramp applies.
const RAMP_ALPHA_LIMIT: f32 = 0.3;

/// Strength above which the hard green clamp engages.
const HARD_CLAMP_THRESHOLD: f32 = 0.5;

/// Alpha below which the hard clamp applies (opaque pixels are left
/// alone).
const HARD_CLAMP_ALPHA_LIMIT: f32 = 0.95;

/// Remove key color contamination from semi-transparent areas.
///
/// Green contamination is `max(0, G - max(R, B))`. A bell-curve weight
/// peaks at 50% alpha and a linear ramp covers nearly-transparent
/// pixels; the larger of the two scales an extra removal term on top
/// of the base despill. Part of the removed green is compensated into
/// red and blue so the result does not drift magenta. When
/// `defringe_transparent > 0.5`, an additional hard clamp blends green
/// toward `min(G, max(R, B))` in non-opaque areas, guaranteeing no
/// residual spill at high strength.
///
/// Returns the frame unchanged (bit-identical) when
/// `defringe_transparent <= 0`.
#[must_use = "returns the corrected frame"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn defringe_transparent_areas(
    frame: &RgbImage,
    mask: &GrayImage,
    settings: &ChromaKeySettings,
) -> RgbImage {
    if settings.defringe_transparent <= 0.0 {
        return frame.clone();
    }

    let strength = settings.defringe_transparent;

    RgbImage::from_fn(frame.width(), frame.height(), |x, y| {
        let [r, g, b] = frame.get_pixel(x, y).0;
        let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));
        let alpha = f32::from(mask.get_pixel(x, y).0[0]) / 255.0;

        let max_rb = r.max(b);
        let contamination = (g - max_rb).max(0.0);

        // Bell curve peaking at 50% alpha, where the screen shows
        // through semi-transparent pixels the most.
        let (semi_lo, semi_hi) = SEMI_TRANSPARENT_RANGE;
        let semi_transparent_weight = if alpha > semi_lo && alpha < semi_hi {
            BELL_COEFFICIENT * alpha * (1.0 - alpha)
        } else {
            0.0
        };

        // Linear ramp for nearly-transparent pixels that still carry
        // some visible color.
        let edge_weight = if alpha < RAMP_ALPHA_LIMIT {
            alpha * RAMP_COEFFICIENT
        } else {
            0.0
        };

        let combined_weight = semi_transparent_weight.max(edge_weight);

        let base_removal = contamination * strength;
        let extra_removal = contamination * combined_weight * strength * EXTRA_REMOVAL_GAIN;
        let total_removal = base_removal + extra_removal;

        let mut g_new = (g - total_removal).clamp(0.0, 255.0);

        let compensation = total_removal * COMPENSATION_RATIO;
        let r_new = (r + compensation * COMPENSATION_RED_SHARE).clamp(0.0, 255.0);
        let b_new = (b + compensation * COMPENSATION_BLUE_SHARE).clamp(0.0, 255.0);

        // Hard clamp: at high strength, force green under max(R, B) in
        // every non-opaque pixel.
        if strength > HARD_CLAMP_THRESHOLD && alpha < HARD_CLAMP_ALPHA_LIMIT {
            let blend = (strength - HARD_CLAMP_THRESHOLD) * 2.0;
            let g_clamped = g_new.min(r_new.max(b_new));
            g_new = (g_new * (1.0 - blend) + g_clamped * blend).clamp(0.0, 255.0);
        }

        image::Rgb([r_new as u8, g_new as u8, b_new as u8])
    })
}
