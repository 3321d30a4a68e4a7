//! Template matching for region tracking.
//!
//! Locates a grayscale template inside a frame by zero-mean normalized
//! cross-correlation: both the template and each candidate window are
//! mean-centred before correlating, so scores live in `[-1, 1]`, a
//! perfect match scores 1.0, and flat (zero-variance) windows score 0
//! rather than saturating the way plain normalized cross-correlation
//! does on bright uniform regions. That property is what makes a
//! score threshold usable as a tracking-loss signal.
//!
//! Matching can be restricted to a [`SearchRegion`]; a region that
//! does not fit the template falls back to scanning the whole frame.

use image::GrayImage;

use crate::types::BoundingBox;

/// A successful template match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackMatch {
    /// Location of the best match, sized like the template.
    pub bounds: BoundingBox,
    /// Zero-mean normalized correlation score in `[-1, 1]`.
    pub score: f32,
}

/// A rectangular search window in frame coordinates.
///
/// Coordinates are signed: windows built by expanding a box near the
/// frame edge may start at negative offsets and are clamped into the
/// frame before matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchRegion {
    /// Left edge (may be negative).
    pub x: i64,
    /// Top edge (may be negative).
    pub y: i64,
    /// Window width in pixels.
    pub width: u32,
    /// Window height in pixels.
    pub height: u32,
}

impl SearchRegion {
    /// Expand a bounding box by `margin` pixels on every side.
    #[must_use]
    pub fn around(bounds: &BoundingBox, margin: u32) -> Self {
        Self {
            x: i64::from(bounds.x) - i64::from(margin),
            y: i64::from(bounds.y) - i64::from(margin),
            width: bounds.width + 2 * margin,
            height: bounds.height + 2 * margin,
        }
    }
}

/// Find the template in the frame.
///
/// When `search` is given, matching is restricted to that window
/// (clamped to the frame); if the clamped window is smaller than the
/// template, the whole frame is searched instead. Returns the
/// best-scoring location only when its score reaches `threshold`;
/// otherwise `None`, signaling tracking loss to the caller rather
/// than raising an error. A flat template has no structure to
/// localize and never matches.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn match_template(
    frame: &GrayImage,
    template: &GrayImage,
    search: Option<SearchRegion>,
    threshold: f32,
) -> Option<TrackMatch> {
    let (frame_w, frame_h) = frame.dimensions();
    let (tmpl_w, tmpl_h) = template.dimensions();
    if tmpl_w == 0 || tmpl_h == 0 || tmpl_w > frame_w || tmpl_h > frame_h {
        return None;
    }

    let stats = TemplateStats::compute(template);
    if stats.variance_sum <= f64::EPSILON {
        // A flat template correlates equally well everywhere.
        return None;
    }

    // Clamp the search window into the frame; fall back to the whole
    // frame when the remainder cannot contain the template.
    let (sx, sy, sw, sh) = search.map_or((0, 0, frame_w, frame_h), |region| {
        let x = region.x.clamp(0, i64::from(frame_w)) as u32;
        let y = region.y.clamp(0, i64::from(frame_h)) as u32;
        let w = region.width.min(frame_w.saturating_sub(x));
        let h = region.height.min(frame_h.saturating_sub(y));
        if w < tmpl_w || h < tmpl_h {
            (0, 0, frame_w, frame_h)
        } else {
            (x, y, w, h)
        }
    });

    let mut best: Option<(f32, u32, u32)> = None;
    for y0 in sy..=(sy + sh - tmpl_h) {
        for x0 in sx..=(sx + sw - tmpl_w) {
            let score = correlate_at(frame, template, &stats, x0, y0);
            if best.is_none_or(|(s, _, _)| score > s) {
                best = Some((score, x0, y0));
            }
        }
    }

    let (score, x, y) = best?;
    if score < threshold {
        return None;
    }
    Some(TrackMatch {
        bounds: BoundingBox::new(x, y, tmpl_w, tmpl_h),
        score,
    })
}

/// Mean and centred variance sum of a template, computed once per
/// search.
struct TemplateStats {
    mean: f64,
    variance_sum: f64,
}

impl TemplateStats {
    fn compute(template: &GrayImage) -> Self {
        let n = f64::from(template.width()) * f64::from(template.height());
        let sum: f64 = template.as_raw().iter().map(|&p| f64::from(p)).sum();
        let mean = sum / n;
        let variance_sum: f64 = template
            .as_raw()
            .iter()
            .map(|&p| {
                let d = f64::from(p) - mean;
                d * d
            })
            .sum();
        Self { mean, variance_sum }
    }
}

/// Zero-mean normalized correlation between the template and the
/// window of the frame whose top-left corner is `(x0, y0)`.
#[allow(clippy::cast_possible_truncation)]
fn correlate_at(
    frame: &GrayImage,
    template: &GrayImage,
    stats: &TemplateStats,
    x0: u32,
    y0: u32,
) -> f32 {
    let (tmpl_w, tmpl_h) = template.dimensions();
    let frame_w = frame.width() as usize;
    let frame_raw = frame.as_raw();
    let tmpl_raw = template.as_raw();

    let n = f64::from(tmpl_w) * f64::from(tmpl_h);
    let mut window_sum = 0.0f64;
    let mut window_sq_sum = 0.0f64;
    let mut dot = 0.0f64;

    for ty in 0..tmpl_h as usize {
        let frame_row_start = (y0 as usize + ty) * frame_w + x0 as usize;
        let frame_row = &frame_raw[frame_row_start..frame_row_start + tmpl_w as usize];
        let tmpl_row_start = ty * tmpl_w as usize;
        let tmpl_row = &tmpl_raw[tmpl_row_start..tmpl_row_start + tmpl_w as usize];

        for (&f, &t) in frame_row.iter().zip(tmpl_row) {
            let f = f64::from(f);
            window_sum += f;
            window_sq_sum += f * f;
            dot += f * f64::from(t);
        }
    }

    // Centred numerator and window variance via the usual sum
    // identities. Rounding can push a flat window's variance slightly
    // negative; clamp so the square root stays defined.
    let numerator = dot - window_sum * stats.mean;
    let window_variance_sum = (window_sq_sum - window_sum * window_sum / n).max(0.0);
    let denominator = (window_variance_sum * stats.variance_sum).sqrt();

    if denominator <= f64::EPSILON {
        0.0
    } else {
        (numerator / denominator) as f32
    }
}
