//! Template-tracking video stabilization.
//!
//! Tracks a user-selected bounding box across frames and computes
//! per-frame translation offsets that realign the tracked region to
//! its reference position.
//!
//! Two-pass usage:
//!
//! 1. [`Stabilizer::set_bounding_box`] defines the region to track.
//! 2. [`Stabilizer::analyze`] scans the whole clip and computes
//!    offsets (first pass).
//! 3. [`Stabilizer::apply_stabilization`] translates each frame by
//!    its precomputed offset (second pass).
//!
//! [`Stabilizer::preview_stabilization`] additionally supports
//! single-frame on-the-fly tracking for live UI preview before a full
//! analysis pass exists.

use image::{GrayImage, Luma, Rgb, Rgba, imageops};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};
use imageproc::geometric_transformations::{Interpolation, warp_with};

use crate::diagnostics::TrackingDiagnostics;
use crate::source::FrameSource;
use crate::track::{self, SearchRegion};
use crate::types::{
    BorderMode, BoundingBox, PipelineError, RgbImage, RgbaImage, StabilizationSettings,
};

/// Offsets smaller than this (in both axes) are imperceptible shake;
/// the frame is passed through untouched to avoid a pointless warp.
const MIN_APPLY_OFFSET: f64 = 0.5;

/// Analysis reports progress every this many frames.
const PROGRESS_INTERVAL: u64 = 10;

/// Crosshair arm length in pixels.
const MARKER_ARM: f32 = 15.0;

/// Crosshair circle radius in pixels.
const MARKER_RADIUS: i32 = 8;

/// Crosshair color (yellow, fully opaque).
const MARKER_COLOR: Rgba<u8> = Rgba([255, 255, 0, 255]);

/// Lifecycle state of a [`Stabilizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilizerState {
    /// No bounding box set; every operation passes frames through.
    Unset,
    /// Box set but the clip has not been analyzed.
    Ready,
    /// Two-pass offsets are computed and ready to apply.
    Analyzed,
}

/// Stabilizes video by tracking a bounding box and compensating for
/// its movement.
///
/// Not safe for concurrent use: [`Self::analyze`] mutates the
/// per-frame offset arrays and must complete before
/// [`Self::apply_stabilization`] starts consuming them for the same
/// job.
#[derive(Debug, Clone)]
pub struct Stabilizer {
    settings: StabilizationSettings,
    offsets: Vec<(f64, f64)>,
    tracked_boxes: Vec<BoundingBox>,
    analyzed: bool,
    diagnostics: TrackingDiagnostics,
}

impl Stabilizer {
    /// Create a stabilizer with the given settings.
    #[must_use]
    pub fn new(settings: StabilizationSettings) -> Self {
        Self {
            settings,
            offsets: Vec::new(),
            tracked_boxes: Vec::new(),
            analyzed: false,
            diagnostics: TrackingDiagnostics::default(),
        }
    }

    /// Current settings.
    #[must_use]
    pub const fn settings(&self) -> &StabilizationSettings {
        &self.settings
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> StabilizerState {
        match (self.settings.bounding_box.is_some(), self.analyzed) {
            (false, _) => StabilizerState::Unset,
            (true, false) => StabilizerState::Ready,
            (true, true) => StabilizerState::Analyzed,
        }
    }

    /// Whether a completed analysis pass is available.
    #[must_use]
    pub const fn is_analyzed(&self) -> bool {
        self.analyzed
    }

    /// Number of frames covered by the analysis pass.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.offsets.len()
    }

    /// Diagnostics from the most recent analysis pass.
    #[must_use]
    pub const fn diagnostics(&self) -> &TrackingDiagnostics {
        &self.diagnostics
    }

    /// Set the region to track, discarding any prior analysis.
    ///
    /// `reference_frame_idx` is the frame on which the box was drawn;
    /// the template is extracted there.
    pub fn set_bounding_box(&mut self, bounds: BoundingBox, reference_frame_idx: u64) {
        self.settings.bounding_box = Some(bounds);
        self.settings.reference_frame_idx = reference_frame_idx;
        self.reset_analysis();
    }

    /// Fully reset: clears the bounding box and all analysis state.
    pub fn reset(&mut self) {
        self.settings.bounding_box = None;
        self.reset_analysis();
    }

    fn reset_analysis(&mut self) {
        self.offsets.clear();
        self.tracked_boxes.clear();
        self.analyzed = false;
        self.diagnostics = TrackingDiagnostics::default();
    }

    /// Analyze the clip and compute per-frame stabilization offsets.
    ///
    /// See [`Self::analyze_with_progress`].
    ///
    /// # Errors
    ///
    /// As [`Self::analyze_with_progress`].
    pub fn analyze<S: FrameSource>(&mut self, source: &mut S) -> Result<(), PipelineError> {
        self.analyze_with_progress(source, |_| {})
    }

    /// First pass: track the template across every frame of the clip.
    ///
    /// Extracts the template from the reference frame's bounding box,
    /// then scans from frame 0, searching a window expanded by
    /// `search_margin` around the LAST tracked box (not the reference
    /// box) and falling back to a full-frame search on a miss. The
    /// per-frame offset is `reference_center - tracked_center`. On
    /// total tracking loss the previous frame's offset and box are
    /// reused (bounding the visual discontinuity at the cost of
    /// staleness), and the loss is recorded in
    /// [`TrackingDiagnostics`].
    ///
    /// `on_progress` receives the fraction of frames analyzed, every
    /// [`PROGRESS_INTERVAL`] frames.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::BoundingBoxUnset`] when no box is set,
    /// [`PipelineError::ReferenceFrameUnavailable`] when the source
    /// cannot produce the reference frame, and
    /// [`PipelineError::Source`] when seeking fails.
    #[allow(clippy::cast_precision_loss)]
    pub fn analyze_with_progress<S, F>(
        &mut self,
        source: &mut S,
        mut on_progress: F,
    ) -> Result<(), PipelineError>
    where
        S: FrameSource,
        F: FnMut(f32),
    {
        let bounds = self
            .settings
            .bounding_box
            .ok_or(PipelineError::BoundingBoxUnset)?;
        self.reset_analysis();

        let total_frames = source.metadata().frame_count;
        let reference_idx = self.settings.reference_frame_idx;

        source.seek(reference_idx)?;
        let reference_frame = source
            .next_frame()
            .ok_or(PipelineError::ReferenceFrameUnavailable(reference_idx))?;
        let template = extract_template(&reference_frame, bounds);
        let reference_center = bounds.center();

        source.seek(0)?;
        let mut last_box = bounds;
        let mut frame_idx: u64 = 0;

        while let Some(frame) = source.next_frame() {
            let gray = imageops::grayscale(&frame);
            let window = SearchRegion::around(&last_box, self.settings.search_margin);

            let matched = track::match_template(
                &gray,
                &template,
                Some(window),
                self.settings.match_threshold,
            )
            .or_else(|| {
                track::match_template(&gray, &template, None, self.settings.match_threshold)
            });

            if let Some(found) = matched {
                let (cx, cy) = found.bounds.center();
                self.offsets
                    .push((reference_center.0 - cx, reference_center.1 - cy));
                self.tracked_boxes.push(found.bounds);
                self.diagnostics.record_match(found.score);
                last_box = found.bounds;
            } else {
                let offset = self.offsets.last().copied().unwrap_or((0.0, 0.0));
                let tracked = self.tracked_boxes.last().copied().unwrap_or(bounds);
                self.offsets.push(offset);
                self.tracked_boxes.push(tracked);
                self.diagnostics.record_loss(frame_idx);
                tracing::debug!(frame = frame_idx, "tracking lost, reusing previous offset");
            }

            frame_idx += 1;
            if frame_idx % PROGRESS_INTERVAL == 0 && total_frames > 0 {
                on_progress(frame_idx as f32 / total_frames as f32);
            }
        }

        self.analyzed = true;
        Ok(())
    }

    /// Precomputed offset for a frame; `(0, 0)` when not analyzed or
    /// out of range.
    #[must_use]
    pub fn get_offset(&self, frame_idx: usize) -> (f64, f64) {
        if !self.analyzed {
            return (0.0, 0.0);
        }
        self.offsets.get(frame_idx).copied().unwrap_or((0.0, 0.0))
    }

    /// Tracked box position for a frame; falls back to the settings
    /// box when not analyzed or out of range.
    #[must_use]
    pub fn tracked_box(&self, frame_idx: usize) -> Option<BoundingBox> {
        if self.analyzed
            && let Some(found) = self.tracked_boxes.get(frame_idx)
        {
            return Some(*found);
        }
        self.settings.bounding_box
    }

    /// Second pass: translate a frame by its precomputed offset.
    ///
    /// Returns the translated color plane plus, for
    /// [`BorderMode::Transparent`], the border-alpha plane the caller
    /// merges into its own alpha. The frame is returned unchanged when
    /// the stabilizer is not in the `Analyzed` state, `frame_idx` is
    /// out of range, or the offset is below half a pixel on both axes.
    #[must_use = "returns the stabilized frame"]
    pub fn apply_stabilization(
        &self,
        frame: &RgbImage,
        frame_idx: usize,
    ) -> (RgbImage, Option<GrayImage>) {
        if !self.analyzed {
            return (frame.clone(), None);
        }
        let Some(&(dx, dy)) = self.offsets.get(frame_idx) else {
            return (frame.clone(), None);
        };
        if dx.abs() < MIN_APPLY_OFFSET && dy.abs() < MIN_APPLY_OFFSET {
            return (frame.clone(), None);
        }

        match self.settings.border_mode {
            BorderMode::Transparent => (
                translate_rgb(frame, dx, dy),
                Some(border_alpha(frame.width(), frame.height(), dx, dy)),
            ),
            BorderMode::Replicate => (translate_replicate(frame, dx, dy), None),
            BorderMode::Crop => (translate_rgb(frame, dx, dy), None),
        }
    }

    /// Single-frame stabilization preview for live UI display.
    ///
    /// Reuses precomputed analysis data when available for
    /// `frame_idx`. Otherwise, when `first_frame` (the reference
    /// frame) is supplied and `frame_idx` is not the reference index,
    /// tracks directly from `first_frame` to `frame` with a one-shot
    /// full-frame template match. The translation always uses a
    /// transparent border. `draw_marker` overlays a crosshair at the
    /// REFERENCE center, where the tracked feature should sit after
    /// stabilization, not at the per-frame tracked position.
    #[must_use = "returns the preview frame"]
    pub fn preview_stabilization(
        &self,
        frame: &RgbImage,
        frame_idx: usize,
        first_frame: Option<&RgbImage>,
        draw_marker: bool,
    ) -> RgbaImage {
        let Some(bounds) = self.settings.bounding_box else {
            return promote(frame);
        };
        let reference_center = bounds.center();

        let (dx, dy) = if self.analyzed && frame_idx < self.offsets.len() {
            self.offsets.get(frame_idx).copied().unwrap_or((0.0, 0.0))
        } else if let Some(first) = first_frame
            && frame_idx as u64 != self.settings.reference_frame_idx
        {
            self.track_single_frame(first, frame)
                .map_or((0.0, 0.0), |(offset, _)| offset)
        } else {
            (0.0, 0.0)
        };

        let mut result = if dx.abs() > MIN_APPLY_OFFSET || dy.abs() > MIN_APPLY_OFFSET {
            translate_rgba(&promote(frame), dx, dy)
        } else {
            promote(frame)
        };

        if draw_marker {
            draw_crosshair(&mut result, reference_center);
        }
        result
    }

    /// One-shot track of the bounding box from the reference frame to
    /// the current frame, with no search-window expansion.
    fn track_single_frame(
        &self,
        first_frame: &RgbImage,
        current_frame: &RgbImage,
    ) -> Option<((f64, f64), BoundingBox)> {
        let bounds = self.settings.bounding_box?;
        let template = extract_template(first_frame, bounds);
        let gray = imageops::grayscale(current_frame);
        let found = track::match_template(&gray, &template, None, self.settings.match_threshold)?;

        let (rx, ry) = bounds.center();
        let (cx, cy) = found.bounds.center();
        Some(((rx - cx, ry - cy), found.bounds))
    }
}

/// Extract the grayscale template for a bounding box, clamping the box
/// into the frame.
fn extract_template(frame: &RgbImage, bounds: BoundingBox) -> GrayImage {
    let (frame_w, frame_h) = frame.dimensions();
    let width = bounds.width.min(frame_w);
    let height = bounds.height.min(frame_h);
    let x = bounds.x.min(frame_w - width);
    let y = bounds.y.min(frame_h - height);

    let gray = imageops::grayscale(frame);
    imageops::crop_imm(&gray, x, y, width, height).to_image()
}

/// Translate an RGB frame, filling uncovered pixels with black.
#[allow(clippy::cast_possible_truncation)]
fn translate_rgb(frame: &RgbImage, dx: f64, dy: f64) -> RgbImage {
    let (dx, dy) = (dx as f32, dy as f32);
    warp_with(
        frame,
        |x, y| (x - dx, y - dy),
        Interpolation::Bilinear,
        Rgb([0, 0, 0]),
    )
}

/// Translate an RGBA frame, filling uncovered pixels with transparent
/// black.
#[allow(clippy::cast_possible_truncation)]
fn translate_rgba(frame: &RgbaImage, dx: f64, dy: f64) -> RgbaImage {
    let (dx, dy) = (dx as f32, dy as f32);
    warp_with(
        frame,
        |x, y| (x - dx, y - dy),
        Interpolation::Bilinear,
        Rgba([0, 0, 0, 0]),
    )
}

/// Translate an RGB frame, extending edge pixels into the border.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn translate_replicate(frame: &RgbImage, dx: f64, dy: f64) -> RgbImage {
    let (dx, dy) = (dx as f32, dy as f32);
    // Keep the sampled coordinate strictly inside the last pixel so
    // every bilinear tap stays in bounds.
    let max_x = ((frame.width() - 1) as f32 - 1e-3).max(0.0);
    let max_y = ((frame.height() - 1) as f32 - 1e-3).max(0.0);
    warp_with(
        frame,
        move |x, y| ((x - dx).min(max_x).max(0.0), (y - dy).min(max_y).max(0.0)),
        Interpolation::Bilinear,
        Rgb([0, 0, 0]),
    )
}

/// Alpha plane of a translation: opaque where the translated frame
/// covers the canvas, transparent on the uncovered border.
#[allow(clippy::cast_possible_truncation)]
fn border_alpha(width: u32, height: u32, dx: f64, dy: f64) -> GrayImage {
    let (dx, dy) = (dx as f32, dy as f32);
    let opaque = GrayImage::from_pixel(width, height, Luma([255]));
    warp_with(
        &opaque,
        |x, y| (x - dx, y - dy),
        Interpolation::Bilinear,
        Luma([0]),
    )
}

/// Promote a 3-channel frame to fully opaque RGBA.
fn promote(frame: &RgbImage) -> RgbaImage {
    RgbaImage::from_fn(frame.width(), frame.height(), |x, y| {
        let [r, g, b] = frame.get_pixel(x, y).0;
        Rgba([r, g, b, 255])
    })
}

/// Draw a 2 px thick crosshair (arms + circle) at the given center.
#[allow(clippy::cast_possible_truncation)]
fn draw_crosshair(image: &mut RgbaImage, center: (f64, f64)) {
    let (cx, cy) = (center.0 as f32, center.1 as f32);

    for offset in 0..2i32 {
        let o = offset as f32;
        draw_line_segment_mut(
            image,
            (cx - MARKER_ARM, cy + o),
            (cx + MARKER_ARM, cy + o),
            MARKER_COLOR,
        );
        draw_line_segment_mut(
            image,
            (cx + o, cy - MARKER_ARM),
            (cx + o, cy + MARKER_ARM),
            MARKER_COLOR,
        );
    }

    let center_px = (cx as i32, cy as i32);
    draw_hollow_circle_mut(image, center_px, MARKER_RADIUS, MARKER_COLOR);
    draw_hollow_circle_mut(image, center_px, MARKER_RADIUS - 1, MARKER_COLOR);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    const FRAME_W: u32 = 64;
    const FRAME_H: u32 = 48;
    const PATCH: u32 = 16;
    const PATCH_X: u32 = 20;
    const PATCH_Y: u32 = 16;

    #[allow(clippy::cast_possible_truncation)]
    fn noise(x: u32, y: u32) -> u8 {
        let mut v = x
            .wrapping_mul(0x9E37_79B1)
            .wrapping_add(y.wrapping_mul(0x85EB_CA6B));
        v ^= v >> 15;
        v = v.wrapping_mul(0x2545_F491);
        (v >> 24) as u8
    }

    /// Frame with the textured patch shifted right by `shift` pixels.
    fn clip_frame(shift: u32) -> RgbImage {
        let px = PATCH_X + shift;
        RgbImage::from_fn(FRAME_W, FRAME_H, |x, y| {
            if (px..px + PATCH).contains(&x) && (PATCH_Y..PATCH_Y + PATCH).contains(&y) {
                let v = noise(x - px, y - PATCH_Y);
                image::Rgb([v, v, v])
            } else {
                image::Rgb([100, 100, 100])
            }
        })
    }

    fn clip(shifts: &[u32]) -> MemorySource {
        MemorySource::new(shifts.iter().map(|&s| clip_frame(s)).collect(), 30.0)
    }

    fn tracking_settings() -> StabilizationSettings {
        StabilizationSettings {
            enabled: true,
            bounding_box: Some(BoundingBox::new(PATCH_X, PATCH_Y, PATCH, PATCH)),
            ..StabilizationSettings::default()
        }
    }

    #[test]
    fn state_machine_transitions() {
        let mut stabilizer = Stabilizer::new(StabilizationSettings::default());
        assert_eq!(stabilizer.state(), StabilizerState::Unset);

        stabilizer.set_bounding_box(BoundingBox::new(10, 10, 20, 20), 0);
        assert_eq!(stabilizer.state(), StabilizerState::Ready);

        let mut source = clip(&[0, 1]);
        stabilizer.set_bounding_box(BoundingBox::new(PATCH_X, PATCH_Y, PATCH, PATCH), 0);
        stabilizer.analyze(&mut source).unwrap();
        assert_eq!(stabilizer.state(), StabilizerState::Analyzed);

        // A new box discards the analysis.
        stabilizer.set_bounding_box(BoundingBox::new(5, 5, 10, 10), 0);
        assert_eq!(stabilizer.state(), StabilizerState::Ready);
        assert_eq!(stabilizer.frame_count(), 0);

        stabilizer.reset();
        assert_eq!(stabilizer.state(), StabilizerState::Unset);
    }

    #[test]
    fn analyze_without_box_fails() {
        let mut stabilizer = Stabilizer::new(StabilizationSettings::default());
        let mut source = clip(&[0]);
        assert!(matches!(
            stabilizer.analyze(&mut source),
            Err(PipelineError::BoundingBoxUnset),
        ));
    }

    #[test]
    fn analyze_recovers_known_translation() {
        let shifts = [0, 1, 2, 3, 4];
        let mut source = clip(&shifts);
        let mut stabilizer = Stabilizer::new(tracking_settings());
        stabilizer.analyze(&mut source).unwrap();

        assert_eq!(stabilizer.frame_count(), shifts.len());
        for (i, &shift) in shifts.iter().enumerate() {
            let (dx, dy) = stabilizer.get_offset(i);
            let expected = -f64::from(shift);
            assert!(
                (dx - expected).abs() <= 1.0,
                "frame {i}: dx = {dx}, expected about {expected}",
            );
            assert!(dy.abs() <= 1.0, "frame {i}: dy = {dy}");
        }
        assert!(stabilizer.diagnostics().lost_frames.is_empty());
    }

    #[test]
    fn tracking_loss_reuses_previous_offset() {
        // Frame 2 is flat: nothing to match anywhere.
        let frames = vec![clip_frame(0), clip_frame(2), RgbImage::from_pixel(
            FRAME_W,
            FRAME_H,
            image::Rgb([100, 100, 100]),
        )];
        let mut source = MemorySource::new(frames, 30.0);
        let mut stabilizer = Stabilizer::new(tracking_settings());
        stabilizer.analyze(&mut source).unwrap();

        assert_eq!(stabilizer.get_offset(2), stabilizer.get_offset(1));
        assert_eq!(stabilizer.diagnostics().lost_frames, vec![2]);
    }

    #[test]
    fn apply_before_analysis_returns_frame_unchanged() {
        let stabilizer = Stabilizer::new(tracking_settings());
        let frame = clip_frame(0);
        let (out, alpha) = stabilizer.apply_stabilization(&frame, 0);
        assert_eq!(out, frame);
        assert!(alpha.is_none());
    }

    #[test]
    fn apply_out_of_range_returns_frame_unchanged() {
        let mut source = clip(&[0, 1]);
        let mut stabilizer = Stabilizer::new(tracking_settings());
        stabilizer.analyze(&mut source).unwrap();

        let frame = clip_frame(0);
        let (out, alpha) = stabilizer.apply_stabilization(&frame, 99);
        assert_eq!(out, frame);
        assert!(alpha.is_none());
    }

    #[test]
    fn subpixel_offsets_are_not_applied() {
        let mut source = clip(&[0, 0, 0]);
        let mut stabilizer = Stabilizer::new(tracking_settings());
        stabilizer.analyze(&mut source).unwrap();

        let frame = clip_frame(0);
        let (out, alpha) = stabilizer.apply_stabilization(&frame, 1);
        assert_eq!(out, frame);
        assert!(alpha.is_none());
    }

    #[test]
    fn transparent_border_mode_exposes_uncovered_border() {
        let mut source = clip(&[0, 5]);
        let mut stabilizer = Stabilizer::new(tracking_settings());
        stabilizer.analyze(&mut source).unwrap();

        // Frame 1 shifts left by 5; the right border is uncovered.
        let frame = clip_frame(5);
        let (out, alpha) = stabilizer.apply_stabilization(&frame, 1);
        let alpha = alpha.unwrap();

        assert_eq!(alpha.get_pixel(FRAME_W - 1, 10).0[0], 0);
        assert_eq!(alpha.get_pixel(10, 10).0[0], 255);
        // Content moved: the output at x now shows the input at x + 5.
        assert_eq!(out.get_pixel(PATCH_X, PATCH_Y + 2), frame.get_pixel(PATCH_X + 5, PATCH_Y + 2));
    }

    #[test]
    fn replicate_border_mode_extends_edges() {
        let settings = StabilizationSettings {
            border_mode: BorderMode::Replicate,
            ..tracking_settings()
        };
        let mut source = clip(&[0, 5]);
        let mut stabilizer = Stabilizer::new(settings);
        stabilizer.analyze(&mut source).unwrap();

        let frame = clip_frame(5);
        let (out, alpha) = stabilizer.apply_stabilization(&frame, 1);
        assert!(alpha.is_none());
        // The uncovered right border replicates the edge background.
        assert_eq!(out.get_pixel(FRAME_W - 1, 10).0, [100, 100, 100]);
    }

    #[test]
    fn crop_border_mode_fills_black() {
        let settings = StabilizationSettings {
            border_mode: BorderMode::Crop,
            ..tracking_settings()
        };
        let mut source = clip(&[0, 5]);
        let mut stabilizer = Stabilizer::new(settings);
        stabilizer.analyze(&mut source).unwrap();

        let frame = clip_frame(5);
        let (out, alpha) = stabilizer.apply_stabilization(&frame, 1);
        assert!(alpha.is_none());
        assert_eq!(out.get_pixel(FRAME_W - 1, 10).0, [0, 0, 0]);
    }

    #[test]
    fn preview_with_unset_box_passes_through() {
        let stabilizer = Stabilizer::new(StabilizationSettings::default());
        let frame = clip_frame(0);
        let preview = stabilizer.preview_stabilization(&frame, 0, None, false);
        for (x, y, p) in preview.enumerate_pixels() {
            let [r, g, b] = frame.get_pixel(x, y).0;
            assert_eq!(p.0, [r, g, b, 255]);
        }
    }

    #[test]
    fn preview_tracks_on_the_fly_from_reference_frame() {
        let stabilizer = Stabilizer::new(tracking_settings());
        let first = clip_frame(0);
        let current = clip_frame(3);

        let preview = stabilizer.preview_stabilization(&current, 1, Some(&first), false);

        // The patch should be realigned to its reference position.
        let expected = clip_frame(0);
        let got = preview.get_pixel(PATCH_X + 4, PATCH_Y + 4);
        let want = expected.get_pixel(PATCH_X + 4, PATCH_Y + 4).0;
        assert_eq!([got.0[0], got.0[1], got.0[2]], want);
        assert_eq!(got.0[3], 255);
    }

    #[test]
    fn preview_at_reference_index_is_not_shifted() {
        let stabilizer = Stabilizer::new(tracking_settings());
        let first = clip_frame(0);
        let preview = stabilizer.preview_stabilization(&first, 0, Some(&first), false);
        for (x, y, p) in preview.enumerate_pixels() {
            let [r, g, b] = first.get_pixel(x, y).0;
            assert_eq!(p.0, [r, g, b, 255]);
        }
    }

    #[test]
    fn preview_marker_is_drawn_at_reference_center() {
        let stabilizer = Stabilizer::new(tracking_settings());
        let frame = clip_frame(0);
        let preview = stabilizer.preview_stabilization(&frame, 0, None, true);

        // The crosshair arms pass through the reference center.
        let (cx, cy) = BoundingBox::new(PATCH_X, PATCH_Y, PATCH, PATCH).center();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let center = preview.get_pixel(cx as u32, cy as u32);
        assert_eq!(center.0, [255, 255, 0, 255]);
    }

    #[test]
    fn tracked_box_falls_back_to_settings_box() {
        let stabilizer = Stabilizer::new(tracking_settings());
        assert_eq!(
            stabilizer.tracked_box(3),
            Some(BoundingBox::new(PATCH_X, PATCH_Y, PATCH, PATCH)),
        );
    }
}
