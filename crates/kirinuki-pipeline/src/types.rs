//! Shared types for the kirinuki processing pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference alpha masks
/// without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can reference decoded frames
/// without depending on `image` directly.
pub use image::RgbImage;

/// Re-export `RgbaImage` so downstream crates can reference keyed output
/// frames without depending on `image` directly.
pub use image::RgbaImage;

/// Settings for chroma key processing.
///
/// Hue bounds use the 8-bit half-degree scale (0-179) so one full hue
/// revolution fits in a byte; saturation and value are 0-255. The
/// `[h_min, h_max]` band is a literal inclusive range, not a circular
/// one: a key color straddling the 179/0 hue boundary (e.g. a red
/// screen) cannot be expressed as a single band. Callers may set
/// `h_min > h_max`, which simply matches nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChromaKeySettings {
    /// Lower hue bound of the key color band (0-179).
    pub h_min: u8,
    /// Upper hue bound of the key color band (0-179).
    pub h_max: u8,
    /// Lower saturation bound of the key color band.
    pub s_min: u8,
    /// Upper saturation bound of the key color band.
    pub s_max: u8,
    /// Lower value (brightness) bound of the key color band.
    pub v_min: u8,
    /// Upper value (brightness) bound of the key color band.
    pub v_max: u8,
    /// Edge feathering radius in pixels. The mask is Gaussian-blurred
    /// with a kernel of size `feather * 2 + 1`; 0 disables feathering.
    pub feather: u8,
    /// Spill suppression strength in `[0, 1]`. 0 disables the pass.
    pub spill_suppression: f32,
    /// Defringe strength for semi-transparent areas in `[0, 1]`.
    /// 0 disables the pass.
    pub defringe_transparent: f32,
    /// Mask erosion radius in pixels (elliptical kernel of size
    /// `erode_size * 2 + 1`); removes key-colored fringe pixels
    /// misclassified as foreground. 0 is a no-op.
    pub erode_size: u8,
    /// Mask dilation radius in pixels (elliptical kernel of size
    /// `dilate_size * 2 + 1`); recovers subject edge pixels lost to
    /// erosion. 0 is a no-op.
    pub dilate_size: u8,
}

impl ChromaKeySettings {
    /// Largest supported feathering radius.
    pub const MAX_FEATHER: u8 = 20;

    /// Preset tuned for a green screen. These are also the defaults.
    #[must_use]
    pub const fn green_screen() -> Self {
        Self {
            h_min: 35,
            h_max: 85,
            s_min: 50,
            s_max: 255,
            v_min: 50,
            v_max: 255,
            feather: 2,
            spill_suppression: 0.5,
            defringe_transparent: 0.0,
            erode_size: 1,
            dilate_size: 1,
        }
    }

    /// Preset tuned for a blue screen.
    #[must_use]
    pub const fn blue_screen() -> Self {
        Self {
            h_min: 100,
            h_max: 130,
            ..Self::green_screen()
        }
    }

    /// Check that all fields are within their documented ranges.
    ///
    /// Intended to run at deserialization boundaries, before any frame
    /// is processed.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidSettings`] naming the offending
    /// field when a hue bound exceeds 179, a strength lies outside
    /// `[0, 1]`, or `feather` exceeds [`Self::MAX_FEATHER`].
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.h_min > 179 || self.h_max > 179 {
            return Err(PipelineError::InvalidSettings(format!(
                "hue bounds must be 0-179, got {}-{}",
                self.h_min, self.h_max,
            )));
        }
        if !(0.0..=1.0).contains(&self.spill_suppression) {
            return Err(PipelineError::InvalidSettings(format!(
                "spill_suppression must be in [0, 1], got {}",
                self.spill_suppression,
            )));
        }
        if !(0.0..=1.0).contains(&self.defringe_transparent) {
            return Err(PipelineError::InvalidSettings(format!(
                "defringe_transparent must be in [0, 1], got {}",
                self.defringe_transparent,
            )));
        }
        if self.feather > Self::MAX_FEATHER {
            return Err(PipelineError::InvalidSettings(format!(
                "feather must be at most {}, got {}",
                Self::MAX_FEATHER,
                self.feather,
            )));
        }
        Ok(())
    }
}

impl Default for ChromaKeySettings {
    fn default() -> Self {
        Self::green_screen()
    }
}

/// An axis-aligned rectangle in source-frame pixel coordinates.
///
/// Used both for the stabilizer's tracked region and for crop
/// rectangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge in pixels.
    pub x: u32,
    /// Top edge in pixels.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl BoundingBox {
    /// Side length of the box built by [`Self::from_center`] callers
    /// that track a single point rather than a region.
    pub const DEFAULT_POINT_BOX_SIZE: u32 = 50;

    /// Create a new bounding box.
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a square box of side `size` centered on a point, clamped
    /// at the frame origin.
    ///
    /// This is the single entry point for point-based tracking: callers
    /// that have a click position rather than a drawn region construct
    /// a default-sized box around it instead of using a separate
    /// point API.
    #[must_use]
    pub const fn from_center(cx: u32, cy: u32, size: u32) -> Self {
        Self {
            x: cx.saturating_sub(size / 2),
            y: cy.saturating_sub(size / 2),
            width: size,
            height: size,
        }
    }

    /// Center of the box in fractional pixel coordinates.
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (
            f64::from(self.x) + f64::from(self.width) / 2.0,
            f64::from(self.y) + f64::from(self.height) / 2.0,
        )
    }
}

/// How a stabilization translation fills the uncovered frame border.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderMode {
    /// Promote the output to 4 channels and leave the border fully
    /// transparent.
    #[default]
    Transparent,
    /// Extend the frame's edge pixels into the border.
    Replicate,
    /// Fill the border with opaque black, leaving the caller to crop
    /// it away.
    Crop,
}

/// Settings for template-tracking stabilization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StabilizationSettings {
    /// Whether stabilization participates in export jobs at all.
    pub enabled: bool,
    /// Region to track, in source-frame pixel coordinates. `None`
    /// means the stabilizer is unset and every operation passes frames
    /// through unchanged.
    pub bounding_box: Option<BoundingBox>,
    /// Frame index at which `bounding_box` was defined; the template
    /// is extracted there and every offset is measured against it.
    pub reference_frame_idx: u64,
    /// Border fill policy for the applied translation.
    pub border_mode: BorderMode,
    /// Minimum acceptable normalized correlation score in `[0, 1]`;
    /// matches scoring below it count as tracking loss.
    pub match_threshold: f32,
    /// Pixels of slack added on every side of the last tracked box
    /// when building the constrained search window.
    pub search_margin: u32,
}

impl StabilizationSettings {
    /// Check that all fields are within their documented ranges.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidSettings`] when
    /// `match_threshold` lies outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(0.0..=1.0).contains(&self.match_threshold) {
            return Err(PipelineError::InvalidSettings(format!(
                "match_threshold must be in [0, 1], got {}",
                self.match_threshold,
            )));
        }
        Ok(())
    }
}

impl Default for StabilizationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            bounding_box: None,
            reference_frame_idx: 0,
            border_mode: BorderMode::default(),
            match_threshold: 0.5,
            search_margin: 50,
        }
    }
}

/// Errors that can occur during pipeline processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A zero-size or otherwise malformed pixel buffer reached the
    /// mask or color stages. Always a caller bug (decoder desync);
    /// aborts the current job.
    #[error("invalid frame: {width}x{height} pixel buffer cannot be processed")]
    InvalidFrame {
        /// Width of the rejected buffer.
        width: u32,
        /// Height of the rejected buffer.
        height: u32,
    },

    /// A settings field was outside its documented range.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// A background color string could not be parsed.
    #[error("invalid color {0:?}: expected #RRGGBB")]
    InvalidColor(String),

    /// A stabilizer operation that requires a tracked region was
    /// invoked with no bounding box set.
    #[error("no bounding box set for stabilization")]
    BoundingBoxUnset,

    /// The frame source could not produce the stabilizer's reference
    /// frame.
    #[error("frame source has no frame at reference index {0}")]
    ReferenceFrameUnavailable(u64),

    /// A frame source failed while the pipeline was driving it.
    #[error(transparent)]
    Source(#[from] crate::source::SourceError),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_green_screen_preset() {
        assert_eq!(ChromaKeySettings::default(), ChromaKeySettings::green_screen());
    }

    #[test]
    fn green_screen_preset_values() {
        let s = ChromaKeySettings::green_screen();
        assert_eq!(s.h_min, 35);
        assert_eq!(s.h_max, 85);
        assert_eq!(s.s_min, 50);
        assert_eq!(s.v_min, 50);
        assert_eq!(s.feather, 2);
        assert!((s.spill_suppression - 0.5).abs() < f32::EPSILON);
        assert!(s.defringe_transparent.abs() < f32::EPSILON);
        assert_eq!(s.erode_size, 1);
        assert_eq!(s.dilate_size, 1);
    }

    #[test]
    fn blue_screen_preset_differs_only_in_hue() {
        let green = ChromaKeySettings::green_screen();
        let blue = ChromaKeySettings::blue_screen();
        assert_eq!(blue.h_min, 100);
        assert_eq!(blue.h_max, 130);
        assert_eq!(
            ChromaKeySettings {
                h_min: green.h_min,
                h_max: green.h_max,
                ..blue
            },
            green,
        );
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(ChromaKeySettings::default().validate().is_ok());
        assert!(StabilizationSettings::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_hue() {
        let s = ChromaKeySettings {
            h_max: 200,
            ..ChromaKeySettings::default()
        };
        assert!(matches!(s.validate(), Err(PipelineError::InvalidSettings(_))));
    }

    #[test]
    fn validate_rejects_out_of_range_strength() {
        let s = ChromaKeySettings {
            spill_suppression: 1.5,
            ..ChromaKeySettings::default()
        };
        assert!(matches!(s.validate(), Err(PipelineError::InvalidSettings(_))));

        let s = ChromaKeySettings {
            defringe_transparent: -0.1,
            ..ChromaKeySettings::default()
        };
        assert!(matches!(s.validate(), Err(PipelineError::InvalidSettings(_))));
    }

    #[test]
    fn validate_rejects_oversized_feather() {
        let s = ChromaKeySettings {
            feather: 21,
            ..ChromaKeySettings::default()
        };
        assert!(matches!(s.validate(), Err(PipelineError::InvalidSettings(_))));
    }

    #[test]
    fn validate_rejects_out_of_range_match_threshold() {
        let s = StabilizationSettings {
            match_threshold: 1.5,
            ..StabilizationSettings::default()
        };
        assert!(matches!(s.validate(), Err(PipelineError::InvalidSettings(_))));
    }

    #[test]
    fn settings_serde_round_trip() {
        let s = ChromaKeySettings {
            defringe_transparent: 0.8,
            feather: 4,
            ..ChromaKeySettings::blue_screen()
        };
        let json = serde_json::to_string(&s).unwrap();
        let back: ChromaKeySettings = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
    }

    #[test]
    fn settings_reject_unknown_fields() {
        let json = r#"{
            "h_min": 35, "h_max": 85,
            "s_min": 50, "s_max": 255,
            "v_min": 50, "v_max": 255,
            "feather": 2,
            "spill_suppression": 0.5,
            "defringe_transparent": 0.0,
            "erode_size": 1, "dilate_size": 1,
            "sharpen": 3
        }"#;
        let result: Result<ChromaKeySettings, _> = serde_json::from_str(json);
        assert!(result.is_err(), "unknown field should be rejected");
    }

    #[test]
    fn stabilization_settings_serde_round_trip() {
        let s = StabilizationSettings {
            enabled: true,
            bounding_box: Some(BoundingBox::new(10, 20, 30, 40)),
            reference_frame_idx: 7,
            border_mode: BorderMode::Replicate,
            match_threshold: 0.7,
            search_margin: 25,
        };
        let json = serde_json::to_string(&s).unwrap();
        let back: StabilizationSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
    }

    #[test]
    fn border_mode_uses_lowercase_names() {
        assert_eq!(
            serde_json::to_string(&BorderMode::Transparent).unwrap(),
            "\"transparent\"",
        );
        let parsed: BorderMode = serde_json::from_str("\"replicate\"").unwrap();
        assert_eq!(parsed, BorderMode::Replicate);
    }

    #[test]
    fn bounding_box_center() {
        let b = BoundingBox::new(10, 20, 30, 40);
        let (cx, cy) = b.center();
        assert!((cx - 25.0).abs() < f64::EPSILON);
        assert!((cy - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn from_center_builds_centered_box() {
        let b = BoundingBox::from_center(100, 100, BoundingBox::DEFAULT_POINT_BOX_SIZE);
        assert_eq!(b, BoundingBox::new(75, 75, 50, 50));
        let (cx, cy) = b.center();
        assert!((cx - 100.0).abs() < f64::EPSILON);
        assert!((cy - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn from_center_clamps_at_origin() {
        let b = BoundingBox::from_center(5, 3, 50);
        assert_eq!(b.x, 0);
        assert_eq!(b.y, 0);
        assert_eq!(b.width, 50);
        assert_eq!(b.height, 50);
    }

    #[test]
    fn error_display_messages() {
        let err = PipelineError::InvalidFrame {
            width: 0,
            height: 480,
        };
        assert_eq!(
            err.to_string(),
            "invalid frame: 0x480 pixel buffer cannot be processed",
        );
        assert_eq!(
            PipelineError::BoundingBoxUnset.to_string(),
            "no bounding box set for stabilization",
        );
    }
}
