//! Preview compositing: solid colors, checkerboard, hard cutout.
//!
//! The preview path blends keyed frames over a display background so
//! transparency is visible in an ordinary 3-channel viewer. This is a
//! display convenience only; the export path keeps raw alpha.

use image::{GrayImage, Rgb};

use crate::types::{PipelineError, RgbImage};

/// Checkerboard tile size in pixels.
pub const CHECKER_TILE: u32 = 10;

/// Lighter of the two checkerboard shades.
const CHECKER_LIGHT: u8 = 200;

/// Darker of the two checkerboard shades.
const CHECKER_DARK: u8 = 150;

/// What to composite a keyed preview frame over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewBackground {
    /// Blend over a solid color (see [`parse_hex_color`]).
    Solid(Rgb<u8>),
    /// Blend over a gray checkerboard ([`CHECKER_TILE`] px tiles).
    Checkerboard,
    /// No background: keep pixels only where the mask is nonzero.
    Cutout,
}

/// Parse a `#RRGGBB` hex color string. The leading `#` is optional.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidColor`] if the string is not six
/// hex digits after the optional `#`.
pub fn parse_hex_color(s: &str) -> Result<Rgb<u8>, PipelineError> {
    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(PipelineError::InvalidColor(s.to_owned()));
    }

    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).map_err(|_| PipelineError::InvalidColor(s.to_owned()))
    };

    Ok(Rgb([channel(0..2)?, channel(2..4)?, channel(4..6)?]))
}

/// Generate a two-shade gray checkerboard.
#[must_use]
pub fn checkerboard(width: u32, height: u32, tile: u32) -> RgbImage {
    let tile = tile.max(1);
    RgbImage::from_fn(width, height, |x, y| {
        let shade = if (y / tile + x / tile) % 2 == 0 {
            CHECKER_LIGHT
        } else {
            CHECKER_DARK
        };
        Rgb([shade, shade, shade])
    })
}

/// Alpha-blend a foreground frame over a background using the mask as
/// per-pixel opacity.
///
/// Both images and the mask must share dimensions; the foreground's
/// dimensions win.
#[must_use = "returns the composited frame"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn composite_over(frame: &RgbImage, mask: &GrayImage, background: &RgbImage) -> RgbImage {
    RgbImage::from_fn(frame.width(), frame.height(), |x, y| {
        let alpha = f32::from(mask.get_pixel(x, y).0[0]) / 255.0;
        let fg = frame.get_pixel(x, y).0;
        let bg = background.get_pixel(x, y).0;
        let blend =
            |c: usize| f32::from(fg[c]).mul_add(alpha, f32::from(bg[c]) * (1.0 - alpha)) as u8;
        Rgb([blend(0), blend(1), blend(2)])
    })
}

/// Hard cutout: keep pixels where the mask is nonzero, black out the
/// rest.
#[must_use = "returns the cutout frame"]
pub fn cutout(frame: &RgbImage, mask: &GrayImage) -> RgbImage {
    RgbImage::from_fn(frame.width(), frame.height(), |x, y| {
        if mask.get_pixel(x, y).0[0] == 0 {
            Rgb([0, 0, 0])
        } else {
            *frame.get_pixel(x, y)
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_with_hash() {
        assert_eq!(parse_hex_color("#FF8000").unwrap(), Rgb([255, 128, 0]));
    }

    #[test]
    fn parses_hex_without_hash() {
        assert_eq!(parse_hex_color("00ff00").unwrap(), Rgb([0, 255, 0]));
    }

    #[test]
    fn rejects_short_hex() {
        assert!(matches!(
            parse_hex_color("#FFF"),
            Err(PipelineError::InvalidColor(_)),
        ));
    }

    #[test]
    fn rejects_non_hex_digits() {
        assert!(matches!(
            parse_hex_color("#GGHHII"),
            Err(PipelineError::InvalidColor(_)),
        ));
    }

    #[test]
    fn checkerboard_alternates_by_tile() {
        let board = checkerboard(40, 40, CHECKER_TILE);
        assert_eq!(board.get_pixel(0, 0).0[0], 200);
        assert_eq!(board.get_pixel(10, 0).0[0], 150);
        assert_eq!(board.get_pixel(0, 10).0[0], 150);
        assert_eq!(board.get_pixel(10, 10).0[0], 200);
        // Uniform within a tile.
        assert_eq!(board.get_pixel(9, 9).0[0], 200);
    }

    #[test]
    fn zero_mask_yields_background() {
        let fg = RgbImage::from_pixel(8, 8, Rgb([255, 0, 0]));
        let bg = checkerboard(8, 8, 2);
        let mask = GrayImage::new(8, 8);
        assert_eq!(composite_over(&fg, &mask, &bg), bg);
    }

    #[test]
    fn full_mask_yields_foreground() {
        let fg = RgbImage::from_pixel(8, 8, Rgb([255, 0, 0]));
        let bg = checkerboard(8, 8, 2);
        let mask = GrayImage::from_pixel(8, 8, image::Luma([255]));
        assert_eq!(composite_over(&fg, &mask, &bg), fg);
    }

    #[test]
    fn half_mask_blends_midway() {
        let fg = RgbImage::from_pixel(2, 2, Rgb([200, 0, 100]));
        let bg = RgbImage::from_pixel(2, 2, Rgb([0, 200, 100]));
        let mask = GrayImage::from_pixel(2, 2, image::Luma([128]));
        let out = composite_over(&fg, &mask, &bg);
        let [r, g, b] = out.get_pixel(0, 0).0;
        assert!((99..=101).contains(&r), "r = {r}");
        assert!((99..=101).contains(&g), "g = {g}");
        assert!((99..=101).contains(&b), "b = {b}");
    }

    #[test]
    fn cutout_blacks_out_masked_pixels() {
        let fg = RgbImage::from_pixel(4, 4, Rgb([10, 20, 30]));
        let mask = GrayImage::from_fn(4, 4, |x, _| image::Luma([if x < 2 { 0 } else { 1 }]));
        let out = cutout(&fg, &mask);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(out.get_pixel(3, 0).0, [10, 20, 30]);
    }
}
