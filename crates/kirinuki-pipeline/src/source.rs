//! Frame source boundary.
//!
//! Container demuxing and codec selection are owned by the embedding
//! application; the pipeline consumes decoded frames through the
//! [`FrameSource`] trait. The contract mirrors a sequential decoder:
//! each call to [`FrameSource::next_frame`] yields the next fixed-size
//! 3-channel frame or end-of-stream, and [`FrameSource::seek`]
//! repositions the stream to a frame index.
//!
//! [`MemorySource`] is an in-memory implementation used by tests, the
//! bench tool, and preview paths that already hold decoded frames.

use crate::types::RgbImage;

/// Stream-level metadata reported by a frame source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second.
    pub fps: f64,
    /// Total number of frames in the stream.
    pub frame_count: u64,
}

/// Error raised by a frame source implementation (seek failure,
/// decoder desync). Aborts the job that observes it.
#[derive(Debug, thiserror::Error)]
#[error("frame source error: {0}")]
pub struct SourceError(pub String);

/// A sequential supplier of decoded video frames.
pub trait FrameSource {
    /// Stream metadata. Stable for the lifetime of the source.
    fn metadata(&self) -> VideoMetadata;

    /// Decode and return the next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Option<RgbImage>;

    /// Reposition the stream so the next [`Self::next_frame`] call
    /// returns the frame at `frame_index`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the source cannot seek to the
    /// requested index.
    fn seek(&mut self, frame_index: u64) -> Result<(), SourceError>;
}

/// A [`FrameSource`] over a vector of in-memory frames.
#[derive(Debug, Clone)]
pub struct MemorySource {
    frames: Vec<RgbImage>,
    fps: f64,
    position: usize,
}

impl MemorySource {
    /// Create a source over the given frames.
    #[must_use]
    pub const fn new(frames: Vec<RgbImage>, fps: f64) -> Self {
        Self {
            frames,
            fps,
            position: 0,
        }
    }
}

impl FrameSource for MemorySource {
    fn metadata(&self) -> VideoMetadata {
        let (width, height) = self
            .frames
            .first()
            .map_or((0, 0), image::GenericImageView::dimensions);
        VideoMetadata {
            width,
            height,
            fps: self.fps,
            frame_count: self.frames.len() as u64,
        }
    }

    fn next_frame(&mut self) -> Option<RgbImage> {
        let frame = self.frames.get(self.position).cloned();
        if frame.is_some() {
            self.position += 1;
        }
        frame
    }

    fn seek(&mut self, frame_index: u64) -> Result<(), SourceError> {
        let index = usize::try_from(frame_index)
            .map_err(|_| SourceError(format!("frame index {frame_index} out of range")))?;
        if index > self.frames.len() {
            return Err(SourceError(format!(
                "seek to frame {index} beyond stream length {}",
                self.frames.len(),
            )));
        }
        self.position = index;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn frames(n: usize) -> Vec<RgbImage> {
        #[allow(clippy::cast_possible_truncation)]
        (0..n)
            .map(|i| RgbImage::from_pixel(4, 2, image::Rgb([i as u8, 0, 0])))
            .collect()
    }

    #[test]
    fn metadata_reports_dimensions_and_count() {
        let source = MemorySource::new(frames(3), 30.0);
        let meta = source.metadata();
        assert_eq!(meta.width, 4);
        assert_eq!(meta.height, 2);
        assert_eq!(meta.frame_count, 3);
        assert!((meta.fps - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_source_has_zero_metadata() {
        let source = MemorySource::new(Vec::new(), 24.0);
        let meta = source.metadata();
        assert_eq!((meta.width, meta.height, meta.frame_count), (0, 0, 0));
    }

    #[test]
    fn next_frame_iterates_then_ends() {
        let mut source = MemorySource::new(frames(2), 30.0);
        assert_eq!(source.next_frame().unwrap().get_pixel(0, 0).0[0], 0);
        assert_eq!(source.next_frame().unwrap().get_pixel(0, 0).0[0], 1);
        assert!(source.next_frame().is_none());
        // End of stream is sticky.
        assert!(source.next_frame().is_none());
    }

    #[test]
    fn seek_repositions_the_stream() {
        let mut source = MemorySource::new(frames(5), 30.0);
        source.seek(3).unwrap();
        assert_eq!(source.next_frame().unwrap().get_pixel(0, 0).0[0], 3);
        source.seek(0).unwrap();
        assert_eq!(source.next_frame().unwrap().get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn seek_beyond_stream_fails() {
        let mut source = MemorySource::new(frames(2), 30.0);
        assert!(source.seek(3).is_err());
    }
}
