//! Frame sink boundary.
//!
//! Encoding, container muxing, and on-disk naming are owned by the
//! embedding application; the export loop hands finished frames to a
//! [`FrameSink`]. A sink receives either 4-channel transparent frames
//! or 3-channel stacked frames, one per call, in presentation order.
//!
//! [`MemorySink`] collects frames in memory for tests and previews.

use kirinuki_pipeline::{RgbImage, RgbaImage};

/// A finished output frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFrame {
    /// Transparent output: RGBA with RGB zeroed wherever alpha is 0.
    Rgba(RgbaImage),
    /// Stacked output: 3-channel frame of twice the source height;
    /// top half RGB premultiplied by alpha, bottom half the alpha
    /// replicated across channels.
    Stacked(RgbImage),
}

impl OutputFrame {
    /// Width and height of the carried buffer.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Rgba(frame) => frame.dimensions(),
            Self::Stacked(frame) => frame.dimensions(),
        }
    }
}

/// Error raised by a frame sink implementation (encoder failure, disk
/// full). Aborts the job that observes it.
#[derive(Debug, thiserror::Error)]
#[error("frame sink error: {0}")]
pub struct SinkError(pub String);

/// A consumer of finished output frames.
pub trait FrameSink {
    /// Accept the next output frame.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the frame cannot be written; the
    /// export job aborts.
    fn write(&mut self, frame: &OutputFrame) -> Result<(), SinkError>;
}

/// A [`FrameSink`] that collects frames in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    frames: Vec<OutputFrame>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub const fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Frames written so far.
    #[must_use]
    pub fn frames(&self) -> &[OutputFrame] {
        &self.frames
    }

    /// Consume the sink and return the collected frames.
    #[must_use]
    pub fn into_frames(self) -> Vec<OutputFrame> {
        self.frames
    }
}

impl FrameSink for MemorySink {
    fn write(&mut self, frame: &OutputFrame) -> Result<(), SinkError> {
        self.frames.push(frame.clone());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_collects_frames_in_order() {
        let mut sink = MemorySink::new();
        sink.write(&OutputFrame::Rgba(RgbaImage::new(2, 2))).unwrap();
        sink.write(&OutputFrame::Stacked(RgbImage::new(2, 4))).unwrap();

        assert_eq!(sink.frames().len(), 2);
        assert!(matches!(sink.frames()[0], OutputFrame::Rgba(_)));
        assert!(matches!(sink.frames()[1], OutputFrame::Stacked(_)));
    }

    #[test]
    fn output_frame_dimensions() {
        assert_eq!(OutputFrame::Rgba(RgbaImage::new(3, 5)).dimensions(), (3, 5));
        assert_eq!(OutputFrame::Stacked(RgbImage::new(3, 10)).dimensions(), (3, 10));
    }
}
