//! kirinuki-pipeline: Pure chroma key and stabilization pipeline (sans-IO).
//!
//! Removes a chroma-key background from decoded video frames:
//! HSV threshold mask -> morphological refinement -> edge feathering ->
//! spill suppression -> transparent-area defringe -> alpha merge.
//! A template-tracking [`Stabilizer`] optionally realigns a tracked
//! region across the clip before keying.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! pixel buffers and consumes decoded frames through the
//! [`FrameSource`] trait. Container demuxing/muxing, file dialogs, and
//! the export job loop live in `kirinuki-export` and the embedding
//! application.

pub mod composite;
pub mod defringe;
pub mod diagnostics;
pub mod hsv;
pub mod mask;
pub mod pipeline;
pub mod source;
pub mod spill;
pub mod stabilize;
pub mod track;
pub mod types;

pub use composite::{PreviewBackground, parse_hex_color};
pub use diagnostics::TrackingDiagnostics;
pub use pipeline::{preview_frame, process_frame};
pub use source::{FrameSource, MemorySource, SourceError, VideoMetadata};
pub use stabilize::{Stabilizer, StabilizerState};
pub use track::{SearchRegion, TrackMatch};
pub use types::{
    BorderMode, BoundingBox, ChromaKeySettings, GrayImage, PipelineError, RgbImage, RgbaImage,
    StabilizationSettings,
};
