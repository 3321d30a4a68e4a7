//! kirinuki-export: the export job runner (sans container IO).
//!
//! Drives a whole clip through the chroma key pipeline:
//! decode -> stabilize (optional) -> crop -> key -> resize -> pack ->
//! write, with throttled progress reporting, cooperative cancellation,
//! and end-of-job statistics.
//!
//! Frames come in through [`kirinuki_pipeline::FrameSource`] and go
//! out through [`FrameSink`]; container demuxing/muxing, codec
//! selection, and on-disk naming are owned by the embedding
//! application's implementations of those traits.

pub mod frame;
pub mod job;
pub mod sink;
pub mod stats;

pub use job::{
    CancelToken, ExportError, Exporter, JobOutcome, NullProgress, ProcessingOptions, ProgressSink,
};
pub use sink::{FrameSink, MemorySink, OutputFrame, SinkError};
pub use stats::ProcessingStats;
