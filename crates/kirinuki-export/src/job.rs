//! The export job: decode -> stabilize -> crop -> key -> encode.
//!
//! [`Exporter::run`] drives a whole clip through the pipeline,
//! reporting throttled progress and honoring cooperative cancellation.
//! The caller typically runs it on a background thread, holding a
//! [`CancelToken`] clone on the UI side; cancellation is observed once
//! per frame iteration, so worst-case latency is one frame's
//! processing time.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use kirinuki_pipeline::source::FrameSource;
use kirinuki_pipeline::{
    BoundingBox, ChromaKeySettings, PipelineError, SourceError, Stabilizer, process_frame,
};

use crate::frame;
use crate::sink::{FrameSink, OutputFrame, SinkError};
use crate::stats::ProcessingStats;

/// The frame loop reports progress every this many frames.
const PROGRESS_INTERVAL: u64 = 5;

/// Fraction of the progress range spent on the stabilization analysis
/// pass when one runs.
const ANALYSIS_PROGRESS_SHARE: f32 = 0.5;

/// Errors that abort an export job.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The frame source failed (seek or decode desync).
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The frame sink failed (encoder or storage).
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// A pipeline stage rejected its input.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// How a job ended. Cancellation is a normal outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Every frame was processed and written.
    Completed,
    /// The cancel token was observed; the job stopped early.
    Cancelled,
}

/// Receiver for throttled progress updates.
///
/// Implemented for any `FnMut(f32, &str)` closure; `fraction` is in
/// `[0, 1]` and `status` is a short human-readable message. Updates
/// arrive every few frames, not on every frame.
pub trait ProgressSink {
    /// Receive a progress update.
    fn report(&mut self, fraction: f32, status: &str);
}

impl<F: FnMut(f32, &str)> ProgressSink for F {
    fn report(&mut self, fraction: f32, status: &str) {
        self(fraction, status);
    }
}

/// A [`ProgressSink`] that discards updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&mut self, _fraction: f32, _status: &str) {}
}

/// Cooperative cancellation flag, cloneable across threads.
///
/// The UI holds a clone and sets it; the job observes it between
/// frames. Starting a new job clears the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a fresh, unset token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the job holding this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Per-job options consumed by [`Exporter::run`].
///
/// Constructed by the calling layer for each export job. The
/// stabilizer rides along as a separate argument so this stays a plain
/// value type.
#[derive(Debug, Clone, Default)]
pub struct ProcessingOptions {
    /// Crop rectangle, clamped to frame bounds before use. Applied
    /// AFTER stabilization so shifted borders can be cropped away.
    pub crop: Option<BoundingBox>,
    /// Target output width; the frame is downscaled (never upscaled)
    /// preserving aspect ratio, with both dimensions rounded to even.
    pub resize_width: Option<u32>,
    /// Emit stacked 3-channel frames (RGB over alpha) instead of
    /// transparent RGBA.
    pub stacked_mask: bool,
}

/// Runs export jobs: one clip through the full pipeline per call.
///
/// One job at a time per instance -- [`Self::run`] takes `&mut self`,
/// so the borrow checker enforces it.
#[derive(Debug, Clone, Default)]
pub struct Exporter {
    stats: ProcessingStats,
    cancel: CancelToken,
}

impl Exporter {
    /// Create an idle exporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A cancellation handle for the next/current job. Clone it to
    /// another thread and call [`CancelToken::cancel`] to stop the
    /// loop.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Statistics of the current or most recent job.
    #[must_use]
    pub const fn stats(&self) -> &ProcessingStats {
        &self.stats
    }

    /// Process a whole clip: stabilize (optional), crop, key, pack,
    /// write.
    ///
    /// If `stabilizer` is supplied, enabled, and has a bounding box,
    /// its analysis pass runs first (reported as the lower half of the
    /// progress range); if analysis fails the job logs a warning and
    /// continues WITHOUT stabilization rather than aborting. The
    /// source is rewound to frame 0 before the frame loop either way.
    ///
    /// Returns [`JobOutcome::Cancelled`] when the cancel token was
    /// observed; the sink keeps whatever frames were written before.
    ///
    /// # Errors
    ///
    /// [`ExportError::Pipeline`] for invalid settings or frames,
    /// [`ExportError::Source`] / [`ExportError::Sink`] for I/O-side
    /// failures. All of these abort the job immediately.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn run<S, K, P>(
        &mut self,
        source: &mut S,
        sink: &mut K,
        settings: &ChromaKeySettings,
        stabilizer: Option<&mut Stabilizer>,
        options: &ProcessingOptions,
        progress: &mut P,
    ) -> Result<JobOutcome, ExportError>
    where
        S: FrameSource,
        K: FrameSink,
        P: ProgressSink,
    {
        settings.validate()?;
        self.cancel.clear();

        let meta = source.metadata();
        let crop = options
            .crop
            .map(|rect| frame::clamp_crop(rect, meta.width, meta.height));
        let (output_width, output_height) =
            crop.map_or((meta.width, meta.height), |rect| (rect.width, rect.height));
        let target = options
            .resize_width
            .and_then(|rw| frame::resize_target(output_width, output_height, rw));
        if let Some((width, height)) = target {
            tracing::info!(width, height, "output will be resized");
        }

        self.stats.start(meta.frame_count);
        tracing::info!(frames = meta.frame_count, "starting export job");

        // Stabilization analysis pass (if enabled).
        let mut active_stabilizer: Option<&Stabilizer> = None;
        if let Some(stab) = stabilizer
            && stab.settings().enabled
            && stab.settings().bounding_box.is_some()
        {
            tracing::info!("analyzing clip for stabilization");
            match stab.analyze_with_progress(source, |fraction| {
                progress.report(fraction * ANALYSIS_PROGRESS_SHARE, "Analyzing motion...");
            }) {
                Ok(()) => {
                    tracing::info!("stabilization analysis complete");
                    active_stabilizer = Some(stab);
                }
                Err(error) => {
                    tracing::warn!(%error, "stabilization analysis failed, proceeding without");
                }
            }
            source.seek(0)?;
        }

        let mut frame_count: u64 = 0;

        loop {
            if self.cancel.is_cancelled() {
                tracing::warn!(frames = frame_count, "processing cancelled by user");
                self.stats.finish();
                return Ok(JobOutcome::Cancelled);
            }

            let Some(decoded) = source.next_frame() else {
                break;
            };
            let frame_idx = usize::try_from(frame_count).unwrap_or(usize::MAX);

            // Stabilize on the full frame, then crop, so the crop can
            // trim away the shifted border.
            let (color, border_alpha) = if let Some(stab) = active_stabilizer {
                stab.apply_stabilization(&decoded, frame_idx)
            } else {
                (decoded, None)
            };

            let (color, border_alpha) = match crop {
                Some(rect) => (
                    frame::crop_rgb(&color, rect),
                    border_alpha.map(|plane| frame::crop_gray(&plane, rect)),
                ),
                None => (color, border_alpha),
            };

            let mut rgba = process_frame(&color, settings)?;

            if let Some(border) = &border_alpha {
                frame::merge_border_alpha(&mut rgba, border);
            }

            if let Some((width, height)) = target {
                rgba = frame::resize_rgba(&rgba, width, height);
            }

            let output = if options.stacked_mask {
                OutputFrame::Stacked(frame::pack_stacked(&rgba))
            } else {
                frame::zero_transparent(&mut rgba);
                OutputFrame::Rgba(rgba)
            };
            sink.write(&output)?;

            frame_count += 1;
            self.stats.update(frame_count);

            if frame_count % PROGRESS_INTERVAL == 0 && meta.frame_count > 0 {
                let fraction = frame_count as f32 / meta.frame_count as f32;
                let eta = self.stats.eta_seconds();
                let status = if eta > 0.0 {
                    format!("{}s remaining", eta as u64)
                } else {
                    String::new()
                };
                progress.report(fraction, &status);
            }
        }

        self.stats.finish();
        tracing::info!(
            frames = frame_count,
            seconds = self.stats.duration().as_secs_f64(),
            fps = self.stats.fps(),
            "export complete",
        );
        progress.report(1.0, "Complete!");
        Ok(JobOutcome::Completed)
    }
}
