//! Tracking diagnostics collected during stabilization analysis.
//!
//! Permanent instrumentation for judging tracking quality: how many
//! frames matched, where tracking was lost and the previous offset
//! reused, and the range of match scores. Populated by
//! [`Stabilizer::analyze`](crate::Stabilizer::analyze) and readable
//! afterwards for UI display or logging.

use serde::{Deserialize, Serialize};

/// Per-analysis tracking quality metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackingDiagnostics {
    /// Frames examined by the analysis pass.
    pub total_frames: u64,
    /// Frames where the template matched above the threshold.
    pub tracked_frames: u64,
    /// Frame indices where tracking was lost and the previous offset
    /// was reused.
    pub lost_frames: Vec<u64>,
    /// Lowest accepted match score, if any frame matched.
    pub min_score: Option<f32>,
    /// Highest accepted match score, if any frame matched.
    pub max_score: Option<f32>,
    score_sum: f64,
}

impl TrackingDiagnostics {
    /// Record a successful match with its score.
    pub fn record_match(&mut self, score: f32) {
        self.total_frames += 1;
        self.tracked_frames += 1;
        self.score_sum += f64::from(score);
        self.min_score = Some(self.min_score.map_or(score, |s| s.min(score)));
        self.max_score = Some(self.max_score.map_or(score, |s| s.max(score)));
    }

    /// Record a tracking loss at the given frame index.
    pub fn record_loss(&mut self, frame_idx: u64) {
        self.total_frames += 1;
        self.lost_frames.push(frame_idx);
    }

    /// Mean accepted match score, if any frame matched.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn mean_score(&self) -> Option<f32> {
        (self.tracked_frames > 0).then(|| (self.score_sum / self.tracked_frames as f64) as f32)
    }

    /// Fraction of frames where tracking was lost.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn loss_ratio(&self) -> f64 {
        if self.total_frames == 0 {
            0.0
        } else {
            self.lost_frames.len() as f64 / self.total_frames as f64
        }
    }

    /// Format the diagnostics as a short human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = vec![format!(
            "Tracking: {}/{} frames matched ({:.1}% lost)",
            self.tracked_frames,
            self.total_frames,
            self.loss_ratio() * 100.0,
        )];

        if let (Some(min), Some(max), Some(mean)) =
            (self.min_score, self.max_score, self.mean_score())
        {
            lines.push(format!(
                "Scores: min={min:.3} mean={mean:.3} max={max:.3}"
            ));
        }

        if !self.lost_frames.is_empty() {
            let shown: Vec<String> = self
                .lost_frames
                .iter()
                .take(10)
                .map(ToString::to_string)
                .collect();
            let suffix = if self.lost_frames.len() > 10 { ", ..." } else { "" };
            lines.push(format!("Lost at frames: {}{suffix}", shown.join(", ")));
        }

        lines.join("\n")
    }
}
