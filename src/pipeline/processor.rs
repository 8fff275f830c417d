//! Per-frame measurement pipeline
//!
//! Owns the smoothing and consistency buffers plus the latest confidence
//! diagnostics, and runs one frame through:
//!
//! 1. Visibility filter (low-visibility landmarks count as untracked)
//! 2. Frame validator
//! 3. Measurement calculator
//! 4. Smoothing buffer
//! 5. Consistency validator
//! 6. Confidence scorer
//!
//! A frame is accepted for publication only if it is valid, the recent
//! history is consistent, and the scored confidence clears the threshold.

use tracing::{debug, trace};

use crate::config::PipelineConfig;
use crate::types::{ConfidenceFactors, LandmarkFrame, Measurement, REQUIRED_JOINTS};

use super::calculator;
use super::confidence::score_confidence;
use super::consistency::{ConsistencyValidator, ConsistencyVerdict};
use super::smoothing::SmoothingBuffer;
use super::validator::validate_frame;
use super::PipelineError;

/// Result of processing one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Frame rejected by the validator or calculator; carries the reason.
    Rejected(Measurement),
    /// Valid measurement that is not yet trustworthy enough to publish.
    Held {
        measurement: Measurement,
        verdict: ConsistencyVerdict,
    },
    /// Publish as the session's current measurement.
    Accepted(Measurement),
}

impl FrameOutcome {
    pub fn measurement(&self) -> &Measurement {
        match self {
            FrameOutcome::Rejected(m) | FrameOutcome::Accepted(m) => m,
            FrameOutcome::Held { measurement, .. } => measurement,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, FrameOutcome::Accepted(_))
    }
}

#[derive(Debug, Clone)]
pub struct MeasurementPipeline {
    smoothing: SmoothingBuffer,
    consistency: ConsistencyValidator,
    factors: ConfidenceFactors,
}

impl MeasurementPipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            smoothing: SmoothingBuffer::new(config.validation.smoothing_history_size),
            consistency: ConsistencyValidator::new(&config.validation),
            factors: ConfidenceFactors::default(),
        }
    }

    /// Apply buffer sizing and variance thresholds from `config`.
    pub fn reconfigure(&mut self, config: &PipelineConfig) {
        if self.smoothing.capacity() != config.validation.smoothing_history_size.max(1) {
            self.smoothing.set_capacity(config.validation.smoothing_history_size);
        }
        self.consistency.reconfigure(&config.validation);
    }

    pub fn clear(&mut self) {
        self.smoothing.clear();
        self.consistency.clear();
        self.factors = ConfidenceFactors::default();
    }

    pub fn clear_smoothing(&mut self) {
        self.smoothing.clear();
    }

    pub fn clear_consistency(&mut self) {
        self.consistency.clear();
    }

    pub fn clear_factors(&mut self) {
        self.factors = ConfidenceFactors::default();
    }

    pub fn factors(&self) -> ConfidenceFactors {
        self.factors
    }

    pub fn smoothing_len(&self) -> usize {
        self.smoothing.len()
    }

    pub fn consistency_len(&self) -> usize {
        self.consistency.len()
    }

    /// Run one frame through the pipeline.
    ///
    /// Rejections are ordinary outcomes; `Err` means the tick itself failed
    /// and should go to the recovery manager.
    pub fn process(
        &mut self,
        frame: &LandmarkFrame,
        config: &PipelineConfig,
        timestamp_ms: i64,
    ) -> Result<FrameOutcome, PipelineError> {
        let thresholds = &config.thresholds;
        let landmarks = frame.landmarks.visible(thresholds.min_landmark_visibility);

        if let Err(rejection) = validate_frame(
            frame.ground_plane_confidence,
            &landmarks,
            &REQUIRED_JOINTS,
            thresholds,
        ) {
            debug!(%rejection, "Frame rejected");
            return Ok(FrameOutcome::Rejected(Measurement::rejected(
                rejection.reason(),
                timestamp_ms,
            )));
        }

        let raw = calculator::calculate(
            &landmarks,
            &REQUIRED_JOINTS,
            thresholds.min_confidence_threshold,
            timestamp_ms,
        )?;
        if !raw.is_valid {
            debug!(reason = raw.error_reason.as_deref().unwrap_or(""), "Measurement rejected");
            return Ok(FrameOutcome::Rejected(raw));
        }

        let smoothed = self.smoothing.push(&raw);
        let verdict = self.consistency.push_checked(&raw)?;
        let score = score_confidence(
            &smoothed,
            &self.smoothing,
            verdict,
            &config.confidence_weights,
            &config.realism,
        )?;
        self.factors = score.factors;

        let scored = smoothed.with_confidence(score.value);
        trace!(
            width_cm = scored.shoulder_width_cm,
            height_cm = scored.height_cm,
            confidence = scored.confidence,
            %verdict,
            "Frame scored"
        );

        if verdict == ConsistencyVerdict::Consistent && score.value >= thresholds.min_confidence_threshold {
            Ok(FrameOutcome::Accepted(scored))
        } else {
            Ok(FrameOutcome::Held {
                measurement: scored,
                verdict,
            })
        }
    }
}
