//! Consistency Validator: multi-frame agreement check
//!
//! Keeps its own bounded history (independent of the smoothing buffer) and
//! reports whether recent shoulder widths and heights agree within the
//! configured population variance.

use std::collections::VecDeque;

use crate::config::ValidationConfig;
use crate::types::Measurement;

use super::{population_variance, PipelineError};

/// Outcome of a consistency check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyVerdict {
    Consistent,
    Inconsistent,
    /// Fewer than `min_consistency_frames` buffered.
    Insufficient,
}

impl std::fmt::Display for ConsistencyVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsistencyVerdict::Consistent => write!(f, "consistent"),
            ConsistencyVerdict::Inconsistent => write!(f, "inconsistent"),
            ConsistencyVerdict::Insufficient => write!(f, "insufficient"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConsistencyValidator {
    capacity: usize,
    min_frames: usize,
    max_variance: f64,
    entries: VecDeque<Measurement>,
    last_verdict: ConsistencyVerdict,
}

impl ConsistencyValidator {
    pub fn new(config: &ValidationConfig) -> Self {
        let capacity = config.required_frames_for_validation.max(1);
        Self {
            capacity,
            min_frames: config.min_consistency_frames,
            max_variance: config.max_variance_threshold,
            entries: VecDeque::with_capacity(capacity),
            last_verdict: ConsistencyVerdict::Insufficient,
        }
    }

    /// Pick up new thresholds, evicting the oldest entries if capacity shrank.
    pub fn reconfigure(&mut self, config: &ValidationConfig) {
        self.capacity = config.required_frames_for_validation.max(1);
        self.min_frames = config.min_consistency_frames;
        self.max_variance = config.max_variance_threshold;
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_verdict = ConsistencyVerdict::Insufficient;
    }

    /// Verdict from the most recent push.
    pub fn last_verdict(&self) -> ConsistencyVerdict {
        self.last_verdict
    }

    /// Buffer `measurement`; true only if recent measurements agree.
    pub fn push(&mut self, measurement: &Measurement) -> bool {
        matches!(self.push_checked(measurement), Ok(ConsistencyVerdict::Consistent))
    }

    /// Buffer `measurement` and return the full verdict.
    ///
    /// A non-finite variance (corrupt history) is a processing error.
    pub fn push_checked(&mut self, measurement: &Measurement) -> Result<ConsistencyVerdict, PipelineError> {
        self.entries.push_back(measurement.clone());
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }

        let verdict = self.evaluate()?;
        self.last_verdict = verdict;
        Ok(verdict)
    }

    fn evaluate(&self) -> Result<ConsistencyVerdict, PipelineError> {
        if self.entries.len() < self.min_frames {
            return Ok(ConsistencyVerdict::Insufficient);
        }

        let widths: Vec<f64> = self.entries.iter().map(|m| m.shoulder_width_cm).collect();
        let heights: Vec<f64> = self.entries.iter().map(|m| m.height_cm).collect();
        let width_var = population_variance(&widths);
        let height_var = population_variance(&heights);

        if !width_var.is_finite() || !height_var.is_finite() {
            return Err(PipelineError::Consistency(format!(
                "variance not finite over {} frames (width={width_var}, height={height_var})",
                self.entries.len()
            )));
        }

        tracing::trace!(width_var, height_var, frames = self.entries.len(), "consistency variance");

        if width_var <= self.max_variance && height_var <= self.max_variance {
            Ok(ConsistencyVerdict::Consistent)
        } else {
            Ok(ConsistencyVerdict::Inconsistent)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(width: f64, height: f64) -> Measurement {
        Measurement::valid(width, height, 0.9, 0)
    }

    #[test]
    fn test_insufficient_until_min_frames() {
        let mut v = ConsistencyValidator::new(&ValidationConfig::default());
        for _ in 0..4 {
            assert!(!v.push(&m(30.0, 170.0)));
            assert_eq!(v.last_verdict(), ConsistencyVerdict::Insufficient);
        }
        assert!(v.push(&m(30.0, 170.0)), "5 identical values have zero variance");
        assert_eq!(v.last_verdict(), ConsistencyVerdict::Consistent);
    }

    #[test]
    fn test_zero_threshold_accepts_identical_values() {
        let config = ValidationConfig {
            max_variance_threshold: 0.0,
            ..ValidationConfig::default()
        };
        let mut v = ConsistencyValidator::new(&config);
        let mut last = false;
        for _ in 0..5 {
            last = v.push(&m(30.0, 30.0));
        }
        assert!(last);
    }

    #[test]
    fn test_either_variance_over_threshold_is_inconsistent() {
        let mut v = ConsistencyValidator::new(&ValidationConfig::default());
        // Widths agree, heights spread by ±5 cm
        for h in [165.0, 175.0, 165.0, 175.0, 165.0] {
            v.push(&m(44.0, h));
        }
        assert_eq!(v.last_verdict(), ConsistencyVerdict::Inconsistent);
    }

    #[test]
    fn test_outlier_ages_out_of_window() {
        let mut v = ConsistencyValidator::new(&ValidationConfig::default());
        v.push(&m(60.0, 171.0));
        for _ in 0..7 {
            v.push(&m(44.0, 171.0));
        }
        assert_eq!(v.last_verdict(), ConsistencyVerdict::Inconsistent);
        // Ninth push evicts the outlier (capacity 8)
        assert!(v.push(&m(44.0, 171.0)));
        assert_eq!(v.len(), 8);
    }

    #[test]
    fn test_non_finite_history_is_error() {
        let mut v = ConsistencyValidator::new(&ValidationConfig::default());
        for _ in 0..4 {
            v.push(&m(44.0, 171.0));
        }
        let err = v.push_checked(&m(f64::INFINITY, 171.0)).unwrap_err();
        assert!(matches!(err, PipelineError::Consistency(_)));
    }

    #[test]
    fn test_clear_resets() {
        let mut v = ConsistencyValidator::new(&ValidationConfig::default());
        for _ in 0..5 {
            v.push(&m(44.0, 171.0));
        }
        v.clear();
        assert!(v.is_empty());
        assert_eq!(v.last_verdict(), ConsistencyVerdict::Insufficient);
    }
}
