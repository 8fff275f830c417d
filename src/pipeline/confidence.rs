//! 4-factor confidence scoring for published measurements

use crate::config::defaults::{
    REALISM_LOOSE_SCORE, REALISM_OUTSIDE_SCORE, REALISM_TIGHT_SCORE,
    STABILITY_CONSISTENT_SCORE, STABILITY_INCONSISTENT_SCORE, STABILITY_INSUFFICIENT_SCORE,
    TEMPORAL_HEIGHT_VARIANCE_SCALE, TEMPORAL_MIN_HISTORY, TEMPORAL_NEUTRAL_SCORE,
    TEMPORAL_WIDTH_VARIANCE_SCALE, TEMPORAL_WINDOW,
};
use crate::config::{ConfidenceWeights, RealismConfig, RealismRange};
use crate::types::{ConfidenceFactors, Measurement};

use super::consistency::ConsistencyVerdict;
use super::smoothing::SmoothingBuffer;
use super::{population_variance, PipelineError};

/// Final confidence plus the factor breakdown that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceScore {
    pub value: f64,
    pub factors: ConfidenceFactors,
}

/// Score confidence across 4 weighted factors.
///
/// Default weights: base 30%, temporal 25%, realism 25%, stability 20%.
pub fn score_confidence(
    measurement: &Measurement,
    history: &SmoothingBuffer,
    verdict: ConsistencyVerdict,
    weights: &ConfidenceWeights,
    realism: &RealismConfig,
) -> Result<ConfidenceScore, PipelineError> {
    let base = measurement.confidence.clamp(0.0, 1.0);
    let temporal = score_temporal(history);
    let realism = score_realism(measurement, realism);
    let stability = score_stability(verdict);

    let weighted = base * weights.base
        + temporal * weights.temporal
        + realism * weights.realism
        + stability * weights.stability;
    if !weighted.is_finite() {
        return Err(PipelineError::Scoring(format!(
            "weighted sum not finite (base={base}, temporal={temporal}, realism={realism}, stability={stability})"
        )));
    }
    let value = weighted.clamp(0.0, 1.0);

    Ok(ConfidenceScore {
        value,
        factors: ConfidenceFactors {
            base,
            temporal,
            realism,
            stability,
            enhanced: value,
        },
    })
}

/// Temporal: low variance over the last 5 smoothing entries → high score.
/// Neutral 0.5 with fewer than 3 entries.
fn score_temporal(history: &SmoothingBuffer) -> f64 {
    let recent: Vec<&Measurement> = history.recent(TEMPORAL_WINDOW).collect();
    if recent.len() < TEMPORAL_MIN_HISTORY {
        return TEMPORAL_NEUTRAL_SCORE;
    }

    let widths: Vec<f64> = recent.iter().map(|m| m.shoulder_width_cm).collect();
    let heights: Vec<f64> = recent.iter().map(|m| m.height_cm).collect();

    let width_term = 1.0 - (population_variance(&widths) / TEMPORAL_WIDTH_VARIANCE_SCALE).min(1.0);
    let height_term = 1.0 - (population_variance(&heights) / TEMPORAL_HEIGHT_VARIANCE_SCALE).min(1.0);
    let score = (width_term + height_term) / 2.0;
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Realism: average of width, height, and proportion plausibility.
fn score_realism(measurement: &Measurement, realism: &RealismConfig) -> f64 {
    let ratio = if measurement.shoulder_width_cm > 0.0 {
        measurement.height_cm / measurement.shoulder_width_cm
    } else {
        0.0
    };
    let scores = [
        range_score(measurement.shoulder_width_cm, &realism.shoulder_width_cm),
        range_score(measurement.height_cm, &realism.height_cm),
        range_score(ratio, &realism.height_to_shoulder_ratio),
    ];
    scores.iter().sum::<f64>() / scores.len() as f64
}

/// Tight range = 1.0, loose range = 0.7, otherwise 0.3.
fn range_score(value: f64, range: &RealismRange) -> f64 {
    if range.in_tight(value) {
        REALISM_TIGHT_SCORE
    } else if range.in_loose(value) {
        REALISM_LOOSE_SCORE
    } else {
        REALISM_OUTSIDE_SCORE
    }
}

fn score_stability(verdict: ConsistencyVerdict) -> f64 {
    match verdict {
        ConsistencyVerdict::Consistent => STABILITY_CONSISTENT_SCORE,
        ConsistencyVerdict::Inconsistent => STABILITY_INCONSISTENT_SCORE,
        ConsistencyVerdict::Insufficient => STABILITY_INSUFFICIENT_SCORE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(width: f64, height: f64, confidence: f64) -> Measurement {
        Measurement::valid(width, height, confidence, 0)
    }

    fn filled(values: &[(f64, f64)]) -> SmoothingBuffer {
        let mut buf = SmoothingBuffer::new(5);
        for (w, h) in values {
            buf.push(&m(*w, *h, 0.9));
        }
        buf
    }

    #[test]
    fn test_temporal_neutral_with_short_history() {
        assert!((score_temporal(&filled(&[(44.0, 171.0), (44.0, 171.0)])) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_temporal_perfect_when_stable() {
        let buf = filled(&[(44.0, 171.0); 5]);
        assert!((score_temporal(&buf) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_temporal_formula() {
        // widths var = 8/3 (mean 44, devs ±2, 0), heights var = 0
        let buf = filled(&[(42.0, 171.0), (44.0, 171.0), (46.0, 171.0)]);
        let expected = ((1.0 - (8.0 / 3.0) / 10.0) + 1.0) / 2.0;
        assert!((score_temporal(&buf) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_realism_bands() {
        let r = RealismConfig::default();
        // width tight, height tight, ratio 171/44 = 3.89 tight
        assert!((score_realism(&m(44.0, 171.0, 0.9), &r) - 1.0).abs() < 1e-12);
        // width loose (65), height tight, ratio 170/65 = 2.6 tight
        let expected = (0.7 + 1.0 + 1.0) / 3.0;
        assert!((score_realism(&m(65.0, 170.0, 0.9), &r) - expected).abs() < 1e-12);
        // everything outside
        assert!((score_realism(&m(90.0, 60.0, 0.9), &r) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_stability_scores() {
        assert!((score_stability(ConsistencyVerdict::Consistent) - 1.0).abs() < f64::EPSILON);
        assert!((score_stability(ConsistencyVerdict::Inconsistent) - 0.5).abs() < f64::EPSILON);
        assert!((score_stability(ConsistencyVerdict::Insufficient) - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_weighted_sum_and_factors() {
        let buf = filled(&[(44.0, 171.0); 5]);
        let score = score_confidence(
            &m(44.0, 171.0, 0.8),
            &buf,
            ConsistencyVerdict::Insufficient,
            &ConfidenceWeights::default(),
            &RealismConfig::default(),
        )
        .unwrap();
        let expected = 0.8 * 0.3 + 1.0 * 0.25 + 1.0 * 0.25 + 0.7 * 0.2;
        assert!((score.value - expected).abs() < 1e-9);
        assert!((score.factors.enhanced - score.value).abs() < f64::EPSILON);
        assert!((score.factors.stability - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_output_always_in_unit_range() {
        let heavy = ConfidenceWeights {
            base: 2.0,
            temporal: 2.0,
            realism: 2.0,
            stability: 2.0,
        };
        let wild = [
            m(0.0, 0.0, 0.0),
            m(500.0, -20.0, 1.0),
            m(44.0, 171.0, 1.0),
            m(1e9, 1e-9, 0.5),
        ];
        for sample in &wild {
            for verdict in [
                ConsistencyVerdict::Consistent,
                ConsistencyVerdict::Inconsistent,
                ConsistencyVerdict::Insufficient,
            ] {
                for weights in [&ConfidenceWeights::default(), &heavy] {
                    let buf = filled(&[(sample.shoulder_width_cm, sample.height_cm); 4]);
                    let s = score_confidence(sample, &buf, verdict, weights, &RealismConfig::default()).unwrap();
                    assert!((0.0..=1.0).contains(&s.value), "score {} out of range", s.value);
                }
            }
        }
    }

    #[test]
    fn test_nan_weight_is_scoring_error() {
        let weights = ConfidenceWeights {
            base: f64::NAN,
            ..ConfidenceWeights::default()
        };
        let err = score_confidence(
            &m(44.0, 171.0, 0.9),
            &filled(&[]),
            ConsistencyVerdict::Consistent,
            &weights,
            &RealismConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Scoring(_)));
    }
}
