//! Measurement Calculator: shoulder width, height, and base confidence
//!
//! Operates on a landmark set that has already passed the frame validator.

use crate::config::defaults::{
    MIN_HEIGHT_TO_SHOULDER_RATIO, PLAUSIBILITY_BONUS, PLAUSIBLE_HEIGHT_CM,
    PLAUSIBLE_SHOULDER_WIDTH_CM, SHOULDER_SYMMETRY_TOLERANCE_M,
};
use crate::types::{Joint, LandmarkSet, Measurement};

use super::PipelineError;

/// Straight-line distance between the shoulders (cm); 0 if either is missing.
pub fn shoulder_width_cm(landmarks: &LandmarkSet) -> f64 {
    match (landmarks.get(Joint::LeftShoulder), landmarks.get(Joint::RightShoulder)) {
        (Some(l), Some(r)) => l.distance_to(r) * 100.0,
        _ => 0.0,
    }
}

/// Vertical head-to-ankle distance (cm); 0 if the head or either ankle is missing.
pub fn height_cm(landmarks: &LandmarkSet) -> f64 {
    match (
        landmarks.get(Joint::Head),
        landmarks.get(Joint::LeftAnkle),
        landmarks.get(Joint::RightAnkle),
    ) {
        (Some(head), Some(la), Some(ra)) => (head.y - (la.y + ra.y) / 2.0) * 100.0,
        _ => 0.0,
    }
}

/// Landmark completeness plus a bonus per plausibility check, capped at 1.0.
pub fn base_confidence(
    landmarks: &LandmarkSet,
    required: &[Joint],
    shoulder_width_cm: f64,
    height_cm: f64,
) -> f64 {
    if required.is_empty() {
        return 0.0;
    }
    let mut confidence = landmarks.count_present(required) as f64 / required.len() as f64;

    let (w_min, w_max) = PLAUSIBLE_SHOULDER_WIDTH_CM;
    if (w_min..=w_max).contains(&shoulder_width_cm) {
        confidence += PLAUSIBILITY_BONUS;
    }
    let (h_min, h_max) = PLAUSIBLE_HEIGHT_CM;
    if (h_min..=h_max).contains(&height_cm) {
        confidence += PLAUSIBILITY_BONUS;
    }
    if height_cm > shoulder_width_cm * MIN_HEIGHT_TO_SHOULDER_RATIO {
        confidence += PLAUSIBILITY_BONUS;
    }
    if let (Some(l), Some(r)) = (landmarks.get(Joint::LeftShoulder), landmarks.get(Joint::RightShoulder)) {
        if (l.y - r.y).abs() < SHOULDER_SYMMETRY_TOLERANCE_M {
            confidence += PLAUSIBILITY_BONUS;
        }
    }

    confidence.min(1.0)
}

/// Compute a measurement from a validated landmark set.
///
/// Implausible results come back as an invalid measurement with a reason.
/// Non-finite geometry is a processing error.
pub fn calculate(
    landmarks: &LandmarkSet,
    required: &[Joint],
    min_confidence: f64,
    timestamp_ms: i64,
) -> Result<Measurement, PipelineError> {
    if landmarks.iter().any(|(_, l)| !l.is_finite()) {
        return Err(PipelineError::NonFiniteGeometry("landmark coordinates"));
    }

    let width = shoulder_width_cm(landmarks);
    let height = height_cm(landmarks);
    if !width.is_finite() || !height.is_finite() {
        return Err(PipelineError::NonFiniteGeometry("measurement"));
    }

    if width <= 0.0 {
        return Ok(Measurement::rejected(
            "Unable to measure shoulder width. Please face the camera.",
            timestamp_ms,
        ));
    }
    if height <= 0.0 {
        return Ok(Measurement::rejected(
            "Unable to measure height. Please ensure your full body is visible.",
            timestamp_ms,
        ));
    }

    let confidence = base_confidence(landmarks, required, width, height);
    if confidence < min_confidence {
        return Ok(Measurement::rejected("Low confidence in body detection", timestamp_ms));
    }

    Ok(Measurement::valid(width, height, confidence, timestamp_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Landmark, REQUIRED_JOINTS};

    fn body(shoulder_half_width: f64, head_y: f64) -> LandmarkSet {
        LandmarkSet::new()
            .with(Joint::Head, Landmark::new(0.0, head_y, 2.0))
            .with(Joint::LeftShoulder, Landmark::new(-shoulder_half_width, 0.45, 2.0))
            .with(Joint::RightShoulder, Landmark::new(shoulder_half_width, 0.45, 2.0))
            .with(Joint::LeftHip, Landmark::new(-0.15, -0.05, 2.0))
            .with(Joint::RightHip, Landmark::new(0.15, -0.05, 2.0))
            .with(Joint::LeftKnee, Landmark::new(-0.15, -0.45, 2.0))
            .with(Joint::RightKnee, Landmark::new(0.15, -0.45, 2.0))
            .with(Joint::LeftAnkle, Landmark::new(-0.15, -0.91, 2.0))
            .with(Joint::RightAnkle, Landmark::new(0.15, -0.91, 2.0))
    }

    #[test]
    fn test_geometry() {
        let set = body(0.22, 0.80);
        assert!((shoulder_width_cm(&set) - 44.0).abs() < 1e-9);
        assert!((height_cm(&set) - 171.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_joints_give_zero() {
        let mut set = body(0.22, 0.80);
        set.remove(Joint::RightShoulder);
        set.remove(Joint::LeftAnkle);
        assert!(shoulder_width_cm(&set).abs() < f64::EPSILON);
        assert!(height_cm(&set).abs() < f64::EPSILON);
    }

    #[test]
    fn test_base_confidence_is_capped() {
        let set = body(0.22, 0.80);
        let c = base_confidence(&set, &REQUIRED_JOINTS, 44.0, 171.0);
        assert!((c - 1.0).abs() < f64::EPSILON, "9/9 plus bonuses should cap at 1.0, got {c}");
    }

    #[test]
    fn test_base_confidence_bonuses() {
        // 5 of 9 present, all four plausibility checks pass
        let mut set = body(0.22, 0.80);
        for joint in [Joint::LeftKnee, Joint::RightKnee, Joint::LeftHip, Joint::RightHip] {
            set.remove(joint);
        }
        let c = base_confidence(&set, &REQUIRED_JOINTS, 44.0, 171.0);
        let expected = 5.0 / 9.0 + 0.4;
        assert!((c - expected).abs() < 1e-9, "got {c}, expected {expected}");

        // Wide, asymmetric shoulders keep only the height bonus
        let mut skewed = body(0.40, 0.80);
        skewed.insert(Joint::LeftShoulder, Landmark::new(-0.40, 0.60, 2.0));
        skewed.remove(Joint::LeftKnee);
        skewed.remove(Joint::RightKnee);
        skewed.remove(Joint::LeftHip);
        let width = shoulder_width_cm(&skewed);
        let c = base_confidence(&skewed, &REQUIRED_JOINTS, width, 171.0);
        let expected = 6.0 / 9.0 + 0.1;
        assert!(width > 60.0);
        assert!((c - expected).abs() < 1e-9, "got {c}, expected {expected}");
    }

    #[test]
    fn test_calculate_valid() {
        let m = calculate(&body(0.22, 0.80), &REQUIRED_JOINTS, 0.7, 42).unwrap();
        assert!(m.is_valid);
        assert_eq!(m.timestamp_ms, 42);
        assert!((m.shoulder_width_cm - 44.0).abs() < 1e-9);
    }

    #[test]
    fn test_head_below_ankles_is_invalid() {
        let m = calculate(&body(0.22, -1.0), &REQUIRED_JOINTS, 0.7, 0).unwrap();
        assert!(!m.is_valid);
        assert!(m.error_reason.is_some());
    }

    #[test]
    fn test_low_confidence_is_invalid() {
        let m = calculate(&body(0.22, 0.80), &REQUIRED_JOINTS, 1.01, 0).unwrap();
        assert!(!m.is_valid);
        assert_eq!(m.error_reason.as_deref(), Some("Low confidence in body detection"));
    }

    #[test]
    fn test_non_finite_is_processing_error() {
        let mut set = body(0.22, 0.80);
        set.insert(Joint::Head, Landmark::new(0.0, f64::NAN, 2.0));
        let err = calculate(&set, &REQUIRED_JOINTS, 0.7, 0).unwrap_err();
        assert!(matches!(err, PipelineError::NonFiniteGeometry(_)));
    }
}
