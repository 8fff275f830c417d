//! Frame Validator: gates a frame before any measurement is computed
//!
//! Checks run in order and stop at the first failure:
//! 1. Ground-plane confidence
//! 2. Required-landmark completeness
//! 3. User distance from the camera (head landmark norm)

use crate::config::ThresholdConfig;
use crate::types::{Joint, LandmarkSet};

/// Why a frame was rejected. `reason()` is the user-facing hint.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameRejection {
    PlaneNotDetected { confidence: f32, required: f32 },
    InsufficientLandmarks { present: usize, required: usize },
    HeadNotDetected,
    TooClose { distance_m: f64 },
    TooFar { distance_m: f64 },
}

impl FrameRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            FrameRejection::PlaneNotDetected { .. } => {
                "Move your device slowly to detect surfaces before measuring"
            }
            FrameRejection::InsufficientLandmarks { .. } => {
                "Insufficient body landmarks detected. Please ensure full body is visible."
            }
            FrameRejection::HeadNotDetected => "Head not detected",
            FrameRejection::TooClose { .. } => "Please step back - you're too close to the camera",
            FrameRejection::TooFar { .. } => "Please step closer - you're too far from the camera",
        }
    }
}

impl std::fmt::Display for FrameRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameRejection::PlaneNotDetected { confidence, required } => {
                write!(f, "plane confidence {confidence:.2} < {required:.2}")
            }
            FrameRejection::InsufficientLandmarks { present, required } => {
                write!(f, "{present} required landmarks present, need {required}")
            }
            FrameRejection::HeadNotDetected => write!(f, "head landmark missing"),
            FrameRejection::TooClose { distance_m } => write!(f, "user at {distance_m:.2}m (too close)"),
            FrameRejection::TooFar { distance_m } => write!(f, "user at {distance_m:.2}m (too far)"),
        }
    }
}

/// Validate one frame against the configured thresholds.
///
/// `landmarks` should already exclude low-visibility joints.
pub fn validate_frame(
    ground_plane_confidence: f32,
    landmarks: &LandmarkSet,
    required: &[Joint],
    thresholds: &ThresholdConfig,
) -> Result<(), FrameRejection> {
    // NaN plane confidence fails this check too
    if !(ground_plane_confidence >= thresholds.min_plane_detection_confidence) {
        return Err(FrameRejection::PlaneNotDetected {
            confidence: ground_plane_confidence,
            required: thresholds.min_plane_detection_confidence,
        });
    }

    let present = landmarks.count_present(required);
    if present < thresholds.min_body_landmarks_required {
        return Err(FrameRejection::InsufficientLandmarks {
            present,
            required: thresholds.min_body_landmarks_required,
        });
    }

    let head = landmarks.get(Joint::Head).ok_or(FrameRejection::HeadNotDetected)?;
    let distance_m = head.norm();
    if distance_m < thresholds.min_user_distance_m {
        return Err(FrameRejection::TooClose { distance_m });
    }
    if distance_m > thresholds.max_user_distance_m {
        return Err(FrameRejection::TooFar { distance_m });
    }

    Ok(())
}
