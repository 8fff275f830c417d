//! Runtime configuration overrides.
//!
//! The host application sends a flat JSON object of optional, camelCase
//! options. Present options are merged onto the current [`PipelineConfig`];
//! absent ones keep their prior value. The merged result is validated before
//! it replaces anything.

use serde::{Deserialize, Serialize};

use super::{ConfigError, PipelineConfig};

/// Host-facing option payload for `load_configuration`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_confidence_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_plane_detection_confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_body_landmarks_required: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_frames_for_validation: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_variance_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_consistency_frames: Option<usize>,
    /// Base frame interval (ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_processing_interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_recovery_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_cooldown_ms: Option<u64>,
}

impl ConfigOverrides {
    /// Parse a JSON option payload. Unknown keys and wrong types are errors.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Parse an already-decoded JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge onto `base` and validate the result. `base` is never modified.
    pub fn apply_to(&self, base: &PipelineConfig) -> Result<PipelineConfig, ConfigError> {
        let mut merged = base.clone();

        if let Some(v) = self.min_confidence_threshold {
            merged.thresholds.min_confidence_threshold = v;
        }
        if let Some(v) = self.min_plane_detection_confidence {
            merged.thresholds.min_plane_detection_confidence = v;
        }
        if let Some(v) = self.min_body_landmarks_required {
            merged.thresholds.min_body_landmarks_required = v;
        }
        if let Some(v) = self.required_frames_for_validation {
            merged.validation.required_frames_for_validation = v;
        }
        if let Some(v) = self.max_variance_threshold {
            merged.validation.max_variance_threshold = v;
        }
        if let Some(v) = self.min_consistency_frames {
            merged.validation.min_consistency_frames = v;
        }
        if let Some(v) = self.frame_processing_interval {
            merged.timing.frame_processing_interval_ms = v;
        }
        if let Some(v) = self.max_recovery_attempts {
            merged.recovery.max_recovery_attempts = v;
        }
        if let Some(v) = self.recovery_cooldown_ms {
            merged.recovery.recovery_cooldown_ms = v;
        }

        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unspecified_options_keep_prior_values() {
        let mut base = PipelineConfig::default();
        base.validation.max_variance_threshold = 2.0;

        let overrides = ConfigOverrides::from_json(r#"{"minConfidenceThreshold": 0.75}"#).unwrap();
        let merged = overrides.apply_to(&base).unwrap();

        assert!((merged.thresholds.min_confidence_threshold - 0.75).abs() < f64::EPSILON);
        assert!((merged.validation.max_variance_threshold - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_all_recognized_options() {
        let overrides = ConfigOverrides::from_json(
            r#"{
                "minConfidenceThreshold": 0.72,
                "minPlaneDetectionConfidence": 0.85,
                "minBodyLandmarksRequired": 9,
                "requiredFramesForValidation": 10,
                "maxVarianceThreshold": 2.0,
                "minConsistencyFrames": 6,
                "frameProcessingInterval": 66,
                "maxRecoveryAttempts": 5,
                "recoveryCooldownMs": 1000
            }"#,
        )
        .unwrap();
        let merged = overrides.apply_to(&PipelineConfig::default()).unwrap();
        assert_eq!(merged.thresholds.min_body_landmarks_required, 9);
        assert_eq!(merged.validation.required_frames_for_validation, 10);
        assert_eq!(merged.validation.min_consistency_frames, 6);
        assert_eq!(merged.timing.frame_processing_interval_ms, 66);
        assert_eq!(merged.recovery.max_recovery_attempts, 5);
        assert_eq!(merged.recovery.recovery_cooldown_ms, 1000);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = ConfigOverrides::from_json(r#"{"minConfidence": 0.7}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Payload(_)));
    }

    #[test]
    fn test_wrong_type_rejected() {
        assert!(ConfigOverrides::from_json(r#"{"maxRecoveryAttempts": "three"}"#).is_err());
    }

    #[test]
    fn test_invalid_merge_leaves_base_untouched() {
        let base = PipelineConfig::default();
        let overrides = ConfigOverrides {
            min_confidence_threshold: Some(3.0),
            ..Default::default()
        };
        assert!(matches!(overrides.apply_to(&base), Err(ConfigError::Validation(_))));
        assert_eq!(base, PipelineConfig::default());
    }

    #[test]
    fn test_empty_payload() {
        let overrides = ConfigOverrides::from_json("{}").unwrap();
        assert!(overrides.is_empty());
    }
}
