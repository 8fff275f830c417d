//! Pipeline Configuration - every measurement threshold as an operator-tunable TOML value
//!
//! Each struct implements `Default` with the values the pipeline was tuned
//! with, so behavior is unchanged when no config file is present.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults::{CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE};
use crate::types::REQUIRED_JOINTS;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a measurement session.
///
/// Load with `PipelineConfig::load()` which searches:
/// 1. `$FITFORM_CONFIG` env var
/// 2. `./fitform.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PipelineConfig {
    /// Frame gating and acceptance thresholds
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Smoothing and multi-frame consistency buffers
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Sampling loop cadence
    #[serde(default)]
    pub timing: TimingConfig,

    /// Error recovery retry policy
    #[serde(default)]
    pub recovery: RecoveryConfig,

    /// Confidence scorer factor weights
    #[serde(default)]
    pub confidence_weights: ConfidenceWeights,

    /// Physiological realism ranges used by the scorer
    #[serde(default)]
    pub realism: RealismConfig,
}

impl PipelineConfig {
    /// Load configuration using the standard search order:
    /// 1. `$FITFORM_CONFIG` environment variable
    /// 2. `./fitform.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded pipeline config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded pipeline config from ./{}", DEFAULT_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", DEFAULT_CONFIG_FILE);
                }
            }
        }

        info!("No {} found, using built-in defaults", DEFAULT_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Toml(source) => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse and validate a TOML document. Unknown keys are logged, not rejected.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Copy with the frame interval recommended for a device tier.
    pub fn with_device_tier(mut self, tier: DeviceTier) -> Self {
        self.timing.frame_processing_interval_ms = tier.frame_interval_ms();
        self
    }

    /// Validate all thresholds for internal consistency.
    ///
    /// Every problem is collected so one reload reports them all.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let t = &self.thresholds;
        check_unit(t.min_confidence_threshold, "thresholds.min_confidence_threshold", &mut errors);
        check_unit(
            f64::from(t.min_plane_detection_confidence),
            "thresholds.min_plane_detection_confidence",
            &mut errors,
        );
        check_unit(t.min_landmark_visibility, "thresholds.min_landmark_visibility", &mut errors);
        if t.min_body_landmarks_required == 0 || t.min_body_landmarks_required > REQUIRED_JOINTS.len() {
            errors.push(format!(
                "thresholds.min_body_landmarks_required must be in 1..={} (got {})",
                REQUIRED_JOINTS.len(),
                t.min_body_landmarks_required
            ));
        }
        if !(t.min_user_distance_m > 0.0 && t.min_user_distance_m < t.max_user_distance_m) {
            errors.push(format!(
                "thresholds.min_user_distance_m ({:.2}) must be > 0 and < max_user_distance_m ({:.2})",
                t.min_user_distance_m, t.max_user_distance_m
            ));
        }

        let v = &self.validation;
        if v.smoothing_history_size == 0 {
            errors.push("validation.smoothing_history_size must be > 0".to_string());
        }
        if v.required_frames_for_validation == 0 {
            errors.push("validation.required_frames_for_validation must be > 0".to_string());
        }
        if v.min_consistency_frames == 0 || v.min_consistency_frames > v.required_frames_for_validation {
            errors.push(format!(
                "validation.min_consistency_frames ({}) must be in 1..=required_frames_for_validation ({})",
                v.min_consistency_frames, v.required_frames_for_validation
            ));
        }
        if !(v.max_variance_threshold >= 0.0) {
            errors.push(format!(
                "validation.max_variance_threshold must be >= 0 (got {})",
                v.max_variance_threshold
            ));
        }

        if self.timing.tick_interval_ms == 0 {
            errors.push("timing.tick_interval_ms must be > 0".to_string());
        }
        if self.timing.frame_processing_interval_ms == 0 {
            errors.push("timing.frame_processing_interval_ms must be > 0".to_string());
        }

        if self.recovery.max_recovery_attempts == 0 {
            errors.push("recovery.max_recovery_attempts must be > 0".to_string());
        }
        if self.recovery.recovery_cooldown_ms == 0 {
            errors.push("recovery.recovery_cooldown_ms must be > 0".to_string());
        }

        // Weights: non-negative and sum to ~1.0 (allow 0.95-1.05)
        let w = &self.confidence_weights;
        for (name, value) in [
            ("base", w.base),
            ("temporal", w.temporal),
            ("realism", w.realism),
            ("stability", w.stability),
        ] {
            if !(value >= 0.0) {
                errors.push(format!("confidence_weights.{name} must be >= 0 (got {value})"));
            }
        }
        let weight_sum = w.sum();
        if !(0.95..=1.05).contains(&weight_sum) {
            errors.push(format!(
                "confidence_weights must sum to ~1.0, got {:.2}",
                weight_sum
            ));
        }

        let (range_errors, range_warnings) = super::validation::validate_physical_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        // Reject NaN/Inf anywhere (sweep all float fields via serialization)
        if let Ok(s) = toml::to_string(self) {
            if s.contains("nan") || s.contains("inf") {
                errors.push("Config contains NaN or Inf values; all thresholds must be finite numbers".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// List the leaf values that differ between `self` and `other`.
    pub fn diff(&self, other: &Self) -> Vec<ConfigChange> {
        let before = flatten(self);
        let after = flatten(other);
        after
            .iter()
            .filter_map(|(key, new)| match before.get(key) {
                Some(old) if old == new => None,
                old => Some(ConfigChange {
                    key: key.clone(),
                    old_value: old.cloned().unwrap_or_default(),
                    new_value: new.clone(),
                }),
            })
            .collect()
    }
}

fn check_unit(value: f64, name: &str, errors: &mut Vec<String>) {
    // NaN comparisons silently pass range checks, catch them explicitly
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        errors.push(format!("{name} must be within [0, 1] (got {value})"));
    }
}

fn flatten(config: &PipelineConfig) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if let Ok(value) = toml::Value::try_from(config) {
        flatten_into(&value, "", &mut out);
    }
    out
}

fn flatten_into(value: &toml::Value, prefix: &str, out: &mut BTreeMap<String, String>) {
    match value.as_table() {
        Some(table) => {
            for (k, v) in table {
                let path = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                flatten_into(v, &path, out);
            }
        }
        None => {
            out.insert(prefix.to_string(), value.to_string());
        }
    }
}

/// One changed leaf value, reported after a reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChange {
    pub key: String,
    pub old_value: String,
    pub new_value: String,
}

impl std::fmt::Display for ConfigChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} -> {}", self.key, self.old_value, self.new_value)
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Config parse error ({}): {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Malformed configuration payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Thresholds
// ============================================================================

/// Frame gating and acceptance thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdConfig {
    /// Minimum base and scored confidence for a measurement to be accepted
    #[serde(default = "default_min_confidence_threshold")]
    pub min_confidence_threshold: f64,

    /// Minimum ground-plane confidence before any landmark is considered
    #[serde(default = "default_min_plane_detection_confidence")]
    pub min_plane_detection_confidence: f32,

    /// Required joints (of 9) that must be tracked
    #[serde(default = "default_min_body_landmarks_required")]
    pub min_body_landmarks_required: usize,

    /// Landmarks below this visibility count as untracked
    #[serde(default = "default_min_landmark_visibility")]
    pub min_landmark_visibility: f64,

    /// Closest acceptable head distance from the camera (m)
    #[serde(default = "default_min_user_distance")]
    pub min_user_distance_m: f64,

    /// Farthest acceptable head distance from the camera (m)
    #[serde(default = "default_max_user_distance")]
    pub max_user_distance_m: f64,
}

fn default_min_confidence_threshold() -> f64 { 0.7 }
fn default_min_plane_detection_confidence() -> f32 { 0.8 }
fn default_min_body_landmarks_required() -> usize { 8 }
fn default_min_landmark_visibility() -> f64 { 0.5 }
fn default_min_user_distance() -> f64 { 1.0 }
fn default_max_user_distance() -> f64 { 3.0 }

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            min_confidence_threshold: default_min_confidence_threshold(),
            min_plane_detection_confidence: default_min_plane_detection_confidence(),
            min_body_landmarks_required: default_min_body_landmarks_required(),
            min_landmark_visibility: default_min_landmark_visibility(),
            min_user_distance_m: default_min_user_distance(),
            max_user_distance_m: default_max_user_distance(),
        }
    }
}

// ============================================================================
// Buffers
// ============================================================================

/// Smoothing and consistency buffer sizing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationConfig {
    /// Smoothing buffer capacity
    #[serde(default = "default_smoothing_history_size")]
    pub smoothing_history_size: usize,

    /// Consistency buffer capacity
    #[serde(default = "default_required_frames_for_validation")]
    pub required_frames_for_validation: usize,

    /// Maximum population variance (cm²) of width and of height
    #[serde(default = "default_max_variance_threshold")]
    pub max_variance_threshold: f64,

    /// Buffered frames needed before consistency is judged
    #[serde(default = "default_min_consistency_frames")]
    pub min_consistency_frames: usize,
}

fn default_smoothing_history_size() -> usize { 5 }
fn default_required_frames_for_validation() -> usize { 8 }
fn default_max_variance_threshold() -> f64 { 2.5 }
fn default_min_consistency_frames() -> usize { 5 }

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            smoothing_history_size: default_smoothing_history_size(),
            required_frames_for_validation: default_required_frames_for_validation(),
            max_variance_threshold: default_max_variance_threshold(),
            min_consistency_frames: default_min_consistency_frames(),
        }
    }
}

// ============================================================================
// Timing
// ============================================================================

/// Sampling loop cadence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimingConfig {
    /// Internal wake-up period of the loop (ms)
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Base interval between processed frames (ms)
    #[serde(default = "default_frame_processing_interval")]
    pub frame_processing_interval_ms: u64,

    /// Stretch or shrink the frame interval from measured processing time
    #[serde(default = "default_adaptive_interval")]
    pub adaptive_interval: bool,
}

fn default_tick_interval() -> u64 { 50 }
fn default_frame_processing_interval() -> u64 { DeviceTier::MidRange.frame_interval_ms() }
fn default_adaptive_interval() -> bool { true }

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            frame_processing_interval_ms: default_frame_processing_interval(),
            adaptive_interval: default_adaptive_interval(),
        }
    }
}

/// Device performance class, used to pick a base frame interval.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeviceTier {
    HighEnd,
    #[default]
    MidRange,
    LowEnd,
}

impl DeviceTier {
    /// Recommended base frame interval (ms).
    pub fn frame_interval_ms(&self) -> u64 {
        match self {
            DeviceTier::HighEnd => 50,
            DeviceTier::MidRange => 100,
            DeviceTier::LowEnd => 200,
        }
    }
}

impl std::str::FromStr for DeviceTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "high_end" | "high" => Ok(DeviceTier::HighEnd),
            "mid_range" | "mid" => Ok(DeviceTier::MidRange),
            "low_end" | "low" => Ok(DeviceTier::LowEnd),
            other => Err(format!("unknown device tier '{other}' (expected high_end, mid_range or low_end)")),
        }
    }
}

impl std::fmt::Display for DeviceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceTier::HighEnd => write!(f, "high_end"),
            DeviceTier::MidRange => write!(f, "mid_range"),
            DeviceTier::LowEnd => write!(f, "low_end"),
        }
    }
}

// ============================================================================
// Recovery
// ============================================================================

/// Retry policy for per-category processing failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecoveryConfig {
    /// Failures tolerated per category before it is marked exhausted
    #[serde(default = "default_max_recovery_attempts")]
    pub max_recovery_attempts: u32,

    /// Delay before a recovery re-arm (ms); exhausted categories reset after twice this
    #[serde(default = "default_recovery_cooldown")]
    pub recovery_cooldown_ms: u64,
}

fn default_max_recovery_attempts() -> u32 { 3 }
fn default_recovery_cooldown() -> u64 { 2000 }

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_recovery_attempts: default_max_recovery_attempts(),
            recovery_cooldown_ms: default_recovery_cooldown(),
        }
    }
}

// ============================================================================
// Confidence Weights
// ============================================================================

/// Weights of the four confidence factors. Should sum to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceWeights {
    #[serde(default = "default_base_weight")]
    pub base: f64,
    #[serde(default = "default_temporal_weight")]
    pub temporal: f64,
    #[serde(default = "default_realism_weight")]
    pub realism: f64,
    #[serde(default = "default_stability_weight")]
    pub stability: f64,
}

fn default_base_weight() -> f64 { 0.3 }
fn default_temporal_weight() -> f64 { 0.25 }
fn default_realism_weight() -> f64 { 0.25 }
fn default_stability_weight() -> f64 { 0.2 }

impl ConfidenceWeights {
    pub fn sum(&self) -> f64 {
        self.base + self.temporal + self.realism + self.stability
    }
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            base: default_base_weight(),
            temporal: default_temporal_weight(),
            realism: default_realism_weight(),
            stability: default_stability_weight(),
        }
    }
}

// ============================================================================
// Realism Ranges
// ============================================================================

/// Tight and loose plausibility bands for one quantity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RealismRange {
    pub tight_min: f64,
    pub tight_max: f64,
    pub loose_min: f64,
    pub loose_max: f64,
}

impl RealismRange {
    pub const fn new(tight_min: f64, tight_max: f64, loose_min: f64, loose_max: f64) -> Self {
        Self { tight_min, tight_max, loose_min, loose_max }
    }

    pub fn in_tight(&self, value: f64) -> bool {
        (self.tight_min..=self.tight_max).contains(&value)
    }

    pub fn in_loose(&self, value: f64) -> bool {
        (self.loose_min..=self.loose_max).contains(&value)
    }
}

/// Physiological ranges for the realism factor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RealismConfig {
    #[serde(default = "default_shoulder_width_range")]
    pub shoulder_width_cm: RealismRange,
    #[serde(default = "default_height_range")]
    pub height_cm: RealismRange,
    /// Height divided by shoulder width
    #[serde(default = "default_proportion_range")]
    pub height_to_shoulder_ratio: RealismRange,
}

fn default_shoulder_width_range() -> RealismRange { RealismRange::new(30.0, 60.0, 25.0, 70.0) }
fn default_height_range() -> RealismRange { RealismRange::new(120.0, 220.0, 100.0, 250.0) }
fn default_proportion_range() -> RealismRange { RealismRange::new(2.5, 4.0, 2.0, 5.0) }

impl Default for RealismConfig {
    fn default() -> Self {
        Self {
            shoulder_width_cm: default_shoulder_width_range(),
            height_cm: default_height_range(),
            height_to_shoulder_ratio: default_proportion_range(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [thresholds]
            min_confidence_threshold = 0.75

            [recovery]
            recovery_cooldown_ms = 1500
            "#,
        )
        .unwrap();
        assert!((config.thresholds.min_confidence_threshold - 0.75).abs() < f64::EPSILON);
        assert_eq!(config.recovery.recovery_cooldown_ms, 1500);
        assert_eq!(config.recovery.max_recovery_attempts, 3);
        assert_eq!(config.validation, ValidationConfig::default());
    }

    #[test]
    fn test_validation_collects_every_error() {
        let mut config = PipelineConfig::default();
        config.thresholds.min_confidence_threshold = 1.5;
        config.validation.min_consistency_frames = 20;
        config.confidence_weights.base = 0.9;
        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 3, "unexpected errors: {errors:?}");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_nan_threshold_rejected() {
        let mut config = PipelineConfig::default();
        config.validation.max_variance_threshold = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_device_tier_intervals() {
        assert_eq!(DeviceTier::HighEnd.frame_interval_ms(), 50);
        assert_eq!(DeviceTier::MidRange.frame_interval_ms(), 100);
        assert_eq!(DeviceTier::LowEnd.frame_interval_ms(), 200);
        assert_eq!("low-end".parse::<DeviceTier>(), Ok(DeviceTier::LowEnd));
        assert!("potato".parse::<DeviceTier>().is_err());
        let config = PipelineConfig::default().with_device_tier(DeviceTier::HighEnd);
        assert_eq!(config.timing.frame_processing_interval_ms, 50);
    }

    #[test]
    fn test_diff_reports_changed_leaves() {
        let before = PipelineConfig::default();
        let mut after = before.clone();
        after.validation.max_variance_threshold = 2.0;
        after.timing.adaptive_interval = false;
        let changes = before.diff(&after);
        let keys: Vec<&str> = changes.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["timing.adaptive_interval", "validation.max_variance_threshold"]);
        assert!(before.diff(&before).is_empty());
    }

    #[test]
    fn test_toml_roundtrip_of_defaults() {
        let toml = PipelineConfig::default().to_toml().unwrap();
        let parsed = PipelineConfig::from_toml_str(&toml).unwrap();
        assert_eq!(parsed, PipelineConfig::default());
    }
}
