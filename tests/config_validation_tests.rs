//! Config Validation Tests
//!
//! Exercise typo detection, range validation, TOML loading, the runtime
//! override payload, and the file watcher independently from the pipeline.

use std::time::Duration;

use fitform_ar::config::validation::{
    known_config_keys, suggest_correction, validate_physical_ranges, validate_unknown_keys,
};
use fitform_ar::config::watcher::{run_config_watcher, ConfigEvent};
use fitform_ar::config::{ConfigError, ConfigOverrides, DeviceTier, PipelineConfig, RealismRange};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_threshold_warns_with_suggestion() {
    let toml_str = r#"
[thresholds]
min_plane_detection_confidance = 0.85
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("min_plane_detection_confidance"));
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("thresholds.min_plane_detection_confidence"),
        "Should suggest the correct spelling"
    );
}

#[test]
fn typo_in_realism_range_warns() {
    let toml_str = r#"
[realism.height_cm]
tigth_min = 120.0
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].suggestion.as_deref(), Some("realism.height_cm.tight_min"));
}

#[test]
fn valid_config_produces_zero_warnings() {
    let toml_str = r#"
[thresholds]
min_confidence_threshold = 0.75
min_plane_detection_confidence = 0.85
min_body_landmarks_required = 9
min_landmark_visibility = 0.6
min_user_distance_m = 1.2
max_user_distance_m = 2.8

[validation]
smoothing_history_size = 6
required_frames_for_validation = 10
max_variance_threshold = 2.0
min_consistency_frames = 6

[timing]
tick_interval_ms = 40
frame_processing_interval_ms = 80
adaptive_interval = false

[recovery]
max_recovery_attempts = 5
recovery_cooldown_ms = 1500

[confidence_weights]
base = 0.25
temporal = 0.25
realism = 0.25
stability = 0.25

[realism.shoulder_width_cm]
tight_min = 32.0
tight_max = 58.0
loose_min = 26.0
loose_max = 68.0
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert!(warnings.is_empty(), "Unexpected warnings: {:?}", warnings);

    let config = PipelineConfig::from_toml_str(toml_str).unwrap();
    assert_eq!(config.validation.required_frames_for_validation, 10);
    assert!(!config.timing.adaptive_interval);
    assert!((config.realism.shoulder_width_cm.loose_max - 68.0).abs() < f64::EPSILON);
    // Untouched sections keep defaults
    assert!((config.realism.height_cm.tight_min - 120.0).abs() < f64::EPSILON);
}

#[test]
fn every_known_key_is_reachable() {
    let known = known_config_keys();
    assert!(known.contains("thresholds.min_confidence_threshold"));
    assert!(known.contains("realism.height_to_shoulder_ratio.loose_max"));
    assert!(!known.contains("realism.height_to_shoulder_ratio.loose"));
}

#[test]
fn distant_typo_has_no_suggestion() {
    let known = known_config_keys();
    assert!(suggest_correction("thresholds.completely_different_setting", &known).is_none());
    assert_eq!(
        suggest_correction("timing.tick_intervl_ms", &known).as_deref(),
        Some("timing.tick_interval_ms")
    );
}

// ============================================================================
// Range Validation
// ============================================================================

#[test]
fn defaults_have_no_range_errors_or_warnings() {
    let (errors, warnings) = validate_physical_ranges(&PipelineConfig::default());
    assert!(errors.is_empty(), "{errors:?}");
    assert!(warnings.is_empty());
}

#[test]
fn loose_range_must_contain_tight_range() {
    let mut config = PipelineConfig::default();
    config.realism.height_to_shoulder_ratio = RealismRange::new(2.5, 4.0, 3.0, 5.0);
    let (errors, _) = validate_physical_ranges(&config);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("must contain tight range"));
}

#[test]
fn validation_reports_every_problem_at_once() {
    let mut config = PipelineConfig::default();
    config.thresholds.min_confidence_threshold = -0.1;
    config.thresholds.min_body_landmarks_required = 12;
    config.validation.min_consistency_frames = 20;
    config.recovery.max_recovery_attempts = 0;
    config.confidence_weights.base = 0.9;

    let Err(ConfigError::Validation(errors)) = config.validate() else {
        panic!("expected validation failure");
    };
    assert!(errors.len() >= 5, "got {errors:?}");
}

#[test]
fn large_variance_threshold_is_only_a_warning() {
    let mut config = PipelineConfig::default();
    config.validation.max_variance_threshold = 40.0;
    let (errors, warnings) = validate_physical_ranges(&config);
    assert!(errors.is_empty());
    assert_eq!(warnings.len(), 1);
    assert!(config.validate().is_ok());
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn load_from_file_reports_path_on_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fitform.toml");
    std::fs::write(&path, "[thresholds\nmin_confidence_threshold = 0.7\n").unwrap();

    let err = PipelineConfig::load_from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("fitform.toml"));
}

#[test]
fn load_from_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = PipelineConfig::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn device_tier_sets_frame_interval() {
    let config = PipelineConfig::default().with_device_tier("low-end".parse::<DeviceTier>().unwrap());
    assert_eq!(config.timing.frame_processing_interval_ms, 200);
    assert!(config.validate().is_ok());
}

// ============================================================================
// Runtime Overrides
// ============================================================================

#[test]
fn overrides_reject_unknown_keys() {
    let err = ConfigOverrides::from_json(r#"{"minConfidence": 0.8}"#).unwrap_err();
    assert!(matches!(err, ConfigError::Payload(_)));
}

#[test]
fn overrides_reject_invalid_merge() {
    let overrides = ConfigOverrides::from_json(
        r#"{"requiredFramesForValidation": 3, "minConsistencyFrames": 5}"#,
    )
    .unwrap();
    assert!(matches!(
        overrides.apply_to(&PipelineConfig::default()),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn empty_overrides_change_nothing() {
    let overrides = ConfigOverrides::from_json("{}").unwrap();
    assert!(overrides.is_empty());
    let base = PipelineConfig::default();
    assert_eq!(overrides.apply_to(&base).unwrap(), base);
}

// ============================================================================
// File Watcher
// ============================================================================

#[tokio::test]
async fn watcher_reports_invalid_edit_without_applying() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fitform.toml");
    std::fs::write(&path, "[recovery]\nmax_recovery_attempts = 3\n").unwrap();

    let (tx, mut rx) = mpsc::channel(4);
    let cancel = CancellationToken::new();
    let (applied_tx, mut applied_rx) = mpsc::unbounded_channel::<PipelineConfig>();
    let watcher = tokio::spawn(run_config_watcher(
        path.clone(),
        move |config: PipelineConfig| {
            config.validate()?;
            let changes = PipelineConfig::default().diff(&config);
            let _ = applied_tx.send(config);
            Ok(changes)
        },
        tx,
        cancel.clone(),
    ));

    // Ensure the new mtime differs from the initial one
    tokio::time::sleep(Duration::from_millis(1100)).await;
    std::fs::write(&path, "[recovery]\nmax_recovery_attempts = 0\n").unwrap();

    let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("watcher should report the failed reload")
        .unwrap();
    match event {
        ConfigEvent::Error(message) => assert!(message.contains("max_recovery_attempts")),
        ConfigEvent::Reloaded(changes) => panic!("invalid config was applied: {changes:?}"),
    }
    assert!(applied_rx.try_recv().is_err());

    cancel.cancel();
    watcher.await.unwrap();
}
