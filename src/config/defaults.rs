//! Pipeline-wide constants that are not operator-tunable.
//!
//! Tunable thresholds live in [`PipelineConfig`](super::PipelineConfig);
//! the values here are fixed properties of the algorithms.

// ============================================================================
// Config Loading
// ============================================================================

/// Environment variable naming a pipeline config TOML file.
pub const CONFIG_ENV_VAR: &str = "FITFORM_CONFIG";

/// Config file looked up in the working directory when the env var is unset.
pub const DEFAULT_CONFIG_FILE: &str = "fitform.toml";

// ============================================================================
// Measurement Calculator
// ============================================================================

/// Bonus added to base confidence for each plausibility check that passes.
pub const PLAUSIBILITY_BONUS: f64 = 0.1;

/// Shoulder width considered plausible for the base-confidence bonus (cm).
pub const PLAUSIBLE_SHOULDER_WIDTH_CM: (f64, f64) = (30.0, 60.0);

/// Height considered plausible for the base-confidence bonus (cm).
pub const PLAUSIBLE_HEIGHT_CM: (f64, f64) = (120.0, 220.0);

/// Height must exceed this multiple of shoulder width for the proportion bonus.
pub const MIN_HEIGHT_TO_SHOULDER_RATIO: f64 = 2.5;

/// Maximum left/right shoulder vertical offset for the symmetry bonus (m).
pub const SHOULDER_SYMMETRY_TOLERANCE_M: f64 = 0.1;

// ============================================================================
// Smoothing Buffer
// ============================================================================

/// Buffered measurements required before smoothing engages.
pub const SMOOTHING_MIN_HISTORY: usize = 3;

/// Positional weights applied to the most recent entries, oldest first.
pub const SMOOTHING_WEIGHTS: [f64; 4] = [0.1, 0.2, 0.3, 0.4];

/// Weight for any entry past the end of [`SMOOTHING_WEIGHTS`].
pub const SMOOTHING_FALLBACK_WEIGHT: f64 = 0.1;

/// Smoothed shoulder width outside this range falls back to the raw value (cm).
pub const SMOOTHED_SHOULDER_WIDTH_RANGE_CM: (f64, f64) = (20.0, 80.0);

/// Smoothed height outside this range falls back to the raw value (cm).
pub const SMOOTHED_HEIGHT_RANGE_CM: (f64, f64) = (100.0, 250.0);

// ============================================================================
// Confidence Scorer
// ============================================================================

/// Smoothing-buffer entries considered by the temporal factor.
pub const TEMPORAL_WINDOW: usize = 5;

/// Entries required before the temporal factor leaves its neutral value.
pub const TEMPORAL_MIN_HISTORY: usize = 3;

/// Temporal factor when history is too short to judge.
pub const TEMPORAL_NEUTRAL_SCORE: f64 = 0.5;

/// Shoulder-width variance (cm²) at which the temporal width term reaches zero.
pub const TEMPORAL_WIDTH_VARIANCE_SCALE: f64 = 10.0;

/// Height variance (cm²) at which the temporal height term reaches zero.
pub const TEMPORAL_HEIGHT_VARIANCE_SCALE: f64 = 20.0;

/// Realism score inside the tight range.
pub const REALISM_TIGHT_SCORE: f64 = 1.0;
/// Realism score inside the loose range.
pub const REALISM_LOOSE_SCORE: f64 = 0.7;
/// Realism score outside both ranges.
pub const REALISM_OUTSIDE_SCORE: f64 = 0.3;

pub const STABILITY_CONSISTENT_SCORE: f64 = 1.0;
pub const STABILITY_INCONSISTENT_SCORE: f64 = 0.5;
pub const STABILITY_INSUFFICIENT_SCORE: f64 = 0.7;

// ============================================================================
// Sampling Loop
// ============================================================================

/// Recent tick durations averaged by the adaptive interval tuner.
pub const FRAME_TIMING_WINDOW: usize = 5;

/// Average processing time above `base × this` lengthens the interval.
pub const ADAPTIVE_SLOW_FACTOR: f64 = 1.2;
/// Multiplier applied to the base interval when processing is slow.
pub const ADAPTIVE_SLOW_MULTIPLIER: f64 = 1.5;
/// Upper bound on a lengthened interval (ms).
pub const ADAPTIVE_MAX_INTERVAL_MS: u64 = 300;

/// Average processing time below `base × this` shortens the interval.
pub const ADAPTIVE_FAST_FACTOR: f64 = 0.7;
/// Multiplier applied to the base interval when processing is fast.
pub const ADAPTIVE_FAST_MULTIPLIER: f64 = 0.8;
/// Lower bound on a shortened interval (ms).
pub const ADAPTIVE_MIN_INTERVAL_MS: u64 = 30;

/// Capacity of the measurement-update broadcast channel.
pub const MEASUREMENT_CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// Recovery Manager
// ============================================================================

/// Exhausted categories reset after `recovery_cooldown_ms × this`.
pub const EXHAUSTED_RESET_MULTIPLIER: u32 = 2;
