//! Config validation: unknown-key detection with Levenshtein suggestions
//! and physiological range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

use super::RealismRange;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

const RANGE_FIELDS: [&str; 4] = ["tight_min", "tight_max", "loose_min", "loose_max"];
const RANGE_TABLES: [&str; 3] = ["shoulder_width_cm", "height_cm", "height_to_shoulder_ratio"];

/// Returns the complete set of valid dotted key paths for PipelineConfig.
///
/// Must be kept in step with the struct hierarchy in pipeline_config.rs.
pub fn known_config_keys() -> HashSet<String> {
    let fixed: &[&str] = &[
        // [thresholds]
        "thresholds",
        "thresholds.min_confidence_threshold",
        "thresholds.min_plane_detection_confidence",
        "thresholds.min_body_landmarks_required",
        "thresholds.min_landmark_visibility",
        "thresholds.min_user_distance_m",
        "thresholds.max_user_distance_m",
        // [validation]
        "validation",
        "validation.smoothing_history_size",
        "validation.required_frames_for_validation",
        "validation.max_variance_threshold",
        "validation.min_consistency_frames",
        // [timing]
        "timing",
        "timing.tick_interval_ms",
        "timing.frame_processing_interval_ms",
        "timing.adaptive_interval",
        // [recovery]
        "recovery",
        "recovery.max_recovery_attempts",
        "recovery.recovery_cooldown_ms",
        // [confidence_weights]
        "confidence_weights",
        "confidence_weights.base",
        "confidence_weights.temporal",
        "confidence_weights.realism",
        "confidence_weights.stability",
        // [realism]
        "realism",
    ];

    let mut keys: HashSet<String> = fixed.iter().map(|k| (*k).to_string()).collect();
    for table in RANGE_TABLES {
        keys.insert(format!("realism.{table}"));
        for field in RANGE_FIELDS {
            keys.insert(format!("realism.{table}.{field}"));
        }
    }
    keys
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// A table `{ a = { b = 1, c = 2 } }` yields `["a", "a.b", "a.c"]`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<String>) -> Option<String> {
    known
        .iter()
        .map(|k| (k, levenshtein(unknown, k)))
        .filter(|(_, dist)| *dist <= 3)
        // Tie-break on the key itself so suggestions are deterministic
        .min_by(|(ka, da), (kb, db)| da.cmp(db).then_with(|| ka.cmp(kb)))
        .map(|(k, _)| k.clone())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// Never fails on unknown keys; parse errors are left to serde.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key))
        .map(|key| ValidationWarning {
            message: format!("Unknown config key '{key}'"),
            suggestion: suggest_correction(&key, &known),
            field: key,
        })
        .collect()
}

// ============================================================================
// Physiological Range Validation
// ============================================================================

/// Validate ranges and cross-field relationships on a parsed PipelineConfig.
///
/// Returns (errors, warnings). Errors are impossible settings that must be
/// rejected; warnings are legal but will make the pipeline behave oddly.
pub fn validate_physical_ranges(
    config: &super::PipelineConfig,
) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let r = &config.realism;
    check_range(&r.shoulder_width_cm, "realism.shoulder_width_cm", &mut errors);
    check_range(&r.height_cm, "realism.height_cm", &mut errors);
    check_range(&r.height_to_shoulder_ratio, "realism.height_to_shoulder_ratio", &mut errors);

    // Human heights outside 50-300 cm are almost certainly a unit mix-up (m vs cm)
    if r.height_cm.loose_max < 50.0 || r.height_cm.loose_min > 300.0 {
        errors.push(format!(
            "realism.height_cm loose range [{:.1}, {:.1}] is not in centimeters",
            r.height_cm.loose_min, r.height_cm.loose_max
        ));
    }

    let v = &config.validation;
    if v.smoothing_history_size < crate::config::defaults::SMOOTHING_MIN_HISTORY {
        warnings.push(ValidationWarning {
            field: "validation.smoothing_history_size".to_string(),
            message: format!(
                "validation.smoothing_history_size = {} is below {}, smoothing will never engage",
                v.smoothing_history_size,
                crate::config::defaults::SMOOTHING_MIN_HISTORY
            ),
            suggestion: None,
        });
    }
    if v.max_variance_threshold > 25.0 {
        warnings.push(ValidationWarning {
            field: "validation.max_variance_threshold".to_string(),
            message: format!(
                "validation.max_variance_threshold = {:.1} cm² accepts a ±5 cm spread as consistent",
                v.max_variance_threshold
            ),
            suggestion: None,
        });
    }

    let t = &config.timing;
    if t.tick_interval_ms > 0 && t.frame_processing_interval_ms < t.tick_interval_ms {
        warnings.push(ValidationWarning {
            field: "timing.frame_processing_interval_ms".to_string(),
            message: format!(
                "timing.frame_processing_interval_ms ({}) is shorter than tick_interval_ms ({}), frames are limited by the tick",
                t.frame_processing_interval_ms, t.tick_interval_ms
            ),
            suggestion: None,
        });
    }

    (errors, warnings)
}

fn check_range(range: &RealismRange, name: &str, errors: &mut Vec<String>) {
    let values = [range.tight_min, range.tight_max, range.loose_min, range.loose_max];
    if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
        errors.push(format!("{name}: bounds must be finite and non-negative"));
        return;
    }
    if range.tight_min > range.tight_max || range.loose_min > range.loose_max {
        errors.push(format!("{name}: min must be <= max"));
    }
    if range.loose_min > range.tight_min || range.loose_max < range.tight_max {
        errors.push(format!(
            "{name}: loose range [{:.1}, {:.1}] must contain tight range [{:.1}, {:.1}]",
            range.loose_min, range.loose_max, range.tight_min, range.tight_max
        ));
    }
}
