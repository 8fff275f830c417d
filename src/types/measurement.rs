//! Measurement types: Measurement, ScanStatus, ScanType, ScanProgress, ConfidenceFactors

use serde::{Deserialize, Serialize};

// ============================================================================
// Scan Progress
// ============================================================================

/// Overall progress of the front/side scan pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    #[default]
    Idle,
    InProgress,
    Completed,
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanStatus::Idle => write!(f, "idle"),
            ScanStatus::InProgress => write!(f, "in_progress"),
            ScanStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Which capture pose a scan covers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    Front,
    Side,
}

impl ScanType {
    /// Parse the host-facing scan name (`"front"` / `"side"`).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "front" => Some(ScanType::Front),
            "side" => Some(ScanType::Side),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanType::Front => write!(f, "front"),
            ScanType::Side => write!(f, "side"),
        }
    }
}

/// Front/side completion flags carried by a session and stamped on measurements.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScanProgress {
    pub front_scan_completed: bool,
    pub side_scan_completed: bool,
}

impl ScanProgress {
    pub fn mark(&mut self, scan: ScanType) {
        match scan {
            ScanType::Front => self.front_scan_completed = true,
            ScanType::Side => self.side_scan_completed = true,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.front_scan_completed && self.side_scan_completed
    }

    /// Status while a session is active: completed once both scans are marked.
    pub fn status(&self) -> ScanStatus {
        if self.is_complete() {
            ScanStatus::Completed
        } else {
            ScanStatus::InProgress
        }
    }
}

// ============================================================================
// Measurement
// ============================================================================

/// A body measurement for one frame (or a smoothed/scored refinement of one).
///
/// Values are never mutated in place; smoothing and scoring return new copies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub shoulder_width_cm: f64,
    pub height_cm: f64,
    /// Always within [0, 1].
    pub confidence: f64,
    pub timestamp_ms: i64,
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    #[serde(default)]
    pub front_scan_completed: bool,
    #[serde(default)]
    pub side_scan_completed: bool,
    #[serde(default)]
    pub scan_status: ScanStatus,
}

impl Measurement {
    /// A valid measurement; confidence is clamped to [0, 1].
    pub fn valid(shoulder_width_cm: f64, height_cm: f64, confidence: f64, timestamp_ms: i64) -> Self {
        Self {
            shoulder_width_cm,
            height_cm,
            confidence: clamp_unit(confidence),
            timestamp_ms,
            is_valid: true,
            error_reason: None,
            front_scan_completed: false,
            side_scan_completed: false,
            scan_status: ScanStatus::Idle,
        }
    }

    /// A rejected frame: zero dimensions, zero confidence, and a user-facing reason.
    pub fn rejected(reason: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            shoulder_width_cm: 0.0,
            height_cm: 0.0,
            confidence: 0.0,
            timestamp_ms,
            is_valid: false,
            error_reason: Some(reason.into()),
            front_scan_completed: false,
            side_scan_completed: false,
            scan_status: ScanStatus::Idle,
        }
    }

    /// Copy with a new (clamped) confidence.
    pub fn with_confidence(&self, confidence: f64) -> Self {
        Self {
            confidence: clamp_unit(confidence),
            ..self.clone()
        }
    }

    /// Copy with new dimensions and confidence.
    pub fn with_values(&self, shoulder_width_cm: f64, height_cm: f64, confidence: f64) -> Self {
        Self {
            shoulder_width_cm,
            height_cm,
            confidence: clamp_unit(confidence),
            ..self.clone()
        }
    }

    /// Copy stamped with the session's scan flags and derived status.
    pub fn with_scan_progress(&self, progress: ScanProgress) -> Self {
        Self {
            front_scan_completed: progress.front_scan_completed,
            side_scan_completed: progress.side_scan_completed,
            scan_status: progress.status(),
            ..self.clone()
        }
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

// ============================================================================
// Confidence Diagnostics
// ============================================================================

/// Most recent scoring inputs and output. Written by the scorer for display,
/// never read back by it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct ConfidenceFactors {
    pub base: f64,
    pub temporal: f64,
    pub realism: f64,
    pub stability: f64,
    pub enhanced: f64,
}
