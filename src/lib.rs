//! FitForm AR: body-measurement signal conditioning
//!
//! Turns a stream of noisy 3D body landmarks from a platform tracker into
//! trustworthy shoulder-width and height measurements.
//!
//! ## Architecture
//!
//! - **Frame Validator**: gates frames on plane quality, landmark completeness, and distance
//! - **Measurement Calculator**: shoulder width, height, and base confidence
//! - **Smoothing Buffer / Consistency Validator**: multi-frame stabilisation
//! - **Confidence Scorer**: 4-factor weighted confidence
//! - **Recovery Manager**: bounded per-category retry with cooldowns
//! - **Session**: lifecycle, sampling loop, and the host-facing API

pub mod config;
pub mod pipeline;
pub mod session;
pub mod types;

// Re-export configuration
pub use config::{ConfigError, ConfigOverrides, DeviceTier, PipelineConfig};

// Re-export commonly used types
pub use types::{
    ConfidenceFactors, Joint, Landmark, LandmarkFrame, LandmarkSet, Measurement, ScanProgress,
    ScanStatus, ScanType, REQUIRED_JOINTS,
};

// Re-export pipeline components
pub use pipeline::{
    MeasurementPipeline, PipelineError, PlatformAdapter, PreflightError, RecoveryCategory,
    ReplaySource, StdinSource,
};

// Re-export session API
pub use session::{Session, SessionError, SessionStatus};
