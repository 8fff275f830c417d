//! Signal-Conditioning Pipeline
//!
//! ```text
//! STAGE 1: Frame Validator      (plane quality, landmark completeness, distance)
//! STAGE 2: Measurement Calculator (shoulder width, height, base confidence)
//! STAGE 3: Smoothing Buffer     (positional weighted average, last 5)
//! STAGE 4: Consistency Validator (population variance over recent frames)
//! STAGE 5: Confidence Scorer    (4 weighted factors)
//! ```
//!
//! A frame that fails stage 1 or 2 becomes an invalid measurement carrying a
//! user-facing reason. Processing errors are routed to the
//! [`RecoveryManager`] by the sampling loop and never reach the caller.

pub mod calculator;
pub mod confidence;
pub mod consistency;
mod error;
pub mod interval;
pub mod processing_loop;
mod processor;
pub mod recovery;
pub mod smoothing;
pub mod source;
pub mod synthetic;
pub mod validator;

pub use consistency::{ConsistencyValidator, ConsistencyVerdict};
pub use error::PipelineError;
pub use interval::FrameIntervalTuner;
pub use processor::{FrameOutcome, MeasurementPipeline};
pub use recovery::{RecoveryCategory, RecoveryDecision, RecoveryManager, RecoveryPhase};
pub use smoothing::SmoothingBuffer;
pub use source::{PlatformAdapter, PreflightError, ReplaySource, StdinSource};
pub use validator::FrameRejection;

use statrs::statistics::Statistics;

/// Population variance (divide by n); 0 for an empty slice.
pub(crate) fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().population_variance()
}
