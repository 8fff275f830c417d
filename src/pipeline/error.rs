//! Per-tick processing errors, each routed to a recovery category.

use super::recovery::RecoveryCategory;

/// A failure inside one sampling-loop tick. Never surfaced to the host;
/// the loop hands it to the recovery manager.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("frame source error: {0}")]
    Source(String),
    #[error("non-finite geometry in {0}")]
    NonFiniteGeometry(&'static str),
    #[error("multi-frame validation failed: {0}")]
    Consistency(String),
    #[error("confidence scoring failed: {0}")]
    Scoring(String),
}

impl PipelineError {
    pub fn category(&self) -> RecoveryCategory {
        match self {
            PipelineError::Source(_) | PipelineError::NonFiniteGeometry(_) => {
                RecoveryCategory::RealtimeProcessing
            }
            PipelineError::Consistency(_) => RecoveryCategory::MultiFrameValidation,
            PipelineError::Scoring(_) => RecoveryCategory::ConfidenceCalculation,
        }
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(e: anyhow::Error) -> Self {
        PipelineError::Source(format!("{e:#}"))
    }
}
