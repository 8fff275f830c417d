//! Shared data structures for the body-measurement pipeline
//!
//! - Landmarks: Joint vocabulary, Landmark, LandmarkSet, LandmarkFrame
//!   (what the platform frame source yields each tick)
//! - Measurement: the value produced by the calculator and refined by
//!   smoothing/scoring, plus scan progress and scoring diagnostics

mod landmarks;
mod measurement;

pub use landmarks::*;
pub use measurement::*;
