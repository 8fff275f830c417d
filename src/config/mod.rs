//! Pipeline Configuration Module
//!
//! Every threshold the measurement pipeline uses, loaded from TOML and
//! overridable at runtime from the host application.
//!
//! ## Loading Order
//!
//! 1. `FITFORM_CONFIG` environment variable (path to TOML file)
//! 2. `fitform.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! There is no global instance: each session owns its config and swaps it
//! atomically on reload.
//!
//! ```ignore
//! let session = Session::new(PipelineConfig::load(), adapter)?;
//! session.load_configuration(r#"{"minConfidenceThreshold": 0.75}"#)?;
//! ```

mod pipeline_config;
mod overrides;
pub mod defaults;
pub mod validation;
pub mod watcher;

pub use overrides::ConfigOverrides;
pub use pipeline_config::*;
