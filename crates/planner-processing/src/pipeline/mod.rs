//! Pipeline module.
//!
//! Orchestrates loading, transformation, persistence and validation in a
//! fixed order.

mod builder;
pub mod progress;

pub use builder::{Pipeline, PipelineBuilder, PipelineOutcome, RunResult};
pub use progress::{ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate};
