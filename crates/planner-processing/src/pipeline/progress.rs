//! Stage progress reporting for the pipeline.
//!
//! # Example
//!
//! ```rust,ignore
//! use planner_processing::Pipeline;
//!
//! let result = Pipeline::builder()
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run(&input, &output_dir, true)?;
//! ```

use serde::{Deserialize, Serialize};

/// Stages of a pipeline run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Locating and reading the input file
    Loading,
    /// Converting rows into records and parsing dates
    Parsing,
    /// Nulling dates of buckets outside the allow-list
    BucketRules,
    /// Filling start dates from due dates
    Inference,
    /// Writing the output file
    Saving,
    /// Comparing the persisted output with the input
    Validation,
    Complete,
    Failed,
}

impl PipelineStage {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Loading => "Loading Input",
            Self::Parsing => "Parsing Dates",
            Self::BucketRules => "Applying Bucket Rules",
            Self::Inference => "Inferring Start Dates",
            Self::Saving => "Saving Output",
            Self::Validation => "Validating Output",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }

    /// Cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Loading => 0.0,
            Self::Parsing => 0.15,
            Self::BucketRules => 0.40,
            Self::Inference => 0.55,
            Self::Saving => 0.65,
            Self::Validation => 0.80,
            Self::Complete => 1.0,
            Self::Failed => 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: PipelineStage,
    /// Overall progress (0.0 - 1.0)
    pub progress: f32,
    pub message: String,
}

static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

impl ProgressUpdate {
    /// Update marking the start of `stage`.
    pub fn new(stage: PipelineStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress: stage.base_progress(),
            message: message.into(),
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(PipelineStage::Complete, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(PipelineStage::Failed, message)
    }
}

/// Receives progress updates from the pipeline.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// [`ProgressReporter`] backed by a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_stage_progress_is_monotonic() {
        let stages = [
            PipelineStage::Loading,
            PipelineStage::Parsing,
            PipelineStage::BucketRules,
            PipelineStage::Inference,
            PipelineStage::Saving,
            PipelineStage::Validation,
            PipelineStage::Complete,
        ];
        for pair in stages.windows(2) {
            assert!(pair[0].base_progress() < pair[1].base_progress());
        }
    }

    #[test]
    fn test_closure_reporter_receives_updates() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = ClosureProgressReporter::new(move |update: ProgressUpdate| {
            sink.lock().unwrap().push(update.stage);
        });

        reporter.report(ProgressUpdate::new(PipelineStage::Loading, "start"));
        reporter.report(ProgressUpdate::complete("done"));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![PipelineStage::Loading, PipelineStage::Complete]
        );
    }

    #[test]
    fn test_update_serialization() {
        let json = serde_json::to_string(&ProgressUpdate::new(PipelineStage::BucketRules, "x")).unwrap();
        assert!(json.contains("\"bucket_rules\""));
    }
}
