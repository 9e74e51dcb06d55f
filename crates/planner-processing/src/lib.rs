//! Task Export Processing Library
//!
//! Normalizes and validates task exports from a project-tracking tool.
//!
//! # Overview
//!
//! - **Label Normalization**: one accent-insensitive comparison for bucket
//!   labels and the allow-list alike
//! - **Date Parsing**: multi-format parsing that separates recognized-but-failed
//!   values from values that were never dates
//! - **Bucket Rules**: start and due dates are removed from buckets outside
//!   the allow-list, with a per-label audit trail
//! - **Start-Date Inference**: missing start dates derived from the due date
//! - **Output Validation**: the persisted file is reloaded and compared with
//!   the parsed input for row, identifier, date and rule drift
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use planner_processing::{Pipeline, PlannerConfig};
//! use std::path::Path;
//!
//! let pipeline = Pipeline::builder()
//!     .config(PlannerConfig::builder().start_date_offset_days(20).build()?)
//!     .build()?;
//!
//! let input = pipeline.resolve_input(None, Path::new("inputs"))?;
//! let result = pipeline.run(&input, Path::new("outputs"), true)?;
//!
//! if !result.passed() {
//!     eprintln!("Validation failed, see {}", result.output_path.display());
//! }
//! ```
//!
//! # Working on records directly
//!
//! The core steps also run without any file involved:
//!
//! ```rust,ignore
//! use planner_processing::{AllowList, DateField, apply_bucket_rules, infer_start_dates};
//!
//! let allowed = AllowList::new(["execução", "concluído"]);
//! let audit = apply_bucket_rules(&mut records, &DateField::BUCKET_GOVERNED, &allowed, &AllowList::default());
//! let summary = infer_start_dates(&mut records, DateField::StartAt, DateField::DueAt, 20);
//! ```

pub mod config;
pub mod dates;
pub mod error;
pub mod frame;
pub mod io;
pub mod normalizer;
pub mod pipeline;
pub mod reporting;
pub mod rules;
pub mod types;
pub mod validation;

// Re-exports for convenient access
pub use config::{
    ColumnMapping, ColumnNames, ConfigValidationError, FilePattern, PlannerConfig,
    PlannerConfigBuilder, ValidationThresholds,
};
pub use dates::{DateInput, DateParser, ParseOutcome, ParseStats, parse_date};
pub use error::{PlannerError, Result as PlannerResult, ResultExt};
pub use normalizer::{AllowList, normalize_label};
pub use pipeline::{
    ClosureProgressReporter, Pipeline, PipelineBuilder, PipelineOutcome, PipelineStage,
    ProgressReporter, ProgressUpdate, RunResult,
};
pub use reporting::{InspectionReport, RunReport};
pub use rules::{BucketAudit, InferenceSummary, apply_bucket_rules, infer_start_dates};
pub use types::{CheckResult, DateField, Severity, TaskRecord, TaskTable};
pub use validation::{OutputValidator, ValidationReport};
