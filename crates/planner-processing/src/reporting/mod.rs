//! Diagnostics and reports around a pipeline run.
//!
//! - processing statistics and the missing-due diagnostic, logged during a run
//! - the bucket inspection used by `--inspect`
//! - [`RunReport`], printed with `--json` or written with `--emit-report`

mod inspect;
mod report;
mod summary;

pub use inspect::{BucketSummary, InspectionReport, bucket_breakdown, inspect, log_inspection};
pub use report::{RunReport, write_report_to_file};
pub use summary::{MissingDueDiagnostic, diagnose_missing_due, log_processing_stats};
