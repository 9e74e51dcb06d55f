//! Date rules applied after parsing, in this order: bucket rules first, then
//! start-date inference.

mod bucket_rules;
mod inference;

pub use bucket_rules::{BucketAudit, apply_bucket_rules};
pub use inference::{InferenceSummary, RangeViolation, infer_start_dates};
