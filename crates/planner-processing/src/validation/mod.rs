//! Output validation.
//!
//! Compares the pre-transform snapshot with the records reloaded from the
//! persisted file. ERROR results fail the run; WARNING results are surfaced
//! without blocking.

mod statistics;
mod validator;

pub use statistics::{
    DatasetSummary, ValidationStatistics, bucket_distribution, date_fill_rates,
    generate_statistics,
};
pub use validator::{
    BUCKET_RULES, CONSISTENCY, CRITICAL_DATES, DateLoss, IDENTIFIERS, OutputValidator, ROW_COUNT,
    ValidationReport, log_report,
};
