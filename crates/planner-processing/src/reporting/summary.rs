//! Processing statistics and the missing-due diagnostic.

use crate::config::ColumnNames;
use crate::normalizer::normalize_label;
use crate::types::TaskTable;
use crate::validation::{bucket_distribution, date_fill_rates};
use serde::Serialize;
use tracing::{info, warn};

/// Number of example records kept by the diagnostic.
const MAX_EXAMPLES: usize = 5;

/// Log the normalized bucket distribution and date fill rates.
pub fn log_processing_stats(table: &TaskTable, columns: &ColumnNames) {
    info!("Bucket distribution:");
    for (bucket, count) in bucket_distribution(table, true) {
        info!("  {}: {} records", bucket, count);
    }
    for (column, rate) in date_fill_rates(table, columns) {
        info!(
            "  {}: {}/{} filled ({:.1}%)",
            column, rate.filled, rate.total, rate.percentage
        );
    }
    info!("Total records processed: {}", table.len());
}

/// Records of one bucket whose due text was present but did not survive
/// parsing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MissingDueDiagnostic {
    pub bucket: String,
    pub records_in_bucket: usize,
    pub unparsed_due: usize,
    /// `(record, raw due text)` for the first few affected records.
    pub examples: Vec<(String, String)>,
}

/// Count records in `target_bucket` with raw due text but no parsed due date.
pub fn diagnose_missing_due(table: &TaskTable, target_bucket: &str) -> MissingDueDiagnostic {
    let target = normalize_label(Some(target_bucket));
    let mut diagnostic = MissingDueDiagnostic {
        bucket: target_bucket.to_string(),
        ..Default::default()
    };

    for record in &table.records {
        if target.is_none() || record.bucket_normalized() != target {
            continue;
        }
        diagnostic.records_in_bucket += 1;
        let Some(raw) = record.due_raw.as_deref() else {
            continue;
        };
        if record.due_at.is_none() && !raw.eq_ignore_ascii_case("nan") {
            diagnostic.unparsed_due += 1;
            if diagnostic.examples.len() < MAX_EXAMPLES {
                diagnostic
                    .examples
                    .push((record.describe(), raw.to_string()));
            }
        }
    }

    if diagnostic.unparsed_due > 0 {
        warn!(
            "{} records in '{}' have due text that could not be parsed",
            diagnostic.unparsed_due, target_bucket
        );
        for (record, raw) in &diagnostic.examples {
            warn!("  {}: '{}'", record, raw);
        }
    }
    diagnostic
}
