//! Read-only inspection of an export: how each bucket label will be treated
//! and what the date columns contain.

use crate::config::PlannerConfig;
use crate::dates::{DateColumnProfile, analyze_date_values};
use crate::error::Result;
use crate::normalizer::AllowList;
use crate::types::{DateField, TaskTable};
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketSummary {
    pub raw_label: String,
    pub normalized: Option<String>,
    /// Whether the bucket keeps its start and due dates.
    pub permitted: bool,
    pub records: usize,
    pub with_start: usize,
    pub with_due: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectionReport {
    pub allow_list: Vec<String>,
    pub buckets: Vec<BucketSummary>,
    pub date_columns: Vec<DateColumnProfile>,
}

/// Per raw bucket label: normalized form, permitted status and date fill
/// counts. Computed on parsed records, before any rule runs.
pub fn bucket_breakdown(table: &TaskTable, allowed: &AllowList) -> Vec<BucketSummary> {
    let mut summaries: BTreeMap<String, BucketSummary> = BTreeMap::new();
    for record in &table.records {
        let raw = record
            .bucket_raw
            .clone()
            .unwrap_or_else(|| "<empty>".to_string());
        let summary = summaries.entry(raw.clone()).or_insert_with(|| {
            let normalized = record.bucket_normalized();
            BucketSummary {
                permitted: normalized
                    .as_deref()
                    .is_some_and(|n| allowed.contains_normalized(n)),
                raw_label: raw,
                normalized,
                records: 0,
                with_start: 0,
                with_due: 0,
            }
        });
        summary.records += 1;
        summary.with_start += usize::from(record.date(DateField::StartAt).is_some());
        summary.with_due += usize::from(record.date(DateField::DueAt).is_some());
    }
    summaries.into_values().collect()
}

/// Build the inspection report. `df` is the renamed but unparsed frame.
pub fn inspect(df: &DataFrame, table: &TaskTable, config: &PlannerConfig) -> Result<InspectionReport> {
    let allowed = AllowList::new(&config.active_buckets);

    let mut date_columns = Vec::new();
    for field in DateField::ALL {
        let name = config.columns.date_column(field);
        let Ok(column) = df.column(name) else {
            continue;
        };
        let column = column.cast(&DataType::String)?;
        let values: Vec<Option<String>> = column
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect();
        date_columns.push(analyze_date_values(name, &values));
    }

    Ok(InspectionReport {
        allow_list: allowed.iter().map(str::to_string).collect(),
        buckets: bucket_breakdown(table, &allowed),
        date_columns,
    })
}

/// Log an inspection report in readable form.
pub fn log_inspection(report: &InspectionReport) {
    info!("Allowed buckets (normalized): {}", report.allow_list.join(", "));
    for bucket in &report.buckets {
        info!(
            "'{}' -> '{}': {} ({} records, start {}/{}, due {}/{})",
            bucket.raw_label,
            bucket.normalized.as_deref().unwrap_or(""),
            if bucket.permitted {
                "dates kept"
            } else {
                "dates removed"
            },
            bucket.records,
            bucket.with_start,
            bucket.records,
            bucket.with_due,
            bucket.records
        );
    }
    for column in &report.date_columns {
        info!(
            "{}: {} rows, {} null, {} empty, {} 'nan', {} with data, formats [{}]",
            column.column,
            column.total_rows,
            column.null_values,
            column.empty_values,
            column.nan_strings,
            column.valid_data,
            column.formats_detected.join(", ")
        );
    }
}
