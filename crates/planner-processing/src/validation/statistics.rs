//! Comparative statistics printed alongside the validation results.

use crate::config::ColumnNames;
use crate::types::{DateField, FillRate, TaskTable};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub rows: usize,
    pub columns: usize,
}

impl DatasetSummary {
    pub fn of(table: &TaskTable) -> Self {
        Self {
            rows: table.len(),
            columns: table.columns.len(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationStatistics {
    pub input: DatasetSummary,
    pub output: DatasetSummary,
    /// Fill rate of the start, due and completion columns in the output.
    pub date_fill: BTreeMap<String, FillRate>,
    /// Output record count per raw bucket label.
    pub bucket_distribution: BTreeMap<String, usize>,
}

/// Fill rates of the start, due and completion dates.
pub fn date_fill_rates(table: &TaskTable, columns: &ColumnNames) -> BTreeMap<String, FillRate> {
    [DateField::StartAt, DateField::DueAt, DateField::CompletedAt]
        .into_iter()
        .map(|field| {
            let filled = table
                .records
                .iter()
                .filter(|r| r.date(field).is_some())
                .count();
            (
                columns.date_column(field).to_string(),
                FillRate::new(filled, table.len()),
            )
        })
        .collect()
}

/// Record count per bucket label. `normalized` groups equivalent spellings.
pub fn bucket_distribution(table: &TaskTable, normalized: bool) -> BTreeMap<String, usize> {
    let mut distribution = BTreeMap::new();
    for record in &table.records {
        let label = if normalized {
            record.bucket_normalized()
        } else {
            record.bucket_raw.clone()
        };
        *distribution
            .entry(label.unwrap_or_else(|| "<empty>".to_string()))
            .or_insert(0) += 1;
    }
    distribution
}

pub fn generate_statistics(
    original: &TaskTable,
    transformed: &TaskTable,
    columns: &ColumnNames,
) -> ValidationStatistics {
    ValidationStatistics {
        input: DatasetSummary::of(original),
        output: DatasetSummary::of(transformed),
        date_fill: date_fill_rates(transformed, columns),
        bucket_distribution: bucket_distribution(transformed, false),
    }
}
