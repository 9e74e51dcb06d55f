//! Post-hoc comparison of a transformed dataset against its input.

use super::statistics::{ValidationStatistics, generate_statistics};
use crate::config::{ColumnNames, PlannerConfig, ValidationThresholds};
use crate::normalizer::{AllowList, normalize_label};
use crate::types::{CheckResult, DateField, Severity, TaskRecord, TaskTable};
use chrono::{Datelike, Local};
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{error, info, warn};

pub const ROW_COUNT: &str = "row_count";
pub const IDENTIFIERS: &str = "identifiers";
pub const CRITICAL_DATES: &str = "critical_dates";
pub const BUCKET_RULES: &str = "bucket_rules";
pub const CONSISTENCY: &str = "consistency";

/// Outcome of a full validation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    /// False as soon as one ERROR-severity check failed.
    pub passed: bool,
    pub results: Vec<CheckResult>,
    pub statistics: ValidationStatistics,
}

impl ValidationReport {
    pub fn result(&self, name: &str) -> Option<&CheckResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// Failed checks that do not block success.
    pub fn warnings(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|r| !r.passed && !r.is_blocking())
    }
}

/// Input-vs-output counts for one date column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateLoss {
    pub input_valid: usize,
    pub output_valid: usize,
    pub difference: i64,
    /// Lost share of the input dates; negative when dates were added.
    pub loss_ratio: f64,
}

/// Compares an original dataset with the transformed one.
///
/// The validator shares the record schema with the pipeline but none of its
/// state; it can run on any pair of tables.
pub struct OutputValidator {
    columns: ColumnNames,
    thresholds: ValidationThresholds,
    allowed: AllowList,
    forbidden: AllowList,
    due_required: Option<String>,
    reference_year: i32,
}

impl OutputValidator {
    pub fn new(config: &PlannerConfig) -> Self {
        Self {
            columns: config.columns.clone(),
            thresholds: config.thresholds.clone(),
            allowed: AllowList::new(&config.active_buckets),
            forbidden: AllowList::new(&config.inactive_buckets),
            due_required: normalize_label(Some(&config.due_required_bucket)),
            reference_year: config
                .thresholds
                .reference_year
                .unwrap_or_else(|| Local::now().year()),
        }
    }

    /// Run every check. `passed` is the conjunction of the ERROR-severity
    /// checks; warnings are reported but never block.
    pub fn validate(&self, original: &TaskTable, transformed: &TaskTable) -> ValidationReport {
        info!("Validating output against input...");

        let results = vec![
            self.validate_row_count(&original.records, &transformed.records),
            self.validate_identifiers(&original.records, &transformed.records),
            self.validate_critical_dates(&original.records, &transformed.records),
            self.validate_bucket_rules(&transformed.records),
            self.validate_consistency(&transformed.records),
        ];

        let passed = !results.iter().any(CheckResult::is_blocking);
        ValidationReport {
            passed,
            results,
            statistics: generate_statistics(original, transformed, &self.columns),
        }
    }

    pub fn validate_row_count(
        &self,
        original: &[TaskRecord],
        transformed: &[TaskRecord],
    ) -> CheckResult {
        let (input_rows, output_rows) = (original.len(), transformed.len());
        let result = if input_rows == output_rows {
            CheckResult::pass(
                ROW_COUNT,
                format!("Row count preserved: {}", input_rows),
            )
        } else {
            CheckResult::fail(
                ROW_COUNT,
                Severity::Error,
                format!(
                    "Rows changed: {} -> {} (difference: {})",
                    input_rows,
                    output_rows,
                    input_rows as i64 - output_rows as i64
                ),
            )
            .with_detail("difference", input_rows as i64 - output_rows as i64)
        };
        result
            .with_detail("input_rows", input_rows)
            .with_detail("output_rows", output_rows)
    }

    pub fn validate_identifiers(
        &self,
        original: &[TaskRecord],
        transformed: &[TaskRecord],
    ) -> CheckResult {
        let ids = |records: &[TaskRecord]| -> BTreeSet<String> {
            records.iter().filter_map(|r| r.id.clone()).collect()
        };
        let input_ids = ids(original);
        let output_ids = ids(transformed);

        if input_ids.is_empty() && output_ids.is_empty() {
            let mut result = CheckResult::pass(IDENTIFIERS, "No identifiers found to validate");
            result.severity = Severity::Warning;
            return result;
        }

        let missing: Vec<&String> = input_ids.difference(&output_ids).collect();
        let extra: Vec<&String> = output_ids.difference(&input_ids).collect();

        if missing.is_empty() && extra.is_empty() {
            return CheckResult::pass(
                IDENTIFIERS,
                format!("All {} identifiers preserved", input_ids.len()),
            )
            .with_detail("total_ids", input_ids.len());
        }

        let mut issues = Vec::new();
        if !missing.is_empty() {
            issues.push(format!("{} identifiers lost", missing.len()));
        }
        if !extra.is_empty() {
            issues.push(format!("{} identifiers added", extra.len()));
        }

        let limit = self.thresholds.max_reported_ids;
        CheckResult::fail(
            IDENTIFIERS,
            Severity::Error,
            format!("Identifier mismatch: {}", issues.join(", ")),
        )
        .with_detail("missing_ids", &missing[..missing.len().min(limit)])
        .with_detail("extra_ids", &extra[..extra.len().min(limit)])
        .with_detail("missing_count", missing.len())
        .with_detail("extra_count", extra.len())
    }

    /// Whether `field` may legitimately hold a value on `record`.
    fn date_permitted(&self, record: &TaskRecord, field: DateField) -> bool {
        !DateField::BUCKET_GOVERNED.contains(&field)
            || record
                .bucket_normalized()
                .is_some_and(|n| self.allowed.contains_normalized(&n))
    }

    fn count_dates(&self, records: &[TaskRecord], field: DateField) -> usize {
        records
            .iter()
            .filter(|r| r.date(field).is_some() && self.date_permitted(r, field))
            .count()
    }

    /// Loss per date column. Dates the bucket rule forbids are left out of
    /// both counts, so rule-driven nulling is not reported as loss.
    pub fn date_losses(
        &self,
        original: &[TaskRecord],
        transformed: &[TaskRecord],
    ) -> BTreeMap<DateField, DateLoss> {
        DateField::ALL
            .into_iter()
            .map(|field| {
                let input_valid = self.count_dates(original, field);
                let output_valid = self.count_dates(transformed, field);
                let difference = input_valid as i64 - output_valid as i64;
                let loss_ratio = if input_valid > 0 {
                    difference as f64 / input_valid as f64
                } else {
                    0.0
                };
                (
                    field,
                    DateLoss {
                        input_valid,
                        output_valid,
                        difference,
                        loss_ratio,
                    },
                )
            })
            .collect()
    }

    pub fn validate_critical_dates(
        &self,
        original: &[TaskRecord],
        transformed: &[TaskRecord],
    ) -> CheckResult {
        let losses = self.date_losses(original, transformed);
        let mut issues = Vec::new();

        for (field, loss) in &losses {
            let threshold = if *field == DateField::DueAt {
                self.thresholds.due_date_loss
            } else {
                self.thresholds.other_date_loss
            };
            if loss.input_valid > 0 && loss.loss_ratio > threshold {
                issues.push(format!(
                    "{}: {:.1}% lost ({} -> {})",
                    self.columns.date_column(*field),
                    loss.loss_ratio * 100.0,
                    loss.input_valid,
                    loss.output_valid
                ));
            }
        }

        let details: BTreeMap<&str, &DateLoss> = losses
            .iter()
            .map(|(field, loss)| (self.columns.date_column(*field), loss))
            .collect();

        let result = if issues.is_empty() {
            CheckResult::pass(CRITICAL_DATES, "Date columns preserved within tolerance")
        } else {
            CheckResult::fail(
                CRITICAL_DATES,
                Severity::Error,
                format!("Significant date loss: {}", issues.join("; ")),
            )
            .with_detail("issues", &issues)
        };
        result.with_detail("columns", details)
    }

    pub fn validate_bucket_rules(&self, transformed: &[TaskRecord]) -> CheckResult {
        let mut issues = Vec::new();
        let mut offending: BTreeMap<String, (usize, usize)> = BTreeMap::new();

        for record in transformed {
            let normalized = record.bucket_normalized();
            let permitted = normalized
                .as_deref()
                .is_some_and(|n| self.allowed.contains_normalized(n));
            if permitted {
                continue;
            }
            let counts = offending
                .entry(normalized.unwrap_or_else(|| "<empty>".to_string()))
                .or_insert((0, 0));
            counts.0 += usize::from(record.start_at.is_some());
            counts.1 += usize::from(record.due_at.is_some());
        }

        for (label, (start, due)) in &offending {
            let kind = if self.forbidden.contains_normalized(label) {
                "date-free bucket"
            } else {
                "bucket outside the allow-list"
            };
            if *start > 0 {
                issues.push(format!("{} '{}' has {} start dates", kind, label, start));
            }
            if *due > 0 {
                issues.push(format!("{} '{}' has {} due dates", kind, label, due));
            }
        }

        if let Some(required) = &self.due_required {
            let in_bucket: Vec<&TaskRecord> = transformed
                .iter()
                .filter(|r| r.bucket_normalized().as_deref() == Some(required.as_str()))
                .collect();
            if !in_bucket.is_empty() {
                let missing_due = in_bucket.iter().filter(|r| r.due_at.is_none()).count();
                let total = in_bucket.len();
                if missing_due as f64 > total as f64 * self.thresholds.missing_due_in_active {
                    issues.push(format!(
                        "'{}': {}/{} without due date ({:.1}%)",
                        required,
                        missing_due,
                        total,
                        missing_due as f64 / total as f64 * 100.0
                    ));
                }
            }
        }

        if issues.is_empty() {
            CheckResult::pass(BUCKET_RULES, "Bucket rules applied correctly")
        } else {
            CheckResult::fail(
                BUCKET_RULES,
                Severity::Error,
                format!("Bucket rule problems: {}", issues.join("; ")),
            )
            .with_detail("issues", &issues)
        }
    }

    pub fn validate_consistency(&self, transformed: &[TaskRecord]) -> CheckResult {
        let mut issues = Vec::new();

        let inverted = transformed
            .iter()
            .filter(|r| matches!((r.start_at, r.due_at), (Some(s), Some(d)) if s > d))
            .count();
        if inverted > 0 {
            issues.push(format!(
                "{} records with start date after due date",
                inverted
            ));
        }

        let window = self.thresholds.year_window;
        let (earliest, latest) = (self.reference_year - window, self.reference_year + window);
        for field in [DateField::StartAt, DateField::DueAt, DateField::CompletedAt] {
            let years = transformed.iter().filter_map(|r| r.date(field)).map(|d| d.year());
            let (mut old, mut future) = (0, 0);
            for year in years {
                if year < earliest {
                    old += 1;
                } else if year > latest {
                    future += 1;
                }
            }
            let column = self.columns.date_column(field);
            if old > 0 {
                issues.push(format!("{}: {} dates before {}", column, old, earliest));
            }
            if future > 0 {
                issues.push(format!("{}: {} dates after {}", column, future, latest));
            }
        }

        if issues.is_empty() {
            CheckResult::pass(CONSISTENCY, "Data is consistent")
        } else {
            CheckResult::fail(
                CONSISTENCY,
                Severity::Warning,
                format!("Consistency problems: {}", issues.join("; ")),
            )
            .with_detail("issues", &issues)
            .with_detail("inverted_ranges", inverted)
            .with_detail("year_window", json!([earliest, latest]))
        }
    }
}

/// Log every result and the statistics, errors at error level.
pub fn log_report(report: &ValidationReport) {
    let stats = &report.statistics;
    info!(
        "Input: {} rows, {} columns; output: {} rows, {} columns",
        stats.input.rows, stats.input.columns, stats.output.rows, stats.output.columns
    );
    for (column, rate) in &stats.date_fill {
        info!(
            "  {}: {}/{} ({:.1}%)",
            column, rate.filled, rate.total, rate.percentage
        );
    }
    for (bucket, count) in &stats.bucket_distribution {
        info!("  {}: {} tasks", bucket, count);
    }

    for result in &report.results {
        match (result.passed, result.severity) {
            (true, Severity::Warning) => warn!("[{}] {}", result.name, result.message),
            (true, _) => info!("[{}] {}", result.name, result.message),
            (false, Severity::Error) => error!("[{}] {}", result.name, result.message),
            (false, _) => warn!("[{}] {}", result.name, result.message),
        }
    }

    if report.passed {
        info!("Validation passed");
    } else {
        error!("Validation failed: ERROR-severity checks did not pass");
    }
}
