use crate::normalizer::normalize_label;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The four nullable date fields of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateField {
    CreatedAt,
    StartAt,
    DueAt,
    CompletedAt,
}

impl DateField {
    pub const ALL: [DateField; 4] = [
        DateField::CreatedAt,
        DateField::StartAt,
        DateField::DueAt,
        DateField::CompletedAt,
    ];

    /// Fields governed by the bucket-date rule.
    pub const BUCKET_GOVERNED: [DateField; 2] = [DateField::StartAt, DateField::DueAt];

    pub fn as_str(&self) -> &'static str {
        match self {
            DateField::CreatedAt => "created_at",
            DateField::StartAt => "start_at",
            DateField::DueAt => "due_at",
            DateField::CompletedAt => "completed_at",
        }
    }
}

impl fmt::Display for DateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a task export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: Option<String>,
    pub title: Option<String>,
    pub bucket_raw: Option<String>,
    pub progress: Option<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub created_by: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub start_at: Option<NaiveDateTime>,
    pub due_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    /// Due-date text as it appeared in the input, before parsing.
    pub due_raw: Option<String>,
    /// Values of non-schema columns, aligned with [`TaskTable::extra_columns`].
    pub extras: Vec<Option<String>>,
}

impl TaskRecord {
    /// Normalized bucket label. Always derived from `bucket_raw`, never stored.
    pub fn bucket_normalized(&self) -> Option<String> {
        normalize_label(self.bucket_raw.as_deref())
    }

    pub fn date(&self, field: DateField) -> Option<NaiveDateTime> {
        match field {
            DateField::CreatedAt => self.created_at,
            DateField::StartAt => self.start_at,
            DateField::DueAt => self.due_at,
            DateField::CompletedAt => self.completed_at,
        }
    }

    pub fn date_mut(&mut self, field: DateField) -> &mut Option<NaiveDateTime> {
        match field {
            DateField::CreatedAt => &mut self.created_at,
            DateField::StartAt => &mut self.start_at,
            DateField::DueAt => &mut self.due_at,
            DateField::CompletedAt => &mut self.completed_at,
        }
    }

    /// Numeric view of `progress`, accepting `"50"`, `"50%"` and `"0,5"` forms.
    pub fn progress_percent(&self) -> Option<f64> {
        let raw = self.progress.as_deref()?.trim().trim_end_matches('%').trim();
        raw.replace(',', ".").parse::<f64>().ok()
    }

    /// Short label for diagnostics.
    pub fn describe(&self) -> String {
        match (&self.id, &self.title) {
            (Some(id), Some(title)) => format!("{} ({})", title, id),
            (None, Some(title)) => title.clone(),
            (Some(id), None) => id.clone(),
            (None, None) => "<untitled>".to_string(),
        }
    }
}

/// A task dataset: records plus the column layout they were read with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskTable {
    /// Output column order, schema and extra columns interleaved as read.
    pub columns: Vec<String>,
    /// Non-schema columns carried through verbatim.
    pub extra_columns: Vec<String>,
    pub records: Vec<TaskRecord>,
}

impl TaskTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Severity of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Outcome of one validator check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, serde_json::Value>,
}

impl CheckResult {
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            severity: Severity::Info,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    pub fn fail(name: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            severity,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Serialize) -> Self {
        self.details.insert(
            key.to_string(),
            serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
        );
        self
    }

    /// Whether this result flips the overall outcome to failed.
    pub fn is_blocking(&self) -> bool {
        !self.passed && self.severity == Severity::Error
    }
}

/// Per-column fill statistics of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillRate {
    pub filled: usize,
    pub total: usize,
    pub percentage: f64,
}

impl FillRate {
    pub fn new(filled: usize, total: usize) -> Self {
        let percentage = if total > 0 {
            filled as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        Self {
            filled,
            total,
            percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_bucket_normalized_is_derived() {
        let mut record = TaskRecord {
            bucket_raw: Some(" Execução ".to_string()),
            ..Default::default()
        };
        assert_eq!(record.bucket_normalized().as_deref(), Some("execucao"));

        record.bucket_raw = Some("Backlog".to_string());
        assert_eq!(record.bucket_normalized().as_deref(), Some("backlog"));
    }

    #[test]
    fn test_date_accessors() {
        let mut record = TaskRecord::default();
        *record.date_mut(DateField::DueAt) = Some(at(2024, 3, 25));
        assert_eq!(record.due_at, Some(at(2024, 3, 25)));
        assert_eq!(record.date(DateField::DueAt), Some(at(2024, 3, 25)));
        assert_eq!(record.date(DateField::StartAt), None);
    }

    #[test]
    fn test_progress_percent() {
        let mut record = TaskRecord {
            progress: Some("50%".to_string()),
            ..Default::default()
        };
        assert_eq!(record.progress_percent(), Some(50.0));
        record.progress = Some("0,5".to_string());
        assert_eq!(record.progress_percent(), Some(0.5));
        record.progress = Some("Em andamento".to_string());
        assert_eq!(record.progress_percent(), None);
    }

    #[test]
    fn test_check_result_blocking() {
        assert!(!CheckResult::pass("a", "ok").is_blocking());
        assert!(!CheckResult::fail("b", Severity::Warning, "meh").is_blocking());
        assert!(CheckResult::fail("c", Severity::Error, "bad").is_blocking());
    }

    #[test]
    fn test_severity_serializes_uppercase() {
        let json = serde_json::to_string(&Severity::Warning).unwrap();
        assert_eq!(json, "\"WARNING\"");
    }

    #[test]
    fn test_fill_rate() {
        let rate = FillRate::new(1, 4);
        assert_eq!(rate.percentage, 25.0);
        assert_eq!(FillRate::new(0, 0).percentage, 0.0);
    }
}
