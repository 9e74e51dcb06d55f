//! Configuration types for the task export pipeline.
//!
//! All configuration is static and read-only once built. Components receive
//! it explicitly instead of reading module-level state, which keeps each of
//! them testable in isolation.

use crate::types::DateField;
use serde::{Deserialize, Serialize};

/// One source-to-target column rename applied at load time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub source: String,
    pub target: String,
}

impl ColumnMapping {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Post-rename column names of the task schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub id: String,
    pub title: String,
    pub bucket: String,
    pub progress: String,
    pub priority: String,
    pub assignee: String,
    pub created_by: String,
    pub created_at: String,
    pub start_at: String,
    pub due_at: String,
    pub completed_at: String,
    /// Transient backup of the raw due-date text.
    pub due_raw: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            id: "ID da Tarefa".to_string(),
            title: "Título".to_string(),
            bucket: "Bucket".to_string(),
            progress: "Progresso (%)".to_string(),
            priority: "Prioridade".to_string(),
            assignee: "Atribuído".to_string(),
            created_by: "Criado por".to_string(),
            created_at: "Data de criação".to_string(),
            start_at: "Data de início".to_string(),
            due_at: "Data de entrega".to_string(),
            completed_at: "Data de conclusão".to_string(),
            due_raw: "Due_raw".to_string(),
        }
    }
}

impl ColumnNames {
    /// Column holding the given date field.
    pub fn date_column(&self, field: DateField) -> &str {
        match field {
            DateField::CreatedAt => &self.created_at,
            DateField::StartAt => &self.start_at,
            DateField::DueAt => &self.due_at,
            DateField::CompletedAt => &self.completed_at,
        }
    }
}

/// Thresholds used by the output validator.
///
/// These are product decisions rather than derivable invariants, so every one
/// of them is configurable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationThresholds {
    /// Maximum tolerated loss ratio on the due-date column. Default: 0.05
    pub due_date_loss: f64,
    /// Maximum tolerated loss ratio on every other date column. Default: 0.20
    pub other_date_loss: f64,
    /// Maximum ratio of records in the due-required bucket without a due date.
    /// Default: 0.30
    pub missing_due_in_active: f64,
    /// Years around the reference year considered sane. Default: 2
    pub year_window: i32,
    /// How many missing/extra identifiers a report lists. Default: 10
    pub max_reported_ids: usize,
    /// Reference year for the sanity window. `None` uses the current year.
    pub reference_year: Option<i32>,
}

impl Default for ValidationThresholds {
    fn default() -> Self {
        Self {
            due_date_loss: 0.05,
            other_date_loss: 0.20,
            missing_due_in_active: 0.30,
            year_window: 2,
            max_reported_ids: 10,
            reference_year: None,
        }
    }
}

/// A `<prefix>*<extension>` file name pattern used for input discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePattern {
    pub prefix: String,
    pub extension: String,
}

impl FilePattern {
    pub fn new(prefix: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            extension: extension.into(),
        }
    }

    /// Whether a bare file name matches this pattern. The extension is
    /// compared case-insensitively.
    pub fn matches(&self, file_name: &str) -> bool {
        let Some((head, ext)) = file_name.rsplit_once('.') else {
            return false;
        };
        head.starts_with(&self.prefix) && ext.eq_ignore_ascii_case(&self.extension)
    }
}

impl std::fmt::Display for FilePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}*.{}", self.prefix, self.extension)
    }
}

/// Configuration for the task export pipeline.
///
/// Use [`PlannerConfig::builder()`] to override individual settings.
///
/// # Example
///
/// ```rust,ignore
/// use planner_processing::config::PlannerConfig;
///
/// let config = PlannerConfig::builder()
///     .start_date_offset_days(15)
///     .keep_due_raw(true)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Export column names and their schema counterparts, applied together.
    pub column_mapping: Vec<ColumnMapping>,

    /// Schema column names after the rename step.
    pub columns: ColumnNames,

    /// Columns that must exist after renaming.
    /// Default: Bucket, Título, Data de entrega
    pub required_columns: Vec<String>,

    /// Bucket labels permitted to carry start/due dates (the allow-list).
    pub active_buckets: Vec<String>,

    /// Bucket labels known to forbid dates.
    pub inactive_buckets: Vec<String>,

    /// Bucket whose records are expected to carry a due date.
    /// Default: "execução"
    pub due_required_bucket: String,

    /// Placeholder for records without an assignee.
    pub default_assignee: String,

    /// Days subtracted from the due date to infer a missing start date.
    /// Default: 20
    pub start_date_offset_days: i64,

    /// Read ambiguous `a/b/yyyy` dates as day/month.
    /// Default: true
    pub day_first: bool,

    /// Ordered fallback formats (chrono syntax) tried after the primary parse.
    pub date_formats: Vec<String>,

    /// Output validator thresholds.
    pub thresholds: ValidationThresholds,

    /// Field separator of input and output CSV files.
    /// Default: ','
    pub csv_separator: char,

    /// Whether the raw due-date backup column is persisted.
    /// Default: false
    pub keep_due_raw: bool,

    /// Prefix of generated output file names.
    /// Default: "TarefasPlanner"
    pub output_prefix: String,

    /// Patterns scanned when no input file is given explicitly.
    pub input_patterns: Vec<FilePattern>,
}

pub(crate) fn default_column_mapping() -> Vec<ColumnMapping> {
    [
        ("Identificação da tarefa", "ID da Tarefa"),
        ("Nome da tarefa", "Título"),
        ("Nome do Bucket", "Bucket"),
        ("Progresso", "Progresso (%)"),
        ("Prioridade", "Prioridade"),
        ("Atribuído a", "Atribuído"),
        ("Criado por", "Criado por"),
        ("Criado em", "Data de criação"),
        ("Data de início", "Data de início"),
        ("Data de conclusão", "Data de entrega"),
        ("Concluído em", "Data de conclusão"),
    ]
    .into_iter()
    .map(|(source, target)| ColumnMapping::new(source, target))
    .collect()
}

pub(crate) fn default_date_formats() -> Vec<String> {
    [
        "%d/%m/%Y",
        "%d/%m/%Y %H:%M",
        "%d/%m/%Y %H:%M:%S",
        "%Y-%m-%d",
        "%Y-%m-%d %H:%M:%S",
        "%d-%m-%Y",
        "%d.%m.%Y",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Default for PlannerConfig {
    fn default() -> Self {
        let columns = ColumnNames::default();
        Self {
            column_mapping: default_column_mapping(),
            required_columns: vec![
                columns.bucket.clone(),
                columns.title.clone(),
                columns.due_at.clone(),
            ],
            columns,
            active_buckets: strings(&[
                "execução",
                "aguardando validação",
                "concluídos",
                "concluído",
                "concluido",
                "concluida",
                "concluidas",
            ]),
            inactive_buckets: strings(&["backlog", "a fazer"]),
            due_required_bucket: "execução".to_string(),
            default_assignee: "Michael Oneil; Artur Almeida".to_string(),
            start_date_offset_days: 20,
            day_first: true,
            date_formats: default_date_formats(),
            thresholds: ValidationThresholds::default(),
            csv_separator: ',',
            keep_due_raw: false,
            output_prefix: "TarefasPlanner".to_string(),
            input_patterns: vec![
                FilePattern::new("Gerenciamento de Projetos", "csv"),
                FilePattern::new("TarefasPlanner", "csv"),
            ],
        }
    }
}

/// Largest accepted start-date offset, in days, in either direction.
pub const MAX_OFFSET_DAYS: i64 = 36_500;

impl PlannerConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PlannerConfigBuilder {
        PlannerConfigBuilder::default()
    }

    /// Load a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        let config: PlannerConfig = serde_json::from_str(json)?;
        config
            .validate()
            .map_err(|e| crate::error::PlannerError::InvalidConfig(e.to_string()))?;
        Ok(config)
    }

    /// Field separator as a CSV byte.
    pub fn separator_byte(&self) -> u8 {
        // validate() guarantees an ASCII separator
        self.csv_separator as u8
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let ratios = [
            ("thresholds.due_date_loss", self.thresholds.due_date_loss),
            ("thresholds.other_date_loss", self.thresholds.other_date_loss),
            (
                "thresholds.missing_due_in_active",
                self.thresholds.missing_due_in_active,
            ),
        ];
        for (field, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigValidationError::InvalidThreshold {
                    field: field.to_string(),
                    value,
                });
            }
        }

        if self.thresholds.year_window < 0 {
            return Err(ConfigValidationError::InvalidYearWindow(
                self.thresholds.year_window,
            ));
        }

        if self.active_buckets.iter().all(|b| b.trim().is_empty()) {
            return Err(ConfigValidationError::EmptyAllowList);
        }

        if self.start_date_offset_days.abs() > MAX_OFFSET_DAYS {
            return Err(ConfigValidationError::InvalidOffset(
                self.start_date_offset_days,
            ));
        }

        if self.date_formats.is_empty() {
            return Err(ConfigValidationError::NoDateFormats);
        }

        if !self.csv_separator.is_ascii() || self.csv_separator.is_ascii_alphanumeric() {
            return Err(ConfigValidationError::InvalidSeparator(self.csv_separator));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid year window: {0} (must not be negative)")]
    InvalidYearWindow(i32),

    #[error("The bucket allow-list is empty")]
    EmptyAllowList,

    #[error("Invalid start date offset: {0} days (limit is {MAX_OFFSET_DAYS})")]
    InvalidOffset(i64),

    #[error("At least one fallback date format is required")]
    NoDateFormats,

    #[error("Invalid CSV separator: {0:?}")]
    InvalidSeparator(char),
}

/// Builder for [`PlannerConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PlannerConfigBuilder {
    column_mapping: Option<Vec<ColumnMapping>>,
    columns: Option<ColumnNames>,
    required_columns: Option<Vec<String>>,
    active_buckets: Option<Vec<String>>,
    inactive_buckets: Option<Vec<String>>,
    due_required_bucket: Option<String>,
    default_assignee: Option<String>,
    start_date_offset_days: Option<i64>,
    day_first: Option<bool>,
    date_formats: Option<Vec<String>>,
    thresholds: Option<ValidationThresholds>,
    csv_separator: Option<char>,
    keep_due_raw: Option<bool>,
    output_prefix: Option<String>,
    input_patterns: Option<Vec<FilePattern>>,
}

impl PlannerConfigBuilder {
    /// Replace the export-to-schema column mapping.
    pub fn column_mapping(mut self, mapping: Vec<ColumnMapping>) -> Self {
        self.column_mapping = Some(mapping);
        self
    }

    /// Replace the schema column names.
    pub fn columns(mut self, columns: ColumnNames) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Replace the list of columns that must be present.
    pub fn required_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Set the bucket allow-list. Labels may be given in any case or accent form.
    pub fn active_buckets<I, S>(mut self, buckets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.active_buckets = Some(buckets.into_iter().map(Into::into).collect());
        self
    }

    /// Set the buckets known to forbid dates.
    pub fn inactive_buckets<I, S>(mut self, buckets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inactive_buckets = Some(buckets.into_iter().map(Into::into).collect());
        self
    }

    /// Set the bucket whose records are expected to carry a due date.
    pub fn due_required_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.due_required_bucket = Some(bucket.into());
        self
    }

    /// Set the placeholder assignee.
    pub fn default_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.default_assignee = Some(assignee.into());
        self
    }

    /// Set how many days before the due date an inferred start date falls.
    pub fn start_date_offset_days(mut self, days: i64) -> Self {
        self.start_date_offset_days = Some(days);
        self
    }

    /// Read ambiguous dates day-first (`3/4/2024` is 3 April).
    pub fn day_first(mut self, day_first: bool) -> Self {
        self.day_first = Some(day_first);
        self
    }

    /// Replace the ordered fallback date formats.
    pub fn date_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.date_formats = Some(formats.into_iter().map(Into::into).collect());
        self
    }

    /// Set the validator thresholds.
    pub fn thresholds(mut self, thresholds: ValidationThresholds) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    /// Set the CSV field separator.
    pub fn csv_separator(mut self, separator: char) -> Self {
        self.csv_separator = Some(separator);
        self
    }

    /// Persist the raw due-date backup column.
    pub fn keep_due_raw(mut self, keep: bool) -> Self {
        self.keep_due_raw = Some(keep);
        self
    }

    /// Set the prefix of generated output files.
    pub fn output_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.output_prefix = Some(prefix.into());
        self
    }

    /// Replace the input discovery patterns.
    pub fn input_patterns(mut self, patterns: Vec<FilePattern>) -> Self {
        self.input_patterns = Some(patterns);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PlannerConfig` or an error if validation fails.
    pub fn build(self) -> Result<PlannerConfig, ConfigValidationError> {
        let defaults = PlannerConfig::default();
        let config = PlannerConfig {
            column_mapping: self.column_mapping.unwrap_or(defaults.column_mapping),
            columns: self.columns.unwrap_or(defaults.columns),
            required_columns: self.required_columns.unwrap_or(defaults.required_columns),
            active_buckets: self.active_buckets.unwrap_or(defaults.active_buckets),
            inactive_buckets: self.inactive_buckets.unwrap_or(defaults.inactive_buckets),
            due_required_bucket: self
                .due_required_bucket
                .unwrap_or(defaults.due_required_bucket),
            default_assignee: self.default_assignee.unwrap_or(defaults.default_assignee),
            start_date_offset_days: self
                .start_date_offset_days
                .unwrap_or(defaults.start_date_offset_days),
            day_first: self.day_first.unwrap_or(defaults.day_first),
            date_formats: self.date_formats.unwrap_or(defaults.date_formats),
            thresholds: self.thresholds.unwrap_or(defaults.thresholds),
            csv_separator: self.csv_separator.unwrap_or(defaults.csv_separator),
            keep_due_raw: self.keep_due_raw.unwrap_or(defaults.keep_due_raw),
            output_prefix: self.output_prefix.unwrap_or(defaults.output_prefix),
            input_patterns: self.input_patterns.unwrap_or(defaults.input_patterns),
        };

        config.validate()?;
        Ok(config)
    }
}
