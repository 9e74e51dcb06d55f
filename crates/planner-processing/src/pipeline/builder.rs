//! The task export pipeline and its builder.

use crate::config::PlannerConfig;
use crate::dates::{DateParser, ParseStats};
use crate::error::{PlannerError, Result, ResultExt};
use crate::frame::{frame_from_records, records_from_frame};
use crate::io::{find_latest_file, load_csv, rename_columns, save_csv, timestamped_output_path};
use crate::normalizer::AllowList;
use crate::pipeline::progress::{
    ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
use crate::reporting::{
    InspectionReport, MissingDueDiagnostic, diagnose_missing_due, inspect, log_processing_stats,
};
use crate::rules::{BucketAudit, InferenceSummary, apply_bucket_rules, infer_start_dates};
use crate::types::{DateField, TaskTable};
use crate::validation::{OutputValidator, ValidationReport, log_report};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Everything the in-memory transformation produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Parsed records before any rule ran. Validation compares against this.
    pub snapshot: TaskTable,
    pub transformed: TaskTable,
    pub parse_stats: ParseStats,
    pub audit: BucketAudit,
    pub inference: InferenceSummary,
    pub missing_due: MissingDueDiagnostic,
}

/// Result of a full run, from input file to validated output file.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub outcome: PipelineOutcome,
    /// `None` when validation was skipped.
    pub validation: Option<ValidationReport>,
    pub duration_ms: u64,
}

impl RunResult {
    /// False only when validation ran and reported an ERROR.
    pub fn passed(&self) -> bool {
        self.validation.as_ref().is_none_or(|v| v.passed)
    }
}

/// The task export pipeline.
///
/// Steps always run in this order: parse, bucket rules, start-date
/// inference, save, validate. Use [`Pipeline::builder()`] to create one.
///
/// # Example
///
/// ```rust,ignore
/// use planner_processing::{Pipeline, PlannerConfig};
///
/// let result = Pipeline::builder()
///     .config(PlannerConfig::builder().keep_due_raw(true).build()?)
///     .on_progress(|update| println!("{}", update.message))
///     .build()?
///     .run(Path::new("inputs/TarefasPlanner.csv"), Path::new("outputs"), true)?;
///
/// assert!(result.passed());
/// ```
pub struct Pipeline {
    config: PlannerConfig,
    parser: DateParser,
    allowed: AllowList,
    forbidden: AllowList,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(Pipeline: Send);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    /// The explicit input when given, otherwise the latest matching file in
    /// `input_dir`.
    pub fn resolve_input(&self, input: Option<&Path>, input_dir: &Path) -> Result<PathBuf> {
        match input {
            Some(path) if path.is_file() => Ok(path.to_path_buf()),
            Some(path) => {
                // A bare file name refers to the input directory
                let in_dir = input_dir.join(path);
                if in_dir.is_file() {
                    Ok(in_dir)
                } else {
                    Err(PlannerError::InputNotFound(path.to_path_buf()))
                }
            }
            None => find_latest_file(input_dir, &self.config.input_patterns),
        }
    }

    /// Read a CSV export and apply the column mapping.
    pub fn load(&self, path: &Path) -> Result<DataFrame> {
        let mut df = load_csv(path, self.config.separator_byte())?;
        rename_columns(&mut df, &self.config.column_mapping)?;
        Ok(df)
    }

    /// Apply the bucket rules and then the start-date inference, in place.
    ///
    /// Inference is skipped with a warning when the table has no start or no
    /// due column, since inferred dates would have nowhere to be written.
    pub fn apply_rules(&self, table: &mut TaskTable) -> (BucketAudit, InferenceSummary) {
        let audit = apply_bucket_rules(
            &mut table.records,
            &DateField::BUCKET_GOVERNED,
            &self.allowed,
            &self.forbidden,
        );

        let missing: Vec<&str> = [DateField::StartAt, DateField::DueAt]
            .into_iter()
            .map(|field| self.config.columns.date_column(field))
            .filter(|name| !table.columns.iter().any(|c| c == name))
            .collect();
        if !missing.is_empty() {
            warn!(
                "Start dates not inferred: missing column(s) {}",
                missing.join(", ")
            );
            return (audit, InferenceSummary::default());
        }

        let inference = infer_start_dates(
            &mut table.records,
            DateField::StartAt,
            DateField::DueAt,
            self.config.start_date_offset_days,
        );
        (audit, inference)
    }

    /// Run the in-memory part of the pipeline on a renamed frame.
    pub fn transform(&self, df: &DataFrame) -> Result<PipelineOutcome> {
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Parsing,
            "Parsing records and dates...",
        ));
        let (snapshot, parse_stats) = records_from_frame(df, &self.config, &self.parser)?;

        let mut transformed = snapshot.clone();
        self.report_progress(ProgressUpdate::new(
            PipelineStage::BucketRules,
            "Applying bucket rules...",
        ));
        let (audit, inference) = self.apply_rules(&mut transformed);
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Inference,
            format!("Inferred {} start dates", inference.filled),
        ));

        let missing_due = diagnose_missing_due(&transformed, &self.config.due_required_bucket);
        log_processing_stats(&transformed, &self.config.columns);

        Ok(PipelineOutcome {
            snapshot,
            transformed,
            parse_stats,
            audit,
            inference,
            missing_due,
        })
    }

    /// Reload a persisted output and compare it with `original`.
    ///
    /// The output keeps schema column names, so no rename is applied.
    pub fn validate_output(&self, original: &TaskTable, output_path: &Path) -> Result<ValidationReport> {
        let df = load_csv(output_path, self.config.separator_byte())
            .context("Reloading output for validation")?;
        let (persisted, _) = records_from_frame(&df, &self.config, &self.parser)
            .context("Reading persisted output")?;

        let report = OutputValidator::new(&self.config).validate(original, &persisted);
        log_report(&report);
        Ok(report)
    }

    /// Process `input` into a new timestamped file in `output_dir`.
    ///
    /// The output is written once, after every transformation finished.
    /// Validation failures do not remove it.
    pub fn run(&self, input: &Path, output_dir: &Path, validate: bool) -> Result<RunResult> {
        match self.run_internal(input, output_dir, validate) {
            Ok(result) => {
                self.report_progress(ProgressUpdate::complete("Pipeline finished"));
                Ok(result)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    fn run_internal(&self, input: &Path, output_dir: &Path, validate: bool) -> Result<RunResult> {
        let start_time = Instant::now();
        info!("Processing {}", input.display());

        self.report_progress(ProgressUpdate::new(
            PipelineStage::Loading,
            format!("Loading {}", input.display()),
        ));
        let df = self.load(input)?;
        let outcome = self.transform(&df)?;

        self.report_progress(ProgressUpdate::new(PipelineStage::Saving, "Saving output..."));
        let output_path = timestamped_output_path(output_dir, &self.config.output_prefix);
        let mut out_df = frame_from_records(&outcome.transformed, &self.config)?;
        save_csv(&mut out_df, &output_path, self.config.separator_byte())?;

        let validation = if validate {
            self.report_progress(ProgressUpdate::new(
                PipelineStage::Validation,
                "Validating output...",
            ));
            Some(self.validate_output(&outcome.snapshot, &output_path)?)
        } else {
            info!("Validation skipped");
            None
        };

        let duration_ms = start_time.elapsed().as_millis() as u64;
        info!("Finished in {} ms: {}", duration_ms, output_path.display());

        Ok(RunResult {
            input_path: input.to_path_buf(),
            output_path,
            outcome,
            validation,
            duration_ms,
        })
    }

    /// Describe how an export would be treated without writing anything.
    pub fn inspect(&self, input: &Path) -> Result<InspectionReport> {
        let df = self.load(input)?;
        let (table, _) = records_from_frame(&df, &self.config, &self.parser)?;
        inspect(&df, &table, &self.config)
    }
}

/// Builder for creating a [`Pipeline`] instance.
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PlannerConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PlannerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter for receiving stage updates.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration does not validate.
    pub fn build(self) -> Result<Pipeline> {
        let config = self.config.unwrap_or_default();
        config
            .validate()
            .map_err(|e| PlannerError::InvalidConfig(e.to_string()))?;

        Ok(Pipeline {
            parser: DateParser::from_config(&config),
            allowed: AllowList::new(&config.active_buckets),
            forbidden: AllowList::new(&config.inactive_buckets),
            config,
            progress_reporter: self.progress_reporter,
        })
    }
}
