//! Machine-readable run report.

use crate::dates::ParseStats;
use crate::error::{Result, ResultExt};
use crate::pipeline::RunResult;
use crate::reporting::MissingDueDiagnostic;
use crate::rules::{BucketAudit, InferenceSummary};
use crate::validation::ValidationReport;
use chrono::Local;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Report of one pipeline run, printed with `--json` and written with
/// `--emit-report`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Timestamp when the report was generated
    pub generated_at: String,
    pub input_file: String,
    pub output_file: String,
    pub duration_ms: u64,
    pub rows: usize,
    /// True unless validation ran and failed.
    pub passed: bool,
    pub parse_stats: ParseStats,
    pub bucket_audit: BucketAudit,
    pub inference: InferenceSummary,
    pub missing_due: MissingDueDiagnostic,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
    /// Human-readable warnings collected over the run.
    pub warnings: Vec<String>,
}

impl RunReport {
    pub fn from_run(result: &RunResult) -> Self {
        let outcome = &result.outcome;

        let mut warnings = outcome.parse_stats.warnings();
        for label in &outcome.audit.unrecognized_labels {
            warnings.push(format!("Unrecognized bucket '{}': dates removed", label));
        }
        if !outcome.inference.violations.is_empty() {
            warnings.push(format!(
                "{} records have a start date after their due date",
                outcome.inference.violations.len()
            ));
        }
        if outcome.missing_due.unparsed_due > 0 {
            warnings.push(format!(
                "{} records in '{}' lost their due date to parsing",
                outcome.missing_due.unparsed_due, outcome.missing_due.bucket
            ));
        }
        if let Some(validation) = &result.validation {
            warnings.extend(validation.warnings().map(|r| r.message.clone()));
        }

        Self {
            generated_at: Local::now().to_rfc3339(),
            input_file: result.input_path.display().to_string(),
            output_file: result.output_path.display().to_string(),
            duration_ms: result.duration_ms,
            rows: outcome.transformed.len(),
            passed: result.passed(),
            parse_stats: outcome.parse_stats.clone(),
            bucket_audit: outcome.audit.clone(),
            inference: outcome.inference.clone(),
            missing_due: outcome.missing_due.clone(),
            validation: result.validation.clone(),
            warnings,
        }
    }
}

/// Write `report` as `<dir>/<base_name>_report.json`.
pub fn write_report_to_file<T: Serialize>(
    report: &T,
    dir: &Path,
    base_name: &str,
) -> Result<PathBuf> {
    fs::create_dir_all(dir).context(format!("Creating {}", dir.display()))?;

    let report_path = dir.join(format!("{}_report.json", base_name));
    let mut file = File::create(&report_path).context(format!("Creating {}", report_path.display()))?;
    file.write_all(serde_json::to_string_pretty(report)?.as_bytes())?;

    info!("Report saved: {}", report_path.display());
    Ok(report_path)
}
