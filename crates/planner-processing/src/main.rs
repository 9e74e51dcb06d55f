//! CLI entry point for the task export pipeline.

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use clap::Parser;
use dotenv::dotenv;
use planner_processing::reporting::{InspectionReport, log_inspection, write_report_to_file};
use planner_processing::{Pipeline, PlannerConfig, RunReport, RunResult};
use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(
    author = "Planner Processing Team",
    version,
    about = "Bucket-aware normalization and validation of task exports",
    long_about = "Normalizes a task export (CSV): removes start and due dates from buckets \
                  outside the allow-list, infers missing start dates from the due date and \
                  validates the written file against the input.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  PLANNER_INPUT_DIR     Directory scanned for the latest export\n  \
                  PLANNER_OUTPUT_DIR    Directory receiving the processed file\n  \
                  RUST_LOG              Overrides --log-level\n\n\
                  EXIT CODES:\n  \
                  0    Processed (validation findings are reported, not fatal)\n  \
                  1    Missing input, invalid configuration or processing error\n  \
                  130  Interrupted (Ctrl+C)\n\n\
                  EXAMPLES:\n  \
                  # Latest export in ./inputs, with validation\n  \
                  planner-processing\n\n  \
                  # Specific file, no validation\n  \
                  planner-processing \"Gerenciamento de Projetos (2).csv\" --no-validation\n\n  \
                  # Show how each bucket will be treated, write nothing\n  \
                  planner-processing --inspect"
)]
struct Args {
    /// Export file to process
    ///
    /// Resolved as given, then relative to --input-dir. If omitted, the most
    /// recently modified matching file in --input-dir is used.
    input: Option<PathBuf>,

    /// Directory scanned for exports
    #[arg(long, env = "PLANNER_INPUT_DIR", default_value = "inputs")]
    input_dir: PathBuf,

    /// Directory receiving the processed file and reports
    #[arg(short, long, env = "PLANNER_OUTPUT_DIR", default_value = "outputs")]
    output_dir: PathBuf,

    /// JSON configuration file; missing fields take their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip validation of the written file
    #[arg(long)]
    no_validation: bool,

    /// Persist the raw due-date text next to the parsed due date
    #[arg(long)]
    keep_raw_due: bool,

    /// Describe bucket handling and date columns without writing output
    #[arg(long)]
    inspect: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Also write logs to <LOG_DIR>/planner_processing_<timestamp>.log
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Suppress progress output (only show warnings, errors and final result)
    #[arg(short, long)]
    quiet: bool,

    /// Output JSON to stdout instead of human-readable summary
    ///
    /// Disables all logs; only the final JSON report is written.
    #[arg(long)]
    json: bool,

    /// Write a detailed JSON report to the output directory
    ///
    /// The report will be saved as <input_name>_report.json
    #[arg(short = 'r', long)]
    emit_report: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout. With a `log_dir`, a second ANSI-free
/// layer writes the same events to a timestamped file.
fn init_logging(
    level: &str,
    quiet: bool,
    json_output: bool,
    log_dir: Option<&Path>,
) -> Result<Option<PathBuf>> {
    if json_output {
        return Ok(None);
    }

    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    let log_file = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Creating log directory {}", dir.display()))?;
            let path = dir.join(format!(
                "planner_processing_{}.log",
                Local::now().format("%Y%m%d_%H%M%S")
            ));
            let file = File::create(&path)
                .with_context(|| format!("Creating log file {}", path.display()))?;
            Some((path, file))
        }
        None => None,
    };

    let (log_path, file_layer) = match log_file {
        Some((path, file)) => (
            Some(path),
            Some(
                fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false)
                    .with_target(false),
            ),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    Ok(log_path)
}

/// Build the configuration from the optional file and CLI overrides.
fn load_config(args: &Args) -> Result<PlannerConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("Reading configuration {}", path.display()))?;
            PlannerConfig::from_json(&json)?
        }
        None => PlannerConfig::default(),
    };

    if args.keep_raw_due {
        config.keep_due_raw = true;
    }

    config
        .validate()
        .map_err(|e| anyhow!("Invalid configuration: {}", e))?;
    Ok(config)
}

/// Load environment variables, then parse arguments.
///
/// clap resolves `env` defaults while parsing, so `.env` (or `env_file`)
/// must be loaded first.
fn parse_args<I, T>(env_file: Option<&Path>, args: I) -> std::result::Result<Args, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match env_file {
        Some(path) => {
            dotenv::from_path(path).ok();
        }
        None => {
            dotenv().ok();
        }
    }
    Args::try_parse_from(args)
}

fn main() -> Result<()> {
    let args = parse_args(None, std::env::args_os()).unwrap_or_else(|e| e.exit());

    let log_path = init_logging(
        &args.log_level,
        args.quiet,
        args.json,
        args.log_dir.as_deref(),
    )?;
    if let Some(path) = &log_path {
        info!("Logging to {}", path.display());
    }

    let config = load_config(&args)?;
    debug!("Configuration: {:?}", config);

    let pipeline = Pipeline::builder()
        .config(config)
        .on_progress(|update| {
            debug!(
                "[{:>3.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            )
        })
        .build()?;

    let input = pipeline.resolve_input(args.input.as_deref(), &args.input_dir)?;

    if args.inspect {
        let report = pipeline.inspect(&input)?;
        return handle_inspection_output(&report, &input, &args);
    }

    info!("{}", "=".repeat(80));
    info!("Starting task export processing...");
    info!("{}", "=".repeat(80));

    let result = pipeline.run(&input, &args.output_dir, !args.no_validation)?;
    handle_run_output(&result, &args)
}

/// Handle pipeline output based on CLI flags.
///
/// Output behavior:
/// - Default: Print human-readable summary to stdout
/// - `--json`: Print JSON to stdout only (no logs)
/// - `--emit-report`: Write JSON report to file
///
/// A failed validation is reported but keeps exit code 0: the output file
/// stays on disk for manual inspection.
fn handle_run_output(result: &RunResult, args: &Args) -> Result<()> {
    let report = RunReport::from_run(result);

    if args.emit_report {
        let input_stem = extract_file_stem(&result.input_path);
        let report_path = write_report_to_file(&report, &args.output_dir, &input_stem)?;
        info!("Report written to: {}", report_path.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if !report.passed {
        warn!("Validation found problems, review the log above");
    }

    print_human_readable_summary(&report, args);
    Ok(())
}

fn handle_inspection_output(report: &InspectionReport, input: &Path, args: &Args) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    log_inspection(report);

    println!("\n{}", "=".repeat(80));
    println!("INSPECTION - {}", input.display());
    println!("{}\n", "=".repeat(80));

    println!("BUCKETS");
    println!("{}", "-".repeat(40));
    println!(
        "{:<28} {:<24} {:<8} {:>8} {:>8} {:>8}",
        "Label", "Normalized", "Dates", "Records", "Start", "Due"
    );
    println!("{}", "-".repeat(90));
    for bucket in &report.buckets {
        println!(
            "{:<28} {:<24} {:<8} {:>8} {:>8} {:>8}",
            truncate_str(&bucket.raw_label, 27),
            truncate_str(bucket.normalized.as_deref().unwrap_or("-"), 23),
            if bucket.permitted { "kept" } else { "removed" },
            bucket.records,
            bucket.with_start,
            bucket.with_due
        );
    }
    println!();

    println!("DATE COLUMNS");
    println!("{}", "-".repeat(40));
    for column in &report.date_columns {
        println!(
            "  {}: {} with data, {} null, {} empty, {} 'nan' (formats: {})",
            column.column,
            column.valid_data,
            column.null_values,
            column.empty_values,
            column.nan_strings,
            if column.formats_detected.is_empty() {
                "none".to_string()
            } else {
                column.formats_detected.join(", ")
            }
        );
    }
    println!();

    println!("{}", "=".repeat(80));
    println!("To process this file, run without --inspect");
    println!("{}", "=".repeat(80));
    Ok(())
}

/// Truncate a string to `max_len` characters, marking the cut with "...".
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Extract the file stem (name without extension) from a path.
fn extract_file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
        .to_string()
}

/// Print a human-readable summary of the run.
fn print_human_readable_summary(report: &RunReport, args: &Args) {
    println!();
    println!("{}", "=".repeat(80));
    if report.passed {
        println!("PROCESSING COMPLETE");
    } else {
        println!("PROCESSING COMPLETE - VALIDATION FAILED");
    }
    println!("{}", "=".repeat(80));
    println!();

    println!("Input:  {}", report.input_file);
    println!("Output: {} ({} rows)", report.output_file, report.rows);
    println!("Duration: {}ms", report.duration_ms);
    println!();

    let audit = &report.bucket_audit;
    println!("Bucket Rules:");
    println!(
        "  {} records in buckets without dates, {} changed, {} dates removed",
        audit.records_in_forbidden_buckets,
        audit.records_affected,
        audit.total_nulled()
    );
    for (label, count) in &audit.nulled_by_label {
        println!("  - {}: {} dates removed", label, count);
    }
    println!();

    println!("Start Dates:");
    println!("  {} inferred from the due date", report.inference.filled);
    if !report.inference.violations.is_empty() {
        println!(
            "  {} start dates fall after their due date",
            report.inference.violations.len()
        );
    }
    if report.inference.out_of_range > 0 {
        println!(
            "  {} start dates not inferred: offset leaves the date range",
            report.inference.out_of_range
        );
    }
    println!();

    match &report.validation {
        Some(validation) => {
            println!("Validation:");
            for check in &validation.results {
                let status = if check.passed { "PASS" } else { "FAIL" };
                println!(
                    "  [{}] {:<16} {:<8} {}",
                    status, check.name, check.severity, check.message
                );
            }
            println!();
        }
        None => {
            println!("Validation: skipped");
            println!();
        }
    }

    if !report.warnings.is_empty() {
        println!("Warnings:");
        for warning in report.warnings.iter().take(10) {
            println!("  - {}", warning);
        }
        if report.warnings.len() > 10 {
            println!("  ... and {} more", report.warnings.len() - 10);
        }
        println!();
    }

    println!("{}", "=".repeat(80));
    if !args.emit_report {
        println!("Use --emit-report to save a detailed JSON report");
    }
    println!("Use --json for machine-readable output");
    println!("{}", "=".repeat(80));
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["planner-processing"]).unwrap();
        assert!(args.input.is_none());
        assert!(!args.no_validation);
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn test_positional_input_and_flags() {
        let args = Args::try_parse_from([
            "planner-processing",
            "TarefasPlanner.csv",
            "--no-validation",
            "--keep-raw-due",
        ])
        .unwrap();
        assert_eq!(args.input, Some(PathBuf::from("TarefasPlanner.csv")));
        assert!(args.no_validation);

        let config = load_config(&args).unwrap();
        assert!(config.keep_due_raw);
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("Execução", 20), "Execução");
        assert_eq!(truncate_str("Aguardando Validação", 10), "Aguarda...");
    }

    #[test]
    fn test_extract_file_stem() {
        assert_eq!(
            extract_file_stem(Path::new("inputs/TarefasPlanner (2).csv")),
            "TarefasPlanner (2)"
        );
    }

    #[test]
    fn test_env_file_feeds_directory_defaults() {
        let dir = std::env::temp_dir().join(format!("planner_cli_env_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let env_file = dir.join(".env");
        fs::write(&env_file, "PLANNER_OUTPUT_DIR=processed_exports\n").unwrap();

        let args = parse_args(Some(&env_file), ["planner-processing"]).unwrap();
        assert_eq!(args.output_dir, PathBuf::from("processed_exports"));

        fs::remove_dir_all(&dir).unwrap();
    }
}
