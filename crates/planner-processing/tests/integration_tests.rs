//! Integration tests for the task export pipeline.
//!
//! These tests run the pipeline on CSV fixtures and inspect the files it
//! writes.

use chrono::{NaiveDate, NaiveDateTime};
use planner_processing::frame::{frame_from_records, records_from_frame};
use planner_processing::io::{load_csv, save_csv};
use planner_processing::validation::{BUCKET_RULES, CRITICAL_DATES, IDENTIFIERS};
use planner_processing::{
    DateParser, OutputValidator, Pipeline, PlannerConfig, RunReport, Severity, TaskRecord,
    TaskTable, ValidationThresholds,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Fresh, empty scratch directory unique to the test.
fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("planner_it_{}_{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

fn config_2024() -> PlannerConfig {
    PlannerConfig::builder()
        .thresholds(ValidationThresholds {
            reference_year: Some(2024),
            ..ValidationThresholds::default()
        })
        .build()
        .unwrap()
}

fn pipeline(config: PlannerConfig) -> Pipeline {
    Pipeline::builder().config(config).build().unwrap()
}

fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn by_id<'a>(table: &'a TaskTable, id: &str) -> &'a TaskRecord {
    table
        .records
        .iter()
        .find(|r| r.id.as_deref() == Some(id))
        .unwrap_or_else(|| panic!("record {} not found", id))
}

fn csv_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    files.sort();
    files
}

// ============================================================================
// End-to-End Runs
// ============================================================================

#[test]
fn test_export_end_to_end() {
    let out = scratch_dir("end_to_end");
    let input = fixtures_path().join("planner_export.csv");

    let result = pipeline(config_2024()).run(&input, &out, true).unwrap();

    assert!(result.passed(), "{:#?}", result.validation);
    assert!(result.output_path.exists());
    let name = result.output_path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("TarefasPlanner_") && name.ends_with(".csv"));
    // Only the final artifact remains, no temporary file
    assert_eq!(csv_files(&out), vec![result.output_path.clone()]);

    let table = &result.outcome.transformed;
    assert_eq!(table.len(), 7);

    // Backlog and "A fazer" lose their dates
    assert_eq!(by_id(table, "T1").due_at, None);
    assert_eq!(by_id(table, "T4").start_at, None);
    assert_eq!(by_id(table, "T4").due_at, None);

    // Spellings of "execução" are all permitted; missing starts are inferred
    assert_eq!(by_id(table, "T2").start_at, Some(at(2024, 3, 5)));
    assert_eq!(by_id(table, "T5").start_at, Some(at(2024, 2, 10)));
    assert_eq!(by_id(table, "T7").start_at, Some(at(2024, 5, 23)));
    assert_eq!(by_id(table, "T6").start_at, Some(at(2024, 4, 15)));

    // Completed task untouched
    let done = by_id(table, "T3");
    assert_eq!(done.start_at, Some(at(2024, 3, 1)));
    assert_eq!(done.due_at, Some(at(2024, 3, 20)));
    assert_eq!(done.completed_at, Some(at(2024, 3, 19)));

    assert_eq!(result.outcome.audit.records_affected, 2);
    assert_eq!(result.outcome.audit.total_nulled(), 3);
    assert!(result.outcome.audit.unrecognized_labels.is_empty());
    assert_eq!(result.outcome.inference.filled, 3);
    assert_eq!(result.outcome.inference.out_of_range, 0);

    fs::remove_dir_all(&out).unwrap();
}

#[test]
fn test_persisted_file_matches_transformed_records() {
    let out = scratch_dir("round_trip");
    let input = fixtures_path().join("planner_export.csv");
    let config = config_2024();
    let pipeline = pipeline(config.clone());

    let result = pipeline.run(&input, &out, false).unwrap();
    assert!(result.validation.is_none());
    assert!(result.passed());

    let header = fs::read_to_string(&result.output_path)
        .unwrap()
        .lines()
        .next()
        .unwrap()
        .to_string();
    assert!(header.starts_with("ID da Tarefa,Título,Bucket"), "{}", header);
    assert!(header.contains("Data de entrega"));
    assert!(header.contains("Rótulos"));
    assert!(!header.contains("Due_raw"));

    let df = pipeline.load(&result.output_path).unwrap();
    let (reloaded, stats) =
        records_from_frame(&df, &config, &DateParser::from_config(&config)).unwrap();
    assert_eq!(stats.total_failed(), 0);
    assert_eq!(reloaded.len(), result.outcome.transformed.len());

    for (written, read) in result
        .outcome
        .transformed
        .records
        .iter()
        .zip(&reloaded.records)
    {
        assert_eq!(written.id, read.id);
        assert_eq!(written.bucket_raw, read.bucket_raw);
        assert_eq!(written.start_at, read.start_at);
        assert_eq!(written.due_at, read.due_at);
        assert_eq!(written.completed_at, read.completed_at);
        assert_eq!(written.extras, read.extras);
    }

    // Default assignee filled where the export had none
    assert_eq!(
        by_id(&reloaded, "T1").assignee.as_deref(),
        Some(config.default_assignee.as_str())
    );
    assert_eq!(
        by_id(&reloaded, "T5").extras,
        vec![Some("Dados, ERP".to_string())]
    );

    fs::remove_dir_all(&out).unwrap();
}

#[test]
fn test_keep_due_raw_persists_backup_column() {
    let out = scratch_dir("due_raw");
    let input = fixtures_path().join("planner_export.csv");
    let mut config = config_2024();
    config.keep_due_raw = true;

    let result = pipeline(config).run(&input, &out, true).unwrap();
    assert!(result.passed(), "{:#?}", result.validation);

    let content = fs::read_to_string(&result.output_path).unwrap();
    let header = content.lines().next().unwrap();
    assert!(header.contains("Data de entrega,Due_raw"), "{}", header);
    // The raw text survives even where the rule removed the date
    let backlog = content.lines().find(|l| l.starts_with("T1,")).unwrap();
    assert!(backlog.contains("10/04/2024"), "{}", backlog);

    fs::remove_dir_all(&out).unwrap();
}

#[test]
fn test_run_report_from_export() {
    let out = scratch_dir("report");
    let input = fixtures_path().join("planner_export.csv");
    let result = pipeline(config_2024()).run(&input, &out, true).unwrap();

    let report = RunReport::from_run(&result);
    assert!(report.passed);
    assert_eq!(report.rows, 7);
    assert_eq!(report.inference.filled, 3);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["bucket_audit"]["records_affected"], 2);
    assert_eq!(json["validation"]["passed"], true);

    fs::remove_dir_all(&out).unwrap();
}

#[test]
fn test_export_without_start_column_infers_nothing() {
    let out = scratch_dir("no_start_column");
    let input = fixtures_path().join("no_start_column.csv");

    let result = pipeline(config_2024()).run(&input, &out, true).unwrap();

    // Summary and persisted file agree: no start dates anywhere
    assert_eq!(result.outcome.inference.filled, 0);
    assert!(result.outcome.transformed.records.iter().all(|r| r.start_at.is_none()));
    let content = fs::read_to_string(&result.output_path).unwrap();
    let header = content.lines().next().unwrap();
    assert_eq!(header, "ID da Tarefa,Título,Bucket,Data de entrega");

    let report = RunReport::from_run(&result);
    assert_eq!(report.inference.filled, 0);
    assert_eq!(by_id(&result.outcome.transformed, "T2").due_at, None);

    fs::remove_dir_all(&out).unwrap();
}

#[test]
fn test_sub_second_dates_survive_the_written_file() {
    let dir = scratch_dir("sub_second");
    let path = dir.join("out.csv");
    let config = config_2024();
    let due = NaiveDate::from_ymd_opt(2024, 3, 5)
        .unwrap()
        .and_hms_milli_opt(14, 30, 15, 250)
        .unwrap();
    let written = table(vec![active_task(1, Some(due))]);

    let mut df = frame_from_records(&written, &config).unwrap();
    save_csv(&mut df, &path, config.separator_byte()).unwrap();
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("2024-03-05 14:30:15.250"), "{}", content);

    let reloaded = load_csv(&path, config.separator_byte()).unwrap();
    let (read, stats) =
        records_from_frame(&reloaded, &config, &DateParser::from_config(&config)).unwrap();
    assert_eq!(stats.total_failed(), 0);
    assert_eq!(read.records[0].due_at, Some(due));
    assert_eq!(read.records[0].start_at, written.records[0].start_at);

    fs::remove_dir_all(&dir).unwrap();
}

// ============================================================================
// Structural Failures
// ============================================================================

#[test]
fn test_missing_bucket_column_fails_without_output() {
    let out = scratch_dir("missing_column");
    let input = fixtures_path().join("missing_bucket.csv");

    let err = pipeline(config_2024()).run(&input, &out, true).unwrap_err();

    assert_eq!(err.error_code(), "MISSING_COLUMNS");
    assert!(err.is_structural());
    assert!(err.to_string().contains("Bucket"));
    assert!(!out.exists() || csv_files(&out).is_empty());
}

#[test]
fn test_header_only_file_is_empty_dataset() {
    let out = scratch_dir("header_only");
    let input = fixtures_path().join("header_only.csv");

    let err = pipeline(config_2024()).run(&input, &out, true).unwrap_err();

    assert_eq!(err.error_code(), "EMPTY_DATASET");
    assert!(!out.exists() || csv_files(&out).is_empty());
}

#[test]
fn test_missing_input_file() {
    let pipeline = pipeline(config_2024());
    let err = pipeline
        .resolve_input(Some(Path::new("does_not_exist.csv")), &fixtures_path())
        .unwrap_err();
    assert_eq!(err.error_code(), "INPUT_NOT_FOUND");
}

#[test]
fn test_byte_order_mark_header_is_renamed() {
    let input = fixtures_path().join("bom_export.csv");
    let df = pipeline(config_2024()).load(&input).unwrap();

    let names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|n| n.to_string())
        .collect();
    assert_eq!(
        names,
        vec!["ID da Tarefa", "Título", "Bucket", "Data de início", "Data de entrega"]
    );
    assert_eq!(df.height(), 2);
}

// ============================================================================
// Input Discovery
// ============================================================================

#[test]
fn test_latest_matching_export_is_selected() {
    let dir = scratch_dir("discovery");
    fs::create_dir_all(&dir).unwrap();
    let fixture = fixtures_path().join("planner_export.csv");
    let now = SystemTime::now();

    let files = [
        ("TarefasPlanner_old.csv", now - Duration::from_secs(3600)),
        ("Gerenciamento de Projetos (2).csv", now - Duration::from_secs(60)),
        ("notes.csv", now),
    ];
    for (name, modified) in files {
        let path = dir.join(name);
        fs::copy(&fixture, &path).unwrap();
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(modified)
            .unwrap();
    }

    let pipeline = pipeline(config_2024());
    let selected = pipeline.resolve_input(None, &dir).unwrap();
    assert_eq!(selected, dir.join("Gerenciamento de Projetos (2).csv"));

    // An explicit name is resolved relative to the input directory
    let explicit = pipeline
        .resolve_input(Some(Path::new("TarefasPlanner_old.csv")), &dir)
        .unwrap();
    assert_eq!(explicit, dir.join("TarefasPlanner_old.csv"));

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_no_matching_export() {
    let dir = scratch_dir("discovery_empty");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("notes.csv"), "a,b\n1,2\n").unwrap();

    let err = pipeline(config_2024()).resolve_input(None, &dir).unwrap_err();
    assert_eq!(err.error_code(), "NO_INPUT_FILE");

    fs::remove_dir_all(&dir).unwrap();
}

// ============================================================================
// Inspection
// ============================================================================

#[test]
fn test_inspect_reports_bucket_treatment() {
    let input = fixtures_path().join("planner_export.csv");
    let report = pipeline(config_2024()).inspect(&input).unwrap();

    let bucket = |label: &str| {
        report
            .buckets
            .iter()
            .find(|b| b.raw_label == label)
            .unwrap_or_else(|| panic!("bucket {} missing", label))
    };

    assert!(!bucket("Backlog").permitted);
    assert_eq!(bucket("Backlog").with_due, 1);
    assert!(!bucket("A fazer").permitted);
    assert!(bucket("Execucao").permitted);
    assert_eq!(bucket("EXECUÇÃO").normalized.as_deref(), Some("execucao"));
    assert!(bucket("Aguardando Validação").permitted);

    assert!(
        report
            .date_columns
            .iter()
            .any(|c| c.column == "Data de entrega" && c.valid_data == 7)
    );
}

// ============================================================================
// Validator Sensitivity
// ============================================================================

fn active_task(id: usize, due: Option<NaiveDateTime>) -> TaskRecord {
    TaskRecord {
        id: Some(format!("T{}", id)),
        title: Some(format!("Tarefa {}", id)),
        bucket_raw: Some("Execução".to_string()),
        start_at: due.map(|d| d - chrono::Duration::days(20)),
        due_at: due,
        ..TaskRecord::default()
    }
}

fn table(records: Vec<TaskRecord>) -> TaskTable {
    TaskTable {
        columns: vec![
            "ID da Tarefa".to_string(),
            "Título".to_string(),
            "Bucket".to_string(),
            "Data de início".to_string(),
            "Data de entrega".to_string(),
        ],
        extra_columns: vec![],
        records,
    }
}

#[test]
fn test_validator_flags_silent_due_date_loss() {
    let original: Vec<TaskRecord> = (1..=10)
        .map(|i| active_task(i, Some(at(2024, 4, i as u32))))
        .collect();
    let mut transformed = original.clone();
    transformed[3].due_at = None;

    let report = OutputValidator::new(&config_2024()).validate(&table(original), &table(transformed));

    assert!(!report.passed);
    let check = report.result(CRITICAL_DATES).unwrap();
    assert!(!check.passed);
    assert_eq!(check.severity, Severity::Error);
    assert!(check.message.contains("Data de entrega"), "{}", check.message);
    // Other checks are unaffected
    assert!(report.result(IDENTIFIERS).unwrap().passed);
}

#[test]
fn test_validator_flags_dates_left_in_forbidden_bucket() {
    let original = vec![active_task(1, Some(at(2024, 4, 1)))];
    let mut leaked = active_task(2, Some(at(2024, 4, 2)));
    leaked.bucket_raw = Some("Backlog".to_string());
    let mut transformed = original.clone();
    transformed.push(leaked.clone());
    let mut original = original;
    original.push(leaked);

    let report = OutputValidator::new(&config_2024()).validate(&table(original), &table(transformed));

    assert!(!report.passed);
    let check = report.result(BUCKET_RULES).unwrap();
    assert!(!check.passed);
    assert_eq!(check.severity, Severity::Error);
}

#[test]
fn test_validator_flags_lost_identifiers() {
    let original: Vec<TaskRecord> = (1..=3)
        .map(|i| active_task(i, Some(at(2024, 4, i as u32))))
        .collect();
    let mut transformed = original.clone();
    transformed[2].id = Some("T99".to_string());

    let report = OutputValidator::new(&config_2024()).validate(&table(original), &table(transformed));

    let check = report.result(IDENTIFIERS).unwrap();
    assert!(!check.passed);
    assert!(!report.passed);
}
