//! Conversion between polars frames and [`TaskTable`].
//!
//! Reading a frame is where string cleanup, the default assignee, the raw
//! due-date backup and per-column date parsing happen. Writing goes the other
//! way and yields date columns typed as `Datetime(ms)`.

use crate::config::{ColumnNames, PlannerConfig};
use crate::dates::{DateInput, DateParser, ParseStats};
use crate::error::{PlannerError, Result};
use crate::types::{DateField, TaskRecord, TaskTable};
use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;
use tracing::{debug, info};

/// Where a column's values live on a [`TaskRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Id,
    Title,
    Bucket,
    Progress,
    Priority,
    Assignee,
    CreatedBy,
    Date(DateField),
    Extra(usize),
}

fn known_slot(name: &str, columns: &ColumnNames) -> Option<Slot> {
    let slot = if name == columns.id {
        Slot::Id
    } else if name == columns.title {
        Slot::Title
    } else if name == columns.bucket {
        Slot::Bucket
    } else if name == columns.progress {
        Slot::Progress
    } else if name == columns.priority {
        Slot::Priority
    } else if name == columns.assignee {
        Slot::Assignee
    } else if name == columns.created_by {
        Slot::CreatedBy
    } else {
        return DateField::ALL
            .into_iter()
            .find(|field| columns.date_column(*field) == name)
            .map(Slot::Date);
    };
    Some(slot)
}

fn text_slot(record: &mut TaskRecord, slot: Slot) -> Option<&mut Option<String>> {
    match slot {
        Slot::Id => Some(&mut record.id),
        Slot::Title => Some(&mut record.title),
        Slot::Bucket => Some(&mut record.bucket_raw),
        Slot::Progress => Some(&mut record.progress),
        Slot::Priority => Some(&mut record.priority),
        Slot::Assignee => Some(&mut record.assignee),
        Slot::CreatedBy => Some(&mut record.created_by),
        Slot::Extra(i) => record.extras.get_mut(i),
        Slot::Date(_) => None,
    }
}

fn text_value(record: &TaskRecord, slot: Slot) -> Option<&str> {
    match slot {
        Slot::Id => record.id.as_deref(),
        Slot::Title => record.title.as_deref(),
        Slot::Bucket => record.bucket_raw.as_deref(),
        Slot::Progress => record.progress.as_deref(),
        Slot::Priority => record.priority.as_deref(),
        Slot::Assignee => record.assignee.as_deref(),
        Slot::CreatedBy => record.created_by.as_deref(),
        Slot::Extra(i) => record.extras.get(i).and_then(|v| v.as_deref()),
        Slot::Date(_) => None,
    }
}

/// Column values as trimmed text. Blank cells become null.
fn text_values(column: &Column) -> Result<Vec<Option<String>>> {
    let column = if column.dtype() == &DataType::String {
        column.clone()
    } else {
        column.cast(&DataType::String)?
    };
    let str_series = column.str()?;

    Ok(str_series
        .into_iter()
        .map(|value| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
        .collect())
}

/// Values of a temporal column as date-times.
fn temporal_values(column: &Column) -> Result<Vec<Option<NaiveDateTime>>> {
    let millis = column
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
        .cast(&DataType::Int64)?;

    Ok(millis
        .i64()?
        .into_iter()
        .map(|ms| ms.and_then(DateTime::from_timestamp_millis).map(|dt| dt.naive_utc()))
        .collect())
}

/// Build a [`TaskTable`] from a frame with post-rename column names.
///
/// Fails with [`PlannerError::MissingColumns`] or
/// [`PlannerError::EmptyDataset`] before any value is read. Unparseable dates
/// become null and are counted in the returned statistics.
pub fn records_from_frame(
    df: &DataFrame,
    config: &PlannerConfig,
    parser: &DateParser,
) -> Result<(TaskTable, ParseStats)> {
    let names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect();

    let missing: Vec<String> = config
        .required_columns
        .iter()
        .filter(|required| !names.contains(required))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(PlannerError::MissingColumns(missing));
    }
    if df.height() == 0 {
        return Err(PlannerError::EmptyDataset);
    }

    let columns = &config.columns;
    let mut table = TaskTable::default();
    let mut slots = Vec::new();
    for name in &names {
        // Regenerated from the due column on every read
        if *name == columns.due_raw {
            continue;
        }
        let slot = known_slot(name, columns).unwrap_or_else(|| {
            table.extra_columns.push(name.clone());
            Slot::Extra(table.extra_columns.len() - 1)
        });
        table.columns.push(name.clone());
        slots.push((name, slot));
    }

    table.records = (0..df.height())
        .map(|_| TaskRecord {
            extras: vec![None; table.extra_columns.len()],
            ..Default::default()
        })
        .collect();

    let mut stats = ParseStats::default();
    for (name, slot) in slots {
        let column = df.column(name)?;
        match slot {
            Slot::Date(field) => {
                let parsed = parse_date_column(column, name, parser, &mut stats)?;
                for (record, value) in table.records.iter_mut().zip(parsed) {
                    *record.date_mut(field) = value;
                }
                if field == DateField::DueAt {
                    for (record, raw) in table.records.iter_mut().zip(text_values(column)?) {
                        record.due_raw = raw;
                    }
                }
            }
            _ => {
                for (record, value) in table.records.iter_mut().zip(text_values(column)?) {
                    if let Some(cell) = text_slot(record, slot) {
                        *cell = value;
                    }
                }
            }
        }
    }

    let mut filled = 0;
    for record in &mut table.records {
        if record.assignee.is_none() {
            record.assignee = Some(config.default_assignee.clone());
            filled += 1;
        }
    }
    if filled > 0 {
        debug!("Default assignee set on {} records", filled);
    }

    info!(
        "Read {} records with {} columns ({} passed through)",
        table.len(),
        table.columns.len(),
        table.extra_columns.len()
    );
    Ok((table, stats))
}

fn parse_date_column(
    column: &Column,
    name: &str,
    parser: &DateParser,
    stats: &mut ParseStats,
) -> Result<Vec<Option<NaiveDateTime>>> {
    let (parsed, column_stats) = match column.dtype() {
        DataType::Date | DataType::Datetime(_, _) => {
            let values = temporal_values(column)?;
            parser.parse_column(
                name,
                values
                    .iter()
                    .map(|v| v.map_or(DateInput::Missing, DateInput::DateTime)),
            )
        }
        _ => {
            let values = text_values(column)?;
            parser.parse_column(name, values.iter().map(|v| DateInput::from(v.as_deref())))
        }
    };
    stats.push(column_stats);
    Ok(parsed)
}

fn date_series(name: &str, records: &[TaskRecord], field: DateField) -> Result<Series> {
    let millis: Vec<Option<i64>> = records
        .iter()
        .map(|r| r.date(field).map(|d| d.and_utc().timestamp_millis()))
        .collect();
    Ok(Series::new(name.into(), millis).cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?)
}

/// Build a frame in the table's column order. The raw due-date backup is
/// placed right after the due column when `config.keep_due_raw` is set.
pub fn frame_from_records(table: &TaskTable, config: &PlannerConfig) -> Result<DataFrame> {
    let columns = &config.columns;
    let mut series = Vec::with_capacity(table.columns.len() + 1);

    for name in &table.columns {
        let slot = known_slot(name, columns).or_else(|| {
            table
                .extra_columns
                .iter()
                .position(|extra| extra == name)
                .map(Slot::Extra)
        });
        let Some(slot) = slot else {
            return Err(PlannerError::Internal(format!(
                "Column '{}' has no source in the record layout",
                name
            )));
        };

        match slot {
            Slot::Date(field) => {
                series.push(date_series(name, &table.records, field)?);
                if field == DateField::DueAt && config.keep_due_raw {
                    let raw: Vec<Option<&str>> =
                        table.records.iter().map(|r| r.due_raw.as_deref()).collect();
                    series.push(Series::new(columns.due_raw.as_str().into(), raw));
                }
            }
            _ => {
                let values: Vec<Option<&str>> =
                    table.records.iter().map(|r| text_value(r, slot)).collect();
                series.push(Series::new(name.as_str().into(), values));
            }
        }
    }

    Ok(DataFrame::new(series.into_iter().map(Column::from).collect())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn sample_frame() -> DataFrame {
        df![
            "ID da Tarefa" => ["T1", "T2", "T3"],
            "Título" => ["Levantamento", " Implantação ", "Homologação"],
            "Bucket" => ["Backlog", "Execução", "Concluído"],
            "Atribuído" => [Some("Ana"), None, Some("  ")],
            "Data de entrega" => ["25/03/2024", "sem data", "31/02/2024"],
            "Data de início" => [Some("2024-03-01 08:30:00"), None, Some("nan")],
            "Observações" => [Some("urgente"), None, Some("")],
        ]
        .unwrap()
    }

    #[test]
    fn test_records_from_frame() {
        let config = PlannerConfig::default();
        let (table, stats) =
            records_from_frame(&sample_frame(), &config, &DateParser::default()).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.extra_columns, vec!["Observações".to_string()]);
        assert_eq!(table.columns.len(), 7);

        let first = &table.records[0];
        assert_eq!(first.due_at, Some(at(2024, 3, 25, 0, 0)));
        assert_eq!(first.start_at, Some(at(2024, 3, 1, 8, 30)));
        assert_eq!(first.extras, vec![Some("urgente".to_string())]);

        assert_eq!(table.records[1].title.as_deref(), Some("Implantação"));
        assert_eq!(table.records[1].due_raw.as_deref(), Some("sem data"));
        assert_eq!(table.records[2].extras, vec![None]);

        let due = stats.get("Data de entrega").unwrap();
        assert_eq!(due.successful, 1);
        assert_eq!(due.failed, 1);
        assert_eq!(due.not_date_like, 1);
    }

    #[test]
    fn test_default_assignee_fills_blank_cells() {
        let config = PlannerConfig::default();
        let (table, _) =
            records_from_frame(&sample_frame(), &config, &DateParser::default()).unwrap();

        assert_eq!(table.records[0].assignee.as_deref(), Some("Ana"));
        assert_eq!(
            table.records[1].assignee.as_deref(),
            Some(config.default_assignee.as_str())
        );
        assert_eq!(
            table.records[2].assignee.as_deref(),
            Some(config.default_assignee.as_str())
        );
    }

    #[test]
    fn test_missing_required_columns() {
        let df = df!["ID da Tarefa" => ["T1"], "Bucket" => ["Execução"]].unwrap();
        let err = records_from_frame(&df, &PlannerConfig::default(), &DateParser::default())
            .unwrap_err();
        match err {
            PlannerError::MissingColumns(columns) => {
                assert_eq!(columns, vec!["Título".to_string(), "Data de entrega".to_string()])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_dataset() {
        let df = df![
            "Bucket" => Vec::<String>::new(),
            "Título" => Vec::<String>::new(),
            "Data de entrega" => Vec::<String>::new(),
        ]
        .unwrap();
        let err = records_from_frame(&df, &PlannerConfig::default(), &DateParser::default())
            .unwrap_err();
        assert!(matches!(err, PlannerError::EmptyDataset));
    }

    #[test]
    fn test_frame_round_trip_keeps_layout() {
        let config = PlannerConfig::default();
        let (table, _) =
            records_from_frame(&sample_frame(), &config, &DateParser::default()).unwrap();
        let df = frame_from_records(&table, &config).unwrap();

        assert_eq!(df.height(), 3);
        let names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, table.columns);
        assert_eq!(
            df.column("Data de entrega").unwrap().dtype(),
            &DataType::Datetime(TimeUnit::Milliseconds, None)
        );

        let (again, _) = records_from_frame(&df, &config, &DateParser::default()).unwrap();
        assert_eq!(again.records[0].due_at, table.records[0].due_at);
        assert_eq!(again.records[0].start_at, table.records[0].start_at);
        assert_eq!(again.records[0].extras, table.records[0].extras);
    }

    #[test]
    fn test_due_raw_column_only_when_requested() {
        let config = PlannerConfig::builder().keep_due_raw(true).build().unwrap();
        let (table, _) =
            records_from_frame(&sample_frame(), &config, &DateParser::default()).unwrap();
        let df = frame_from_records(&table, &config).unwrap();

        let raw = df.column("Due_raw").unwrap();
        assert_eq!(raw.str().unwrap().get(1), Some("sem data"));

        let without = frame_from_records(&table, &PlannerConfig::default()).unwrap();
        assert!(without.column("Due_raw").is_err());
    }
}
