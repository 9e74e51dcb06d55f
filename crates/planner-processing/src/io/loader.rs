//! CSV loading and the export-to-schema column rename.

use crate::config::ColumnMapping;
use crate::error::{PlannerError, Result, ResultExt};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info};

fn read_options(separator: u8) -> CsvReadOptions {
    // Every column is read as text; dates are parsed by the pipeline itself.
    CsvReadOptions::default()
        .with_infer_schema_length(Some(0))
        .with_has_header(true)
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(separator)
                .with_quote_char(Some(b'"'))
                .with_encoding(CsvEncoding::LossyUtf8),
        )
}

/// Load a CSV file with every column as text.
///
/// A file that fails standard parsing is retried once after stripping blank
/// lines and a UTF-8 byte order mark.
pub fn load_csv(path: &Path, separator: u8) -> Result<DataFrame> {
    if !path.exists() {
        return Err(PlannerError::InputNotFound(path.to_path_buf()));
    }

    match read_options(separator)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
    {
        Ok(df) => {
            info!(
                "Loaded {}: {} rows, {} columns",
                path.display(),
                df.height(),
                df.width()
            );
            return Ok(df);
        }
        Err(e) => {
            debug!("Standard loading failed: {}", e);
        }
    }

    let content = std::fs::read_to_string(path).context(format!("Reading {}", path.display()))?;
    let df = read_options(separator)
        .into_reader_with_file_handle(Cursor::new(clean_csv_content(&content)))
        .finish()
        .context(format!("Parsing {}", path.display()))?;
    info!(
        "Loaded {} after cleanup: {} rows, {} columns",
        path.display(),
        df.height(),
        df.width()
    );
    Ok(df)
}

fn clean_csv_content(content: &str) -> String {
    content
        .trim_start_matches('\u{feff}')
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Apply every mapping at once, so chained mappings such as `A -> B`
/// together with `B -> C` do not cascade. Header whitespace and a leading
/// byte order mark are stripped first.
///
/// A mapping is skipped when its target would collide with a column that
/// keeps its name, which lets already-processed files load unchanged.
/// Returns the number of renamed columns.
pub fn rename_columns(df: &mut DataFrame, mapping: &[ColumnMapping]) -> Result<usize> {
    let current: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|name| name.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut targets: Vec<Option<&str>> = current
        .iter()
        .map(|name| {
            mapping
                .iter()
                .find(|m| m.source == *name && m.target != *name)
                .map(|m| m.target.as_str())
        })
        .collect();

    // Dropping a rename can create a new clash, so repeat until stable
    loop {
        let final_names: Vec<&str> = targets
            .iter()
            .zip(&current)
            .map(|(target, name)| target.unwrap_or(name.as_str()))
            .collect();
        let mut changed = false;
        for (i, target) in targets.iter_mut().enumerate() {
            let Some(t) = *target else { continue };
            let clash = final_names
                .iter()
                .enumerate()
                .any(|(j, other)| j != i && *other == t);
            if clash {
                debug!("Keeping '{}': target '{}' already present", current[i], t);
                *target = None;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let renamed = targets.iter().filter(|t| t.is_some()).count();
    let new_names: Vec<&str> = targets
        .iter()
        .zip(&current)
        .map(|(target, name)| target.unwrap_or(name.as_str()))
        .collect();

    df.set_column_names(new_names).context("Renaming columns")?;
    if renamed > 0 {
        info!("Renamed {} columns", renamed);
    }
    Ok(renamed)
}
