//! Output naming and atomic CSV writing.

use crate::error::{Result, ResultExt};
use chrono::{Local, NaiveDateTime};
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

/// Format of date-time cells in written files. Milliseconds are kept, matching
/// the `Datetime(ms)` columns being written.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// `<prefix>_<YYYYmmdd_HHMMSS>.csv`
pub fn output_filename(prefix: &str, timestamp: NaiveDateTime) -> String {
    format!("{}_{}.csv", prefix, timestamp.format("%Y%m%d_%H%M%S"))
}

/// Output path in `dir` stamped with the current local time.
pub fn timestamped_output_path(dir: &Path, prefix: &str) -> PathBuf {
    dir.join(output_filename(prefix, Local::now().naive_local()))
}

/// Write `df` to `path`.
///
/// The frame goes to a temporary sibling first and is renamed into place, so
/// an interrupted run never leaves a partial file at `path`.
pub fn save_csv(df: &mut DataFrame, path: &Path, separator: u8) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).context(format!("Creating {}", parent.display()))?;
    }

    let tmp_path = path.with_extension("csv.tmp");
    let written = write_frame(df, &tmp_path, separator)
        .and_then(|_| fs::rename(&tmp_path, path).context("Moving output into place"));
    if written.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    written?;

    info!("Saved {} rows to {}", df.height(), path.display());
    Ok(())
}

fn write_frame(df: &mut DataFrame, path: &Path, separator: u8) -> Result<()> {
    let mut file = File::create(path).context(format!("Creating {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(separator)
        .with_quote_char(b'"')
        .with_datetime_format(Some(DATETIME_FORMAT.to_string()))
        .finish(df)
        .context(format!("Writing {}", path.display()))?;
    file.sync_all().context("Flushing output")?;
    Ok(())
}
