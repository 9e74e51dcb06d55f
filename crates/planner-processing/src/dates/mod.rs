//! Date parsing.
//!
//! Values are classified into parsed, recognized-but-failed, not date-like,
//! and missing. Only recognized-but-failed values count as data loss; the
//! output validator relies on that split.

mod analysis;
mod parser;
mod stats;

pub use analysis::{DateColumnProfile, analyze_date_values};
pub use parser::{DateInput, DateParser, ParseOutcome, detect_pattern, is_missing_text, parse_date};
pub use stats::{ColumnParseStats, ParseStats};
