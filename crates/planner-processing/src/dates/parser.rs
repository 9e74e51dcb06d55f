//! Multi-format date parsing with graceful fallback.

use super::stats::ColumnParseStats;
use crate::config::{PlannerConfig, default_date_formats};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

// Recognized date shapes - compiled once at startup
static DATE_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            "dd/mm/yyyy",
            Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}$").expect("Invalid regex: dd/mm/yyyy"),
        ),
        (
            "dd/mm/yyyy_time",
            Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}\s\d{1,2}:\d{1,2}")
                .expect("Invalid regex: dd/mm/yyyy time"),
        ),
        (
            "yyyy-mm-dd",
            Regex::new(r"^\d{4}-\d{1,2}-\d{1,2}").expect("Invalid regex: yyyy-mm-dd"),
        ),
        (
            "dd-mm-yyyy",
            Regex::new(r"^\d{1,2}-\d{1,2}-\d{4}").expect("Invalid regex: dd-mm-yyyy"),
        ),
        (
            "dd.mm.yyyy",
            Regex::new(r"^\d{1,2}\.\d{1,2}\.\d{4}").expect("Invalid regex: dd.mm.yyyy"),
        ),
    ]
});

/// Name of the first recognized pattern the (trimmed) text matches.
pub fn detect_pattern(text: &str) -> Option<&'static str> {
    let text = text.trim();
    DATE_PATTERNS
        .iter()
        .find(|(_, regex)| regex.is_match(text))
        .map(|(name, _)| *name)
}

/// Textual forms that mean "no value".
pub fn is_missing_text(text: &str) -> bool {
    let text = text.trim();
    text.is_empty() || text.eq_ignore_ascii_case("nan") || text.eq_ignore_ascii_case("nat")
}

/// A date-like input value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateInput<'a> {
    Missing,
    Text(&'a str),
    DateTime(NaiveDateTime),
}

impl<'a> From<Option<&'a str>> for DateInput<'a> {
    fn from(value: Option<&'a str>) -> Self {
        value.map_or(DateInput::Missing, DateInput::Text)
    }
}

impl<'a> From<&'a str> for DateInput<'a> {
    fn from(value: &'a str) -> Self {
        DateInput::Text(value)
    }
}

impl From<NaiveDateTime> for DateInput<'_> {
    fn from(value: NaiveDateTime) -> Self {
        DateInput::DateTime(value)
    }
}

/// Result of parsing one value.
///
/// `Failed` and `NotDateLike` both end up as null, but only `Failed` means a
/// real date was lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    /// Null, empty, or a textual null marker.
    Missing,
    Parsed(NaiveDateTime),
    /// Text that matched no recognized date shape.
    NotDateLike,
    /// Text that looked like a date but could not be converted.
    Failed,
}

impl ParseOutcome {
    pub fn value(&self) -> Option<NaiveDateTime> {
        match self {
            ParseOutcome::Parsed(value) => Some(*value),
            _ => None,
        }
    }
}

/// Converts heterogeneous date-like values into `NaiveDateTime`.
#[derive(Debug, Clone)]
pub struct DateParser {
    day_first: bool,
    formats: Vec<String>,
}

impl Default for DateParser {
    fn default() -> Self {
        Self::new(true, default_date_formats())
    }
}

impl DateParser {
    pub fn new(day_first: bool, formats: Vec<String>) -> Self {
        Self { day_first, formats }
    }

    pub fn from_config(config: &PlannerConfig) -> Self {
        Self::new(config.day_first, config.date_formats.clone())
    }

    /// Parse a single value.
    pub fn parse<'a>(&self, input: impl Into<DateInput<'a>>) -> ParseOutcome {
        let text = match input.into() {
            DateInput::Missing => return ParseOutcome::Missing,
            DateInput::DateTime(value) => return ParseOutcome::Parsed(value),
            DateInput::Text(text) => text.trim(),
        };

        if is_missing_text(text) {
            return ParseOutcome::Missing;
        }

        if detect_pattern(text).is_none() {
            debug!("Unrecognized date format: '{}'", text);
            return ParseOutcome::NotDateLike;
        }

        if let Some(value) = self.parse_flexible(text) {
            return ParseOutcome::Parsed(value);
        }

        if let Some(value) = self.parse_with_formats(text) {
            return ParseOutcome::Parsed(value);
        }

        debug!("Failed to parse date: '{}'", text);
        ParseOutcome::Failed
    }

    /// Parse a whole column, collecting statistics. Failures are reported at
    /// warning level.
    pub fn parse_column<'a, I>(
        &self,
        column: &str,
        values: I,
    ) -> (Vec<Option<NaiveDateTime>>, ColumnParseStats)
    where
        I: IntoIterator<Item = DateInput<'a>>,
    {
        let mut stats = ColumnParseStats::new(column);
        let parsed = values
            .into_iter()
            .map(|value| {
                let outcome = self.parse(value);
                stats.record(&outcome);
                outcome.value()
            })
            .collect();

        if stats.failed > 0 {
            warn!(
                "{}: {} date values could not be parsed ({:.1}% success)",
                column, stats.failed, stats.success_rate
            );
        }
        if stats.not_date_like > 0 {
            debug!(
                "{}: {} values are not dates and were left empty",
                column, stats.not_date_like
            );
        }

        (parsed, stats)
    }

    /// Primary parse: numeric day, month and year separated by `/`, `-` or
    /// `.`, optionally followed by a time. Year-first input is read as
    /// year-month-day; otherwise `day_first` decides the order.
    fn parse_flexible(&self, text: &str) -> Option<NaiveDateTime> {
        let (date_part, time_part) = match text.split_once(|c: char| c == 'T' || c.is_whitespace())
        {
            Some((date, time)) => (date, Some(time.trim())),
            None => (text, None),
        };

        let parts: Vec<&str> = date_part.split(['/', '-', '.']).collect();
        if parts.len() != 3
            || parts
                .iter()
                .any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit()))
        {
            return None;
        }

        let (year, month, day) = if parts[0].len() == 4 {
            (parts[0], parts[1], parts[2])
        } else if parts[2].len() == 4 {
            if self.day_first {
                (parts[2], parts[1], parts[0])
            } else {
                (parts[2], parts[0], parts[1])
            }
        } else {
            return None;
        };

        let date = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)?;
        let time = match time_part {
            Some(time) if !time.is_empty() => parse_time(time)?,
            _ => NaiveTime::MIN,
        };

        Some(date.and_time(time))
    }

    /// Fallback: the configured explicit formats, first match wins. Formats
    /// without a time component yield midnight.
    fn parse_with_formats(&self, text: &str) -> Option<NaiveDateTime> {
        self.formats.iter().find_map(|format| {
            NaiveDateTime::parse_from_str(text, format)
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(text, format)
                        .ok()
                        .map(|date| date.and_time(NaiveTime::MIN))
                })
        })
    }
}

/// Parse `HH:MM`, `HH:MM:SS` or `HH:MM:SS.fraction`, with an optional
/// trailing `Z`.
fn parse_time(text: &str) -> Option<NaiveTime> {
    let text = text.strip_suffix('Z').unwrap_or(text);
    let mut fields = text.split(':');
    let hour: u32 = fields.next()?.parse().ok()?;
    let minute: u32 = fields.next()?.parse().ok()?;
    let (second, nanos) = match fields.next() {
        None => (0, 0),
        Some(seconds) => match seconds.split_once('.') {
            None => (seconds.parse().ok()?, 0),
            Some((whole, fraction)) => {
                if fraction.is_empty() || !fraction.chars().all(|c| c.is_ascii_digit()) {
                    return None;
                }
                let digits: String = fraction.chars().chain("000000000".chars()).take(9).collect();
                (whole.parse().ok()?, digits.parse().ok()?)
            }
        },
    };
    if fields.next().is_some() {
        return None;
    }
    NaiveTime::from_hms_nano_opt(hour, minute, second, nanos)
}

/// Parse one value with the default fallback formats.
///
/// ```rust
/// use planner_processing::dates::{parse_date, DateInput};
///
/// let parsed = parse_date(DateInput::Text("3/4/2024"), true).unwrap();
/// assert_eq!(parsed.format("%Y-%m-%d").to_string(), "2024-04-03");
/// assert!(parse_date(DateInput::Text("nan"), true).is_none());
/// ```
pub fn parse_date(value: DateInput<'_>, day_first: bool) -> Option<NaiveDateTime> {
    DateParser::new(day_first, default_date_formats())
        .parse(value)
        .value()
}
