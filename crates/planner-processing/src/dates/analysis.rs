//! Shape analysis of raw date columns, used when inspecting an export.

use super::parser::{detect_pattern, is_missing_text};
use serde::Serialize;
use std::collections::BTreeSet;

/// Number of sample values kept per column.
const SAMPLE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateColumnProfile {
    pub column: String,
    pub total_rows: usize,
    pub null_values: usize,
    pub empty_values: usize,
    pub nan_strings: usize,
    pub valid_data: usize,
    pub formats_detected: Vec<String>,
    pub sample_values: Vec<String>,
}

/// Profile raw text values of a date column.
pub fn analyze_date_values(column: &str, values: &[Option<String>]) -> DateColumnProfile {
    let mut null_values = 0;
    let mut empty_values = 0;
    let mut nan_strings = 0;
    let mut formats = BTreeSet::new();
    let mut samples = Vec::new();

    for value in values {
        let Some(value) = value else {
            null_values += 1;
            continue;
        };
        let trimmed = value.trim();
        if trimmed.is_empty() {
            empty_values += 1;
            continue;
        }
        if is_missing_text(trimmed) {
            nan_strings += 1;
            continue;
        }
        if samples.len() < SAMPLE_SIZE {
            samples.push(trimmed.to_string());
            if let Some(pattern) = detect_pattern(trimmed) {
                formats.insert(pattern.to_string());
            }
        }
    }

    DateColumnProfile {
        column: column.to_string(),
        total_rows: values.len(),
        null_values,
        empty_values,
        nan_strings,
        valid_data: values.len() - null_values - empty_values - nan_strings,
        formats_detected: formats.into_iter().collect(),
        sample_values: samples,
    }
}
