//! Per-column date parsing statistics.

use super::parser::ParseOutcome;
use serde::{Deserialize, Serialize};

/// Parsing counts for one date column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnParseStats {
    pub column: String,
    pub successful: usize,
    /// Values that looked like dates but could not be converted.
    pub failed: usize,
    /// Values that never looked like dates.
    pub not_date_like: usize,
    pub missing: usize,
    /// `successful / (successful + failed)` as a percentage; 0 when both are 0.
    pub success_rate: f64,
}

impl ColumnParseStats {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: &ParseOutcome) {
        match outcome {
            ParseOutcome::Parsed(_) => self.successful += 1,
            ParseOutcome::Failed => self.failed += 1,
            ParseOutcome::NotDateLike => self.not_date_like += 1,
            ParseOutcome::Missing => self.missing += 1,
        }
        let attempted = self.successful + self.failed;
        self.success_rate = if attempted > 0 {
            self.successful as f64 / attempted as f64 * 100.0
        } else {
            0.0
        };
    }

    pub fn total(&self) -> usize {
        self.successful + self.failed + self.not_date_like + self.missing
    }
}

/// Parsing statistics for every date column of a dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseStats {
    pub columns: Vec<ColumnParseStats>,
}

impl ParseStats {
    pub fn push(&mut self, stats: ColumnParseStats) {
        self.columns.push(stats);
    }

    pub fn get(&self, column: &str) -> Option<&ColumnParseStats> {
        self.columns.iter().find(|c| c.column == column)
    }

    pub fn total_failed(&self) -> usize {
        self.columns.iter().map(|c| c.failed).sum()
    }

    /// Warning lines for every column with recognized-but-failed values.
    pub fn warnings(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.failed > 0)
            .map(|c| {
                format!(
                    "{}: {} date values could not be parsed ({:.1}% success)",
                    c.column, c.failed, c.success_rate
                )
            })
            .collect()
    }
}
