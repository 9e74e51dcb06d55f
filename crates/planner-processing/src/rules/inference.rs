//! Start-date inference from the due date.

use crate::types::{DateField, TaskRecord};
use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Number of filled records echoed at debug level.
const EXAMPLES_LOGGED: usize = 3;

/// A record whose start date ends up after its due date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeViolation {
    pub index: usize,
    pub record: String,
    pub start: NaiveDateTime,
    pub due: NaiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InferenceSummary {
    pub filled: usize,
    /// Records skipped because the subtraction left the representable range.
    pub out_of_range: usize,
    pub violations: Vec<RangeViolation>,
}

/// Set `start = due - offset_days` wherever `due` is present and `start` is
/// not. Must run after the bucket rules so forbidden buckets never gain a
/// start date.
///
/// Every record with `start > due` afterwards is reported as a violation,
/// whether its start date was inferred or already present.
pub fn infer_start_dates(
    records: &mut [TaskRecord],
    start: DateField,
    due: DateField,
    offset_days: i64,
) -> InferenceSummary {
    let mut summary = InferenceSummary::default();
    let offset = TimeDelta::try_days(offset_days);

    for record in records.iter_mut() {
        let Some(due_at) = record.date(due) else {
            continue;
        };
        if record.date(start).is_some() {
            continue;
        }

        match offset.and_then(|delta| due_at.checked_sub_signed(delta)) {
            Some(inferred) => {
                *record.date_mut(start) = Some(inferred);
                summary.filled += 1;
                if summary.filled <= EXAMPLES_LOGGED {
                    debug!(
                        "Inferred start {} from due {} for {}",
                        inferred,
                        due_at,
                        record.describe()
                    );
                }
            }
            None => summary.out_of_range += 1,
        }
    }

    for (index, record) in records.iter().enumerate() {
        if let (Some(start_at), Some(due_at)) = (record.date(start), record.date(due))
            && start_at > due_at
        {
            summary.violations.push(RangeViolation {
                index,
                record: record.describe(),
                start: start_at,
                due: due_at,
            });
        }
    }

    info!(
        "Start dates inferred for {} records ({} days before due)",
        summary.filled, offset_days
    );
    if summary.out_of_range > 0 {
        warn!(
            "{} start dates could not be inferred: offset leaves the date range",
            summary.out_of_range
        );
    }
    if !summary.violations.is_empty() {
        warn!(
            "{} records have a start date after their due date",
            summary.violations.len()
        );
    }

    summary
}
