//! Bucket-date rule: only allow-listed buckets may carry governed dates.

use crate::normalizer::AllowList;
use crate::types::{DateField, TaskRecord};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Audit trail of one rule pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BucketAudit {
    /// Records that lost at least one date.
    pub records_affected: usize,
    /// Records whose bucket is not allow-listed, whether or not they carried dates.
    pub records_in_forbidden_buckets: usize,
    /// Nulled values per date field.
    pub nulled_by_field: BTreeMap<DateField, usize>,
    /// Nulled values per distinct raw bucket label. Missing labels are keyed
    /// as `<empty>`.
    pub nulled_by_label: BTreeMap<String, usize>,
    /// Raw label to normalized form, for every label seen.
    pub normalization: BTreeMap<String, Option<String>>,
    /// Normalized labels that are neither allowed nor known to forbid dates.
    pub unrecognized_labels: Vec<String>,
}

impl BucketAudit {
    pub fn total_nulled(&self) -> usize {
        self.nulled_by_field.values().sum()
    }
}

const EMPTY_LABEL: &str = "<empty>";

/// Null every field of `date_fields` on records whose normalized bucket is not
/// in `allowed`. Fields outside `date_fields` are never touched.
///
/// `known_forbidden` only feeds the audit: labels in neither list are reported
/// as unrecognized, since a typo in the allow-list would otherwise wipe dates
/// silently.
pub fn apply_bucket_rules(
    records: &mut [TaskRecord],
    date_fields: &[DateField],
    allowed: &AllowList,
    known_forbidden: &AllowList,
) -> BucketAudit {
    let mut audit = BucketAudit::default();

    for record in records.iter_mut() {
        let normalized = record.bucket_normalized();
        let label = record
            .bucket_raw
            .clone()
            .unwrap_or_else(|| EMPTY_LABEL.to_string());
        audit
            .normalization
            .entry(label.clone())
            .or_insert_with(|| normalized.clone());

        let permitted = normalized
            .as_deref()
            .is_some_and(|n| allowed.contains_normalized(n));
        if permitted {
            continue;
        }

        audit.records_in_forbidden_buckets += 1;
        if let Some(n) = normalized.as_deref()
            && !known_forbidden.contains_normalized(n)
            && !audit.unrecognized_labels.iter().any(|u| u == n)
        {
            audit.unrecognized_labels.push(n.to_string());
        }

        let mut nulled_here = 0;
        for &field in date_fields {
            let slot = record.date_mut(field);
            if slot.take().is_some() {
                nulled_here += 1;
                *audit.nulled_by_field.entry(field).or_insert(0) += 1;
            }
        }

        if nulled_here > 0 {
            audit.records_affected += 1;
            *audit.nulled_by_label.entry(label).or_insert(0) += nulled_here;
            debug!("Nulled {} date(s) on {}", nulled_here, record.describe());
        }
    }

    info!(
        "Bucket rules: {} records in date-forbidding buckets, {} records had dates removed ({} values)",
        audit.records_in_forbidden_buckets,
        audit.records_affected,
        audit.total_nulled()
    );
    for (label, count) in &audit.nulled_by_label {
        info!("  '{}': {} date values removed", label, count);
    }
    for label in &audit.unrecognized_labels {
        warn!(
            "Bucket '{}' is not in the allow-list nor a known date-free bucket; its dates were removed",
            label
        );
    }

    audit
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use pretty_assertions::assert_eq;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn record(bucket: Option<&str>) -> TaskRecord {
        TaskRecord {
            id: Some("T".to_string()),
            title: Some("Tarefa".to_string()),
            bucket_raw: bucket.map(String::from),
            created_at: Some(at(2024, 1, 10)),
            start_at: Some(at(2024, 3, 1)),
            due_at: Some(at(2024, 3, 25)),
            completed_at: Some(at(2024, 3, 20)),
            ..Default::default()
        }
    }

    fn lists() -> (AllowList, AllowList) {
        (
            AllowList::new(["execução", "aguardando validação", "concluído"]),
            AllowList::new(["backlog", "a fazer"]),
        )
    }

    #[test]
    fn test_forbidden_bucket_loses_governed_dates() {
        let (allowed, forbidden) = lists();
        let mut records = vec![record(Some("Backlog"))];
        let audit = apply_bucket_rules(
            &mut records,
            &DateField::BUCKET_GOVERNED,
            &allowed,
            &forbidden,
        );

        assert_eq!(records[0].start_at, None);
        assert_eq!(records[0].due_at, None);
        // Outside the governed set
        assert_eq!(records[0].created_at, Some(at(2024, 1, 10)));
        assert_eq!(records[0].completed_at, Some(at(2024, 3, 20)));
        assert_eq!(audit.records_affected, 1);
        assert_eq!(audit.nulled_by_label.get("Backlog"), Some(&2));
        assert!(audit.unrecognized_labels.is_empty());
    }

    #[test]
    fn test_allowed_bucket_any_spelling_is_untouched() {
        let (allowed, forbidden) = lists();
        let mut records = vec![
            record(Some(" EXECUÇÃO ")),
            record(Some("execucao")),
            record(Some("Concluído")),
        ];
        let before = records.clone();
        let audit = apply_bucket_rules(
            &mut records,
            &DateField::BUCKET_GOVERNED,
            &allowed,
            &forbidden,
        );

        assert_eq!(records, before);
        assert_eq!(audit.records_affected, 0);
        assert_eq!(audit.records_in_forbidden_buckets, 0);
    }

    #[test]
    fn test_missing_bucket_is_forbidden() {
        let (allowed, forbidden) = lists();
        let mut records = vec![record(None), record(Some("   "))];
        let audit = apply_bucket_rules(
            &mut records,
            &DateField::BUCKET_GOVERNED,
            &allowed,
            &forbidden,
        );

        assert!(records.iter().all(|r| r.start_at.is_none() && r.due_at.is_none()));
        assert_eq!(audit.records_affected, 2);
        assert_eq!(audit.nulled_by_label.get(EMPTY_LABEL), Some(&2));
    }

    #[test]
    fn test_unrecognized_labels_are_reported_once() {
        let (allowed, forbidden) = lists();
        let mut records = vec![record(Some("Em revisão")), record(Some("em revisao"))];
        let audit = apply_bucket_rules(
            &mut records,
            &DateField::BUCKET_GOVERNED,
            &allowed,
            &forbidden,
        );

        assert_eq!(audit.unrecognized_labels, vec!["em revisao".to_string()]);
        assert_eq!(audit.nulled_by_field.get(&DateField::DueAt), Some(&2));
        assert_eq!(audit.total_nulled(), 4);
    }

    #[test]
    fn test_only_requested_fields_are_nulled() {
        let (allowed, forbidden) = lists();
        let mut records = vec![record(Some("a fazer"))];
        apply_bucket_rules(&mut records, &[DateField::DueAt], &allowed, &forbidden);

        assert_eq!(records[0].due_at, None);
        assert_eq!(records[0].start_at, Some(at(2024, 3, 1)));
    }
}
