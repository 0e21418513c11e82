use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::super::domain::{ApplicationStatus, CertificateType, RecordId, TrackingId};
use super::super::repository::ApplicationRecord;

/// Officer-facing urgency derived from certificate type and age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Urgent,
    High,
    Medium,
    Normal,
}

impl Priority {
    /// Lower ranks sort first.
    pub const fn rank(self) -> u8 {
        match self {
            Priority::Urgent => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Normal => 3,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Priority::Urgent => "urgent",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Normal => "normal",
        }
    }
}

/// Whole days elapsed since submission, never negative.
pub fn age_in_days(submitted_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - submitted_at).num_days().max(0)
}

/// Birth requests are always high; everything else escalates with age.
pub fn priority_for(certificate_type: CertificateType, age_in_days: i64) -> Priority {
    if certificate_type.is_birth() {
        Priority::High
    } else if age_in_days > 5 {
        Priority::Urgent
    } else if age_in_days > 3 {
        Priority::Medium
    } else {
        Priority::Normal
    }
}

/// Query narrowing the review queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QueueFilter {
    #[serde(default)]
    pub certificate_type: Option<CertificateType>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub search: Option<String>,
}

impl QueueFilter {
    fn matches(&self, entry: &QueueEntry) -> bool {
        if self
            .certificate_type
            .is_some_and(|kind| kind != entry.certificate_type)
        {
            return false;
        }
        if self.priority.is_some_and(|priority| priority != entry.priority) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                [
                    entry.tracking_id.as_str(),
                    entry.record_id.0.as_str(),
                    entry.applicant_name.as_str(),
                ]
                .iter()
                .any(|haystack| haystack.to_lowercase().contains(&needle))
            }
        }
    }
}

/// One pending record as the officer queue shows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueEntry {
    pub record_id: RecordId,
    pub tracking_id: TrackingId,
    pub certificate_type: CertificateType,
    pub applicant_name: String,
    pub submitted_at: DateTime<Utc>,
    pub age_in_days: i64,
    pub priority: Priority,
}

impl QueueEntry {
    pub fn from_record(record: &ApplicationRecord, now: DateTime<Utc>) -> Self {
        let certificate_type = record.certificate_type();
        let age = age_in_days(record.submitted_at, now);
        Self {
            record_id: record.record_id.clone(),
            tracking_id: record.tracking_id.clone(),
            certificate_type,
            applicant_name: record.payload.applicant_name().to_string(),
            submitted_at: record.submitted_at,
            age_in_days: age,
            priority: priority_for(certificate_type, age),
        }
    }
}

/// Pending records only, filtered, most urgent first and oldest first within a priority.
pub fn build_queue(
    records: &[ApplicationRecord],
    filter: &QueueFilter,
    now: DateTime<Utc>,
) -> Vec<QueueEntry> {
    let mut entries: Vec<QueueEntry> = records
        .iter()
        .filter(|record| record.is_pending())
        .map(|record| QueueEntry::from_record(record, now))
        .filter(|entry| filter.matches(entry))
        .collect();

    entries.sort_by(|left, right| match left.priority.rank().cmp(&right.priority.rank()) {
        Ordering::Equal => left.submitted_at.cmp(&right.submitted_at),
        other => other,
    });
    entries
}

/// Counts shown on the officer dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub total: usize,
}

impl DashboardStats {
    pub fn tally(records: &[ApplicationRecord]) -> Self {
        records.iter().fold(Self::default(), |mut stats, record| {
            match record.status {
                ApplicationStatus::Submitted => stats.pending += 1,
                ApplicationStatus::Approved => stats.approved += 1,
                ApplicationStatus::Rejected => stats.rejected += 1,
            }
            stats.total += 1;
            stats
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn noon(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn age_counts_whole_days_and_clamps_future_timestamps() {
        assert_eq!(age_in_days(noon(1), noon(1) + Duration::hours(23)), 0);
        assert_eq!(age_in_days(noon(1), noon(5)), 4);
        assert_eq!(age_in_days(noon(5), noon(1)), 0);
    }

    #[test]
    fn boundaries_are_strictly_greater_than() {
        assert_eq!(priority_for(CertificateType::Residence, 3), Priority::Normal);
        assert_eq!(priority_for(CertificateType::Residence, 5), Priority::Medium);
        assert_eq!(priority_for(CertificateType::Caste, 6), Priority::Urgent);
    }

    #[test]
    fn ranks_are_total() {
        let ranks: Vec<u8> = [
            Priority::Urgent,
            Priority::High,
            Priority::Medium,
            Priority::Normal,
        ]
        .iter()
        .map(|priority| priority.rank())
        .collect();
        assert_eq!(ranks, vec![0, 1, 2, 3]);
    }
}
