use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicationPayload, ApplicationStatus, CertificateType, Decision, DeliveryEstimate, OfficerId,
    RecordId, TrackingId,
};

/// Request handed to the persistence collaborator when an application is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewApplication {
    pub tracking_id: TrackingId,
    pub submitted_at: DateTime<Utc>,
    pub payload: ApplicationPayload,
}

/// Audit trail for a terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionStamp {
    pub officer_id: OfficerId,
    pub decided_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Persisted application as the core sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub record_id: RecordId,
    pub tracking_id: TrackingId,
    pub status: ApplicationStatus,
    pub submitted_at: DateTime<Utc>,
    pub payload: ApplicationPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<DecisionStamp>,
}

impl ApplicationRecord {
    pub fn certificate_type(&self) -> CertificateType {
        self.payload.certificate_type()
    }

    pub fn estimated_delivery(&self) -> DeliveryEstimate {
        self.certificate_type()
            .delivery_window()
            .estimate_from(self.submitted_at)
    }

    pub fn is_pending(&self) -> bool {
        self.status == ApplicationStatus::Submitted
    }

    pub fn status_view(&self) -> ApplicationStatusView {
        ApplicationStatusView {
            tracking_id: self.tracking_id.clone(),
            certificate_type: self.certificate_type(),
            status: self.status.label(),
            submitted_at: self.submitted_at,
            estimated_delivery: self.estimated_delivery(),
            rejection_reason: self
                .decision
                .as_ref()
                .and_then(|stamp| stamp.reason.clone()),
        }
    }
}

/// Applicant-facing status. The backend record id stays internal.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationStatusView {
    pub tracking_id: TrackingId,
    pub certificate_type: CertificateType,
    pub status: &'static str,
    pub submitted_at: DateTime<Utc>,
    pub estimated_delivery: DeliveryEstimate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

/// Requested terminal status plus who decided it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub status: ApplicationStatus,
    pub stamp: DecisionStamp,
}

/// Optional narrowing for `list`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ListFilter {
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
    #[serde(default)]
    pub certificate_type: Option<CertificateType>,
}

impl ListFilter {
    pub fn pending() -> Self {
        Self {
            status: Some(ApplicationStatus::Submitted),
            certificate_type: None,
        }
    }

    pub fn matches(&self, record: &ApplicationRecord) -> bool {
        self.status.map_or(true, |status| record.status == status)
            && self
                .certificate_type
                .map_or(true, |kind| record.certificate_type() == kind)
    }
}

/// Persistence collaborator.
///
/// `update_status` is a check-and-set: implementations must apply the change only while the
/// stored status equals `expected`, and report the current status otherwise.
pub trait ApplicationRepository: Send + Sync {
    fn create(&self, application: NewApplication) -> Result<ApplicationRecord, RepositoryError>;
    fn fetch(&self, id: &RecordId) -> Result<Option<ApplicationRecord>, RepositoryError>;
    fn find_by_tracking_id(
        &self,
        tracking_id: &TrackingId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError>;
    fn list(&self, filter: &ListFilter) -> Result<Vec<ApplicationRecord>, RepositoryError>;
    fn update_status(
        &self,
        id: &RecordId,
        expected: ApplicationStatus,
        change: StatusChange,
    ) -> Result<ApplicationRecord, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("record status is {} instead of the expected value", .current.label())]
    StatusConflict { current: ApplicationStatus },
    #[error("stored record is malformed: {0}")]
    Malformed(#[from] StatusFlagsError),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Boolean pair the persistence collaborator stores instead of a status enum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusFlags {
    #[serde(rename = "Isapproved", alias = "is_approved", default)]
    pub is_approved: bool,
    #[serde(rename = "Isrejected", alias = "is_rejected", default)]
    pub is_rejected: bool,
}

/// Flag combinations the core refuses to accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StatusFlagsError {
    #[error("application cannot be both approved and rejected")]
    BothSet,
    #[error("a decision requires exactly one of approved or rejected")]
    NoDecision,
    #[error("a {} application cannot return to {}", .from.label(), .to.label())]
    Unset {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
}

impl StatusFlags {
    pub const fn from_status(status: ApplicationStatus) -> Self {
        match status {
            ApplicationStatus::Submitted => Self {
                is_approved: false,
                is_rejected: false,
            },
            ApplicationStatus::Approved => Self {
                is_approved: true,
                is_rejected: false,
            },
            ApplicationStatus::Rejected => Self {
                is_approved: false,
                is_rejected: true,
            },
        }
    }

    pub fn status(self) -> Result<ApplicationStatus, StatusFlagsError> {
        match (self.is_approved, self.is_rejected) {
            (true, true) => Err(StatusFlagsError::BothSet),
            (true, false) => Ok(ApplicationStatus::Approved),
            (false, true) => Ok(ApplicationStatus::Rejected),
            (false, false) => Ok(ApplicationStatus::Submitted),
        }
    }

    /// Validate a flag update against the stored status. Terminal flags can never be cleared.
    pub fn transition_from(
        self,
        current: ApplicationStatus,
    ) -> Result<ApplicationStatus, StatusFlagsError> {
        let next = self.status()?;
        if current.is_terminal() && next != current {
            return Err(StatusFlagsError::Unset {
                from: current,
                to: next,
            });
        }
        Ok(next)
    }

    /// Interpret an officer's flag pair as a decision.
    pub fn into_decision(self, reason: Option<String>) -> Result<Decision, StatusFlagsError> {
        match self.status()? {
            ApplicationStatus::Submitted => Err(StatusFlagsError::NoDecision),
            ApplicationStatus::Approved => Ok(Decision::Approved),
            ApplicationStatus::Rejected => Ok(Decision::rejected(reason.unwrap_or_default())),
        }
    }
}

impl TryFrom<StatusFlags> for ApplicationStatus {
    type Error = StatusFlagsError;

    fn try_from(value: StatusFlags) -> Result<Self, Self::Error> {
        value.status()
    }
}

/// Wire shape of a stored application, flags included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRow {
    pub record_id: RecordId,
    pub tracking_id: TrackingId,
    #[serde(flatten)]
    pub flags: StatusFlags,
    pub submitted_at: DateTime<Utc>,
    pub payload: ApplicationPayload,
    #[serde(default)]
    pub decision: Option<DecisionStamp>,
}

impl From<&ApplicationRecord> for ApplicationRow {
    fn from(record: &ApplicationRecord) -> Self {
        Self {
            record_id: record.record_id.clone(),
            tracking_id: record.tracking_id.clone(),
            flags: StatusFlags::from_status(record.status),
            submitted_at: record.submitted_at,
            payload: record.payload.clone(),
            decision: record.decision.clone(),
        }
    }
}

impl TryFrom<ApplicationRow> for ApplicationRecord {
    type Error = StatusFlagsError;

    fn try_from(row: ApplicationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: row.flags.status()?,
            record_id: row.record_id,
            tracking_id: row.tracking_id,
            submitted_at: row.submitted_at,
            payload: row.payload,
            decision: row.decision,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_flags_set_is_rejected_at_the_boundary() {
        let flags = StatusFlags {
            is_approved: true,
            is_rejected: true,
        };
        assert_eq!(flags.status(), Err(StatusFlagsError::BothSet));
        assert_eq!(
            ApplicationStatus::try_from(flags),
            Err(StatusFlagsError::BothSet)
        );
    }

    #[test]
    fn terminal_flags_cannot_be_cleared_or_flipped() {
        let cleared = StatusFlags::default();
        assert_eq!(
            cleared.transition_from(ApplicationStatus::Approved),
            Err(StatusFlagsError::Unset {
                from: ApplicationStatus::Approved,
                to: ApplicationStatus::Submitted,
            })
        );

        let flipped = StatusFlags::from_status(ApplicationStatus::Rejected);
        assert!(flipped
            .transition_from(ApplicationStatus::Approved)
            .is_err());

        let same = StatusFlags::from_status(ApplicationStatus::Approved);
        assert_eq!(
            same.transition_from(ApplicationStatus::Approved),
            Ok(ApplicationStatus::Approved)
        );
    }

    #[test]
    fn legacy_flag_names_deserialize() {
        let flags: StatusFlags =
            serde_json::from_str(r#"{"Isapproved": false, "Isrejected": true}"#).expect("json");
        assert_eq!(flags.status(), Ok(ApplicationStatus::Rejected));

        let decision = flags
            .into_decision(Some("illegible medical certificate".to_string()))
            .expect("decision");
        assert_eq!(decision.reason(), Some("illegible medical certificate"));
    }

    #[test]
    fn empty_flag_pair_is_not_a_decision() {
        assert_eq!(
            StatusFlags::default().into_decision(None),
            Err(StatusFlagsError::NoDecision)
        );
    }
}
