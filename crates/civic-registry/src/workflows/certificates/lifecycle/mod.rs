//! Server-side status machine for persisted applications.
//!
//! `submitted -> approved | rejected`, one-directional. Every decision is written with a
//! check-and-set on the `submitted` status, so two officers racing on the same record cannot
//! both win.

mod queue;

pub use queue::{
    age_in_days, build_queue, priority_for, DashboardStats, Priority, QueueEntry, QueueFilter,
};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{ApplicationStatus, Decision, RecordId, TrackingId};
use super::identity::OfficerIdentity;
use super::notification::{Notification, NotificationTemplate, Notifier};
use super::repository::{
    ApplicationRecord, ApplicationRepository, DecisionStamp, ListFilter, RepositoryError,
    StatusChange, StatusFlags, StatusFlagsError,
};

/// Persisted record after a decision, plus non-fatal delivery problems.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionOutcome {
    pub record: ApplicationRecord,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Error raised by lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("application {0} was not found")]
    NotFound(String),
    #[error("application {record_id} was already {}", .status.label())]
    AlreadyDecided {
        record_id: RecordId,
        status: ApplicationStatus,
    },
    #[error(transparent)]
    InvalidDecision(#[from] StatusFlagsError),
    /// Includes stored rows whose flag pair is malformed; those are integrity faults on our
    /// side, unlike an invalid pair in a decision request.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct ApplicationLifecycle<R, N> {
    repository: Arc<R>,
    notifier: Arc<N>,
}

impl<R, N> ApplicationLifecycle<R, N>
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    pub fn new(repository: Arc<R>, notifier: Arc<N>) -> Self {
        Self {
            repository,
            notifier,
        }
    }

    /// Move a submitted record to its terminal status on behalf of `officer`.
    pub fn decide(
        &self,
        record_id: &RecordId,
        decision: Decision,
        officer: &OfficerIdentity,
    ) -> Result<DecisionOutcome, LifecycleError> {
        let current = self.get(record_id)?;
        if current.status.is_terminal() {
            return Err(already_decided(record_id, current.status));
        }

        let change = StatusChange {
            status: decision.status(),
            stamp: DecisionStamp {
                officer_id: officer.officer_id.clone(),
                decided_at: Utc::now(),
                reason: decision.reason().map(str::to_string),
            },
        };

        let record = match self
            .repository
            .update_status(record_id, ApplicationStatus::Submitted, change)
        {
            Ok(record) => record,
            Err(RepositoryError::StatusConflict { current }) => {
                warn!(%record_id, status = current.label(), "decision lost a concurrent update");
                return Err(already_decided(record_id, current));
            }
            Err(RepositoryError::NotFound) => {
                return Err(LifecycleError::NotFound(record_id.to_string()))
            }
            Err(other) => return Err(other.into()),
        };

        info!(
            %record_id,
            tracking_id = %record.tracking_id,
            status = record.status.label(),
            officer = %officer.officer_id.0,
            "application decided"
        );

        let warnings = self.notify_applicant(&record, &decision).into_iter().collect();
        Ok(DecisionOutcome { record, warnings })
    }

    /// Decision expressed as the `Isapproved` / `Isrejected` pair used on the wire.
    pub fn decide_flags(
        &self,
        record_id: &RecordId,
        flags: StatusFlags,
        reason: Option<String>,
        officer: &OfficerIdentity,
    ) -> Result<DecisionOutcome, LifecycleError> {
        let decision = flags.into_decision(reason)?;
        self.decide(record_id, decision, officer)
    }

    pub fn get(&self, record_id: &RecordId) -> Result<ApplicationRecord, LifecycleError> {
        self.repository
            .fetch(record_id)?
            .ok_or_else(|| LifecycleError::NotFound(record_id.to_string()))
    }

    pub fn find_by_tracking(
        &self,
        tracking_id: &TrackingId,
    ) -> Result<ApplicationRecord, LifecycleError> {
        self.repository
            .find_by_tracking_id(tracking_id)?
            .ok_or_else(|| LifecycleError::NotFound(tracking_id.to_string()))
    }

    pub fn list(&self, filter: &ListFilter) -> Result<Vec<ApplicationRecord>, LifecycleError> {
        Ok(self.repository.list(filter)?)
    }

    pub fn queue(&self, filter: &QueueFilter) -> Result<Vec<QueueEntry>, LifecycleError> {
        self.queue_at(filter, Utc::now())
    }

    pub fn queue_at(
        &self,
        filter: &QueueFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<QueueEntry>, LifecycleError> {
        let pending = self.repository.list(&ListFilter {
            certificate_type: filter.certificate_type,
            ..ListFilter::pending()
        })?;
        Ok(build_queue(&pending, filter, now))
    }

    pub fn stats(&self) -> Result<DashboardStats, LifecycleError> {
        let records = self.repository.list(&ListFilter::default())?;
        Ok(DashboardStats::tally(&records))
    }

    fn notify_applicant(&self, record: &ApplicationRecord, decision: &Decision) -> Option<String> {
        let address = record.payload.contact_email()?;
        let template = match decision {
            Decision::Approved => NotificationTemplate::ApplicationApproved,
            Decision::Rejected { .. } => NotificationTemplate::ApplicationRejected,
        };

        let mut notification = Notification::new(template, address)
            .with_detail("tracking_id", record.tracking_id.as_str())
            .with_detail("certificate", record.certificate_type().label());
        if let Some(reason) = decision.reason() {
            notification = notification.with_detail("reason", reason);
        }

        match self.notifier.send(notification) {
            Ok(()) => None,
            Err(error) => {
                warn!(tracking_id = %record.tracking_id, %error, "decision notice not delivered");
                Some(format!("decision notice not delivered: {error}"))
            }
        }
    }
}

fn already_decided(record_id: &RecordId, status: ApplicationStatus) -> LifecycleError {
    LifecycleError::AlreadyDecided {
        record_id: record_id.clone(),
        status,
    }
}
