use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{
    ApplicationPayload, DeliveryEstimate, RecordId, TrackingId, TRACKING_SUFFIX_LEN,
};
use super::repository::{ApplicationRecord, ApplicationRepository, NewApplication, RepositoryError};
use super::wizard::{LockRefused, Transition, UnmetCondition, WizardPhase, WizardStateMachine};

/// Shown when an earlier attempt landed after the applicant cancelled and kept editing.
pub const SUPERSEDED_EDITS_NOTICE: &str =
    "your application was stored before the cancellation took effect; changes made afterwards were not included";

const TRACKING_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Source of client-visible tracking identifiers.
pub trait TrackingIdSource: Send + Sync {
    fn next_tracking_id(&self) -> TrackingId;
}

/// `APP` plus nine characters drawn uniformly from `[A-Z0-9]` (about 46 bits).
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomTrackingIds;

impl TrackingIdSource for RandomTrackingIds {
    fn next_tracking_id(&self) -> TrackingId {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..TRACKING_SUFFIX_LEN)
            .map(|_| TRACKING_ALPHABET[rng.gen_range(0..TRACKING_ALPHABET.len())] as char)
            .collect();
        TrackingId::from_suffix(&suffix)
    }
}

/// What the applicant sees on the confirmation step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReceipt {
    pub record_id: RecordId,
    pub tracking_id: TrackingId,
    pub submitted_at: DateTime<Utc>,
    pub estimated_delivery: DeliveryEstimate,
    pub payload: ApplicationPayload,
}

impl SubmissionReceipt {
    fn from_record(record: &ApplicationRecord) -> Self {
        Self {
            record_id: record.record_id.clone(),
            tracking_id: record.tracking_id.clone(),
            submitted_at: record.submitted_at,
            estimated_delivery: record.estimated_delivery(),
            payload: record.payload.clone(),
        }
    }
}

/// A locked draft waiting for the persistence collaborator.
///
/// Holding a ticket does not borrow the wizard, so session locks can be released while the
/// collaborator call is outstanding.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionTicket {
    pub tracking_id: TrackingId,
    pub payload: ApplicationPayload,
    pub submitted_at: DateTime<Utc>,
}

/// Error raised while submitting a draft.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("application is missing required information")]
    ValidationFailed(Vec<UnmetCondition>),
    #[error("applications can only be submitted from the review step (currently step {0})")]
    NotAtReview(u8),
    #[error("a submission for this application is already in progress")]
    InFlight,
    #[error("application has already been submitted")]
    AlreadySubmitted,
    #[error("registry already holds an application with tracking id {0}")]
    Duplicate(TrackingId),
    #[error("could not reach the registry, please try again: {0}")]
    Transport(#[source] RepositoryError),
}

fn refused(reason: LockRefused) -> SubmissionError {
    match reason {
        LockRefused::AlreadySubmitted => SubmissionError::AlreadySubmitted,
        LockRefused::InFlight => SubmissionError::InFlight,
        LockRefused::NotAtReview(step) => SubmissionError::NotAtReview(step.number()),
        LockRefused::Unmet(unmet) => SubmissionError::ValidationFailed(unmet),
    }
}

/// Turns a reviewed draft into a persisted application record.
pub struct SubmissionCoordinator<R> {
    repository: Arc<R>,
    tracking: Arc<dyn TrackingIdSource>,
}

impl<R> SubmissionCoordinator<R>
where
    R: ApplicationRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self::with_tracking_source(repository, Arc::new(RandomTrackingIds))
    }

    pub fn with_tracking_source(repository: Arc<R>, tracking: Arc<dyn TrackingIdSource>) -> Self {
        Self {
            repository,
            tracking,
        }
    }

    /// Re-check every gate, lock the draft and freeze the active branch.
    pub fn begin(
        &self,
        wizard: &mut WizardStateMachine,
    ) -> Result<SubmissionTicket, SubmissionError> {
        let (tracking_id, payload) = wizard
            .lock_for_submission(|| self.tracking.next_tracking_id())
            .map_err(refused)?;

        Ok(SubmissionTicket {
            tracking_id,
            payload,
            submitted_at: Utc::now(),
        })
    }

    /// Call the persistence collaborator. A conflict on our own tracking id with the same
    /// payload means an earlier attempt landed, so that record is returned instead.
    pub fn dispatch(&self, ticket: &SubmissionTicket) -> Result<ApplicationRecord, RepositoryError> {
        let application = NewApplication {
            tracking_id: ticket.tracking_id.clone(),
            submitted_at: ticket.submitted_at,
            payload: ticket.payload.clone(),
        };

        match self.repository.create(application) {
            Err(RepositoryError::Conflict) => {
                match self.repository.find_by_tracking_id(&ticket.tracking_id)? {
                    Some(existing) if existing.payload == ticket.payload => Ok(existing),
                    _ => Err(RepositoryError::Conflict),
                }
            }
            other => other,
        }
    }

    /// Apply the collaborator's answer to the wizard.
    pub fn settle(
        &self,
        wizard: &mut WizardStateMachine,
        ticket: SubmissionTicket,
        result: Result<ApplicationRecord, RepositoryError>,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        if wizard.receipt().is_some() {
            return Err(SubmissionError::AlreadySubmitted);
        }

        match result {
            Ok(record) => {
                let receipt = SubmissionReceipt::from_record(&record);
                info!(
                    tracking_id = %receipt.tracking_id,
                    record_id = %receipt.record_id,
                    certificate = receipt.payload.certificate_type().code(),
                    "application submitted"
                );
                // Cancelled while in flight and edited since: the stored payload wins.
                let superseded = wizard.phase() == WizardPhase::Editing
                    && wizard.draft().payload().as_ref() != Some(&receipt.payload);
                wizard.record_success(receipt.clone());
                if superseded {
                    warn!(
                        tracking_id = %receipt.tracking_id,
                        "edits made after cancelling were not part of the stored application"
                    );
                    wizard.record_notice(SUPERSEDED_EDITS_NOTICE.to_string());
                }
                Ok(receipt)
            }
            Err(RepositoryError::Conflict) => {
                let error = SubmissionError::Duplicate(ticket.tracking_id);
                warn!(%error, "tracking id collision, a fresh id will be issued on retry");
                wizard.record_failure(error.to_string());
                wizard.forget_tracking_id();
                Err(error)
            }
            Err(source) => {
                let error = SubmissionError::Transport(source);
                warn!(tracking_id = %ticket.tracking_id, %error, "submission failed");
                wizard.record_failure(error.to_string());
                Err(error)
            }
        }
    }

    pub fn submit(
        &self,
        wizard: &mut WizardStateMachine,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let ticket = self.begin(wizard)?;
        let result = self.dispatch(&ticket);
        self.settle(wizard, ticket, result)
    }

    /// Advance the wizard, submitting when it asks to leave the review step.
    pub fn advance(&self, wizard: &mut WizardStateMachine) -> Result<Transition, SubmissionError> {
        match wizard.advance() {
            Transition::SubmissionRequested => self.submit(wizard).map(Transition::Submitted),
            other => Ok(other),
        }
    }
}
