use std::sync::Arc;

use axum::http::StatusCode;
use tracing::debug;

use super::documents::{DocumentStore, DocumentUpload, FieldNotActive, StorageError};
use super::domain::{Draft, DraftBranch, RecordId, TrackingId};
use super::export::{render_csv, ExportArtifact, ExportError};
use super::identity::{bearer_token, IdentityProvider, OfficerIdentity};
use super::lifecycle::{
    ApplicationLifecycle, DashboardStats, DecisionOutcome, LifecycleError, QueueEntry, QueueFilter,
};
use super::notification::Notifier;
use super::repository::{
    ApplicationRecord, ApplicationRepository, ApplicationStatusView, ListFilter, StatusFlags,
};
use super::sessions::{DraftPatch, PatchError, SessionId, WizardSessions, WizardView};
use super::submission::{
    SubmissionCoordinator, SubmissionError, SubmissionReceipt, TrackingIdSource,
};
use super::verification::{CodeIssued, VerificationError, VerificationService};
use super::wizard::{DraftLocked, Transition, UnmetCondition, WizardStateMachine};

/// Applicant and officer operations composed over the collaborators.
pub struct CertificatePortal<R, N> {
    coordinator: SubmissionCoordinator<R>,
    lifecycle: ApplicationLifecycle<R, N>,
    verification: VerificationService<N>,
    sessions: WizardSessions,
    documents: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
}

impl<R, N> CertificatePortal<R, N>
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    pub fn new(
        repository: Arc<R>,
        notifier: Arc<N>,
        documents: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self::from_parts(
            SubmissionCoordinator::new(Arc::clone(&repository)),
            ApplicationLifecycle::new(repository, Arc::clone(&notifier)),
            VerificationService::new(notifier),
            documents,
            identity,
        )
    }

    pub fn with_tracking_source(
        repository: Arc<R>,
        notifier: Arc<N>,
        documents: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        tracking: Arc<dyn TrackingIdSource>,
    ) -> Self {
        Self::from_parts(
            SubmissionCoordinator::with_tracking_source(Arc::clone(&repository), tracking),
            ApplicationLifecycle::new(repository, Arc::clone(&notifier)),
            VerificationService::new(notifier),
            documents,
            identity,
        )
    }

    pub fn from_parts(
        coordinator: SubmissionCoordinator<R>,
        lifecycle: ApplicationLifecycle<R, N>,
        verification: VerificationService<N>,
        documents: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            coordinator,
            lifecycle,
            verification,
            sessions: WizardSessions::new(),
            documents,
            identity,
        }
    }

    pub fn lifecycle(&self) -> &ApplicationLifecycle<R, N> {
        &self.lifecycle
    }

    pub fn coordinator(&self) -> &SubmissionCoordinator<R> {
        &self.coordinator
    }

    pub fn open_session(&self) -> WizardView {
        self.sessions.open()
    }

    pub fn session(&self, session_id: &SessionId) -> Result<WizardView, PortalError> {
        self.sessions
            .view(session_id)
            .ok_or_else(|| PortalError::SessionNotFound(session_id.to_string()))
    }

    pub fn patch_draft(
        &self,
        session_id: &SessionId,
        patch: &DraftPatch,
    ) -> Result<WizardView, PortalError> {
        self.locked(session_id, |wizard| {
            let draft = wizard.draft_mut()?;
            patch.apply(draft)?;
            Ok(WizardView::of(session_id, wizard))
        })
    }

    /// Advance one step. Leaving the review step submits without holding the session lock
    /// across the persistence call.
    pub fn advance(&self, session_id: &SessionId) -> Result<WizardView, PortalError> {
        let transition = self.locked(session_id, |wizard| Ok(wizard.advance()))?;
        match transition {
            Transition::Moved(_) | Transition::Stayed(_) | Transition::Submitted(_) => {
                self.session(session_id)
            }
            Transition::SubmissionRequested => self.submit_session(session_id),
            Transition::Blocked(unmet) => Err(PortalError::Blocked(unmet)),
            Transition::Busy => Err(PortalError::Busy),
            Transition::Closed => Err(PortalError::Closed),
        }
    }

    pub fn retreat(&self, session_id: &SessionId) -> Result<WizardView, PortalError> {
        let transition = self.locked(session_id, |wizard| Ok(wizard.retreat()))?;
        match transition {
            Transition::Busy => Err(PortalError::Busy),
            Transition::Closed => Err(PortalError::Closed),
            _ => self.session(session_id),
        }
    }

    pub fn cancel(&self, session_id: &SessionId) -> Result<WizardView, PortalError> {
        self.locked(session_id, |wizard| {
            if wizard.cancel_submission() {
                debug!(%session_id, "submission cancelled by applicant");
            }
            Ok(WizardView::of(session_id, wizard))
        })
    }

    /// Begin under the session lock, dispatch unlocked, settle under the lock again. A
    /// confirmed session is released; its final view carries the receipt.
    pub fn submit_session(&self, session_id: &SessionId) -> Result<WizardView, PortalError> {
        let ticket = self.locked(session_id, |wizard| {
            self.require_verified_contact(wizard.draft())?;
            Ok(self.coordinator.begin(wizard)?)
        })?;
        let result = self.coordinator.dispatch(&ticket);
        let view = self.locked(session_id, |wizard| {
            self.coordinator.settle(wizard, ticket, result)?;
            Ok(WizardView::of(session_id, wizard))
        })?;
        self.sessions.close(session_id);
        debug!(%session_id, "wizard session released after submission");
        Ok(view)
    }

    /// Discard a session without submitting it.
    pub fn close_session(&self, session_id: &SessionId) -> Result<WizardView, PortalError> {
        self.sessions
            .close(session_id)
            .map(|wizard| WizardView::of(session_id, &wizard))
            .ok_or_else(|| PortalError::SessionNotFound(session_id.to_string()))
    }

    /// Store the upload, then attach its reference to the session's active branch.
    pub fn attach_document(
        &self,
        session_id: &SessionId,
        upload: DocumentUpload,
    ) -> Result<WizardView, PortalError> {
        let field = upload.field;
        self.locked(session_id, |wizard| {
            let active = wizard.draft_mut()?.branch();
            if active == Some(field.branch()) {
                Ok(())
            } else {
                Err(FieldNotActive { field, active }.into())
            }
        })?;

        let reference = self.documents.store(upload)?;
        debug!(%session_id, %field, reference = reference.as_str(), "document stored");

        self.locked(session_id, |wizard| {
            wizard.draft_mut()?.attach_document(field, reference)?;
            Ok(WizardView::of(session_id, wizard))
        })
    }

    /// Submit a complete draft without a session, running every gate on the way.
    pub fn submit_draft(&self, draft: Draft) -> Result<SubmissionReceipt, PortalError> {
        let mut wizard = WizardStateMachine::fast_forward(draft)
            .map_err(|unmet| PortalError::Submission(SubmissionError::ValidationFailed(unmet)))?;
        self.require_verified_contact(wizard.draft())?;
        Ok(self.coordinator.submit(&mut wizard)?)
    }

    pub fn status(&self, tracking_id: &str) -> Result<ApplicationStatusView, PortalError> {
        Ok(self.record_by_tracking(tracking_id)?.status_view())
    }

    pub fn export(&self, tracking_id: &str) -> Result<ExportArtifact, PortalError> {
        let record = self.record_by_tracking(tracking_id)?;
        Ok(render_csv(&record)?)
    }

    pub fn issue_code(&self, address: &str) -> Result<CodeIssued, PortalError> {
        Ok(self.verification.issue(address)?)
    }

    pub fn verify_code(&self, address: &str, code: &str) -> Result<(), PortalError> {
        Ok(self.verification.verify(address, code)?)
    }

    /// Resolve an `Authorization` header to an officer.
    pub fn authenticate(&self, authorization: Option<&str>) -> Result<OfficerIdentity, PortalError> {
        authorization
            .and_then(bearer_token)
            .and_then(|token| self.identity.authenticate(token))
            .ok_or(PortalError::Unauthorized)
    }

    pub fn queue(&self, filter: &QueueFilter) -> Result<Vec<QueueEntry>, PortalError> {
        Ok(self.lifecycle.queue(filter)?)
    }

    pub fn list(&self, filter: &ListFilter) -> Result<Vec<ApplicationRecord>, PortalError> {
        Ok(self.lifecycle.list(filter)?)
    }

    pub fn stats(&self) -> Result<DashboardStats, PortalError> {
        Ok(self.lifecycle.stats()?)
    }

    pub fn decide(
        &self,
        record_id: &RecordId,
        flags: StatusFlags,
        reason: Option<String>,
        officer: &OfficerIdentity,
    ) -> Result<DecisionOutcome, PortalError> {
        Ok(self
            .lifecycle
            .decide_flags(record_id, flags, reason, officer)?)
    }

    /// Personal-information certificates are only accepted for a verified contact email.
    fn require_verified_contact(&self, draft: &Draft) -> Result<(), PortalError> {
        if draft.branch() != Some(DraftBranch::PersonalInfo) {
            return Ok(());
        }
        if self.verification.is_verified(&draft.personal_info.email) {
            Ok(())
        } else {
            Err(PortalError::Blocked(vec![UnmetCondition::ContactNotVerified]))
        }
    }

    fn record_by_tracking(&self, tracking_id: &str) -> Result<ApplicationRecord, PortalError> {
        let tracking_id = TrackingId::parse(tracking_id)
            .ok_or_else(|| LifecycleError::NotFound(tracking_id.to_string()))?;
        Ok(self.lifecycle.find_by_tracking(&tracking_id)?)
    }

    fn locked<T>(
        &self,
        session_id: &SessionId,
        action: impl FnOnce(&mut WizardStateMachine) -> Result<T, PortalError>,
    ) -> Result<T, PortalError> {
        self.sessions
            .with_session(session_id, action)
            .unwrap_or_else(|| Err(PortalError::SessionNotFound(session_id.to_string())))
    }
}

/// Error raised by portal operations.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("wizard session {0} was not found")]
    SessionNotFound(String),
    #[error("this step is missing required information")]
    Blocked(Vec<UnmetCondition>),
    #[error("a submission is in progress for this session")]
    Busy,
    #[error("application has already been submitted")]
    Closed,
    #[error(transparent)]
    DraftLocked(#[from] DraftLocked),
    #[error(transparent)]
    Patch(#[from] PatchError),
    #[error(transparent)]
    Document(#[from] FieldNotActive),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("a valid officer bearer token is required")]
    Unauthorized,
}

impl PortalError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PortalError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            PortalError::Blocked(_)
            | PortalError::Patch(_)
            | PortalError::Document(_)
            | PortalError::Storage(StorageError::Empty(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            PortalError::Busy | PortalError::Closed | PortalError::DraftLocked(_) => {
                StatusCode::CONFLICT
            }
            PortalError::Storage(StorageError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            PortalError::Submission(error) => match error {
                SubmissionError::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
                SubmissionError::Transport(_) => StatusCode::SERVICE_UNAVAILABLE,
                SubmissionError::NotAtReview(_)
                | SubmissionError::InFlight
                | SubmissionError::AlreadySubmitted
                | SubmissionError::Duplicate(_) => StatusCode::CONFLICT,
            },
            PortalError::Lifecycle(error) => match error {
                LifecycleError::NotFound(_) => StatusCode::NOT_FOUND,
                LifecycleError::AlreadyDecided { .. } => StatusCode::CONFLICT,
                LifecycleError::InvalidDecision(_) => StatusCode::UNPROCESSABLE_ENTITY,
                LifecycleError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            PortalError::Verification(error) => match error {
                VerificationError::NoPendingCode(_) => StatusCode::NOT_FOUND,
                VerificationError::InvalidAddress(_) | VerificationError::Mismatch => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
            },
            PortalError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PortalError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }

    /// Conditions to show inline, when the failure was a gate.
    pub fn unmet(&self) -> Option<&[UnmetCondition]> {
        match self {
            PortalError::Blocked(unmet)
            | PortalError::Submission(SubmissionError::ValidationFailed(unmet)) => Some(unmet),
            _ => None,
        }
    }
}
