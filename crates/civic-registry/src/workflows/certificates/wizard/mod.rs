//! Applicant intake wizard.
//!
//! The step counter and the draft's selectors form the joint state: the same step number
//! renders a different form, and gates different fields, depending on the certificate type
//! and birth sub-type chosen on step one.

mod gate;
mod step;

pub use gate::{UnmetCondition, ValidationGate};
pub use step::{StepForm, WizardStep};

use serde::Serialize;
use tracing::debug;

use super::domain::{ApplicationPayload, Draft, TrackingId};
use super::submission::SubmissionReceipt;

/// Whether the draft can still be edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardPhase {
    Editing,
    Submitting,
    Submitted,
}

/// Result of asking the wizard to move.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Moved(WizardStep),
    /// Already at the first step; retreat does nothing.
    Stayed(WizardStep),
    /// The gate for the current step failed; nothing changed.
    Blocked(Vec<UnmetCondition>),
    /// Advancing from review hands control to the submission coordinator.
    SubmissionRequested,
    Submitted(SubmissionReceipt),
    /// A submission is in flight; progression waits for it to settle or be cancelled.
    Busy,
    /// The application was submitted; the session is read-only.
    Closed,
}

/// Raised when the draft is edited outside steps 1-4 or while a submission is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("draft is locked while the application is {0:?}")]
pub struct DraftLocked(pub WizardPhase);

/// Owns the draft and the step pointer for one applicant session.
#[derive(Debug, Clone)]
pub struct WizardStateMachine {
    step: WizardStep,
    draft: Draft,
    phase: WizardPhase,
    pending_tracking_id: Option<TrackingId>,
    receipt: Option<SubmissionReceipt>,
    last_error: Option<String>,
}

impl Default for WizardStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl WizardStateMachine {
    pub fn new() -> Self {
        Self::with_draft(Draft::default())
    }

    pub fn with_draft(draft: Draft) -> Self {
        Self {
            step: WizardStep::TypeSelection,
            draft,
            phase: WizardPhase::Editing,
            pending_tracking_id: None,
            receipt: None,
            last_error: None,
        }
    }

    /// Walk a complete draft through the gates up to the review step.
    pub fn fast_forward(draft: Draft) -> Result<Self, Vec<UnmetCondition>> {
        let mut wizard = Self::with_draft(draft);
        while wizard.step != WizardStep::Review {
            match wizard.advance() {
                Transition::Moved(_) => {}
                Transition::Blocked(unmet) => return Err(unmet),
                _ => break,
            }
        }
        Ok(wizard)
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn form(&self) -> StepForm {
        StepForm::resolve(self.step, &self.draft)
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn phase(&self) -> WizardPhase {
        self.phase
    }

    pub fn pending_tracking_id(&self) -> Option<&TrackingId> {
        self.pending_tracking_id.as_ref()
    }

    pub fn receipt(&self) -> Option<&SubmissionReceipt> {
        self.receipt.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn unmet(&self) -> Vec<UnmetCondition> {
        ValidationGate::unmet(self.step, &self.draft)
    }

    pub fn can_advance(&self) -> bool {
        self.phase == WizardPhase::Editing && ValidationGate::can_advance(self.step, &self.draft)
    }

    /// Mutable access for the applicant; refused once a submission starts.
    pub fn draft_mut(&mut self) -> Result<&mut Draft, DraftLocked> {
        match self.phase {
            WizardPhase::Editing => Ok(&mut self.draft),
            phase => Err(DraftLocked(phase)),
        }
    }

    pub fn advance(&mut self) -> Transition {
        match self.phase {
            WizardPhase::Submitted => return Transition::Closed,
            WizardPhase::Submitting => return Transition::Busy,
            WizardPhase::Editing => {}
        }

        let unmet = self.unmet();
        if !unmet.is_empty() {
            debug!(step = self.step.number(), unmet = unmet.len(), "wizard gate blocked advance");
            return Transition::Blocked(unmet);
        }

        if self.step == WizardStep::Review {
            return Transition::SubmissionRequested;
        }

        self.step = self.step.next();
        Transition::Moved(self.step)
    }

    pub fn retreat(&mut self) -> Transition {
        match self.phase {
            WizardPhase::Submitted => return Transition::Closed,
            WizardPhase::Submitting => return Transition::Busy,
            WizardPhase::Editing => {}
        }

        if self.step == WizardStep::TypeSelection {
            return Transition::Stayed(self.step);
        }

        self.step = self.step.previous();
        Transition::Moved(self.step)
    }

    /// Abandon an in-flight submission and return to an editable review step.
    pub fn cancel_submission(&mut self) -> bool {
        if self.phase != WizardPhase::Submitting {
            return false;
        }
        self.phase = WizardPhase::Editing;
        true
    }

    /// Lock the draft for dispatch, reusing the tracking id of any earlier attempt.
    pub(crate) fn lock_for_submission(
        &mut self,
        generate: impl FnOnce() -> TrackingId,
    ) -> Result<(TrackingId, ApplicationPayload), LockRefused> {
        match self.phase {
            WizardPhase::Submitted => return Err(LockRefused::AlreadySubmitted),
            WizardPhase::Submitting => return Err(LockRefused::InFlight),
            WizardPhase::Editing => {}
        }

        if self.step != WizardStep::Review {
            return Err(LockRefused::NotAtReview(self.step));
        }

        let unmet = ValidationGate::unmet_for_submission(&self.draft);
        if !unmet.is_empty() {
            return Err(LockRefused::Unmet(unmet));
        }

        let payload = self
            .draft
            .payload()
            .ok_or_else(|| LockRefused::Unmet(ValidationGate::unmet_for_submission(&self.draft)))?;

        let tracking_id = self.pending_tracking_id.get_or_insert_with(generate).clone();
        self.phase = WizardPhase::Submitting;
        self.last_error = None;
        Ok((tracking_id, payload))
    }

    pub(crate) fn record_success(&mut self, receipt: SubmissionReceipt) {
        self.phase = WizardPhase::Submitted;
        self.step = WizardStep::Confirmation;
        self.last_error = None;
        self.receipt = Some(receipt);
    }

    /// Informational message that survives a successful submission.
    pub(crate) fn record_notice(&mut self, message: String) {
        self.last_error = Some(message);
    }

    pub(crate) fn forget_tracking_id(&mut self) {
        self.pending_tracking_id = None;
    }

    pub(crate) fn record_failure(&mut self, message: String) {
        if self.phase == WizardPhase::Submitting {
            self.phase = WizardPhase::Editing;
        }
        self.last_error = Some(message);
    }
}

/// Why the wizard refused to lock its draft for submission.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LockRefused {
    AlreadySubmitted,
    InFlight,
    NotAtReview(WizardStep),
    Unmet(Vec<UnmetCondition>),
}
