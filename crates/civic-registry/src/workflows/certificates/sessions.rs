use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{
    BirthCertificateKind, CertificateType, Draft, TrackingId, UpdateIssue,
};
use super::submission::SubmissionReceipt;
use super::wizard::{StepForm, UnmetCondition, WizardPhase, WizardStateMachine};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of one wizard session for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct WizardView {
    pub session_id: SessionId,
    pub step: u8,
    pub title: &'static str,
    pub form: StepForm,
    pub phase: WizardPhase,
    pub can_advance: bool,
    pub unmet: Vec<UnmetCondition>,
    pub draft: Draft,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_tracking_id: Option<TrackingId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<SubmissionReceipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl WizardView {
    pub fn of(session_id: &SessionId, wizard: &WizardStateMachine) -> Self {
        let step = wizard.step();
        Self {
            session_id: session_id.clone(),
            step: step.number(),
            title: step.title(),
            form: wizard.form(),
            phase: wizard.phase(),
            can_advance: wizard.can_advance(),
            unmet: wizard.unmet(),
            draft: wizard.draft().clone(),
            pending_tracking_id: wizard.pending_tracking_id().cloned(),
            receipt: wizard.receipt().cloned(),
            last_error: wizard.last_error().map(str::to_string),
        }
    }
}

/// Partial draft update. Selectors are applied first, then text fields by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DraftPatch {
    pub certificate_type: Option<CertificateType>,
    pub birth_certificate_type: Option<BirthCertificateKind>,
    pub update_issue_type: Option<UpdateIssue>,
    pub fields: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    #[error("birth certificate type applies only to birth certificates")]
    BirthKindWithoutBirth,
    #[error("update issue applies only to birth certificate updates")]
    IssueWithoutUpdate,
    #[error("unknown draft field {0:?}")]
    UnknownField(String),
}

impl DraftPatch {
    /// Apply all-or-nothing: on error the draft is untouched.
    pub fn apply(&self, draft: &mut Draft) -> Result<(), PatchError> {
        let mut next = draft.clone();

        if let Some(certificate_type) = self.certificate_type {
            next.select_certificate_type(certificate_type);
        }
        if let Some(kind) = self.birth_certificate_type {
            if next.certificate_type != Some(CertificateType::Birth) {
                return Err(PatchError::BirthKindWithoutBirth);
            }
            next.select_birth_kind(kind);
        }
        if let Some(issue) = self.update_issue_type {
            if next.birth_certificate_type != Some(BirthCertificateKind::Update) {
                return Err(PatchError::IssueWithoutUpdate);
            }
            next.select_update_issue(issue);
        }

        for (name, value) in &self.fields {
            let slot =
                text_field(&mut next, name).ok_or_else(|| PatchError::UnknownField(name.clone()))?;
            *slot = value.clone();
        }

        *draft = next;
        Ok(())
    }
}

fn text_field<'a>(draft: &'a mut Draft, name: &str) -> Option<&'a mut String> {
    let field = match name {
        "full_name" => &mut draft.personal_info.full_name,
        "email" => &mut draft.personal_info.email,
        "mobile" => &mut draft.personal_info.mobile,
        "address" => &mut draft.personal_info.address,
        "child_name" => &mut draft.birth_registration.child_name,
        "date_of_birth" => &mut draft.birth_registration.date_of_birth,
        "father_name" => &mut draft.birth_registration.father_name,
        "mother_name" => &mut draft.birth_registration.mother_name,
        "full_address" => &mut draft.birth_registration.full_address,
        "parent_nativity" => &mut draft.birth_registration.parent_nativity,
        "current_name" => &mut draft.birth_update.current_name,
        "correct_name" => &mut draft.birth_update.correct_name,
        "current_dob" => &mut draft.birth_update.current_dob,
        "correct_dob" => &mut draft.birth_update.correct_dob,
        "current_gender" => &mut draft.birth_update.current_gender,
        "correct_gender" => &mut draft.birth_update.correct_gender,
        _ => return None,
    };
    Some(field)
}

/// Characters of randomness in a session id (alphanumeric, about 190 bits).
const SESSION_TOKEN_LEN: usize = 32;

/// Sessions untouched for this long are dropped.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

struct Session {
    wizard: WizardStateMachine,
    touched: Instant,
}

/// In-process store of applicant wizard sessions.
///
/// Ids are unguessable bearer tokens: holding the id is what makes a caller the session's
/// owner. Sessions leave the store when closed or after sitting idle past the timeout.
pub struct WizardSessions {
    sessions: Mutex<HashMap<SessionId, Session>>,
    idle_timeout: Duration,
}

impl Default for WizardSessions {
    fn default() -> Self {
        Self::new()
    }
}

impl WizardSessions {
    pub fn new() -> Self {
        Self::with_idle_timeout(DEFAULT_IDLE_TIMEOUT)
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    pub fn open(&self) -> WizardView {
        let session_id = fresh_session_id();
        let wizard = WizardStateMachine::new();
        let view = WizardView::of(&session_id, &wizard);

        let mut sessions = self.sessions.lock().expect("session mutex poisoned");
        let now = Instant::now();
        let before = sessions.len();
        sessions.retain(|_, session| now.duration_since(session.touched) < self.idle_timeout);
        if sessions.len() < before {
            debug!(expired = before - sessions.len(), "idle wizard sessions dropped");
        }
        sessions.insert(
            session_id,
            Session {
                wizard,
                touched: now,
            },
        );
        view
    }

    pub fn view(&self, session_id: &SessionId) -> Option<WizardView> {
        self.with_session(session_id, |wizard| WizardView::of(session_id, wizard))
    }

    /// Run `action` with the session locked. The lock is released before returning.
    pub fn with_session<T>(
        &self,
        session_id: &SessionId,
        action: impl FnOnce(&mut WizardStateMachine) -> T,
    ) -> Option<T> {
        let mut sessions = self.sessions.lock().expect("session mutex poisoned");
        let now = Instant::now();
        let expired = sessions
            .get(session_id)
            .is_some_and(|session| now.duration_since(session.touched) >= self.idle_timeout);
        if expired {
            sessions.remove(session_id);
            return None;
        }

        let session = sessions.get_mut(session_id)?;
        session.touched = now;
        Some(action(&mut session.wizard))
    }

    /// Remove a session, returning its final state.
    pub fn close(&self, session_id: &SessionId) -> Option<WizardStateMachine> {
        self.sessions
            .lock()
            .expect("session mutex poisoned")
            .remove(session_id)
            .map(|session| session.wizard)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().expect("session mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn fresh_session_id() -> SessionId {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LEN)
        .map(char::from)
        .collect();
    SessionId(format!("wiz-{token}"))
}
