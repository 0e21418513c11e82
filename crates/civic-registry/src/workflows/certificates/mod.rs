//! Certificate requests: applicant intake wizard, submission and officer adjudication.

pub mod documents;
pub mod domain;
pub mod export;
pub mod identity;
pub mod lifecycle;
pub mod notification;
pub mod repository;
pub mod router;
pub mod service;
pub mod sessions;
pub mod submission;
pub mod verification;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use documents::{DocumentField, DocumentStore, DocumentUpload, StorageError};
pub use domain::{
    ApplicationPayload, ApplicationStatus, BirthCertificateKind, BirthRegistration, BirthUpdate,
    CertificateType, Decision, DeliveryEstimate, DocumentRef, Draft, DraftBranch, OfficerId,
    PersonalInfo, RecordId, TrackingId, UpdateIssue,
};
pub use export::{render_csv, ExportArtifact, ExportError};
pub use identity::{IdentityProvider, OfficerIdentity, StaticTokenRegistry};
pub use lifecycle::{
    ApplicationLifecycle, DashboardStats, DecisionOutcome, LifecycleError, Priority, QueueEntry,
    QueueFilter,
};
pub use notification::{Notification, NotificationTemplate, Notifier, NotifyError};
pub use repository::{
    ApplicationRecord, ApplicationRepository, ApplicationRow, ApplicationStatusView,
    DecisionStamp, ListFilter, NewApplication, RepositoryError, StatusChange, StatusFlags,
    StatusFlagsError,
};
pub use router::application_router;
pub use service::{CertificatePortal, PortalError};
pub use sessions::{DraftPatch, SessionId, WizardView};
pub use submission::{
    RandomTrackingIds, SubmissionCoordinator, SubmissionError, SubmissionReceipt,
    TrackingIdSource,
};
pub use verification::{CodeIssued, CodeSource, VerificationError, VerificationService};
pub use wizard::{
    StepForm, Transition, UnmetCondition, ValidationGate, WizardPhase, WizardStateMachine,
    WizardStep,
};
