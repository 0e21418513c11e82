use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::certificates::documents::{DocumentStore, DocumentUpload, StorageError};
use crate::workflows::certificates::domain::{
    ApplicationPayload, ApplicationStatus, BirthCertificateKind, CertificateType, DocumentRef,
    Draft, PersonalInfo, RecordId, TrackingId, UpdateIssue,
};
use crate::workflows::certificates::identity::{OfficerIdentity, StaticTokenRegistry};
use crate::workflows::certificates::notification::{Notification, Notifier, NotifyError};
use crate::workflows::certificates::repository::{
    ApplicationRecord, ApplicationRepository, ListFilter, NewApplication, RepositoryError,
    StatusChange, StatusFlags,
};
use crate::workflows::certificates::service::CertificatePortal;
use crate::workflows::certificates::submission::TrackingIdSource;

pub(super) const OFFICER_TOKEN: &str = "officer-token";

pub(super) fn officer() -> OfficerIdentity {
    OfficerIdentity::new("off-017", "R. Iyer")
}

pub(super) fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

/// The complete birth registration used across scenarios.
pub(super) fn birth_registration_draft() -> Draft {
    let mut draft = Draft::default();
    draft.select_certificate_type(CertificateType::Birth);
    draft.select_birth_kind(BirthCertificateKind::New);
    let details = &mut draft.birth_registration;
    details.child_name = "A".to_string();
    details.date_of_birth = "2020-01-01".to_string();
    details.father_name = "B".to_string();
    details.mother_name = "C".to_string();
    details.full_address = "X".to_string();
    details.parent_nativity = "Y".to_string();
    details.parent_id_proof_ref = Some(DocumentRef("p1".to_string()));
    details.medical_record_ref = Some(DocumentRef("m1".to_string()));
    draft
}

pub(super) fn birth_update_draft(issue: UpdateIssue) -> Draft {
    let mut draft = Draft::default();
    draft.select_certificate_type(CertificateType::Birth);
    draft.select_birth_kind(BirthCertificateKind::Update);
    draft.select_update_issue(issue);
    let details = &mut draft.birth_update;
    details.current_name = "Aarav Shrma".to_string();
    details.correct_name = "Aarav Sharma".to_string();
    details.correct_dob = "2019-06-14".to_string();
    details.correct_gender = "male".to_string();
    details
        .proof_document_refs
        .push(DocumentRef("school-leaving-certificate".to_string()));
    draft
}

pub(super) fn personal_draft(certificate_type: CertificateType) -> Draft {
    let mut draft = Draft::default();
    draft.select_certificate_type(certificate_type);
    draft.personal_info = PersonalInfo {
        full_name: "Lakshmi Nair".to_string(),
        email: "lakshmi@example.org".to_string(),
        mobile: "9840012345".to_string(),
        address: "14 Temple Street, Madurai".to_string(),
    };
    draft
}

pub(super) fn personal_payload(certificate_type: CertificateType) -> ApplicationPayload {
    personal_draft(certificate_type)
        .payload()
        .expect("complete personal draft")
}

#[derive(Default)]
pub(super) struct MemoryRepository {
    records: Mutex<HashMap<RecordId, ApplicationRecord>>,
    sequence: AtomicU64,
    creates: AtomicUsize,
}

impl MemoryRepository {
    pub(super) fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub(super) fn records(&self) -> Vec<ApplicationRecord> {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Seed a pending record with a fixed submission time.
    pub(super) fn seed(
        &self,
        tracking_suffix: &str,
        payload: ApplicationPayload,
        submitted_at: DateTime<Utc>,
    ) -> ApplicationRecord {
        let tracking_id =
            TrackingId::parse(&format!("APP{tracking_suffix}")).expect("valid tracking id");
        self.create(NewApplication {
            tracking_id,
            submitted_at,
            payload,
        })
        .expect("seed succeeds")
    }
}

impl ApplicationRepository for MemoryRepository {
    fn create(&self, application: NewApplication) -> Result<ApplicationRecord, RepositoryError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard
            .values()
            .any(|record| record.tracking_id == application.tracking_id)
        {
            return Err(RepositoryError::Conflict);
        }
        let id = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let record = ApplicationRecord {
            record_id: RecordId(format!("rec-{id:04}")),
            tracking_id: application.tracking_id,
            status: ApplicationStatus::Submitted,
            submitted_at: application.submitted_at,
            payload: application.payload,
            decision: None,
        };
        guard.insert(record.record_id.clone(), record.clone());
        Ok(record)
    }

    fn fetch(&self, id: &RecordId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn find_by_tracking_id(
        &self,
        tracking_id: &TrackingId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .find(|record| &record.tracking_id == tracking_id)
            .cloned())
    }

    fn list(&self, filter: &ListFilter) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut records: Vec<ApplicationRecord> = guard
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();
        records.sort_by(|left, right| left.record_id.cmp(&right.record_id));
        Ok(records)
    }

    fn update_status(
        &self,
        id: &RecordId,
        expected: ApplicationStatus,
        change: StatusChange,
    ) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let record = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if record.status != expected {
            return Err(RepositoryError::StatusConflict {
                current: record.status,
            });
        }
        record.status = StatusFlags::from_status(change.status).transition_from(record.status)?;
        record.decision = Some(change.stamp);
        Ok(record.clone())
    }
}

/// Fails the first `failures` creates, then behaves like [`MemoryRepository`].
pub(super) struct FlakyRepository {
    pub(super) inner: MemoryRepository,
    failures: AtomicUsize,
    pub(super) seen: Mutex<Vec<TrackingId>>,
}

impl FlakyRepository {
    pub(super) fn failing(failures: usize) -> Self {
        Self {
            inner: MemoryRepository::default(),
            failures: AtomicUsize::new(failures),
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl ApplicationRepository for FlakyRepository {
    fn create(&self, application: NewApplication) -> Result<ApplicationRecord, RepositoryError> {
        self.seen
            .lock()
            .expect("seen mutex poisoned")
            .push(application.tracking_id.clone());
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(RepositoryError::Unavailable("registry offline".to_string()));
        }
        self.inner.create(application)
    }

    fn fetch(&self, id: &RecordId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn find_by_tracking_id(
        &self,
        tracking_id: &TrackingId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        self.inner.find_by_tracking_id(tracking_id)
    }

    fn list(&self, filter: &ListFilter) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        self.inner.list(filter)
    }

    fn update_status(
        &self,
        id: &RecordId,
        expected: ApplicationStatus,
        change: StatusChange,
    ) -> Result<ApplicationRecord, RepositoryError> {
        self.inner.update_status(id, expected, change)
    }
}

pub(super) struct UnavailableRepository;

impl ApplicationRepository for UnavailableRepository {
    fn create(&self, _application: NewApplication) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &RecordId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_by_tracking_id(
        &self,
        _tracking_id: &TrackingId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self, _filter: &ListFilter) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_status(
        &self,
        _id: &RecordId,
        _expected: ApplicationStatus,
        _change: StatusChange,
    ) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub(super) fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }
}

impl Notifier for MemoryNotifier {
    fn send(&self, notification: Notification) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(super) struct OfflineNotifier;

impl Notifier for OfflineNotifier {
    fn send(&self, _notification: Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp relay offline".to_string()))
    }
}

/// Hands out tracking ids in order, then repeats the last one.
pub(super) struct FixedTrackingIds {
    ids: Mutex<Vec<TrackingId>>,
}

impl FixedTrackingIds {
    pub(super) fn new(suffixes: &[&str]) -> Self {
        let mut ids: Vec<TrackingId> = suffixes
            .iter()
            .map(|suffix| TrackingId::parse(&format!("APP{suffix}")).expect("valid tracking id"))
            .collect();
        ids.reverse();
        Self {
            ids: Mutex::new(ids),
        }
    }
}

impl TrackingIdSource for FixedTrackingIds {
    fn next_tracking_id(&self) -> TrackingId {
        let mut ids = self.ids.lock().expect("tracking mutex poisoned");
        if ids.len() > 1 {
            ids.pop().expect("non-empty")
        } else {
            ids.last().cloned().expect("at least one tracking id")
        }
    }
}

#[derive(Default)]
pub(super) struct MemoryDocuments {
    stored: Mutex<Vec<DocumentUpload>>,
}

impl MemoryDocuments {
    pub(super) fn stored(&self) -> usize {
        self.stored.lock().expect("documents mutex poisoned").len()
    }
}

impl DocumentStore for MemoryDocuments {
    fn store(&self, upload: DocumentUpload) -> Result<DocumentRef, StorageError> {
        if upload.bytes.is_empty() {
            return Err(StorageError::Empty(upload.file_name));
        }
        let mut stored = self.stored.lock().expect("documents mutex poisoned");
        let reference = DocumentRef(format!(
            "doc-{}-{}",
            stored.len() + 1,
            upload.field.wire_name()
        ));
        stored.push(upload);
        Ok(reference)
    }
}

pub(super) struct PortalFixture<R> {
    pub(super) portal: Arc<CertificatePortal<R, MemoryNotifier>>,
    pub(super) repository: Arc<R>,
    pub(super) notifier: Arc<MemoryNotifier>,
    pub(super) documents: Arc<MemoryDocuments>,
}

pub(super) fn build_portal() -> PortalFixture<MemoryRepository> {
    build_portal_with(MemoryRepository::default())
}

pub(super) fn build_portal_with<R>(repository: R) -> PortalFixture<R>
where
    R: ApplicationRepository + 'static,
{
    let repository = Arc::new(repository);
    let notifier = Arc::new(MemoryNotifier::default());
    let documents = Arc::new(MemoryDocuments::default());
    let identity = StaticTokenRegistry::default().with_officer(OFFICER_TOKEN, officer());
    let portal = CertificatePortal::new(
        Arc::clone(&repository),
        Arc::clone(&notifier),
        documents.clone(),
        Arc::new(identity),
    );
    PortalFixture {
        portal: Arc::new(portal),
        repository,
        notifier,
        documents,
    }
}

pub(super) fn days_before(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now - Duration::days(days)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
