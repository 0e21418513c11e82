use chrono::NaiveDate;
use civic_registry::workflows::certificates::{
    ApplicationRecord, ApplicationRepository, ApplicationRow, ApplicationStatus, DocumentRef,
    DocumentStore, DocumentUpload, ListFilter, NewApplication, Notification, Notifier,
    NotifyError, RecordId, RepositoryError, StatusChange, StatusFlags, StorageError, TrackingId,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Keeps the flag-pair rows exactly as a document store would, so reads pass the same
/// validation a remote registry forces on us.
#[derive(Default, Clone)]
pub(crate) struct InMemoryApplicationRepository {
    rows: Arc<Mutex<Vec<ApplicationRow>>>,
}

impl InMemoryApplicationRepository {
    fn next_record_id(rows: &[ApplicationRow]) -> RecordId {
        RecordId(format!("rec-{:06}", rows.len() + 1))
    }
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn create(&self, application: NewApplication) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = self.rows.lock().expect("repository mutex poisoned");
        if guard
            .iter()
            .any(|row| row.tracking_id == application.tracking_id)
        {
            return Err(RepositoryError::Conflict);
        }
        let row = ApplicationRow {
            record_id: Self::next_record_id(&guard),
            tracking_id: application.tracking_id,
            flags: StatusFlags::default(),
            submitted_at: application.submitted_at,
            payload: application.payload,
            decision: None,
        };
        guard.push(row.clone());
        Ok(ApplicationRecord::try_from(row)?)
    }

    fn fetch(&self, id: &RecordId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let guard = self.rows.lock().expect("repository mutex poisoned");
        Ok(guard
            .iter()
            .find(|row| &row.record_id == id)
            .cloned()
            .map(ApplicationRecord::try_from)
            .transpose()?)
    }

    fn find_by_tracking_id(
        &self,
        tracking_id: &TrackingId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let guard = self.rows.lock().expect("repository mutex poisoned");
        Ok(guard
            .iter()
            .find(|row| &row.tracking_id == tracking_id)
            .cloned()
            .map(ApplicationRecord::try_from)
            .transpose()?)
    }

    fn list(&self, filter: &ListFilter) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let guard = self.rows.lock().expect("repository mutex poisoned");
        let mut records = Vec::with_capacity(guard.len());
        for row in guard.iter().cloned() {
            let record = ApplicationRecord::try_from(row)?;
            if filter.matches(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn update_status(
        &self,
        id: &RecordId,
        expected: ApplicationStatus,
        change: StatusChange,
    ) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = self.rows.lock().expect("repository mutex poisoned");
        let row = guard
            .iter_mut()
            .find(|row| &row.record_id == id)
            .ok_or(RepositoryError::NotFound)?;
        let current = row.flags.status()?;
        if current != expected {
            return Err(RepositoryError::StatusConflict { current });
        }
        let next = StatusFlags::from_status(change.status);
        next.transition_from(current)?;
        row.flags = next;
        row.decision = Some(change.stamp);
        Ok(ApplicationRecord::try_from(row.clone())?)
    }
}

/// Writes every outbound message to the log instead of a mail relay.
#[derive(Default, Clone)]
pub(crate) struct LoggingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl Notifier for LoggingNotifier {
    fn send(&self, notification: Notification) -> Result<(), NotifyError> {
        info!(
            template = ?notification.template,
            address = %notification.address,
            "notification queued"
        );
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
        Ok(())
    }
}

impl LoggingNotifier {
    pub(crate) fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct StoredDocument {
    pub(crate) content_type: String,
    pub(crate) size: usize,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryDocumentStore {
    documents: Arc<Mutex<HashMap<String, StoredDocument>>>,
}

impl DocumentStore for InMemoryDocumentStore {
    fn store(&self, upload: DocumentUpload) -> Result<DocumentRef, StorageError> {
        if upload.bytes.is_empty() {
            return Err(StorageError::Empty(upload.file_name));
        }
        let content_type = upload.content_type.unwrap_or_else(|| {
            mime_guess::from_path(&upload.file_name)
                .first_or_octet_stream()
                .to_string()
        });

        let mut guard = self.documents.lock().expect("document mutex poisoned");
        let reference = format!(
            "uploads/{}/{}-{}",
            upload.field.wire_name(),
            guard.len() + 1,
            upload.file_name
        );
        guard.insert(
            reference.clone(),
            StoredDocument {
                content_type,
                size: upload.bytes.len(),
            },
        );
        Ok(DocumentRef(reference))
    }
}

impl InMemoryDocumentStore {
    pub(crate) fn get(&self, reference: &DocumentRef) -> Option<StoredDocument> {
        self.documents
            .lock()
            .expect("document mutex poisoned")
            .get(reference.as_str())
            .cloned()
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
