use serde::Serialize;

use super::domain::{ApplicationPayload, DocumentRef};
use super::repository::ApplicationRecord;

/// Downloadable rendering of a submitted application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportArtifact {
    pub file_name: String,
    pub content_type: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to render export: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush export buffer: {0}")]
    Flush(String),
}

/// Render the record as a two-column `field,value` CSV. Only the frozen payload is read.
pub fn render_csv(record: &ApplicationRecord) -> Result<ExportArtifact, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["field", "value"])?;

    let delivery = record.estimated_delivery();
    let submitted_at = record.submitted_at.to_rfc3339();
    let earliest = delivery.earliest.date_naive().to_string();
    let latest = delivery.latest.date_naive().to_string();
    let header = [
        ("tracking_id", record.tracking_id.as_str()),
        ("certificate", record.certificate_type().label()),
        ("status", record.status.label()),
        ("submitted_at", submitted_at.as_str()),
        ("estimated_delivery", delivery.label.as_str()),
        ("delivery_earliest", earliest.as_str()),
        ("delivery_latest", latest.as_str()),
        ("applicant_name", record.payload.applicant_name()),
    ];
    for (field, value) in header {
        writer.write_record([field, value])?;
    }

    for (field, value) in payload_rows(&record.payload) {
        writer.write_record([field, value.as_str()])?;
    }

    if let Some(reason) = record
        .decision
        .as_ref()
        .and_then(|stamp| stamp.reason.as_deref())
    {
        writer.write_record(["rejection_reason", reason])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|error| ExportError::Flush(error.to_string()))?;

    Ok(ExportArtifact {
        file_name: format!("{}.csv", record.tracking_id),
        content_type: mime::TEXT_CSV_UTF_8.to_string(),
        bytes,
    })
}

fn payload_rows(payload: &ApplicationPayload) -> Vec<(&'static str, String)> {
    match payload {
        ApplicationPayload::BirthRegistration(details) => vec![
            ("child_name", details.child_name.clone()),
            ("date_of_birth", details.date_of_birth.clone()),
            ("father_name", details.father_name.clone()),
            ("mother_name", details.mother_name.clone()),
            ("full_address", details.full_address.clone()),
            ("parent_nativity", details.parent_nativity.clone()),
            (
                "parent_id_proof",
                details
                    .parent_id_proof_ref
                    .as_ref()
                    .map(|reference| reference.0.clone())
                    .unwrap_or_default(),
            ),
            (
                "medical_certificate",
                details
                    .medical_record_ref
                    .as_ref()
                    .map(|reference| reference.0.clone())
                    .unwrap_or_default(),
            ),
        ],
        ApplicationPayload::BirthUpdate { issue, details } => {
            let (current, correct) = details.correction_for(*issue);
            vec![
                ("update_issue", issue.label().to_string()),
                ("current_value", current.to_string()),
                ("correct_value", correct.to_string()),
                ("proof_documents", join_refs(&details.proof_document_refs)),
            ]
        }
        ApplicationPayload::PersonalInfo { details, .. } => vec![
            ("full_name", details.full_name.clone()),
            ("email", details.email.clone()),
            ("mobile", details.mobile.clone()),
            ("address", details.address.clone()),
        ],
    }
}

fn join_refs(references: &[DocumentRef]) -> String {
    references
        .iter()
        .map(DocumentRef::as_str)
        .collect::<Vec<_>>()
        .join(";")
}
