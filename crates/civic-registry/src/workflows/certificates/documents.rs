use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::domain::{DocumentRef, Draft, DraftBranch};

/// Upload slots exposed by the document step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocumentField {
    ParentIdProof,
    MedicalCertificate,
    /// Repeatable; every upload appends another reference.
    ProofDocuments,
}

impl DocumentField {
    pub const fn wire_name(self) -> &'static str {
        match self {
            DocumentField::ParentIdProof => "parentIdProof",
            DocumentField::MedicalCertificate => "medicalCertificate",
            DocumentField::ProofDocuments => "proofDocuments",
        }
    }

    pub const fn branch(self) -> DraftBranch {
        match self {
            DocumentField::ParentIdProof | DocumentField::MedicalCertificate => {
                DraftBranch::BirthRegistration
            }
            DocumentField::ProofDocuments => DraftBranch::BirthUpdate,
        }
    }
}

impl fmt::Display for DocumentField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown document field {0:?}")]
pub struct UnknownDocumentField(pub String);

impl FromStr for DocumentField {
    type Err = UnknownDocumentField;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "parentIdProof" | "parent_id_proof" => Ok(DocumentField::ParentIdProof),
            "medicalCertificate" | "medical_certificate" => Ok(DocumentField::MedicalCertificate),
            "proofDocuments" | "proof_documents" => Ok(DocumentField::ProofDocuments),
            other => Err(UnknownDocumentField(other.to_string())),
        }
    }
}

/// Raw upload handed to the file-storage collaborator.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub field: DocumentField,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// File-storage collaborator. References it returns are stored verbatim in the draft.
pub trait DocumentStore: Send + Sync {
    fn store(&self, upload: DocumentUpload) -> Result<DocumentRef, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("uploaded document {0:?} is empty")]
    Empty(String),
    #[error("document storage unavailable: {0}")]
    Unavailable(String),
}

/// Raised when a document targets a branch the selectors have not activated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field} does not belong to the selected certificate")]
pub struct FieldNotActive {
    pub field: DocumentField,
    pub active: Option<DraftBranch>,
}

impl Draft {
    /// Record a stored document reference on the active branch.
    pub fn attach_document(
        &mut self,
        field: DocumentField,
        reference: DocumentRef,
    ) -> Result<(), FieldNotActive> {
        let active = self.branch();
        if active != Some(field.branch()) {
            return Err(FieldNotActive { field, active });
        }

        match field {
            DocumentField::ParentIdProof => {
                self.birth_registration.parent_id_proof_ref = Some(reference)
            }
            DocumentField::MedicalCertificate => {
                self.birth_registration.medical_record_ref = Some(reference)
            }
            DocumentField::ProofDocuments => {
                self.birth_update.proof_document_refs.push(reference)
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::certificates::domain::{BirthCertificateKind, CertificateType};

    #[test]
    fn field_names_accept_both_spellings() {
        assert_eq!(
            "medicalCertificate".parse::<DocumentField>(),
            Ok(DocumentField::MedicalCertificate)
        );
        assert_eq!(
            "proof_documents".parse::<DocumentField>(),
            Ok(DocumentField::ProofDocuments)
        );
        assert!("passport".parse::<DocumentField>().is_err());
    }

    #[test]
    fn attachments_only_land_on_the_active_branch() {
        let mut draft = Draft::default();
        draft.select_certificate_type(CertificateType::Birth);
        draft.select_birth_kind(BirthCertificateKind::Update);

        let refused = draft.attach_document(
            DocumentField::ParentIdProof,
            DocumentRef("doc-1".to_string()),
        );
        assert_eq!(
            refused,
            Err(FieldNotActive {
                field: DocumentField::ParentIdProof,
                active: Some(DraftBranch::BirthUpdate),
            })
        );

        for reference in ["doc-2", "doc-3"] {
            draft
                .attach_document(
                    DocumentField::ProofDocuments,
                    DocumentRef(reference.to_string()),
                )
                .expect("update branch accepts proof documents");
        }
        assert_eq!(draft.birth_update.proof_document_refs.len(), 2);
        assert_eq!(draft.birth_registration.parent_id_proof_ref, None);
    }
}
