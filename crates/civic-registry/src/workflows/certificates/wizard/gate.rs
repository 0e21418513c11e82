use std::fmt;

use serde::Serialize;

use super::super::domain::{Draft, UpdateIssue};
use super::step::{StepForm, WizardStep};

/// Requirement blocking the wizard from leaving a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "condition", rename_all = "snake_case")]
pub enum UnmetCondition {
    CertificateTypeMissing,
    BirthCertificateTypeMissing,
    UpdateIssueMissing,
    FieldMissing { field: &'static str },
    DocumentMissing { field: &'static str },
    ProofDocumentsMissing,
    /// The contact email has not completed one-time code verification.
    ContactNotVerified,
    /// The confirmation step has nowhere further to go.
    WizardClosed,
}

impl fmt::Display for UnmetCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnmetCondition::CertificateTypeMissing => write!(f, "select a certificate type"),
            UnmetCondition::BirthCertificateTypeMissing => {
                write!(f, "choose new registration or certificate updation")
            }
            UnmetCondition::UpdateIssueMissing => write!(f, "choose what needs correcting"),
            UnmetCondition::FieldMissing { field } => write!(f, "{field} is required"),
            UnmetCondition::DocumentMissing { field } => write!(f, "upload {field}"),
            UnmetCondition::ProofDocumentsMissing => {
                write!(f, "upload at least one proof document")
            }
            UnmetCondition::ContactNotVerified => {
                write!(f, "verify your email address before submitting")
            }
            UnmetCondition::WizardClosed => write!(f, "application already submitted"),
        }
    }
}

/// Pure step predicates over the accumulated draft.
pub struct ValidationGate;

impl ValidationGate {
    pub fn can_advance(step: WizardStep, draft: &Draft) -> bool {
        Self::unmet(step, draft).is_empty()
    }

    /// Every unmet requirement for leaving `step`, in display order.
    pub fn unmet(step: WizardStep, draft: &Draft) -> Vec<UnmetCondition> {
        let mut unmet = Vec::new();

        match StepForm::resolve(step, draft) {
            StepForm::TypeSelection | StepForm::AwaitingSelection { .. } => {
                selection_conditions(draft, &mut unmet)
            }
            StepForm::BirthRegistrationDetails => {
                let details = &draft.birth_registration;
                require(&mut unmet, "child_name", &details.child_name);
                require(&mut unmet, "date_of_birth", &details.date_of_birth);
                require(&mut unmet, "father_name", &details.father_name);
                require(&mut unmet, "mother_name", &details.mother_name);
                require(&mut unmet, "full_address", &details.full_address);
                require(&mut unmet, "parent_nativity", &details.parent_nativity);
            }
            StepForm::BirthUpdateDetails => match draft.update_issue_type {
                None => unmet.push(UnmetCondition::UpdateIssueMissing),
                Some(issue) => {
                    let (_, correct) = draft.birth_update.correction_for(issue);
                    require(&mut unmet, correct_field(issue), correct);
                }
            },
            StepForm::PersonalDetails { .. } => {
                require(&mut unmet, "full_name", &draft.personal_info.full_name);
                require(&mut unmet, "email", &draft.personal_info.email);
            }
            StepForm::BirthRegistrationDocuments => {
                let details = &draft.birth_registration;
                if details.parent_id_proof_ref.is_none() {
                    unmet.push(UnmetCondition::DocumentMissing {
                        field: "parent_id_proof",
                    });
                }
                if details.medical_record_ref.is_none() {
                    unmet.push(UnmetCondition::DocumentMissing {
                        field: "medical_certificate",
                    });
                }
            }
            StepForm::BirthUpdateDocuments => {
                if draft.birth_update.proof_document_refs.is_empty() {
                    unmet.push(UnmetCondition::ProofDocumentsMissing);
                }
            }
            StepForm::NoDocuments { .. } | StepForm::Review => {}
            StepForm::Confirmation => unmet.push(UnmetCondition::WizardClosed),
        }

        unmet
    }

    /// Conditions across every input step, used before dispatching a submission.
    pub fn unmet_for_submission(draft: &Draft) -> Vec<UnmetCondition> {
        let mut unmet: Vec<UnmetCondition> = Vec::new();
        for step in WizardStep::INPUT_STEPS {
            for condition in Self::unmet(step, draft) {
                if !unmet.contains(&condition) {
                    unmet.push(condition);
                }
            }
        }
        unmet
    }
}

fn selection_conditions(draft: &Draft, unmet: &mut Vec<UnmetCondition>) {
    match draft.certificate_type {
        None => unmet.push(UnmetCondition::CertificateTypeMissing),
        Some(certificate_type) => {
            if certificate_type.is_birth() && draft.birth_certificate_type.is_none() {
                unmet.push(UnmetCondition::BirthCertificateTypeMissing);
            }
        }
    }
}

fn require(unmet: &mut Vec<UnmetCondition>, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        unmet.push(UnmetCondition::FieldMissing { field });
    }
}

const fn correct_field(issue: UpdateIssue) -> &'static str {
    match issue {
        UpdateIssue::Name => "correct_name",
        UpdateIssue::Dob => "correct_dob",
        UpdateIssue::Gender => "correct_gender",
    }
}
