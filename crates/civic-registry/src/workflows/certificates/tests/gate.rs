use super::common::*;

use crate::workflows::certificates::domain::{
    BirthCertificateKind, CertificateType, DocumentRef, Draft, UpdateIssue,
};
use crate::workflows::certificates::wizard::{UnmetCondition, ValidationGate, WizardStep};

#[test]
fn non_birth_drafts_always_pass_the_document_step() {
    for certificate_type in [
        CertificateType::Income,
        CertificateType::Caste,
        CertificateType::Residence,
    ] {
        let mut draft = Draft::default();
        draft.select_certificate_type(certificate_type);
        assert!(
            ValidationGate::can_advance(WizardStep::Documents, &draft),
            "{certificate_type:?} should skip documents"
        );

        let complete = personal_draft(certificate_type);
        assert!(ValidationGate::can_advance(WizardStep::Documents, &complete));
    }
}

#[test]
fn birth_registration_documents_require_both_references() {
    let cases = [
        (None, None, false),
        (Some("p1"), None, false),
        (None, Some("m1"), false),
        (Some("p1"), Some("m1"), true),
    ];

    for (parent_proof, medical, expected) in cases {
        let mut draft = birth_registration_draft();
        draft.birth_registration.parent_id_proof_ref =
            parent_proof.map(|value| DocumentRef(value.to_string()));
        draft.birth_registration.medical_record_ref =
            medical.map(|value| DocumentRef(value.to_string()));

        assert_eq!(
            ValidationGate::can_advance(WizardStep::Documents, &draft),
            expected,
            "parent proof {parent_proof:?}, medical {medical:?}"
        );
    }
}

#[test]
fn missing_documents_are_reported_by_field() {
    let mut draft = birth_registration_draft();
    draft.birth_registration.parent_id_proof_ref = None;
    draft.birth_registration.medical_record_ref = None;

    assert_eq!(
        ValidationGate::unmet(WizardStep::Documents, &draft),
        vec![
            UnmetCondition::DocumentMissing {
                field: "parent_id_proof"
            },
            UnmetCondition::DocumentMissing {
                field: "medical_certificate"
            },
        ]
    );
}

#[test]
fn type_selection_requires_birth_sub_type() {
    let mut draft = Draft::default();
    assert_eq!(
        ValidationGate::unmet(WizardStep::TypeSelection, &draft),
        vec![UnmetCondition::CertificateTypeMissing]
    );

    draft.select_certificate_type(CertificateType::Birth);
    assert_eq!(
        ValidationGate::unmet(WizardStep::TypeSelection, &draft),
        vec![UnmetCondition::BirthCertificateTypeMissing]
    );

    draft.select_birth_kind(BirthCertificateKind::New);
    assert!(ValidationGate::can_advance(WizardStep::TypeSelection, &draft));

    let mut income = Draft::default();
    income.select_certificate_type(CertificateType::Income);
    assert!(ValidationGate::can_advance(WizardStep::TypeSelection, &income));
}

#[test]
fn whitespace_only_fields_count_as_empty() {
    let mut draft = birth_registration_draft();
    draft.birth_registration.mother_name = "   ".to_string();

    assert_eq!(
        ValidationGate::unmet(WizardStep::Details, &draft),
        vec![UnmetCondition::FieldMissing {
            field: "mother_name"
        }]
    );
}

#[test]
fn birth_update_requires_only_the_matching_correct_field() {
    let mut draft = birth_update_draft(UpdateIssue::Dob);
    draft.birth_update.current_dob.clear();
    draft.birth_update.correct_name.clear();
    assert!(ValidationGate::can_advance(WizardStep::Details, &draft));

    draft.birth_update.correct_dob.clear();
    assert_eq!(
        ValidationGate::unmet(WizardStep::Details, &draft),
        vec![UnmetCondition::FieldMissing {
            field: "correct_dob"
        }]
    );

    draft.update_issue_type = None;
    assert_eq!(
        ValidationGate::unmet(WizardStep::Details, &draft),
        vec![UnmetCondition::UpdateIssueMissing]
    );
}

#[test]
fn birth_update_needs_at_least_one_proof_document() {
    let mut draft = birth_update_draft(UpdateIssue::Gender);
    assert!(ValidationGate::can_advance(WizardStep::Documents, &draft));

    draft.birth_update.proof_document_refs.clear();
    assert_eq!(
        ValidationGate::unmet(WizardStep::Documents, &draft),
        vec![UnmetCondition::ProofDocumentsMissing]
    );
}

#[test]
fn personal_details_require_name_and_email() {
    let mut draft = personal_draft(CertificateType::Caste);
    draft.personal_info.mobile.clear();
    draft.personal_info.address.clear();
    assert!(ValidationGate::can_advance(WizardStep::Details, &draft));

    draft.personal_info.email.clear();
    assert!(!ValidationGate::can_advance(WizardStep::Details, &draft));
}

#[test]
fn review_always_passes_and_confirmation_never_does() {
    let draft = Draft::default();
    assert!(ValidationGate::can_advance(WizardStep::Review, &draft));
    assert_eq!(
        ValidationGate::unmet(WizardStep::Confirmation, &draft),
        vec![UnmetCondition::WizardClosed]
    );
}

#[test]
fn submission_check_unions_every_input_step() {
    let mut draft = birth_registration_draft();
    draft.birth_registration.child_name.clear();
    draft.birth_registration.medical_record_ref = None;

    assert_eq!(
        ValidationGate::unmet_for_submission(&draft),
        vec![
            UnmetCondition::FieldMissing {
                field: "child_name"
            },
            UnmetCondition::DocumentMissing {
                field: "medical_certificate"
            },
        ]
    );
}
