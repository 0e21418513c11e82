use serde::{Deserialize, Serialize};

use super::super::domain::{CertificateType, Draft, DraftBranch};

/// Wizard positions. `Confirmation` is reached only through a successful submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    TypeSelection,
    Details,
    Documents,
    Review,
    Confirmation,
}

impl WizardStep {
    pub const INPUT_STEPS: [WizardStep; 4] = [
        WizardStep::TypeSelection,
        WizardStep::Details,
        WizardStep::Documents,
        WizardStep::Review,
    ];

    pub const fn number(self) -> u8 {
        match self {
            WizardStep::TypeSelection => 1,
            WizardStep::Details => 2,
            WizardStep::Documents => 3,
            WizardStep::Review => 4,
            WizardStep::Confirmation => 5,
        }
    }

    pub const fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(WizardStep::TypeSelection),
            2 => Some(WizardStep::Details),
            3 => Some(WizardStep::Documents),
            4 => Some(WizardStep::Review),
            5 => Some(WizardStep::Confirmation),
            _ => None,
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            WizardStep::TypeSelection => "Choose certificate",
            WizardStep::Details => "Applicant details",
            WizardStep::Documents => "Supporting documents",
            WizardStep::Review => "Review",
            WizardStep::Confirmation => "Submitted",
        }
    }

    pub(crate) const fn next(self) -> Self {
        match self {
            WizardStep::TypeSelection => WizardStep::Details,
            WizardStep::Details => WizardStep::Documents,
            WizardStep::Documents => WizardStep::Review,
            WizardStep::Review | WizardStep::Confirmation => WizardStep::Confirmation,
        }
    }

    pub(crate) const fn previous(self) -> Self {
        match self {
            WizardStep::TypeSelection | WizardStep::Details => WizardStep::TypeSelection,
            WizardStep::Documents => WizardStep::Details,
            WizardStep::Review => WizardStep::Documents,
            WizardStep::Confirmation => WizardStep::Review,
        }
    }
}

/// What a step renders and requires, keyed by `(step, certificate type, sub-type)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum StepForm {
    TypeSelection,
    /// Details or documents reached while the selectors still leave the branch open.
    AwaitingSelection {
        step: WizardStep,
    },
    BirthRegistrationDetails,
    BirthUpdateDetails,
    PersonalDetails {
        certificate_type: CertificateType,
    },
    BirthRegistrationDocuments,
    BirthUpdateDocuments,
    /// Non-birth certificates: the step advances but renders nothing.
    NoDocuments {
        certificate_type: CertificateType,
    },
    Review,
    Confirmation,
}

impl StepForm {
    pub fn resolve(step: WizardStep, draft: &Draft) -> Self {
        let branch = draft.branch();
        match (step, branch) {
            (WizardStep::TypeSelection, _) => StepForm::TypeSelection,
            (WizardStep::Details | WizardStep::Documents, None) => {
                StepForm::AwaitingSelection { step }
            }
            (WizardStep::Details, Some(DraftBranch::BirthRegistration)) => {
                StepForm::BirthRegistrationDetails
            }
            (WizardStep::Details, Some(DraftBranch::BirthUpdate)) => StepForm::BirthUpdateDetails,
            (WizardStep::Details, Some(DraftBranch::PersonalInfo)) => StepForm::PersonalDetails {
                certificate_type: personal_type(draft),
            },
            (WizardStep::Documents, Some(DraftBranch::BirthRegistration)) => {
                StepForm::BirthRegistrationDocuments
            }
            (WizardStep::Documents, Some(DraftBranch::BirthUpdate)) => {
                StepForm::BirthUpdateDocuments
            }
            (WizardStep::Documents, Some(DraftBranch::PersonalInfo)) => StepForm::NoDocuments {
                certificate_type: personal_type(draft),
            },
            (WizardStep::Review, _) => StepForm::Review,
            (WizardStep::Confirmation, _) => StepForm::Confirmation,
        }
    }

    pub const fn renders_nothing(self) -> bool {
        matches!(self, StepForm::NoDocuments { .. })
    }
}

// A personal-info branch always has a certificate type selected.
fn personal_type(draft: &Draft) -> CertificateType {
    draft.certificate_type.unwrap_or(CertificateType::Income)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::certificates::domain::{BirthCertificateKind, CertificateType};

    #[test]
    fn same_step_maps_to_different_forms_by_selector() {
        let mut draft = Draft::default();
        assert_eq!(
            StepForm::resolve(WizardStep::Details, &draft),
            StepForm::AwaitingSelection {
                step: WizardStep::Details
            }
        );

        draft.select_certificate_type(CertificateType::Birth);
        draft.select_birth_kind(BirthCertificateKind::New);
        assert_eq!(
            StepForm::resolve(WizardStep::Details, &draft),
            StepForm::BirthRegistrationDetails
        );

        draft.select_birth_kind(BirthCertificateKind::Update);
        assert_eq!(
            StepForm::resolve(WizardStep::Documents, &draft),
            StepForm::BirthUpdateDocuments
        );

        draft.select_certificate_type(CertificateType::Income);
        let form = StepForm::resolve(WizardStep::Documents, &draft);
        assert!(form.renders_nothing());
    }

    #[test]
    fn step_numbers_round_trip() {
        for number in 1..=5 {
            let step = WizardStep::from_number(number).expect("valid step");
            assert_eq!(step.number(), number);
        }
        assert_eq!(WizardStep::from_number(0), None);
        assert_eq!(WizardStep::from_number(6), None);
    }
}
