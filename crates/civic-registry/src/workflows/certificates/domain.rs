use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Prefix carried by every client-visible tracking identifier.
pub const TRACKING_PREFIX: &str = "APP";
/// Number of `[A-Z0-9]` characters following the prefix.
pub const TRACKING_SUFFIX_LEN: usize = 9;

/// Certificates the portal accepts requests for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateType {
    Birth,
    Income,
    Caste,
    Residence,
}

impl CertificateType {
    pub const ALL: [CertificateType; 4] = [
        CertificateType::Birth,
        CertificateType::Income,
        CertificateType::Caste,
        CertificateType::Residence,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            CertificateType::Birth => "Birth Certificate",
            CertificateType::Income => "Income Certificate",
            CertificateType::Caste => "Caste Certificate",
            CertificateType::Residence => "Residence Certificate",
        }
    }

    pub const fn code(self) -> &'static str {
        match self {
            CertificateType::Birth => "birth",
            CertificateType::Income => "income",
            CertificateType::Caste => "caste",
            CertificateType::Residence => "residence",
        }
    }

    pub const fn is_birth(self) -> bool {
        matches!(self, CertificateType::Birth)
    }

    pub const fn delivery_window(self) -> DeliveryWindow {
        match self {
            CertificateType::Birth => DeliveryWindow {
                min_days: 3,
                max_days: 5,
            },
            _ => DeliveryWindow {
                min_days: 7,
                max_days: 10,
            },
        }
    }
}

/// Whether a birth request registers a new birth or corrects an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BirthCertificateKind {
    New,
    Update,
}

/// Field being corrected on an existing birth record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateIssue {
    Name,
    Dob,
    Gender,
}

impl UpdateIssue {
    pub const fn label(self) -> &'static str {
        match self {
            UpdateIssue::Name => "Incorrect Name",
            UpdateIssue::Dob => "Incorrect Date of Birth",
            UpdateIssue::Gender => "Incorrect Gender",
        }
    }
}

/// Stable reference returned by the file-storage collaborator. Contents are never inspected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentRef(pub String);

impl DocumentRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Contact details collected for income, caste and residence certificates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalInfo {
    pub full_name: String,
    pub email: String,
    pub mobile: String,
    pub address: String,
}

/// Details for registering a new birth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BirthRegistration {
    pub child_name: String,
    pub date_of_birth: String,
    pub father_name: String,
    pub mother_name: String,
    pub full_address: String,
    pub parent_nativity: String,
    pub parent_id_proof_ref: Option<DocumentRef>,
    pub medical_record_ref: Option<DocumentRef>,
}

/// Corrections requested against an existing birth record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BirthUpdate {
    pub current_name: String,
    pub correct_name: String,
    pub current_dob: String,
    pub correct_dob: String,
    pub current_gender: String,
    pub correct_gender: String,
    pub proof_document_refs: Vec<DocumentRef>,
}

impl BirthUpdate {
    pub fn correction_for(&self, issue: UpdateIssue) -> (&str, &str) {
        match issue {
            UpdateIssue::Name => (&self.current_name, &self.correct_name),
            UpdateIssue::Dob => (&self.current_dob, &self.correct_dob),
            UpdateIssue::Gender => (&self.current_gender, &self.correct_gender),
        }
    }
}

/// Which of the draft's sub-objects is live for the current selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftBranch {
    BirthRegistration,
    BirthUpdate,
    PersonalInfo,
}

/// In-progress application owned by a single applicant session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Draft {
    pub certificate_type: Option<CertificateType>,
    pub birth_certificate_type: Option<BirthCertificateKind>,
    pub update_issue_type: Option<UpdateIssue>,
    pub personal_info: PersonalInfo,
    pub birth_registration: BirthRegistration,
    pub birth_update: BirthUpdate,
}

impl Draft {
    /// Choose the certificate. Sub-type selectors only survive while the type stays `birth`.
    pub fn select_certificate_type(&mut self, certificate_type: CertificateType) {
        self.certificate_type = Some(certificate_type);
        if !certificate_type.is_birth() {
            self.birth_certificate_type = None;
            self.update_issue_type = None;
        }
    }

    pub fn select_birth_kind(&mut self, kind: BirthCertificateKind) {
        self.birth_certificate_type = Some(kind);
        if kind == BirthCertificateKind::New {
            self.update_issue_type = None;
        }
    }

    pub fn select_update_issue(&mut self, issue: UpdateIssue) {
        self.update_issue_type = Some(issue);
    }

    /// Resolve the active sub-object. `None` until the selectors identify one.
    pub fn branch(&self) -> Option<DraftBranch> {
        match (self.certificate_type?, self.birth_certificate_type) {
            (CertificateType::Birth, None) => None,
            (CertificateType::Birth, Some(BirthCertificateKind::New)) => {
                Some(DraftBranch::BirthRegistration)
            }
            (CertificateType::Birth, Some(BirthCertificateKind::Update)) => {
                Some(DraftBranch::BirthUpdate)
            }
            (_, _) => Some(DraftBranch::PersonalInfo),
        }
    }

    /// Freeze the active sub-object. Inactive branches never leave the draft.
    pub fn payload(&self) -> Option<ApplicationPayload> {
        match self.branch()? {
            DraftBranch::BirthRegistration => Some(ApplicationPayload::BirthRegistration(
                self.birth_registration.clone(),
            )),
            DraftBranch::BirthUpdate => Some(ApplicationPayload::BirthUpdate {
                issue: self.update_issue_type?,
                details: self.birth_update.clone(),
            }),
            DraftBranch::PersonalInfo => Some(ApplicationPayload::PersonalInfo {
                certificate_type: self.certificate_type?,
                details: self.personal_info.clone(),
            }),
        }
    }
}

/// Frozen copy of the active draft branch stored on the application record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApplicationPayload {
    BirthRegistration(BirthRegistration),
    BirthUpdate {
        issue: UpdateIssue,
        details: BirthUpdate,
    },
    PersonalInfo {
        certificate_type: CertificateType,
        details: PersonalInfo,
    },
}

impl ApplicationPayload {
    pub fn certificate_type(&self) -> CertificateType {
        match self {
            ApplicationPayload::BirthRegistration(_) | ApplicationPayload::BirthUpdate { .. } => {
                CertificateType::Birth
            }
            ApplicationPayload::PersonalInfo {
                certificate_type, ..
            } => *certificate_type,
        }
    }

    pub fn branch(&self) -> DraftBranch {
        match self {
            ApplicationPayload::BirthRegistration(_) => DraftBranch::BirthRegistration,
            ApplicationPayload::BirthUpdate { .. } => DraftBranch::BirthUpdate,
            ApplicationPayload::PersonalInfo { .. } => DraftBranch::PersonalInfo,
        }
    }

    /// Name shown to officers in the review queue.
    pub fn applicant_name(&self) -> &str {
        match self {
            ApplicationPayload::BirthRegistration(details) => &details.child_name,
            ApplicationPayload::BirthUpdate { details, .. } => {
                if details.correct_name.trim().is_empty() {
                    &details.current_name
                } else {
                    &details.correct_name
                }
            }
            ApplicationPayload::PersonalInfo { details, .. } => &details.full_name,
        }
    }

    /// Address decision notices go to, when the payload carries one.
    pub fn contact_email(&self) -> Option<&str> {
        match self {
            ApplicationPayload::PersonalInfo { details, .. } if !details.email.trim().is_empty() => {
                Some(details.email.trim())
            }
            _ => None,
        }
    }

    pub fn document_refs(&self) -> Vec<&DocumentRef> {
        match self {
            ApplicationPayload::BirthRegistration(details) => details
                .parent_id_proof_ref
                .iter()
                .chain(details.medical_record_ref.iter())
                .collect(),
            ApplicationPayload::BirthUpdate { details, .. } => {
                details.proof_document_refs.iter().collect()
            }
            ApplicationPayload::PersonalInfo { .. } => Vec::new(),
        }
    }
}

/// Backend-assigned persistence key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-visible surrogate shown to the applicant, e.g. `APP7K2M9QX4B`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingId(String);

impl TrackingId {
    /// Accepts `APP` followed by nine upper-case alphanumerics.
    pub fn parse(raw: &str) -> Option<Self> {
        let suffix = raw.strip_prefix(TRACKING_PREFIX)?;
        let valid = suffix.len() == TRACKING_SUFFIX_LEN
            && suffix
                .bytes()
                .all(|byte| byte.is_ascii_uppercase() || byte.is_ascii_digit());
        valid.then(|| Self(raw.to_string()))
    }

    pub(crate) fn from_suffix(suffix: &str) -> Self {
        Self(format!("{TRACKING_PREFIX}{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status of a persisted application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Submitted,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, ApplicationStatus::Submitted)
    }
}

/// Officer adjudication. Only rejections carry a reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected { reason: Option<String> },
}

impl Decision {
    pub fn rejected(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let trimmed = reason.trim();
        Decision::Rejected {
            reason: (!trimmed.is_empty()).then(|| trimmed.to_string()),
        }
    }

    pub const fn status(&self) -> ApplicationStatus {
        match self {
            Decision::Approved => ApplicationStatus::Approved,
            Decision::Rejected { .. } => ApplicationStatus::Rejected,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Decision::Approved => None,
            Decision::Rejected { reason } => reason.as_deref(),
        }
    }
}

/// Identifier of the officer a decision is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfficerId(pub String);

/// Inclusive delivery range in days after submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryWindow {
    pub min_days: u8,
    pub max_days: u8,
}

impl DeliveryWindow {
    pub fn label(self) -> String {
        format!("{}-{} business days", self.min_days, self.max_days)
    }

    pub fn estimate_from(self, submitted_at: DateTime<Utc>) -> DeliveryEstimate {
        DeliveryEstimate {
            earliest: submitted_at + Duration::days(i64::from(self.min_days)),
            latest: submitted_at + Duration::days(i64::from(self.max_days)),
            label: self.label(),
        }
    }
}

/// Display-only estimate derived from the submission timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryEstimate {
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switching_away_from_birth_clears_sub_selectors() {
        let mut draft = Draft::default();
        draft.select_certificate_type(CertificateType::Birth);
        draft.select_birth_kind(BirthCertificateKind::Update);
        draft.select_update_issue(UpdateIssue::Dob);

        draft.select_certificate_type(CertificateType::Residence);

        assert_eq!(draft.birth_certificate_type, None);
        assert_eq!(draft.update_issue_type, None);
        assert_eq!(draft.branch(), Some(DraftBranch::PersonalInfo));
    }

    #[test]
    fn birth_without_sub_type_has_no_branch() {
        let mut draft = Draft::default();
        assert_eq!(draft.branch(), None);
        draft.select_certificate_type(CertificateType::Birth);
        assert_eq!(draft.branch(), None);
        assert!(draft.payload().is_none());
    }

    #[test]
    fn tracking_ids_require_prefix_and_alphabet() {
        assert!(TrackingId::parse("APPAB12CD34E").is_some());
        assert!(TrackingId::parse("APPab12cd34e").is_none());
        assert!(TrackingId::parse("APP123").is_none());
        assert!(TrackingId::parse("XYZAB12CD34E").is_none());
    }

    #[test]
    fn rejection_reason_is_trimmed_and_optional() {
        assert_eq!(
            Decision::rejected("   "),
            Decision::Rejected { reason: None }
        );
        assert_eq!(Decision::rejected(" blurry scan ").reason(), Some("blurry scan"));
        assert_eq!(Decision::Approved.reason(), None);
    }

    #[test]
    fn delivery_windows_follow_certificate_type() {
        assert_eq!(CertificateType::Birth.delivery_window().label(), "3-5 business days");
        assert_eq!(CertificateType::Caste.delivery_window().label(), "7-10 business days");
    }

    #[test]
    fn update_applicant_name_prefers_corrected_spelling() {
        let payload = ApplicationPayload::BirthUpdate {
            issue: UpdateIssue::Name,
            details: BirthUpdate {
                current_name: "Aarav Shrma".to_string(),
                correct_name: "Aarav Sharma".to_string(),
                ..BirthUpdate::default()
            },
        };
        assert_eq!(payload.applicant_name(), "Aarav Sharma");
        assert_eq!(payload.certificate_type(), CertificateType::Birth);
    }
}
