use crate::infra::{InMemoryApplicationRepository, InMemoryDocumentStore, LoggingNotifier};
use chrono::{NaiveDate, Utc};
use civic_registry::error::AppError;
use civic_registry::workflows::certificates::{
    ApplicationStatus, BirthCertificateKind, CertificatePortal, CertificateType, DocumentField,
    DocumentStore, DocumentUpload, Draft, DraftPatch, OfficerIdentity, PortalError, QueueFilter,
    StaticTokenRegistry, StatusFlags, SubmissionReceipt, WizardView,
};
use clap::Args;
use std::collections::HashMap;
use std::sync::Arc;

const DEMO_OFFICER_TOKEN: &str = "demo-registrar-token";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Evaluate the review queue as of this date (YYYY-MM-DD). Defaults to now.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Reject the income application instead of approving it.
    #[arg(long)]
    pub(crate) reject: bool,
}

type DemoPortal = CertificatePortal<InMemoryApplicationRepository, LoggingNotifier>;

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { today, reject } = args;

    let notifier = Arc::new(LoggingNotifier::default());
    let documents = Arc::new(InMemoryDocumentStore::default());
    let identity = StaticTokenRegistry::default().with_officer(
        DEMO_OFFICER_TOKEN,
        OfficerIdentity::new("off-demo", "Demo Registrar"),
    );
    let portal: DemoPortal = CertificatePortal::new(
        Arc::new(InMemoryApplicationRepository::default()),
        Arc::clone(&notifier),
        Arc::clone(&documents) as Arc<dyn DocumentStore>,
        Arc::new(identity),
    );

    println!("Civic registry portal demo");

    println!("\nApplicant wizard: new birth registration");
    let birth = walk_birth_registration(&portal)?;
    render_receipt(&birth);
    for reference in birth.payload.document_refs() {
        if let Some(stored) = documents.get(reference) {
            println!(
                "  stored {} ({}, {} bytes)",
                reference.as_str(),
                stored.content_type,
                stored.size
            );
        }
    }

    println!("\nApplicant one-shot submission: income certificate");
    let email = "lakshmi.n@example.org";
    match portal.submit_draft(income_draft(email)) {
        Err(PortalError::Blocked(unmet)) => {
            for condition in unmet {
                println!("- Refused before verification: {condition}");
            }
        }
        Err(err) => return Err(err.into()),
        Ok(receipt) => println!("- Unexpectedly accepted {}", receipt.tracking_id),
    }
    let issued = portal.issue_code(email)?;
    println!(
        "- Verification code sent to {} (delivered: {})",
        issued.address, issued.delivered
    );
    let code = notifier
        .sent()
        .last()
        .and_then(|notification| notification.details.get("code").cloned())
        .unwrap_or_default();
    portal.verify_code(email, &code)?;
    println!("- Contact verified");
    let income = portal.submit_draft(income_draft(email))?;
    render_receipt(&income);

    let now = today
        .and_then(|day| day.and_hms_opt(12, 0, 0))
        .map(|moment| moment.and_utc())
        .unwrap_or_else(Utc::now);
    println!("\nOfficer review queue as of {}", now.format("%Y-%m-%d"));
    let queue = portal
        .lifecycle()
        .queue_at(&QueueFilter::default(), now)
        .map_err(PortalError::from)?;
    for entry in &queue {
        println!(
            "  - [{}] {} | {} | {} | {} day(s) old",
            entry.priority.label(),
            entry.tracking_id,
            entry.certificate_type.label(),
            entry.applicant_name,
            entry.age_in_days
        );
    }

    let authorization = format!("Bearer {DEMO_OFFICER_TOKEN}");
    let officer = portal.authenticate(Some(authorization.as_str()))?;
    println!("\nDecisions by {}", officer.display_name);
    decide(&portal, &birth, ApplicationStatus::Approved, None, &officer)?;
    if reject {
        decide(
            &portal,
            &income,
            ApplicationStatus::Rejected,
            Some("salary certificate is older than six months".to_string()),
            &officer,
        )?;
    } else {
        decide(&portal, &income, ApplicationStatus::Approved, None, &officer)?;
    }

    match portal.decide(
        &income.record_id,
        StatusFlags::from_status(ApplicationStatus::Approved),
        None,
        &officer,
    ) {
        Err(PortalError::Lifecycle(err)) => println!("  - Second decision refused: {err}"),
        Err(err) => return Err(err.into()),
        Ok(_) => println!("  - Second decision unexpectedly accepted"),
    }

    println!("\nPublic status lookups");
    for receipt in [&birth, &income] {
        let view = portal.status(receipt.tracking_id.as_str())?;
        match serde_json::to_string_pretty(&view) {
            Ok(json) => println!("{json}"),
            Err(err) => println!("  Status payload unavailable: {err}"),
        }
    }

    let stats = portal.stats()?;
    println!(
        "\nDashboard: {} pending | {} approved | {} rejected | {} total",
        stats.pending, stats.approved, stats.rejected, stats.total
    );

    let artifact = portal.export(income.tracking_id.as_str())?;
    println!("\nExport {} ({})", artifact.file_name, artifact.content_type);
    println!("{}", String::from_utf8_lossy(&artifact.bytes));

    let sent = notifier.sent();
    println!("Notifications dispatched:");
    for notification in sent {
        println!(
            "  - {:?} -> {}",
            notification.template, notification.address
        );
    }

    Ok(())
}

fn walk_birth_registration(portal: &DemoPortal) -> Result<SubmissionReceipt, AppError> {
    let session = portal.open_session();
    let session_id = session.session_id.clone();
    render_step(&session);

    match portal.advance(&session_id) {
        Err(PortalError::Blocked(unmet)) => {
            for condition in unmet {
                println!("  blocked: {condition}");
            }
        }
        Err(err) => return Err(err.into()),
        Ok(view) => render_step(&view),
    }

    let fields: HashMap<String, String> = [
        ("child_name", "Anika Rao"),
        ("date_of_birth", "2026-02-14"),
        ("father_name", "Vikram Rao"),
        ("mother_name", "Divya Rao"),
        ("full_address", "12 Lake View Road, Mysuru"),
        ("parent_nativity", "Karnataka"),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value.to_string()))
    .collect();
    portal.patch_draft(
        &session_id,
        &DraftPatch {
            certificate_type: Some(CertificateType::Birth),
            birth_certificate_type: Some(BirthCertificateKind::New),
            update_issue_type: None,
            fields,
        },
    )?;

    render_step(&portal.advance(&session_id)?);
    render_step(&portal.advance(&session_id)?);

    for (field, file_name) in [
        (DocumentField::ParentIdProof, "parent-aadhaar.pdf"),
        (DocumentField::MedicalCertificate, "hospital-discharge.jpg"),
    ] {
        portal.attach_document(
            &session_id,
            DocumentUpload {
                field,
                file_name: file_name.to_string(),
                content_type: None,
                bytes: b"demo scan".to_vec(),
            },
        )?;
        println!("  uploaded {field}: {file_name}");
    }

    render_step(&portal.advance(&session_id)?);
    let confirmed = portal.advance(&session_id)?;
    render_step(&confirmed);

    confirmed
        .receipt
        .ok_or_else(|| AppError::from(PortalError::Closed))
}

fn income_draft(email: &str) -> Draft {
    let mut draft = Draft::default();
    draft.select_certificate_type(CertificateType::Income);
    draft.personal_info.full_name = "Lakshmi Narayanan".to_string();
    draft.personal_info.email = email.to_string();
    draft.personal_info.mobile = "9845012345".to_string();
    draft.personal_info.address = "4 Temple Street, Madurai".to_string();
    draft
}

fn decide(
    portal: &DemoPortal,
    receipt: &SubmissionReceipt,
    status: ApplicationStatus,
    reason: Option<String>,
    officer: &OfficerIdentity,
) -> Result<(), AppError> {
    let outcome = portal.decide(
        &receipt.record_id,
        StatusFlags::from_status(status),
        reason,
        officer,
    )?;
    println!(
        "  - {} -> {}",
        receipt.tracking_id,
        outcome.record.status.label()
    );
    for warning in outcome.warnings {
        println!("    warning: {warning}");
    }
    Ok(())
}

fn render_step(view: &WizardView) {
    println!(
        "- Step {} ({}) | phase {:?} | ready to continue: {}",
        view.step, view.title, view.phase, view.can_advance
    );
}

fn render_receipt(receipt: &SubmissionReceipt) {
    println!(
        "- Submitted {} as record {} | delivery {}",
        receipt.tracking_id, receipt.record_id, receipt.estimated_delivery.label
    );
}
