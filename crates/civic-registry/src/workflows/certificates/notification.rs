use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Outbound message collaborator (email, SMS gateway, ...).
pub trait Notifier: Send + Sync {
    fn send(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Message handed to the notifier. Templates are rendered on the delivery side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub template: NotificationTemplate,
    pub address: String,
    pub details: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTemplate {
    VerificationCode,
    ApplicationApproved,
    ApplicationRejected,
}

impl NotificationTemplate {
    pub const fn code(self) -> &'static str {
        match self {
            NotificationTemplate::VerificationCode => "verification_code",
            NotificationTemplate::ApplicationApproved => "application_approved",
            NotificationTemplate::ApplicationRejected => "application_rejected",
        }
    }
}

impl Notification {
    pub fn new(template: NotificationTemplate, address: impl Into<String>) -> Self {
        Self {
            template,
            address: address.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Notification dispatch error. Callers treat it as a warning.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
    #[error("address {0:?} rejected by the transport")]
    Rejected(String),
}
