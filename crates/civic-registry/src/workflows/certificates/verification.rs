use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use rand::Rng;
use serde::Serialize;
use tracing::{debug, warn};

use super::notification::{Notification, NotificationTemplate, Notifier};

/// Source of six-digit one-time codes.
pub trait CodeSource: Send + Sync {
    fn next_code(&self) -> u32;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodes;

impl CodeSource for RandomCodes {
    fn next_code(&self) -> u32 {
        rand::thread_rng().gen_range(100_000..=999_999)
    }
}

/// Result of issuing a code. Delivery failures are reported, not raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeIssued {
    pub address: String,
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("{0:?} is not a usable email address")]
    InvalidAddress(String),
    #[error("no verification code is pending for {0}")]
    NoPendingCode(String),
    #[error("verification code does not match")]
    Mismatch,
}

/// Issues and checks one-time codes for applicant contact addresses.
pub struct VerificationService<N> {
    notifier: Arc<N>,
    codes: Arc<dyn CodeSource>,
    pending: Mutex<HashMap<String, u32>>,
    verified: Mutex<HashSet<String>>,
}

impl<N> VerificationService<N>
where
    N: Notifier + 'static,
{
    pub fn new(notifier: Arc<N>) -> Self {
        Self::with_code_source(notifier, Arc::new(RandomCodes))
    }

    pub fn with_code_source(notifier: Arc<N>, codes: Arc<dyn CodeSource>) -> Self {
        Self {
            notifier,
            codes,
            pending: Mutex::new(HashMap::new()),
            verified: Mutex::new(HashSet::new()),
        }
    }

    /// Store a fresh code for `address`, replacing any earlier one, and send it.
    pub fn issue(&self, address: &str) -> Result<CodeIssued, VerificationError> {
        let address = normalize(address)?;
        let code = self.codes.next_code();
        self.pending
            .lock()
            .expect("verification mutex poisoned")
            .insert(address.clone(), code);

        let notification = Notification::new(NotificationTemplate::VerificationCode, &address)
            .with_detail("code", format!("{code:06}"));

        match self.notifier.send(notification) {
            Ok(()) => {
                debug!(%address, "verification code sent");
                Ok(CodeIssued {
                    address,
                    delivered: true,
                    warning: None,
                })
            }
            Err(error) => {
                warn!(%address, %error, "verification code not delivered");
                Ok(CodeIssued {
                    address,
                    delivered: false,
                    warning: Some(format!("verification code not delivered: {error}")),
                })
            }
        }
    }

    /// A matching code is consumed; a mismatch leaves it pending.
    pub fn verify(&self, address: &str, code: &str) -> Result<(), VerificationError> {
        let address = normalize(address)?;
        let mut pending = self.pending.lock().expect("verification mutex poisoned");
        let expected = pending
            .get(&address)
            .copied()
            .ok_or_else(|| VerificationError::NoPendingCode(address.clone()))?;

        match code.trim().parse::<u32>() {
            Ok(candidate) if candidate == expected => {
                pending.remove(&address);
                debug!(%address, "contact address verified");
                self.verified
                    .lock()
                    .expect("verification mutex poisoned")
                    .insert(address);
                Ok(())
            }
            _ => Err(VerificationError::Mismatch),
        }
    }
}

impl<N> VerificationService<N> {
    /// Whether `address` has completed code verification, compared case-insensitively.
    pub fn is_verified(&self, address: &str) -> bool {
        normalize(address).is_ok_and(|address| {
            self.verified
                .lock()
                .expect("verification mutex poisoned")
                .contains(&address)
        })
    }
}

fn normalize(address: &str) -> Result<String, VerificationError> {
    let trimmed = address.trim();
    let valid = trimmed
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if valid {
        Ok(trimmed.to_lowercase())
    } else {
        Err(VerificationError::InvalidAddress(trimmed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::certificates::notification::NotifyError;

    struct Silent;

    impl Notifier for Silent {
        fn send(&self, _notification: Notification) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    struct FixedCode;

    impl CodeSource for FixedCode {
        fn next_code(&self) -> u32 {
            42
        }
    }

    fn service() -> VerificationService<Silent> {
        VerificationService::with_code_source(Arc::new(Silent), Arc::new(FixedCode))
    }

    #[test]
    fn only_a_matching_code_marks_the_address_verified() {
        let service = service();
        service.issue("Priya@Example.org").expect("issued");
        assert!(!service.is_verified("priya@example.org"));

        assert_eq!(
            service.verify("priya@example.org", "000041"),
            Err(VerificationError::Mismatch)
        );
        assert!(!service.is_verified("priya@example.org"));

        service
            .verify("priya@example.org", "000042")
            .expect("verified");
        assert!(service.is_verified(" PRIYA@example.org "));
        assert!(!service.is_verified("someone@example.org"));
        assert!(!service.is_verified("not-an-address"));
    }

    #[test]
    fn codes_are_single_use() {
        let service = service();
        service.issue("ravi@example.in").expect("issued");
        service.verify("ravi@example.in", "42").expect("verified");
        assert_eq!(
            service.verify("ravi@example.in", "42"),
            Err(VerificationError::NoPendingCode("ravi@example.in".to_string()))
        );
        assert!(service.is_verified("ravi@example.in"));
    }
}
