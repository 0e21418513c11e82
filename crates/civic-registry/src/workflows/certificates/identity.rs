use std::collections::HashMap;

use serde::Serialize;

use super::domain::OfficerId;
use crate::config::IdentityConfig;

/// Authenticated officer a decision is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfficerIdentity {
    pub officer_id: OfficerId,
    pub display_name: String,
}

impl OfficerIdentity {
    pub fn new(officer_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            officer_id: OfficerId(officer_id.into()),
            display_name: display_name.into(),
        }
    }
}

/// Identity collaborator. Credential issuance happens elsewhere; the core only resolves tokens.
pub trait IdentityProvider: Send + Sync {
    fn authenticate(&self, token: &str) -> Option<OfficerIdentity>;
}

/// Bearer tokens configured at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenRegistry {
    officers: HashMap<String, OfficerIdentity>,
}

impl StaticTokenRegistry {
    pub fn from_config(config: &IdentityConfig) -> Self {
        let officers = config
            .officers
            .iter()
            .map(|credential| {
                let display_name = credential
                    .display_name
                    .clone()
                    .unwrap_or_else(|| credential.officer_id.clone());
                (
                    credential.token.clone(),
                    OfficerIdentity::new(credential.officer_id.clone(), display_name),
                )
            })
            .collect();
        Self { officers }
    }

    pub fn with_officer(mut self, token: impl Into<String>, identity: OfficerIdentity) -> Self {
        self.officers.insert(token.into(), identity);
        self
    }

    pub fn len(&self) -> usize {
        self.officers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.officers.is_empty()
    }
}

impl IdentityProvider for StaticTokenRegistry {
    fn authenticate(&self, token: &str) -> Option<OfficerIdentity> {
        self.officers.get(token).cloned()
    }
}

/// Extract the credential from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
