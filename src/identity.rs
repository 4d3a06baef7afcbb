//! Identity collaborators consumed by the token core.
//!
//! The core never stores users itself; it resolves a token subject to a
//! [`Principal`] through [`IdentityLookup`] and receives already-verified
//! principals from a [`CredentialVerifier`] at sign-in.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Authority granted to every regular user.
pub const ROLE_USER: &str = "ROLE_USER";

/// Authority granted to administrators.
pub const ROLE_ADMIN: &str = "ROLE_ADMIN";

/// Resolved identity and authority set for a token subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub subject: String,
    pub authorities: Vec<String>,
}

impl Principal {
    pub fn new(subject: impl Into<String>, authorities: Vec<String>) -> Self {
        Self {
            subject: subject.into(),
            authorities,
        }
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a == authority)
    }
}

/// Backend failure while resolving an identity.
#[derive(Debug, Error)]
#[error("identity backend error: {0}")]
pub struct IdentityError(pub String);

/// Resolves a token subject to the current principal.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    /// `Ok(None)` when the subject no longer exists.
    async fn resolve_by_subject(&self, subject: &str) -> Result<Option<Principal>, IdentityError>;
}

/// Checks raw credentials on the sign-in path.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// `Ok(None)` for unknown users and wrong passwords alike.
    async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<Principal>, IdentityError>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_authority() {
        let principal = Principal::new("alice", vec![ROLE_USER.to_string()]);

        assert!(principal.has_authority(ROLE_USER));
        assert!(!principal.has_authority(ROLE_ADMIN));
    }
}
