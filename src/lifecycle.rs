//! Token pair issuance and refresh rotation.
//!
//! Sign-in produces an access/refresh pair. Refreshing always mints a new
//! access token and mints a new refresh token only when the presented one is
//! close to expiry. Revocation is not consulted here.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::identity::{IdentityError, IdentityLookup, Principal};
use crate::jwt::{ExtraClaims, IssuedToken, TokenCodec, TokenError, TokenType, now_secs};

/// Access token validity: 3 minutes
pub const DEFAULT_ACCESS_VALIDITY: Duration = Duration::from_secs(3 * 60);

/// Refresh token validity: 30 days
pub const DEFAULT_REFRESH_VALIDITY: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Refresh tokens with less than this left are rotated: 24 hours
pub const DEFAULT_ROTATION_THRESHOLD: Duration = Duration::from_secs(24 * 60 * 60);

/// Lifetimes used when issuing tokens.
#[derive(Debug, Clone, Copy)]
pub struct TokenPolicy {
    pub access_validity: Duration,
    pub refresh_validity: Duration,
    pub rotation_threshold: Duration,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            access_validity: DEFAULT_ACCESS_VALIDITY,
            refresh_validity: DEFAULT_REFRESH_VALIDITY,
            rotation_threshold: DEFAULT_ROTATION_THRESHOLD,
        }
    }
}

/// Tokens produced together at sign-in.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: IssuedToken,
    pub refresh_token: IssuedToken,
}

/// Result of a successful refresh.
#[derive(Debug, Clone)]
pub struct RefreshedTokens {
    pub access_token: IssuedToken,
    /// Set only when the presented refresh token was rotated.
    pub refresh_token: Option<IssuedToken>,
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("subject {0} no longer resolves to an identity")]
    IdentityNotFound(String),
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

#[derive(Clone)]
pub struct TokenLifecycleManager {
    codec: Arc<TokenCodec>,
    identities: Arc<dyn IdentityLookup>,
    policy: TokenPolicy,
}

impl TokenLifecycleManager {
    pub fn new(
        codec: Arc<TokenCodec>,
        identities: Arc<dyn IdentityLookup>,
        policy: TokenPolicy,
    ) -> Self {
        Self {
            codec,
            identities,
            policy,
        }
    }

    /// Issue the access/refresh pair for a principal that just signed in.
    pub fn issue_initial_pair(&self, principal: &Principal) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue_access(principal)?,
            refresh_token: self.issue_refresh(principal)?,
        })
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// Authorities are re-resolved from the identity lookup rather than
    /// trusted from the old token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, RefreshError> {
        let claims = self.codec.verify_as(refresh_token, TokenType::Refresh)?;

        let principal = self
            .identities
            .resolve_by_subject(&claims.sub)
            .await?
            .ok_or_else(|| RefreshError::IdentityNotFound(claims.sub.clone()))?;

        let access_token = self.issue_access(&principal)?;

        let remaining = Duration::from_secs(claims.exp.saturating_sub(now_secs()?));
        let refresh_token = if remaining < self.policy.rotation_threshold {
            debug!(subject = %principal.subject, remaining_secs = remaining.as_secs(), "Rotating refresh token");
            Some(self.issue_refresh(&principal)?)
        } else {
            None
        };

        Ok(RefreshedTokens {
            access_token,
            refresh_token,
        })
    }

    fn issue_access(&self, principal: &Principal) -> Result<IssuedToken, TokenError> {
        self.codec.issue(
            &principal.subject,
            TokenType::Access,
            self.policy.access_validity,
            ExtraClaims::with_authorities(principal.authorities.clone()),
        )
    }

    fn issue_refresh(&self, principal: &Principal) -> Result<IssuedToken, TokenError> {
        self.codec.issue(
            &principal.subject,
            TokenType::Refresh,
            self.policy.refresh_validity,
            ExtraClaims::default(),
        )
    }
}
