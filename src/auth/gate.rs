//! The per-request authentication checkpoint.
//!
//! `NoToken -> ExtractedToken -> SignatureValid -> NotRevoked -> Authenticated`.
//! An absent or non-bearer `Authorization` header leaves the request
//! anonymous. A bearer token that fails any later step rejects the request;
//! the reason is logged and never sent to the caller.

use axum::http::HeaderMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::bearer::bearer_token;
use crate::identity::{IdentityError, IdentityLookup, Principal};
use crate::jwt::{TokenCodec, TokenError, TokenType};
use crate::revocation::RevocationGuard;

/// Result of running the gate once for a request.
#[derive(Debug)]
pub enum GateOutcome {
    Anonymous,
    Authenticated(Principal),
    Rejected(GateRejection),
}

/// Internal reason a presented bearer token was refused.
#[derive(Debug, Error)]
pub enum GateRejection {
    #[error("invalid token: {0}")]
    InvalidToken(TokenError),
    #[error("token has been revoked")]
    Revoked,
    #[error("{0:?} token presented where an access token is required")]
    WrongTokenType(TokenType),
    #[error("subject {0} no longer resolves to an identity")]
    IdentityNotFound(String),
    #[error(transparent)]
    IdentityUnavailable(IdentityError),
}

#[derive(Clone)]
pub struct AuthenticationGate {
    codec: Arc<TokenCodec>,
    revocations: RevocationGuard,
    identities: Arc<dyn IdentityLookup>,
}

impl AuthenticationGate {
    pub fn new(
        codec: Arc<TokenCodec>,
        revocations: RevocationGuard,
        identities: Arc<dyn IdentityLookup>,
    ) -> Self {
        Self {
            codec,
            revocations,
            identities,
        }
    }

    /// Run the checkpoint against a request's headers.
    pub async fn authenticate(&self, headers: &HeaderMap) -> GateOutcome {
        let Some(token) = bearer_token(headers) else {
            return GateOutcome::Anonymous;
        };

        match self.check(token).await {
            Ok(principal) => {
                debug!(subject = %principal.subject, "Authenticated request");
                GateOutcome::Authenticated(principal)
            }
            Err(rejection) => {
                match &rejection {
                    GateRejection::IdentityUnavailable(e) => {
                        warn!(error = %e, "Identity lookup failed during authentication")
                    }
                    other => debug!(reason = %other, "Rejected bearer token"),
                }
                GateOutcome::Rejected(rejection)
            }
        }
    }

    async fn check(&self, token: &str) -> Result<Principal, GateRejection> {
        let claims = self
            .codec
            .verify(token)
            .map_err(GateRejection::InvalidToken)?;

        if self.revocations.is_revoked(token).await {
            return Err(GateRejection::Revoked);
        }

        if claims.token_type != TokenType::Access {
            return Err(GateRejection::WrongTokenType(claims.token_type));
        }

        self.identities
            .resolve_by_subject(&claims.sub)
            .await
            .map_err(GateRejection::IdentityUnavailable)?
            .ok_or(GateRejection::IdentityNotFound(claims.sub))
    }
}
