//! JWT token generation and validation.
//!
//! `TokenCodec` is the only place that touches the signing key. It never
//! consults revocation state; callers decide what a valid signature means
//! for the request at hand.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Minimum accepted length of a configured secret, in bytes.
pub const MIN_SECRET_LENGTH: usize = 32;

/// Claim names owned by the codec. Extra claims using these names are dropped.
const RESERVED_CLAIMS: &[&str] = &["sub", "iat", "exp", "jti", "token_type", "authorities"];

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived token presented on every API call
    Access,
    /// Long-lived token only accepted by the refresh endpoint
    Refresh,
}

/// Claims carried by every token this service issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Unique token identifier
    pub jti: String,
    pub token_type: TokenType,
    /// Granted authorities, only present on access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorities: Option<Vec<String>>,
    /// Any additional claims supplied at issuance
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Claims supplied by the caller on top of the ones the codec always sets.
#[derive(Debug, Clone, Default)]
pub struct ExtraClaims {
    pub authorities: Option<Vec<String>>,
    pub custom: Map<String, Value>,
}

impl ExtraClaims {
    pub fn with_authorities(authorities: Vec<String>) -> Self {
        Self {
            authorities: Some(authorities),
            custom: Map::new(),
        }
    }
}

/// A freshly issued token together with the claims it encodes.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Compact JWT serialization
    pub token: String,
    pub claims: Claims,
}

impl IssuedToken {
    /// Lifetime the token was issued with.
    pub fn validity(&self) -> Duration {
        Duration::from_secs(self.claims.exp.saturating_sub(self.claims.iat))
    }
}

/// Symmetric HMAC key, held in memory for the lifetime of the process.
///
/// A key created with [`SigningKey::generate`] is never written anywhere, so
/// restarting the process invalidates every outstanding token.
#[derive(Clone)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    /// Generate a random 256-bit key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::rng(), &mut bytes);
        Self(bytes.to_vec())
    }

    /// Use an operator-provided secret.
    pub fn from_secret(secret: &[u8]) -> Self {
        Self(secret.to_vec())
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

/// Errors that can occur during JWT operations.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Not a structurally valid token
    #[error("malformed token: {0}")]
    Malformed(String),
    /// Signed with a different key, or tampered with
    #[error("invalid token signature")]
    InvalidSignature,
    /// Well-formed and correctly signed, but past `exp`
    #[error("token expired")]
    Expired,
    #[error("wrong token type: expected {expected:?}, got {actual:?}")]
    WrongTokenType {
        expected: TokenType,
        actual: TokenType,
    },
    #[error("failed to encode token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    #[error("system time error")]
    Clock,
    /// `issued_at + validity` does not fit in a timestamp
    #[error("token validity out of range")]
    ValidityOutOfRange,
}

/// Issues and verifies signed tokens.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenCodec {
    pub fn new(key: &SigningKey) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(&key.0),
            decoding_key: DecodingKey::from_secret(&key.0),
        }
    }

    /// Issue a token valid from now for `validity`.
    pub fn issue(
        &self,
        subject: &str,
        token_type: TokenType,
        validity: Duration,
        extra: ExtraClaims,
    ) -> Result<IssuedToken, TokenError> {
        self.issue_at(subject, token_type, now_secs()?, validity, extra)
    }

    /// Issue a token as if it had been created at `issued_at` (Unix seconds).
    pub fn issue_at(
        &self,
        subject: &str,
        token_type: TokenType,
        issued_at: u64,
        validity: Duration,
        extra: ExtraClaims,
    ) -> Result<IssuedToken, TokenError> {
        let mut custom = extra.custom;
        custom.retain(|name, _| {
            let reserved = RESERVED_CLAIMS.contains(&name.as_str());
            if reserved {
                tracing::warn!(claim = %name, "Dropping extra claim that shadows a reserved claim");
            }
            !reserved
        });

        let claims = Claims {
            sub: subject.to_string(),
            iat: issued_at,
            exp: issued_at
                .checked_add(validity.as_secs())
                .ok_or(TokenError::ValidityOutOfRange)?,
            jti: uuid::Uuid::new_v4().to_string(),
            token_type,
            authorities: extra.authorities,
            extra: custom,
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Encoding)?;

        Ok(IssuedToken { token, claims })
    }

    /// Check signature, structure and expiry, returning the claims.
    ///
    /// The token type is not checked here; see [`TokenCodec::verify_as`].
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.decode(token, true)
    }

    /// Verify and additionally require a specific token type.
    pub fn verify_as(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let claims = self.verify(token)?;
        if claims.token_type != expected {
            return Err(TokenError::WrongTokenType {
                expected,
                actual: claims.token_type,
            });
        }
        Ok(claims)
    }

    /// Read a single claim without enforcing expiry.
    ///
    /// The signature is still checked, so a forged token never yields claims.
    pub fn extract_claim<T>(
        &self,
        token: &str,
        selector: impl FnOnce(&Claims) -> T,
    ) -> Result<T, TokenError> {
        let claims = self.decode(token, false)?;
        Ok(selector(&claims))
    }

    /// Time left until the token stops verifying, zero if it already has.
    ///
    /// A token is accepted through the whole second named by `exp`, so the
    /// result runs to the end of that second.
    pub fn remaining_validity(&self, token: &str) -> Result<Duration, TokenError> {
        let exp = self.extract_claim(token, |claims| claims.exp)?;
        let valid_until = Duration::from_secs(exp.saturating_add(1));
        Ok(valid_until.saturating_sub(now()?))
    }

    fn decode(&self, token: &str, validate_exp: bool) -> Result<Claims, TokenError> {
        if token.is_empty() {
            return Err(TokenError::Malformed("empty token".into()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = validate_exp;
        validation.set_required_spec_claims(&["exp", "sub"]);

        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(classify)
    }
}

fn classify(e: jsonwebtoken::errors::Error) -> TokenError {
    match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        _ => TokenError::Malformed(e.to_string()),
    }
}

fn now() -> Result<Duration, TokenError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| TokenError::Clock)
}

/// Current Unix time in seconds.
pub fn now_secs() -> Result<u64, TokenError> {
    now().map(|d| d.as_secs())
}
