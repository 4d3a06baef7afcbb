//! Gate middleware and Axum extractors for authentication.

use std::marker::PhantomData;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::errors::{ApiAuthError, AuthErrorKind};
use super::gate::{AuthenticationGate, GateOutcome};
use super::types::AuthContext;
use crate::identity::{self, Principal};

/// Middleware running the gate once per request.
///
/// Stores an [`AuthContext`] in the request extensions, or answers 401 when a
/// bearer token is present but unusable.
pub async fn authenticate(
    State(gate): State<AuthenticationGate>,
    mut request: Request,
    next: Next,
) -> Response {
    let context = match gate.authenticate(request.headers()).await {
        GateOutcome::Anonymous => AuthContext::Anonymous,
        GateOutcome::Authenticated(principal) => AuthContext::Authenticated(principal),
        GateOutcome::Rejected(_) => {
            return ApiAuthError(AuthErrorKind::InvalidCredentials).into_response();
        }
    };

    request.extensions_mut().insert(context);
    next.run(request).await
}

fn context(parts: &Parts) -> Option<&AuthContext> {
    let context = parts.extensions.get::<AuthContext>();
    if context.is_none() {
        tracing::error!("Auth extractor used on a route without the gate middleware");
    }
    context
}

// =============================================================================
// Extractors
// =============================================================================

/// Extractor for endpoints that require an authenticated principal.
pub struct Auth(pub Principal);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        context(parts)
            .and_then(AuthContext::principal)
            .cloned()
            .map(Auth)
            .ok_or(ApiAuthError(AuthErrorKind::NotAuthenticated))
    }
}

/// Optional authentication extractor - never fails.
pub struct OptionalAuth(pub Option<Principal>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(
            context(parts).and_then(AuthContext::principal).cloned(),
        ))
    }
}

/// An authority an endpoint can demand through [`RequireAuthority`].
pub trait AuthorityConstraint {
    const AUTHORITY: &'static str;
}

pub struct UserAuthority;

impl AuthorityConstraint for UserAuthority {
    const AUTHORITY: &'static str = identity::ROLE_USER;
}

pub struct AdminAuthority;

impl AuthorityConstraint for AdminAuthority {
    const AUTHORITY: &'static str = identity::ROLE_ADMIN;
}

/// Extractor for endpoints that require a specific authority.
/// 401 when anonymous, 403 when the authority is missing.
pub struct RequireAuthority<A: AuthorityConstraint>(pub Principal, PhantomData<A>);

impl<S, A> FromRequestParts<S> for RequireAuthority<A>
where
    S: Send + Sync,
    A: AuthorityConstraint,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Auth(principal) = Auth::from_request_parts(parts, state).await?;

        if !principal.has_authority(A::AUTHORITY) {
            tracing::debug!(subject = %principal.subject, required = A::AUTHORITY, "Missing authority");
            return Err(ApiAuthError(AuthErrorKind::InsufficientAuthority));
        }

        Ok(RequireAuthority(principal, PhantomData))
    }
}
