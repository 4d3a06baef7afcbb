//! Sign-in and token refresh endpoints.
//!
//! - POST `/sign-in` - Exchange username/password for an access/refresh pair
//! - POST `/refresh-token` - Exchange a refresh token for a new access token
//! - GET `/me` - Principal resolved for the presented access token

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::error::ApiError;
use crate::auth::Auth;
use crate::identity::{CredentialVerifier, Principal};
use crate::jwt::TokenError;
use crate::lifecycle::{RefreshError, TokenLifecycleManager};
use crate::rate_limit::{RateLimitConfig, rate_limit_sign_in};
use crate::revocation::RevocationGuard;

/// Plain-text body returned for every refresh failure, whatever the cause.
pub const INVALID_REFRESH_TOKEN: &str = "Invalid refresh token";

#[derive(Clone)]
pub struct AuthState {
    pub lifecycle: TokenLifecycleManager,
    pub revocations: RevocationGuard,
    pub credentials: Arc<dyn CredentialVerifier>,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

pub fn router(state: AuthState) -> Router {
    let sign_in_router = Router::new()
        .route("/sign-in", post(sign_in))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_sign_in,
        ));

    Router::new()
        .route("/refresh-token", post(refresh_token))
        .route("/me", get(me))
        .with_state(state)
        .merge(sign_in_router)
}

#[derive(Deserialize)]
struct SignInRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokensResponse {
    access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

async fn sign_in(
    State(state): State<AuthState>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<TokensResponse>, ApiError> {
    let principal = state
        .credentials
        .verify_credentials(&request.username, &request.password)
        .await
        .map_err(|e| ApiError::internal_error("Failed to verify credentials", e))?
        .ok_or_else(|| {
            info!(username = %request.username, "Sign-in failed");
            ApiError::unauthorized("Invalid credentials")
        })?;

    let pair = state
        .lifecycle
        .issue_initial_pair(&principal)
        .map_err(|e| ApiError::internal_error("Failed to generate token", e))?;

    info!(subject = %principal.subject, "Signed in");

    Ok(Json(TokensResponse {
        access_token: pair.access_token.token,
        refresh_token: Some(pair.refresh_token.token),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Plain-text 401 shared by every refresh failure.
fn invalid_refresh_token() -> Response {
    (StatusCode::UNAUTHORIZED, INVALID_REFRESH_TOKEN).into_response()
}

/// Refresh the access token using a valid, unrevoked refresh token.
/// The response carries a new refresh token only when it was rotated.
/// A missing or unreadable body is treated like a bad token.
async fn refresh_token(
    State(state): State<AuthState>,
    request: Result<Json<RefreshRequest>, JsonRejection>,
) -> Response {
    let token = match request {
        Ok(Json(RefreshRequest {
            refresh_token: Some(token),
        })) => token,
        Ok(_) => {
            debug!("Refresh request without a refresh token");
            return invalid_refresh_token();
        }
        Err(e) => {
            debug!(error = %e, "Unreadable refresh request");
            return invalid_refresh_token();
        }
    };

    if state.revocations.is_revoked(&token).await {
        debug!("Refusing revoked refresh token");
        return invalid_refresh_token();
    }

    match state.lifecycle.refresh(&token).await {
        Ok(refreshed) => Json(TokensResponse {
            access_token: refreshed.access_token.token,
            refresh_token: refreshed.refresh_token.map(|t| t.token),
        })
        .into_response(),
        Err(RefreshError::Token(
            e @ (TokenError::Encoding(_) | TokenError::Clock | TokenError::ValidityOutOfRange),
        )) => ApiError::internal_error("Failed to generate token", e).into_response(),
        Err(RefreshError::Identity(e)) => {
            warn!(error = %e, "Identity lookup failed during refresh");
            invalid_refresh_token()
        }
        Err(e) => {
            debug!(reason = %e, "Rejected refresh token");
            invalid_refresh_token()
        }
    }
}

async fn me(Auth(principal): Auth) -> Json<Principal> {
    Json(principal)
}
