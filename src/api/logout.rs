//! Logout endpoint.
//!
//! - POST `/logout` - Revoke the presented access and/or refresh token

use axum::{Json, Router, extract::State, routing::post};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::error::ApiError;
use crate::jwt::TokenCodec;
use crate::revocation::RevocationGuard;

#[derive(Clone)]
pub struct LogoutState {
    pub codec: Arc<TokenCodec>,
    pub revocations: RevocationGuard,
}

pub fn router(state: LogoutState) -> Router {
    Router::new()
        .route("/logout", post(logout))
        .with_state(state)
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LogoutRequest {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Revoke each presented token for the rest of its natural lifetime.
///
/// Tokens that are not ours (bad signature, garbage) are skipped, as are
/// tokens that have already expired. A store failure is reported as 503 so
/// the client knows the tokens are still live.
async fn logout(
    State(state): State<LogoutState>,
    Json(request): Json<LogoutRequest>,
) -> Result<&'static str, ApiError> {
    let mut revoked = 0;

    for token in [request.access_token, request.refresh_token]
        .into_iter()
        .flatten()
    {
        let remaining = match state.codec.remaining_validity(&token) {
            Ok(remaining) => remaining,
            Err(e) => {
                debug!(reason = %e, "Ignoring unusable token on logout");
                continue;
            }
        };

        state
            .revocations
            .revoke(&token, remaining)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to revoke token");
                ApiError::service_unavailable("Logout could not be completed")
            })?;

        if !remaining.is_zero() {
            revoked += 1;
        }
    }

    info!(revoked, "Logged out");
    Ok("Logged out successfully")
}
