mod auth;
mod error;
mod home;
mod logout;

use axum::Router;
use std::sync::Arc;

use crate::identity::CredentialVerifier;
use crate::jwt::TokenCodec;
use crate::lifecycle::TokenLifecycleManager;
use crate::rate_limit::RateLimitConfig;
use crate::revocation::RevocationGuard;

pub use auth::INVALID_REFRESH_TOKEN;
pub use error::ApiError;

/// Create the API router.
///
/// Authentication itself is not applied here; the caller layers the gate
/// middleware over the result.
pub fn create_api_router(
    lifecycle: TokenLifecycleManager,
    codec: Arc<TokenCodec>,
    revocations: RevocationGuard,
    credentials: Arc<dyn CredentialVerifier>,
    rate_limit_config: Arc<RateLimitConfig>,
) -> Router {
    let auth_state = auth::AuthState {
        lifecycle,
        revocations: revocations.clone(),
        credentials,
        rate_limit_config,
    };

    let logout_state = logout::LogoutState { codec, revocations };

    Router::new()
        .nest("/api/auth", auth::router(auth_state))
        .nest("/api/log", logout::router(logout_state))
        .nest("/home", home::router())
}
