pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod identity;
pub mod jwt;
pub mod lifecycle;
pub mod rate_limit;
pub mod revocation;

use api::create_api_router;
use auth::{AuthenticationGate, authenticate};
use axum::{Router, middleware};
use db::Database;
use identity::{CredentialVerifier, IdentityLookup};
use jwt::{SigningKey, TokenCodec};
use lifecycle::{TokenLifecycleManager, TokenPolicy};
use rate_limit::RateLimitConfig;
use revocation::{ReadPolicy, RevocationGuard, RevocationStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Key used to sign and verify every token
    pub signing_key: SigningKey,
    /// Token lifetimes and rotation threshold
    pub token_policy: TokenPolicy,
    /// Shared denial list for logged-out tokens
    pub revocation_store: Arc<dyn RevocationStore>,
    /// Bound on a single revocation store call
    pub revocation_timeout: Duration,
    /// Answer given when the revocation store cannot be reached
    pub read_policy: ReadPolicy,
    /// Whether to trust `X-Forwarded-For` for the client IP (requires running behind a proxy)
    pub trust_forwarded_for: bool,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let codec = Arc::new(TokenCodec::new(&config.signing_key));
    let users = config.db.users();
    let identities: Arc<dyn IdentityLookup> = Arc::new(users.clone());
    let credentials: Arc<dyn CredentialVerifier> = Arc::new(users);

    let revocations = RevocationGuard::new(
        config.revocation_store.clone(),
        config.revocation_timeout,
        config.read_policy,
    );

    let lifecycle =
        TokenLifecycleManager::new(codec.clone(), identities.clone(), config.token_policy);

    let gate = AuthenticationGate::new(codec.clone(), revocations.clone(), identities);

    create_api_router(
        lifecycle,
        codec,
        revocations,
        credentials,
        Arc::new(RateLimitConfig::new(config.trust_forwarded_for)),
    )
    .layer(middleware::from_fn_with_state(gate, authenticate))
}

/// Run cleanup once and spawn the background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(store: &Arc<dyn RevocationStore>) {
    cleanup::run_cleanup(store.as_ref()).await;
    cleanup::spawn_cleanup_scheduler(store.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    init_cleanup(&config.revocation_store).await;

    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
