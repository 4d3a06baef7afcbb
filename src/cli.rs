//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::{Database, UserStoreError};
use crate::identity::ROLE_USER;
use crate::jwt::{MIN_SECRET_LENGTH, SigningKey};
use crate::lifecycle::{
    DEFAULT_ACCESS_VALIDITY, DEFAULT_REFRESH_VALIDITY, DEFAULT_ROTATION_THRESHOLD, TokenPolicy,
};
use crate::revocation::{
    DEFAULT_STORE_TIMEOUT, MemoryRevocationStore, ReadPolicy, RevocationStore,
};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Longest accepted token lifetime: 10 years
const MAX_TOKEN_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Longest accepted revocation store timeout: 1 minute
const MAX_REVOCATION_TIMEOUT_MS: u64 = 60 * 1000;

/// Environment variable holding the password for `--create-user`.
pub const PASSWORD_ENV: &str = "TOLLGATE_PASSWORD";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RevocationBackend {
    /// Process-local map, lost on restart and not shared between instances
    Memory,
    /// Table in the service database, shared by every instance using it
    #[default]
    Sqlite,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReadPolicyArg {
    /// Let requests through when the revocation store cannot answer
    #[default]
    FailOpen,
    /// Reject requests when the revocation store cannot answer
    FailClosed,
}

impl From<ReadPolicyArg> for ReadPolicy {
    fn from(arg: ReadPolicyArg) -> Self {
        match arg {
            ReadPolicyArg::FailOpen => ReadPolicy::FailOpen,
            ReadPolicyArg::FailClosed => ReadPolicy::FailClosed,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "Tollgate",
    about = "Bearer token issuance, refresh and revocation service"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "7291")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "tollgate.db")]
    pub database: String,

    /// Path to file containing the JWT secret. Prefer using JWT_SECRET env var instead.
    /// Without either, a random key is generated and tokens do not survive a restart
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, default_value_t = DEFAULT_ACCESS_VALIDITY.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..=MAX_TOKEN_TTL_SECS))]
    pub access_token_ttl: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, default_value_t = DEFAULT_REFRESH_VALIDITY.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..=MAX_TOKEN_TTL_SECS))]
    pub refresh_token_ttl: u64,

    /// Refresh tokens with fewer seconds than this left are rotated on refresh
    #[arg(long, default_value_t = DEFAULT_ROTATION_THRESHOLD.as_secs())]
    pub rotation_threshold: u64,

    /// Where revoked tokens are recorded
    #[arg(long, value_enum, default_value_t = RevocationBackend::Sqlite)]
    pub revocation_backend: RevocationBackend,

    /// Upper bound on a single revocation store call, in milliseconds
    #[arg(long, default_value_t = DEFAULT_STORE_TIMEOUT.as_millis() as u64,
        value_parser = clap::value_parser!(u64).range(1..=MAX_REVOCATION_TIMEOUT_MS))]
    pub revocation_timeout_ms: u64,

    /// Behavior when the revocation store cannot answer a check
    #[arg(long, value_enum, default_value_t = ReadPolicyArg::FailOpen)]
    pub revocation_read_policy: ReadPolicyArg,

    /// Key sign-in rate limiting on X-Forwarded-For (only behind a trusted proxy)
    #[arg(long)]
    pub trust_forwarded_for: bool,

    /// Create a user on startup. The password is read from TOLLGATE_PASSWORD
    #[arg(long)]
    pub create_user: Option<String>,

    /// Authorities granted to the user created with --create-user
    #[arg(long, value_delimiter = ',', default_value = ROLE_USER, requires = "create_user")]
    pub authorities: Vec<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load the signing key from environment variable or file, or generate one.
/// Returns None and logs an error if a configured secret cannot be used.
pub fn load_signing_key(jwt_secret_file: Option<&str>) -> Option<SigningKey> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        warn!("No JWT secret configured, generating one. Tokens will not survive a restart");
        return Some(SigningKey::generate());
    };

    validate_secret(&secret).map(|s| SigningKey::from_secret(s.as_bytes()))
}

fn validate_secret(secret: &str) -> Option<&str> {
    if secret.len() < MIN_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_SECRET_LENGTH
        );
        return None;
    }
    Some(secret)
}

/// Build the token policy, rejecting a rotation threshold that would rotate on every refresh.
pub fn token_policy(args: &Args) -> Option<TokenPolicy> {
    let policy = TokenPolicy {
        access_validity: Duration::from_secs(args.access_token_ttl),
        refresh_validity: Duration::from_secs(args.refresh_token_ttl),
        rotation_threshold: Duration::from_secs(args.rotation_threshold),
    };

    if policy.rotation_threshold >= policy.refresh_validity {
        error!("Rotation threshold must be shorter than the refresh token lifetime");
        return None;
    }

    Some(policy)
}

/// Handle the --create-user flag.
pub async fn handle_create_user(db: &Database, username: &str, authorities: &[String]) {
    let Ok(password) = std::env::var(PASSWORD_ENV) else {
        error!("--create-user requires the {} environment variable", PASSWORD_ENV);
        std::process::exit(1);
    };
    // SAFETY: Still single-threaded startup, as for JWT_SECRET.
    unsafe { std::env::remove_var(PASSWORD_ENV) };

    let authorities: Vec<&str> = authorities.iter().map(String::as_str).collect();

    match db.users().create(username, &password, &authorities).await {
        Ok(id) => info!(username = %username, id, authorities = ?authorities, "User created"),
        Err(UserStoreError::Database(sqlx::Error::Database(e))) if e.is_unique_violation() => {
            warn!(username = %username, "User already exists, leaving it unchanged");
        }
        Err(e) => {
            error!(error = %e, "Failed to create user");
            std::process::exit(1);
        }
    }
}

/// Pick the revocation store for the configured backend.
pub fn revocation_store(backend: RevocationBackend, db: &Database) -> Arc<dyn RevocationStore> {
    match backend {
        RevocationBackend::Memory => {
            warn!("Using in-memory revocation store; revocations are lost on restart");
            Arc::new(MemoryRevocationStore::new())
        }
        RevocationBackend::Sqlite => Arc::new(db.revocations()),
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    args: &Args,
    db: Database,
    signing_key: SigningKey,
    token_policy: TokenPolicy,
) -> ServerConfig {
    let revocation_store = revocation_store(args.revocation_backend, &db);

    ServerConfig {
        db,
        signing_key,
        token_policy,
        revocation_store,
        revocation_timeout: Duration::from_millis(args.revocation_timeout_ms),
        read_policy: args.revocation_read_policy.into(),
        trust_forwarded_for: args.trust_forwarded_for,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
