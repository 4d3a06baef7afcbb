#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tollgate::{
    ServerConfig, create_app,
    db::Database,
    identity::{ROLE_ADMIN, ROLE_USER},
    jwt::{SigningKey, TokenCodec},
    lifecycle::TokenPolicy,
    revocation::{ReadPolicy, RevocationStore, StoreError},
};
use tower::ServiceExt;

pub const SECRET: &[u8] = b"integration-test-secret-of-adequate-length";

pub const ALICE_PASSWORD: &str = "alice-password";
pub const ROOT_PASSWORD: &str = "root-password";

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    /// Codec sharing the app's key, for minting tokens directly
    pub codec: TokenCodec,
    pub store: Arc<dyn RevocationStore>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("response body is not JSON")
    }
}

/// App backed by in-memory SQLite for both users and revocations.
/// Seeds `alice` (ROLE_USER) and `root` (ROLE_USER, ROLE_ADMIN).
pub async fn test_app() -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let store: Arc<dyn RevocationStore> = Arc::new(db.revocations());
    build(db, store).await
}

/// App using the given revocation store.
pub async fn test_app_with_store(store: Arc<dyn RevocationStore>) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    build(db, store).await
}

async fn build(db: Database, store: Arc<dyn RevocationStore>) -> TestApp {
    db.users()
        .create("alice", ALICE_PASSWORD, &[ROLE_USER])
        .await
        .expect("Failed to create alice");
    db.users()
        .create("root", ROOT_PASSWORD, &[ROLE_USER, ROLE_ADMIN])
        .await
        .expect("Failed to create root");

    let config = ServerConfig {
        db: db.clone(),
        signing_key: SigningKey::from_secret(SECRET),
        token_policy: TokenPolicy::default(),
        revocation_store: store.clone(),
        revocation_timeout: Duration::from_secs(1),
        read_policy: ReadPolicy::FailOpen,
        trust_forwarded_for: true,
    };

    TestApp {
        app: create_app(&config),
        db,
        codec: TokenCodec::new(&SigningKey::from_secret(SECRET)),
        store,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        TestResponse {
            status,
            body: String::from_utf8(body.to_vec()).unwrap(),
        }
    }

    /// POST a JSON body from the default test client IP.
    pub async fn post_json(&self, uri: &str, body: Value) -> TestResponse {
        self.post_json_from(uri, body, "203.0.113.7").await
    }

    pub async fn post_json_from(&self, uri: &str, body: Value, ip: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-forwarded-for", ip)
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// POST an arbitrary body with the given content type.
    pub async fn post_raw(&self, uri: &str, content_type: &str, body: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, content_type)
                .header("x-forwarded-for", "203.0.113.7")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// GET with an optional bearer token.
    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// Sign in and return `(access_token, refresh_token)`.
    pub async fn sign_in(&self, username: &str, password: &str) -> (String, String) {
        let response = self
            .post_json(
                "/api/auth/sign-in",
                serde_json::json!({ "username": username, "password": password }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "sign-in failed: {}", response.body);

        let json = response.json();
        (
            json["accessToken"].as_str().unwrap().to_string(),
            json["refreshToken"].as_str().unwrap().to_string(),
        )
    }
}

/// Revocation store whose backend is always unreachable.
pub struct FailingStore;

#[async_trait]
impl RevocationStore for FailingStore {
    async fn revoke(&self, _token: &str, _remaining: Duration) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn is_revoked(&self, _token: &str) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

/// Revocation store that never answers.
pub struct HangingStore;

#[async_trait]
impl RevocationStore for HangingStore {
    async fn revoke(&self, _token: &str, _remaining: Duration) -> Result<(), StoreError> {
        std::future::pending().await
    }

    async fn is_revoked(&self, _token: &str) -> Result<bool, StoreError> {
        std::future::pending().await
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        std::future::pending().await
    }
}
