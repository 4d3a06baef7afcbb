mod common;

use axum::http::StatusCode;
use common::{ALICE_PASSWORD, ROOT_PASSWORD, test_app};
use std::time::Duration;
use tollgate::jwt::{ExtraClaims, SigningKey, TokenCodec, TokenType, now_secs};

#[tokio::test]
async fn test_user_endpoint_with_user_authority() {
    let t = test_app().await;
    let (access, _) = t.sign_in("alice", ALICE_PASSWORD).await;

    let response = t.get("/home/user", Some(&access)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, "Hello user: alice");
}

#[tokio::test]
async fn test_admin_endpoint_forbidden_for_user() {
    let t = test_app().await;
    let (access, _) = t.sign_in("alice", ALICE_PASSWORD).await;

    let response = t.get("/home/admin", Some(&access)).await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_endpoint_with_admin_authority() {
    let t = test_app().await;
    let (access, _) = t.sign_in("root", ROOT_PASSWORD).await;

    let response = t.get("/home/admin", Some(&access)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, "Hello admin: root");
}

#[tokio::test]
async fn test_protected_endpoints_reject_anonymous() {
    let t = test_app().await;

    assert_eq!(t.get("/home/user", None).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(t.get("/home/admin", None).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_free_endpoint_anonymous() {
    let t = test_app().await;

    let response = t.get("/home/free", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, "Hello free: anonymous");
}

#[tokio::test]
async fn test_free_endpoint_authenticated() {
    let t = test_app().await;
    let (access, _) = t.sign_in("alice", ALICE_PASSWORD).await;

    let response = t.get("/home/free", Some(&access)).await;

    assert_eq!(response.body, "Hello free: alice");
}

#[tokio::test]
async fn test_refresh_token_not_accepted_as_bearer() {
    let t = test_app().await;
    let (_, refresh) = t.sign_in("alice", ALICE_PASSWORD).await;

    let response = t.get("/home/user", Some(&refresh)).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json()["error"], "Invalid token");
}

#[tokio::test]
async fn test_bad_bearer_rejected_even_on_open_endpoint() {
    let t = test_app().await;

    let response = t.get("/home/free", Some("not-a-jwt")).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_access_token_rejected() {
    let t = test_app().await;
    let now = now_secs().unwrap();
    let expired = t
        .codec
        .issue_at(
            "alice",
            TokenType::Access,
            now - 600,
            Duration::from_secs(180),
            ExtraClaims::with_authorities(vec!["ROLE_USER".into()]),
        )
        .unwrap()
        .token;

    let response = t.get("/home/user", Some(&expired)).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_foreign_signature_rejected() {
    let t = test_app().await;
    let foreign = TokenCodec::new(&SigningKey::from_secret(b"some-other-service-secret-value!"));
    let token = foreign
        .issue(
            "alice",
            TokenType::Access,
            Duration::from_secs(180),
            ExtraClaims::with_authorities(vec!["ROLE_USER".into()]),
        )
        .unwrap()
        .token;

    let response = t.get("/home/user", Some(&token)).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_authorities_come_from_identity_not_token() {
    let t = test_app().await;
    // Claims admin, but alice only holds ROLE_USER
    let token = t
        .codec
        .issue(
            "alice",
            TokenType::Access,
            Duration::from_secs(180),
            ExtraClaims::with_authorities(vec!["ROLE_USER".into(), "ROLE_ADMIN".into()]),
        )
        .unwrap()
        .token;

    let response = t.get("/home/admin", Some(&token)).await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
}
