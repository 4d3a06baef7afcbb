//! Sample protected endpoints demonstrating authority checks.
//!
//! - GET `/user` - requires `ROLE_USER`
//! - GET `/admin` - requires `ROLE_ADMIN`
//! - GET `/free` - open to anyone, greets authenticated callers by name

use axum::{Router, routing::get};

use crate::auth::{AdminAuthority, OptionalAuth, RequireAuthority, UserAuthority};

pub fn router() -> Router {
    Router::new()
        .route("/user", get(user))
        .route("/admin", get(admin))
        .route("/free", get(free))
}

async fn user(auth: RequireAuthority<UserAuthority>) -> String {
    format!("Hello user: {}", auth.0.subject)
}

async fn admin(auth: RequireAuthority<AdminAuthority>) -> String {
    format!("Hello admin: {}", auth.0.subject)
}

async fn free(OptionalAuth(principal): OptionalAuth) -> String {
    match principal {
        Some(principal) => format!("Hello free: {}", principal.subject),
        None => "Hello free: anonymous".to_string(),
    }
}
