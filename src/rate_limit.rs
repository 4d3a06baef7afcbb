//! Rate limiting for the sign-in endpoint.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down password
//! guessing.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};

use crate::auth::extract_client_ip;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Sustained sign-in attempts per second per IP.
const SIGN_IN_PER_SEC: NonZeroU32 = NonZeroU32::new(1).unwrap();

/// Sign-in attempts allowed in a burst per IP.
const SIGN_IN_BURST: NonZeroU32 = NonZeroU32::new(5).unwrap();

#[derive(Clone)]
pub struct RateLimitConfig {
    /// Per-IP limiter for sign-in (5 requests, then 1 per second)
    pub sign_in: Arc<IpLimiter>,
    /// Whether to key on `X-Forwarded-For` instead of the peer address
    pub trust_forwarded_for: bool,
}

impl RateLimitConfig {
    pub fn new(trust_forwarded_for: bool) -> Self {
        Self {
            sign_in: Arc::new(RateLimiter::keyed(
                Quota::per_second(SIGN_IN_PER_SEC).allow_burst(SIGN_IN_BURST),
            )),
            trust_forwarded_for,
        }
    }
}

/// Middleware for rate limiting sign-in attempts.
pub async fn rate_limit_sign_in(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(ip) = extract_client_ip(&request, config.trust_forwarded_for) else {
        return (StatusCode::FORBIDDEN, "Unable to determine client IP.").into_response();
    };

    match config.sign_in.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            tracing::info!(ip = %ip, "Sign-in rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many sign-in attempts. Please wait before trying again.",
            )
                .into_response()
        }
    }
}
