//! Authentication error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Externally visible auth failure kinds.
///
/// Deliberately coarse: every reason a presented token is refused maps to
/// `InvalidCredentials`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// No credential on a route that needs one
    NotAuthenticated,
    /// A credential was presented but cannot be used
    InvalidCredentials,
    /// Authenticated, but missing the required authority
    InsufficientAuthority,
}

/// Authentication error rendered as a JSON body.
#[derive(Debug)]
pub struct ApiAuthError(pub AuthErrorKind);

impl ApiAuthError {
    fn status_code(&self) -> StatusCode {
        match self.0 {
            AuthErrorKind::NotAuthenticated | AuthErrorKind::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            AuthErrorKind::InsufficientAuthority => StatusCode::FORBIDDEN,
        }
    }

    fn message(&self) -> &'static str {
        match self.0 {
            AuthErrorKind::NotAuthenticated => "Not authenticated",
            AuthErrorKind::InvalidCredentials => "Invalid token",
            AuthErrorKind::InsufficientAuthority => "Forbidden",
        }
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}
