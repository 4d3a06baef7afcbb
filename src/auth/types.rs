//! Request-scoped authentication context.

use crate::identity::Principal;

/// Set once per request by the gate middleware and read by extractors.
#[derive(Debug, Clone)]
pub enum AuthContext {
    /// No bearer credential was presented.
    Anonymous,
    Authenticated(Principal),
}

impl AuthContext {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            AuthContext::Anonymous => None,
            AuthContext::Authenticated(principal) => Some(principal),
        }
    }
}
