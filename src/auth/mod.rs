//! Bearer token authentication.
//!
//! Every request passes through [`AuthenticationGate`] once, via the
//! [`authenticate`] middleware. Handlers read the outcome through the
//! extractors: [`Auth`], [`OptionalAuth`] and [`RequireAuthority`].

mod bearer;
mod errors;
mod extractors;
mod gate;
mod ip;
mod types;

pub use bearer::bearer_token;
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{
    AdminAuthority, Auth, AuthorityConstraint, OptionalAuth, RequireAuthority, UserAuthority,
    authenticate,
};
pub use gate::{AuthenticationGate, GateOutcome, GateRejection};
pub use ip::extract_client_ip;
pub use types::AuthContext;
