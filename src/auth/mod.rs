//! Authentication and authorization module

pub mod guard;
pub mod jwt;
pub mod middleware;
pub mod password;

pub use guard::{require_roles, RoleGuard};
pub use jwt::{Claims, TokenCodec, TokenError, VerifiedToken};
pub use middleware::{
    extract_bearer_token, require_auth, AuthContext, AuthOutcome, AuthRejection, Authenticator,
};
pub use password::{CredentialError, CredentialVerifier};
