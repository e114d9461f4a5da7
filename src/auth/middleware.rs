//! Bearer-token authentication middleware
//!
//! Each request moves through `NoToken -> TokenPresent -> {Verified, Rejected}`.
//! A verified request carries an [`AuthContext`] in its extensions; a
//! rejected one never reaches the handler.

use crate::{
    auth::jwt::TokenCodec,
    error::AppError,
    models::user::{Identity, Role},
    repository::UserDirectory,
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

/// 认证上下文（附加到请求扩展）
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub identity: Identity,
}

impl AuthContext {
    pub fn user_id(&self) -> Uuid {
        self.identity.id
    }

    pub fn role(&self) -> Role {
        self.identity.role
    }
}

// 实现 FromRequestParts 以便在 handler 中直接提取 AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

/// Why a request was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    MissingToken,
    InvalidToken,
    UnknownOrInactiveUser,
}

impl AuthRejection {
    pub fn message(&self) -> &'static str {
        match self {
            AuthRejection::MissingToken => "Access token required",
            AuthRejection::InvalidToken => "Invalid or expired token",
            AuthRejection::UnknownOrInactiveUser => "Invalid token",
        }
    }

    fn metric_label(&self) -> &'static str {
        match self {
            AuthRejection::MissingToken => "missing_token",
            AuthRejection::InvalidToken => "invalid_token",
            AuthRejection::UnknownOrInactiveUser => "unknown_or_inactive_user",
        }
    }
}

impl From<AuthRejection> for AppError {
    fn from(rejection: AuthRejection) -> Self {
        AppError::authentication(rejection.message())
    }
}

/// Terminal state of the per-request authentication
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    Verified(AuthContext),
    Rejected(AuthRejection),
}

/// 从 Authorization 头提取 Bearer 令牌
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Resolves the caller of a request from its bearer token.
///
/// The token alone is not trusted: the identity is re-read from the
/// directory on every request so deactivation takes effect immediately.
pub struct Authenticator {
    codec: Arc<TokenCodec>,
    directory: Arc<dyn UserDirectory>,
}

impl Authenticator {
    pub fn new(codec: Arc<TokenCodec>, directory: Arc<dyn UserDirectory>) -> Self {
        Self { codec, directory }
    }

    /// Only directory failures surface as `Err`; every authentication
    /// failure is an `Ok(AuthOutcome::Rejected)`.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthOutcome, AppError> {
        let Some(token) = extract_bearer_token(headers) else {
            return Ok(AuthOutcome::Rejected(AuthRejection::MissingToken));
        };

        let verified = match self.codec.verify(token) {
            Ok(verified) => verified,
            Err(_) => return Ok(AuthOutcome::Rejected(AuthRejection::InvalidToken)),
        };

        let user = match self.directory.find_by_id(verified.identity_id).await? {
            Some(user) if user.is_active => user,
            Some(_) => {
                tracing::debug!(user_id = %verified.identity_id, "Token for deactivated account");
                return Ok(AuthOutcome::Rejected(AuthRejection::UnknownOrInactiveUser));
            }
            None => {
                tracing::debug!(user_id = %verified.identity_id, "Token for unknown account");
                return Ok(AuthOutcome::Rejected(AuthRejection::UnknownOrInactiveUser));
            }
        };

        Ok(AuthOutcome::Verified(AuthContext {
            identity: user.into(),
        }))
    }
}

/// 认证中间件 - 必须认证
pub async fn require_auth(
    State(authenticator): State<Arc<Authenticator>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    match authenticator.authenticate(req.headers()).await? {
        AuthOutcome::Verified(context) => {
            tracing::debug!(
                user_id = %context.user_id(),
                role = %context.role(),
                "Request authenticated"
            );
            req.extensions_mut().insert(context);
            Ok(next.run(req).await)
        }
        AuthOutcome::Rejected(rejection) => {
            crate::telemetry::record_auth_event("authenticate", rejection.metric_label());
            Err(rejection.into())
        }
    }
}
