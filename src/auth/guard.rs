//! Role-based authorization guard
//!
//! Runs after [`require_auth`](super::middleware::require_auth) and checks
//! the attached identity's role against an allow-list.

use crate::{auth::middleware::AuthContext, error::AppError, models::user::Role};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Allow-list of roles for a group of routes
#[derive(Debug, Clone)]
pub struct RoleGuard {
    allowed: Arc<[Role]>,
}

impl RoleGuard {
    pub fn new(allowed: impl Into<Arc<[Role]>>) -> Self {
        Self {
            allowed: allowed.into(),
        }
    }

    /// No context means authentication never ran; that is a 401, not a 403.
    pub fn check(&self, context: Option<&AuthContext>) -> Result<(), AppError> {
        let context = context.ok_or(AppError::Unauthorized)?;

        if self.allowed.contains(&context.role()) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = %context.user_id(),
                role = %context.role(),
                "Insufficient role for route"
            );
            Err(AppError::Forbidden)
        }
    }
}

/// 授权中间件 - 校验角色
pub async fn require_roles(
    State(guard): State<RoleGuard>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Err(e) = guard.check(req.extensions().get::<AuthContext>()) {
        let outcome = match e {
            AppError::Forbidden => "forbidden",
            _ => "unauthenticated",
        };
        crate::telemetry::record_auth_event("authorize", outcome);
        return Err(e);
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Identity;
    use uuid::Uuid;

    fn context(role: Role) -> AuthContext {
        AuthContext {
            identity: Identity {
                id: Uuid::new_v4(),
                email: "a@x.com".to_string(),
                name: "A".to_string(),
                role,
            },
        }
    }

    #[test]
    fn test_allowed_roles_pass() {
        let guard = RoleGuard::new(vec![Role::Admin, Role::Manager]);

        assert!(guard.check(Some(&context(Role::Admin))).is_ok());
        assert!(guard.check(Some(&context(Role::Manager))).is_ok());
    }

    #[test]
    fn test_other_roles_are_forbidden() {
        let guard = RoleGuard::new(vec![Role::Admin, Role::Manager]);
        let err = guard.check(Some(&context(Role::User))).unwrap_err();

        assert!(matches!(err, AppError::Forbidden));
        assert_eq!(err.code(), 403);
    }

    #[test]
    fn test_missing_context_fails_closed() {
        let guard = RoleGuard::new(vec![Role::User, Role::Manager, Role::Admin]);
        let err = guard.check(None).unwrap_err();

        assert!(matches!(err, AppError::Unauthorized));
        assert_eq!(err.code(), 401);
    }

    #[test]
    fn test_empty_allow_list_denies_everyone() {
        let guard = RoleGuard::new(Vec::new());
        assert!(guard.check(Some(&context(Role::Admin))).is_err());
    }
}
