//! User directory (数据库访问层)

use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use super::with_timeout;
use crate::{
    db,
    error::AppError,
    models::user::{NewUser, UserRecord},
};

/// Message returned for any duplicate-account conflict
pub const DUPLICATE_ACCOUNT_MESSAGE: &str = "An account with this email already exists";

/// Lookup and mutation of user accounts.
///
/// Only single-row atomicity is assumed. In particular a `find_by_email`
/// that returns `None` does not guarantee a following `insert` succeeds:
/// `insert` reports `AppError::Conflict` itself when the email is taken.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, AppError>;

    async fn insert(&self, user: &NewUser) -> Result<UserRecord, AppError>;

    async fn touch_last_login(&self, id: Uuid) -> Result<(), AppError>;

    /// Readiness probe
    async fn ping(&self) -> Result<(), AppError>;
}

pub struct PgUserDirectory {
    db: PgPool,
    timeout: Duration,
}

impl PgUserDirectory {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        with_timeout(self.timeout, "users.find_by_email", async {
            let user = sqlx::query_as::<_, UserRecord>(
                r#"
                SELECT id, email, name, password_hash, role, is_active,
                       last_login_at, created_at, updated_at
                FROM users
                WHERE email = $1
                "#,
            )
            .bind(email)
            .fetch_optional(&self.db)
            .await?;

            Ok(user)
        })
        .await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, AppError> {
        with_timeout(self.timeout, "users.find_by_id", async {
            let user = sqlx::query_as::<_, UserRecord>(
                r#"
                SELECT id, email, name, password_hash, role, is_active,
                       last_login_at, created_at, updated_at
                FROM users
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

            Ok(user)
        })
        .await
    }

    async fn insert(&self, user: &NewUser) -> Result<UserRecord, AppError> {
        with_timeout(self.timeout, "users.insert", async {
            sqlx::query_as::<_, UserRecord>(
                r#"
                INSERT INTO users (email, name, password_hash, role)
                VALUES ($1, $2, $3, $4)
                RETURNING id, email, name, password_hash, role, is_active,
                          last_login_at, created_at, updated_at
                "#,
            )
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.password_hash)
            .bind(user.role)
            .fetch_one(&self.db)
            .await
            .map_err(map_insert_error)
        })
        .await
    }

    async fn touch_last_login(&self, id: Uuid) -> Result<(), AppError> {
        with_timeout(self.timeout, "users.touch_last_login", async {
            sqlx::query("UPDATE users SET last_login_at = NOW(), updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(&self.db)
                .await?;

            Ok(())
        })
        .await
    }

    async fn ping(&self) -> Result<(), AppError> {
        with_timeout(self.timeout, "users.ping", async {
            db::ping(&self.db).await?;
            Ok(())
        })
        .await
    }
}

/// 唯一约束冲突映射为 Conflict，其余保持数据库错误
fn map_insert_error(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            tracing::debug!(constraint = ?db_err.constraint(), "Duplicate user insert");
            return AppError::conflict(DUPLICATE_ACCOUNT_MESSAGE);
        }
    }
    AppError::Database(e)
}
