//! Contact submission repository

use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use super::with_timeout;
use crate::{
    error::AppError,
    models::lead::{ContactSubmission, LeadStatus, NewContactSubmission, Page, PageRequest, StatusUpdateRequest},
};

#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn create(&self, submission: NewContactSubmission) -> Result<ContactSubmission, AppError>;

    /// Newest first
    async fn list(
        &self,
        status: Option<LeadStatus>,
        page: PageRequest,
    ) -> Result<Page<ContactSubmission>, AppError>;

    async fn update_status(
        &self,
        id: Uuid,
        update: &StatusUpdateRequest,
    ) -> Result<Option<ContactSubmission>, AppError>;
}

pub struct PgContactRepository {
    db: PgPool,
    timeout: Duration,
}

impl PgContactRepository {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[async_trait]
impl ContactRepository for PgContactRepository {
    async fn create(&self, submission: NewContactSubmission) -> Result<ContactSubmission, AppError> {
        with_timeout(self.timeout, "contact_submissions.create", async {
            let row = sqlx::query_as::<_, ContactSubmission>(
                r#"
                INSERT INTO contact_submissions
                    (name, email, phone, subject, message, ip_address, user_agent)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
                "#,
            )
            .bind(&submission.name)
            .bind(&submission.email)
            .bind(&submission.phone)
            .bind(&submission.subject)
            .bind(&submission.message)
            .bind(&submission.ip_address)
            .bind(&submission.user_agent)
            .fetch_one(&self.db)
            .await?;

            Ok(row)
        })
        .await
    }

    async fn list(
        &self,
        status: Option<LeadStatus>,
        page: PageRequest,
    ) -> Result<Page<ContactSubmission>, AppError> {
        with_timeout(self.timeout, "contact_submissions.list", async {
            let items = sqlx::query_as::<_, ContactSubmission>(
                r#"
                SELECT * FROM contact_submissions
                WHERE ($1::lead_status IS NULL OR status = $1)
                ORDER BY created_at DESC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(status)
            .bind(page.limit as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.db)
            .await?;

            let total: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM contact_submissions WHERE ($1::lead_status IS NULL OR status = $1)",
            )
            .bind(status)
            .fetch_one(&self.db)
            .await?;

            Ok(Page {
                items,
                total: total as u64,
            })
        })
        .await
    }

    async fn update_status(
        &self,
        id: Uuid,
        update: &StatusUpdateRequest,
    ) -> Result<Option<ContactSubmission>, AppError> {
        with_timeout(self.timeout, "contact_submissions.update_status", async {
            let row = sqlx::query_as::<_, ContactSubmission>(
                r#"
                UPDATE contact_submissions
                SET status = $2,
                    notes = COALESCE($3, notes),
                    updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(update.status)
            .bind(&update.notes)
            .fetch_optional(&self.db)
            .await?;

            Ok(row)
        })
        .await
    }
}
