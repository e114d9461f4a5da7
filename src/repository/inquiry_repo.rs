//! Service inquiry repository

use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use super::with_timeout;
use crate::{
    error::AppError,
    models::lead::{InquiryFilter, NewServiceInquiry, Page, PageRequest, ServiceInquiry, StatusUpdateRequest},
};

#[async_trait]
pub trait InquiryRepository: Send + Sync {
    async fn create(&self, inquiry: NewServiceInquiry) -> Result<ServiceInquiry, AppError>;

    /// Newest first
    async fn list(
        &self,
        filter: &InquiryFilter,
        page: PageRequest,
    ) -> Result<Page<ServiceInquiry>, AppError>;

    async fn update_status(
        &self,
        id: Uuid,
        update: &StatusUpdateRequest,
    ) -> Result<Option<ServiceInquiry>, AppError>;
}

pub struct PgInquiryRepository {
    db: PgPool,
    timeout: Duration,
}

impl PgInquiryRepository {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[async_trait]
impl InquiryRepository for PgInquiryRepository {
    async fn create(&self, inquiry: NewServiceInquiry) -> Result<ServiceInquiry, AppError> {
        with_timeout(self.timeout, "service_inquiries.create", async {
            let row = sqlx::query_as::<_, ServiceInquiry>(
                r#"
                INSERT INTO service_inquiries
                    (service_type, name, email, phone, company_name, requirements, ip_address, user_agent)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING *
                "#,
            )
            .bind(&inquiry.service_type)
            .bind(&inquiry.name)
            .bind(&inquiry.email)
            .bind(&inquiry.phone)
            .bind(&inquiry.company_name)
            .bind(&inquiry.requirements)
            .bind(&inquiry.ip_address)
            .bind(&inquiry.user_agent)
            .fetch_one(&self.db)
            .await?;

            Ok(row)
        })
        .await
    }

    async fn list(
        &self,
        filter: &InquiryFilter,
        page: PageRequest,
    ) -> Result<Page<ServiceInquiry>, AppError> {
        with_timeout(self.timeout, "service_inquiries.list", async {
            let items = sqlx::query_as::<_, ServiceInquiry>(
                r#"
                SELECT * FROM service_inquiries
                WHERE ($1::text IS NULL OR service_type = $1)
                  AND ($2::lead_status IS NULL OR status = $2)
                ORDER BY created_at DESC
                LIMIT $3 OFFSET $4
                "#,
            )
            .bind(&filter.service_type)
            .bind(filter.status)
            .bind(page.limit as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.db)
            .await?;

            let total: i64 = sqlx::query_scalar(
                r#"
                SELECT COUNT(*) FROM service_inquiries
                WHERE ($1::text IS NULL OR service_type = $1)
                  AND ($2::lead_status IS NULL OR status = $2)
                "#,
            )
            .bind(&filter.service_type)
            .bind(filter.status)
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
    ) -> Result<Option<ServiceInquiry>, AppError> {
        with_timeout(self.timeout, "service_inquiries.update_status", async {
            let row = sqlx::query_as::<_, ServiceInquiry>(
                r#"
                UPDATE service_inquiries
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
