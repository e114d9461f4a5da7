//! In-process store implementations
//!
//! Same contracts as the PostgreSQL repositories, backed by `RwLock`ed
//! collections. Used by the test suites and for running the API without a
//! database.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ContactRepository, InquiryRepository, UserDirectory, DUPLICATE_ACCOUNT_MESSAGE};
use crate::{
    error::AppError,
    models::{
        lead::{
            ContactSubmission, InquiryFilter, LeadStatus, NewContactSubmission, NewServiceInquiry,
            Page, PageRequest, ServiceInquiry, StatusUpdateRequest,
        },
        user::{NewUser, Role, UserRecord},
    },
};

#[derive(Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<Uuid, UserRecord>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate or deactivate an account
    pub async fn set_active(&self, id: Uuid, active: bool) -> bool {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) => {
                user.is_active = active;
                user.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub async fn set_role(&self, id: Uuid, role: Role) -> bool {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) => {
                user.role = role;
                user.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, AppError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn insert(&self, user: &NewUser) -> Result<UserRecord, AppError> {
        let mut users = self.users.write().await;

        if users.values().any(|u| u.email == user.email) {
            return Err(AppError::conflict(DUPLICATE_ACCOUNT_MESSAGE));
        }

        let now = Utc::now();
        let record = UserRecord {
            id: Uuid::new_v4(),
            email: user.email.clone(),
            name: user.name.clone(),
            password_hash: user.password_hash.clone(),
            role: user.role,
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(record.id, record.clone());

        Ok(record)
    }

    async fn touch_last_login(&self, id: Uuid) -> Result<(), AppError> {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.last_login_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Newest-first page over rows kept in insertion order
fn paginate<T: Clone>(rows: Vec<&T>, page: PageRequest) -> Page<T> {
    let total = rows.len() as u64;
    let items = rows
        .into_iter()
        .rev()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .cloned()
        .collect();

    Page { items, total }
}

#[derive(Default)]
pub struct MemoryContactRepository {
    rows: RwLock<Vec<ContactSubmission>>,
}

impl MemoryContactRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContactRepository for MemoryContactRepository {
    async fn create(&self, submission: NewContactSubmission) -> Result<ContactSubmission, AppError> {
        let now = Utc::now();
        let row = ContactSubmission {
            id: Uuid::new_v4(),
            name: submission.name,
            email: submission.email,
            phone: submission.phone,
            subject: submission.subject,
            message: submission.message,
            status: LeadStatus::New,
            notes: None,
            ip_address: submission.ip_address,
            user_agent: submission.user_agent,
            created_at: now,
            updated_at: now,
        };
        self.rows.write().await.push(row.clone());
        Ok(row)
    }

    async fn list(
        &self,
        status: Option<LeadStatus>,
        page: PageRequest,
    ) -> Result<Page<ContactSubmission>, AppError> {
        let rows = self.rows.read().await;
        let matching = rows
            .iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .collect();
        Ok(paginate(matching, page))
    }

    async fn update_status(
        &self,
        id: Uuid,
        update: &StatusUpdateRequest,
    ) -> Result<Option<ContactSubmission>, AppError> {
        let mut rows = self.rows.write().await;
        Ok(rows.iter_mut().find(|r| r.id == id).map(|row| {
            row.status = update.status;
            if let Some(notes) = &update.notes {
                row.notes = Some(notes.clone());
            }
            row.updated_at = Utc::now();
            row.clone()
        }))
    }
}

#[derive(Default)]
pub struct MemoryInquiryRepository {
    rows: RwLock<Vec<ServiceInquiry>>,
}

impl MemoryInquiryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InquiryRepository for MemoryInquiryRepository {
    async fn create(&self, inquiry: NewServiceInquiry) -> Result<ServiceInquiry, AppError> {
        let now = Utc::now();
        let row = ServiceInquiry {
            id: Uuid::new_v4(),
            service_type: inquiry.service_type,
            name: inquiry.name,
            email: inquiry.email,
            phone: inquiry.phone,
            company_name: inquiry.company_name,
            requirements: inquiry.requirements,
            status: LeadStatus::New,
            notes: None,
            ip_address: inquiry.ip_address,
            user_agent: inquiry.user_agent,
            created_at: now,
            updated_at: now,
        };
        self.rows.write().await.push(row.clone());
        Ok(row)
    }

    async fn list(
        &self,
        filter: &InquiryFilter,
        page: PageRequest,
    ) -> Result<Page<ServiceInquiry>, AppError> {
        let rows = self.rows.read().await;
        let matching = rows
            .iter()
            .filter(|r| {
                filter
                    .service_type
                    .as_deref()
                    .map_or(true, |t| r.service_type == t)
            })
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .collect();
        Ok(paginate(matching, page))
    }

    async fn update_status(
        &self,
        id: Uuid,
        update: &StatusUpdateRequest,
    ) -> Result<Option<ServiceInquiry>, AppError> {
        let mut rows = self.rows.write().await;
        Ok(rows.iter_mut().find(|r| r.id == id).map(|row| {
            row.status = update.status;
            if let Some(notes) = &update.notes {
                row.notes = Some(notes.clone());
            }
            row.updated_at = Utc::now();
            row.clone()
        }))
    }
}
