//! Lead intake models: contact submissions and service inquiries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::catalog::is_known_service;

/// 线索处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "lead_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    /// 新提交
    #[default]
    New,
    /// 跟进中
    InProgress,
    /// 已解决
    Resolved,
    /// 已关闭
    Closed,
}

/// 联系表单记录
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ContactSubmission {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub message: String,
    pub status: LeadStatus,
    pub notes: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 联系表单请求
#[derive(Debug, Deserialize, Validate)]
pub struct ContactFormRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(length(max = 20, message = "Phone must be at most 20 characters"))]
    pub phone: Option<String>,
    #[validate(length(max = 200, message = "Subject must be at most 200 characters"))]
    pub subject: Option<String>,
    #[validate(length(min = 1, max = 5000, message = "Message must be 1-5000 characters"))]
    pub message: String,
}

/// 联系表单入库数据
#[derive(Debug, Clone)]
pub struct NewContactSubmission {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub message: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// 服务咨询记录
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ServiceInquiry {
    pub id: Uuid,
    pub service_type: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub requirements: Option<String>,
    pub status: LeadStatus,
    pub notes: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 服务咨询请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInquiryRequest {
    #[validate(custom(function = "validate_service_type"))]
    pub service_type: String,
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(length(max = 20, message = "Phone must be at most 20 characters"))]
    pub phone: Option<String>,
    #[validate(length(max = 200, message = "Company name must be at most 200 characters"))]
    pub company_name: Option<String>,
    #[validate(length(max = 5000, message = "Requirements must be at most 5000 characters"))]
    pub requirements: Option<String>,
}

fn validate_service_type(service_type: &str) -> Result<(), ValidationError> {
    if is_known_service(service_type) {
        Ok(())
    } else {
        let mut err = ValidationError::new("unknown_service");
        err.message = Some("Unknown service type".into());
        Err(err)
    }
}

/// 服务咨询入库数据
#[derive(Debug, Clone)]
pub struct NewServiceInquiry {
    pub service_type: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub requirements: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// 管理端状态更新请求
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StatusUpdateRequest {
    pub status: LeadStatus,
    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

/// 联系表单列表查询参数
#[derive(Debug, Default, Deserialize)]
pub struct ContactListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<LeadStatus>,
}

/// 服务咨询列表查询参数
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InquiryListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub service_type: Option<String>,
    pub status: Option<LeadStatus>,
}

/// 服务咨询过滤条件
#[derive(Debug, Clone, Default)]
pub struct InquiryFilter {
    pub service_type: Option<String>,
    pub status: Option<LeadStatus>,
}

/// 分页请求（已归一化）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }
}

/// 分页结果
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// 分页元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(request: PageRequest, total: u64) -> Self {
        Self {
            page: request.page,
            limit: request.limit,
            total,
            total_pages: total.div_ceil(request.limit as u64),
        }
    }
}
