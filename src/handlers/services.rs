//! 服务目录与服务咨询处理器

use crate::{
    error::AppError,
    handlers::contact::user_agent,
    middleware::{AppState, ClientIp},
    models::{
        catalog::SERVICE_CATALOG,
        lead::{
            InquiryFilter, InquiryListQuery, NewServiceInquiry, PageRequest, Pagination,
            ServiceInquiryRequest, StatusUpdateRequest,
        },
    },
};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// 服务目录
pub async fn list_services() -> impl IntoResponse {
    Json(json!({ "services": SERVICE_CATALOG }))
}

/// 提交服务咨询
pub async fn submit_inquiry(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    headers: HeaderMap,
    Json(req): Json<ServiceInquiryRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let inquiry = state
        .inquiries
        .create(NewServiceInquiry {
            service_type: req.service_type,
            name: req.name,
            email: req.email,
            phone: req.phone,
            company_name: req.company_name,
            requirements: req.requirements,
            ip_address: Some(client_ip.to_string()),
            user_agent: user_agent(&headers),
        })
        .await?;

    tracing::info!(
        inquiry_id = %inquiry.id,
        service_type = %inquiry.service_type,
        "Service inquiry received"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Service inquiry submitted successfully",
            "inquiryId": inquiry.id,
        })),
    ))
}

/// 列出服务咨询（管理端）
pub async fn list_inquiries(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InquiryListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = PageRequest::new(query.page, query.limit);
    let filter = InquiryFilter {
        service_type: query.service_type,
        status: query.status,
    };
    let result = state.inquiries.list(&filter, page).await?;

    Ok(Json(json!({
        "inquiries": result.items,
        "pagination": Pagination::new(page, result.total),
    })))
}

/// 更新服务咨询状态（管理端）
pub async fn update_inquiry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let inquiry = state
        .inquiries
        .update_status(id, &req)
        .await?
        .ok_or_else(|| AppError::not_found("Inquiry"))?;

    tracing::info!(inquiry_id = %id, status = ?req.status, "Service inquiry updated");

    Ok(Json(json!({
        "message": "Service inquiry updated successfully",
        "inquiry": inquiry,
    })))
}
