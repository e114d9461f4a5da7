//! 联系表单处理器

use crate::{
    error::AppError,
    middleware::{AppState, ClientIp},
    models::lead::{
        ContactFormRequest, ContactListQuery, NewContactSubmission, PageRequest, Pagination,
        StatusUpdateRequest,
    },
};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// 读取 User-Agent 头
pub(crate) fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.chars().take(500).collect())
}

/// 提交联系表单
pub async fn submit(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    headers: HeaderMap,
    Json(req): Json<ContactFormRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let submission = state
        .contacts
        .create(NewContactSubmission {
            name: req.name,
            email: req.email,
            phone: req.phone,
            subject: req.subject,
            message: req.message,
            ip_address: Some(client_ip.to_string()),
            user_agent: user_agent(&headers),
        })
        .await?;

    tracing::info!(submission_id = %submission.id, "Contact submission received");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Contact form submitted successfully",
            "submissionId": submission.id,
        })),
    ))
}

/// 列出联系表单（管理端）
pub async fn list_submissions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ContactListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = PageRequest::new(query.page, query.limit);
    let result = state.contacts.list(query.status, page).await?;

    Ok(Json(json!({
        "submissions": result.items,
        "pagination": Pagination::new(page, result.total),
    })))
}

/// 更新联系表单状态（管理端）
pub async fn update_submission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let submission = state
        .contacts
        .update_status(id, &req)
        .await?
        .ok_or_else(|| AppError::not_found("Submission"))?;

    tracing::info!(submission_id = %id, status = ?req.status, "Contact submission updated");

    Ok(Json(json!({
        "message": "Contact submission updated successfully",
        "submission": submission,
    })))
}
