//! HTTP 处理器模块

pub mod auth;
pub mod contact;
pub mod health;
pub mod services;

use axum::{
    http::{Method, StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use serde_json::json;

/// 未匹配路由
pub async fn not_found(method: Method, uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Endpoint not found",
            "path": uri.path(),
            "method": method.as_str(),
        })),
    )
}
