//! 认证相关的 HTTP 处理器

use crate::{
    auth::middleware::AuthContext, error::AppError, middleware::AppState, models::auth::*,
    models::user::Identity,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

/// 注册
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = state.auth_service.register(req).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// 登录
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = state.auth_service.login(req).await?;

    Ok(Json(response))
}

/// 登出（令牌无状态，由客户端丢弃）
pub async fn logout(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "message": state.auth_service.logout() }))
}

/// 刷新令牌
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    let response = state.auth_service.refresh(&auth_context)?;

    Ok(Json(response))
}

/// 获取当前用户信息
pub async fn get_current_user(auth_context: AuthContext) -> Json<Identity> {
    Json(auth_context.identity)
}
