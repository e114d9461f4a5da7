//! 健康检查处理器
//! 提供 /、/api/health 和 /api/ready 端点

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::{sync::Arc, time::Instant};

use crate::middleware::AppState;

/// 应用启动时间
static APP_START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

/// 记录应用启动时间（在 main.rs 中调用）
pub fn set_start_time() {
    Lazy::force(&APP_START_TIME);
}

/// 获取应用运行时间（秒）
pub fn get_uptime() -> u64 {
    APP_START_TIME.elapsed().as_secs()
}

/// 根路径响应
#[derive(Serialize)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// 存活探针响应
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub environment: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// 就绪探针响应
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: Vec<HealthCheck>,
}

/// 健康检查项
#[derive(Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// 服务信息
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Advisory services API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "running".to_string(),
        timestamp: Utc::now(),
    })
}

/// 存活探针
/// 快速响应，不检查依赖
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: Utc::now(),
        environment: state.config.server.environment.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: get_uptime(),
    })
}

/// 就绪探针
/// 检查用户目录（数据库）是否可达
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let mut checks = Vec::new();

    let directory = state.users.ping().await;
    checks.push(HealthCheck {
        name: "database".to_string(),
        status: match &directory {
            Ok(()) => "healthy".to_string(),
            Err(_) => "unhealthy".to_string(),
        },
        // 不向外暴露底层错误细节
        message: directory.err().map(|e| e.user_message()),
    });

    let all_healthy = checks.iter().all(|c| c.status == "healthy");
    let status = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ready: all_healthy,
            checks,
        }),
    )
}
