//! 错误处理集成测试
//!
//! 测试错误类型到 HTTP 响应的映射

use advisory_api::{
    auth::{jwt::TokenError, middleware::AuthRejection, password::CredentialError},
    error::AppError,
};
use axum::{http::StatusCode, response::IntoResponse};
use http_body_util::BodyExt;

async fn render(error: AppError) -> (StatusCode, serde_json::Value) {
    let response = error.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_error_body_shape() {
    let (status, body) = render(AppError::conflict("An account with this email already exists")).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], 409);
    assert_eq!(
        body["error"]["message"],
        "An account with this email already exists"
    );
    assert!(body["error"]["request_id"].is_string());
}

#[tokio::test]
async fn test_server_errors_hide_details() {
    for error in [
        AppError::Database(sqlx::Error::PoolTimedOut),
        AppError::Upstream("users.find_by_id timed out".to_string()),
        AppError::Config("jwt secret missing".to_string()),
        AppError::internal_error("hashing task failed"),
    ] {
        let (status, body) = render(error).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], "Internal server error");
    }
}

#[tokio::test]
async fn test_auth_rejections_are_unauthorized() {
    for rejection in [
        AuthRejection::MissingToken,
        AuthRejection::InvalidToken,
        AuthRejection::UnknownOrInactiveUser,
    ] {
        let (status, body) = render(rejection.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["message"], rejection.message());
    }

    let (status, _) = render(AppError::Forbidden).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[test]
fn test_component_error_conversions() {
    let error: AppError = TokenError::Invalid.into();
    assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);

    let error: AppError = TokenError::WeakSecret.into();
    assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

    let error: AppError = CredentialError::MalformedDigest.into();
    assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

    let error: AppError = config::ConfigError::Message("bad".to_string()).into();
    assert!(matches!(error, AppError::Config(_)));
}
