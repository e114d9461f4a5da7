//! 路由注册
//! 创建所有 API 路由并应用中间件

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    set_header::SetResponseHeaderLayer,
};

use crate::{
    auth::{require_auth, require_roles},
    config::ServerConfig,
    handlers,
    middleware::{rate_limit_middleware, request_tracking_middleware, AppState, IpRateLimiter, RateLimit},
};

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    let trust_proxy = state.config.security.trust_proxy;
    let limiters = &state.rate_limiters;
    let rate_limit = |limiter: &Arc<IpRateLimiter>, scope: &'static str| RateLimit {
        limiter: limiter.clone(),
        trust_proxy,
        scope,
    };

    // 公开端点
    let public_routes = Router::new()
        .route("/", get(handlers::health::root))
        .route("/api/health", get(handlers::health::health_check))
        .route("/api/ready", get(handlers::health::readiness_check))
        .route("/api/services", get(handlers::services::list_services))
        .route("/api/auth/logout", post(handlers::auth::logout));

    // 注册/登录（更严格的限流）
    let auth_routes = Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route_layer(from_fn_with_state(
            rate_limit(&limiters.auth, "auth"),
            rate_limit_middleware,
        ));

    // 需要认证的会话端点
    let session_routes = Router::new()
        .route("/api/auth/refresh", post(handlers::auth::refresh_token))
        .route("/api/auth/me", get(handlers::auth::get_current_user))
        .route_layer(from_fn_with_state(state.authenticator.clone(), require_auth));

    // 线索提交（按 IP 限流）
    let contact_routes = Router::new()
        .route("/api/contact/submit", post(handlers::contact::submit))
        .route_layer(from_fn_with_state(
            rate_limit(&limiters.contact, "contact"),
            rate_limit_middleware,
        ));

    let inquiry_routes = Router::new()
        .route("/api/services/inquiry", post(handlers::services::submit_inquiry))
        .route_layer(from_fn_with_state(
            rate_limit(&limiters.inquiry, "inquiry"),
            rate_limit_middleware,
        ));

    // 管理端点：先认证，再校验角色
    let admin_routes = Router::new()
        .route(
            "/api/contact/submissions",
            get(handlers::contact::list_submissions),
        )
        .route(
            "/api/contact/submissions/{id}",
            put(handlers::contact::update_submission),
        )
        .route(
            "/api/services/inquiries",
            get(handlers::services::list_inquiries),
        )
        .route(
            "/api/services/inquiries/{id}",
            put(handlers::services::update_inquiry),
        )
        .route_layer(from_fn_with_state(state.admin_guard.clone(), require_roles))
        .route_layer(from_fn_with_state(state.authenticator.clone(), require_auth));

    // 组合所有路由
    let router = Router::new()
        .merge(public_routes)
        .merge(auth_routes)
        .merge(session_routes)
        .merge(contact_routes)
        .merge(inquiry_routes)
        .merge(admin_routes)
        .fallback(handlers::not_found)
        .layer(from_fn_with_state(
            rate_limit(&limiters.global, "global"),
            rate_limit_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(RequestBodyLimitLayer::new(state.config.server.body_limit_bytes))
        .layer(cors_layer(&state.config.server));

    security_headers(router)
        .layer(from_fn(request_tracking_middleware))
        .with_state(state)
}

/// 浏览器安全响应头，已存在的头不覆盖
fn security_headers<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    [
        ("x-content-type-options", "nosniff"),
        ("x-frame-options", "SAMEORIGIN"),
        ("referrer-policy", "no-referrer"),
        ("x-dns-prefetch-control", "off"),
        ("cross-origin-opener-policy", "same-origin"),
        ("strict-transport-security", "max-age=15552000; includeSubDomains"),
        ("content-security-policy", "default-src 'self'; frame-ancestors 'self'"),
    ]
    .into_iter()
    .fold(router, |router, (name, value)| {
        router.layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        ))
    })
}

/// CORS 策略：仅允许配置的来源，允许携带凭证
fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .allowed_origins()
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) if value != "*" => Some(value),
            _ => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
        ])
        .allow_credentials(true)
}
