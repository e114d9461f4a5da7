//! HTTP 中间件
//! 应用状态、请求追踪、按 IP 限流

use crate::{
    auth::{jwt::TokenCodec, middleware::Authenticator, password::CredentialVerifier, RoleGuard},
    config::{AppConfig, RateLimitConfig},
    error::AppError,
    repository::{ContactRepository, InquiryRepository, UserDirectory},
    services::AuthService,
};
use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::{
    collections::VecDeque,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use tracing::Instrument;
use uuid::Uuid;

/// 应用状态
///
/// 存储层以 trait 对象持有，生产环境为 PostgreSQL，测试为内存实现。
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub users: Arc<dyn UserDirectory>,
    pub contacts: Arc<dyn ContactRepository>,
    pub inquiries: Arc<dyn InquiryRepository>,
    pub auth_service: Arc<AuthService>,
    pub authenticator: Arc<Authenticator>,
    /// 管理接口的角色守卫
    pub admin_guard: RoleGuard,
    pub rate_limiters: RateLimiters,
}

impl AppState {
    /// 组装服务与中间件依赖
    pub fn new(
        config: AppConfig,
        users: Arc<dyn UserDirectory>,
        contacts: Arc<dyn ContactRepository>,
        inquiries: Arc<dyn InquiryRepository>,
    ) -> Result<Self, AppError> {
        let codec = Arc::new(TokenCodec::from_config(&config)?);
        let verifier = CredentialVerifier::from_config(&config.security)?;
        let admin_roles = config.security.admin_roles()?;

        let auth_service = Arc::new(AuthService::new(
            users.clone(),
            codec.clone(),
            verifier,
            config.security.clone(),
        )?);
        let authenticator = Arc::new(Authenticator::new(codec, users.clone()));
        let rate_limiters = RateLimiters::from_config(&config.rate_limit);

        Ok(Self {
            config,
            users,
            contacts,
            inquiries,
            auth_service,
            authenticator,
            admin_guard: RoleGuard::new(admin_roles),
            rate_limiters,
        })
    }
}

tokio::task_local! {
    static REQUEST_ID: String;
}

/// 当前请求的 request_id，仅在请求追踪中间件内可用
pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(|id| id.clone()).ok()
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    async move {
        let start = Instant::now();

        let mut response = REQUEST_ID.scope(request_id.clone(), next.run(req)).await;

        let elapsed = start.elapsed();
        let status = response.status().as_u16();

        // 指标标签使用静态字符串，避免基数膨胀
        let method_name = match method.as_str() {
            "GET" => "GET",
            "POST" => "POST",
            "PUT" => "PUT",
            "DELETE" => "DELETE",
            "OPTIONS" => "OPTIONS",
            _ => "OTHER",
        };
        let status_code = match status {
            200 => "200",
            201 => "201",
            400 => "400",
            401 => "401",
            403 => "403",
            404 => "404",
            409 => "409",
            429 => "429",
            500 => "500",
            _ => "other",
        };

        metrics::counter!("http_requests_total", "method" => method_name, "status" => status_code)
            .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            status = status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Request completed"
        );

        // 在响应头中回写追踪 ID
        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            response.headers_mut().insert("x-trace-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert("x-request-id", value);
        }

        response
    }
    .instrument(span)
    .await
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

// ==================== 限流 ====================

/// 各路由组的限流器
#[derive(Clone)]
pub struct RateLimiters {
    pub global: Arc<IpRateLimiter>,
    pub auth: Arc<IpRateLimiter>,
    pub contact: Arc<IpRateLimiter>,
    pub inquiry: Arc<IpRateLimiter>,
}

impl RateLimiters {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            global: Arc::new(IpRateLimiter::new(
                config.global_max_requests,
                Duration::from_secs(config.global_window_secs),
            )),
            auth: Arc::new(IpRateLimiter::new(
                config.auth_max_requests,
                Duration::from_secs(config.auth_window_secs),
            )),
            contact: Arc::new(IpRateLimiter::new(
                config.contact_max_requests,
                Duration::from_secs(config.contact_window_secs),
            )),
            inquiry: Arc::new(IpRateLimiter::new(
                config.inquiry_max_requests,
                Duration::from_secs(config.inquiry_window_secs),
            )),
        }
    }
}

/// IP 级别的速率限制器
/// 使用滑动窗口算法实现
pub struct IpRateLimiter {
    /// 每个 IP 地址的请求记录
    limiters: DashMap<IpAddr, Arc<IpLimiterState>>,
    max_requests: usize,
    window: Duration,
}

/// 单个 IP 的限流状态
struct IpLimiterState {
    /// 请求时间戳队列（滑动窗口）
    requests: Mutex<VecDeque<Instant>>,
}

impl IpRateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            limiters: DashMap::new(),
            max_requests: max_requests as usize,
            window,
        }
    }

    /// 检查是否允许请求；允许时计入窗口
    pub fn check(&self, ip: IpAddr) -> bool {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> bool {
        let state = self
            .limiters
            .entry(ip)
            .or_insert_with(|| {
                Arc::new(IpLimiterState {
                    requests: Mutex::new(VecDeque::new()),
                })
            })
            .clone();

        let mut requests = state.requests.lock().unwrap_or_else(|e| e.into_inner());

        // 清理过期的请求记录
        while let Some(&front) = requests.front() {
            if now.duration_since(front) < self.window {
                break;
            }
            requests.pop_front();
        }

        if requests.len() < self.max_requests {
            requests.push_back(now);
            true
        } else {
            false
        }
    }

    /// 清理窗口内已无请求的 IP
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        self.limiters.retain(|_, state| {
            let requests = state.requests.lock().unwrap_or_else(|e| e.into_inner());
            requests
                .back()
                .is_some_and(|&last| now.duration_since(last) < self.window)
        });
    }

    pub fn tracked_ips(&self) -> usize {
        self.limiters.len()
    }
}

/// 限流中间件的状态
#[derive(Clone)]
pub struct RateLimit {
    pub limiter: Arc<IpRateLimiter>,
    pub trust_proxy: bool,
    /// 日志与指标中的限流器名称
    pub scope: &'static str,
}

/// 速率限制中间件
/// 使用客户端 IP 作为限流键
pub async fn rate_limit_middleware(
    State(rate_limit): State<RateLimit>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client_ip = resolve_client_ip(&req, rate_limit.trust_proxy);

    if !rate_limit.limiter.check(client_ip) {
        tracing::warn!(
            client_ip = %client_ip,
            scope = rate_limit.scope,
            path = %req.uri().path(),
            "Rate limit exceeded"
        );
        metrics::counter!("rate_limit_rejections_total", "scope" => rate_limit.scope).increment(1);
        return Err(AppError::RateLimitExceeded);
    }

    // 将 IP 添加到请求扩展，以便后续使用
    req.extensions_mut().insert(ClientIp(client_ip));

    Ok(next.run(req).await)
}

/// 获取客户端 IP 地址
/// 信任代理时优先使用代理头，否则使用连接地址
fn resolve_client_ip(req: &Request, trust_proxy: bool) -> IpAddr {
    if let Some(ClientIp(ip)) = req.extensions().get::<ClientIp>() {
        return *ip;
    }

    if trust_proxy {
        if let Some(ip) = ip_from_proxy_headers(req.headers()) {
            return ip;
        }
    }

    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip();
    }

    // 无连接信息（例如测试中的 oneshot 请求）
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn ip_from_proxy_headers(headers: &HeaderMap) -> Option<IpAddr> {
    // X-Forwarded-For 可能包含多个 IP，取第一个
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok());

    forwarded.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    })
}

// ==================== 客户端 IP 提取器 ====================

/// Axum 提取器：从请求中获取客户端 IP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // 由限流中间件设置
        if let Some(ip) = parts.extensions.get::<ClientIp>() {
            return Ok(*ip);
        }

        if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            return Ok(ClientIp(addr.ip()));
        }

        Ok(ClientIp(IpAddr::V4(Ipv4Addr::LOCALHOST)))
    }
}
