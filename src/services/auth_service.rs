//! 认证服务：注册、登录、令牌刷新、登出

use crate::{
    auth::{jwt::TokenCodec, middleware::AuthContext, password::CredentialVerifier},
    config::SecurityConfig,
    error::AppError,
    models::{
        auth::{AuthResponse, LoginRequest, RefreshResponse, RegisterRequest},
        user::{NewUser, Role},
    },
    repository::{UserDirectory, DUPLICATE_ACCOUNT_MESSAGE},
    telemetry::record_auth_event,
};
use std::sync::Arc;
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const ACCOUNT_DEACTIVATED: &str = "Account is deactivated";

pub struct AuthService {
    directory: Arc<dyn UserDirectory>,
    codec: Arc<TokenCodec>,
    verifier: CredentialVerifier,
    policy: SecurityConfig,
    /// 未知邮箱登录时用于等价耗时校验的摘要
    dummy_hash: Arc<str>,
}

impl AuthService {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        codec: Arc<TokenCodec>,
        verifier: CredentialVerifier,
        policy: SecurityConfig,
    ) -> Result<Self, AppError> {
        let dummy_hash = verifier.hash("dummy-password-for-timing")?;

        Ok(Self {
            directory,
            codec,
            verifier,
            policy,
            dummy_hash: dummy_hash.into(),
        })
    }

    /// 用户注册
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse, AppError> {
        req.validate()?;
        CredentialVerifier::validate_password_policy(&req.password, &self.policy)?;

        // 快速路径；并发注册以 insert 的唯一约束为准
        if self.directory.find_by_email(&req.email).await?.is_some() {
            record_auth_event("register", "conflict");
            return Err(AppError::conflict(DUPLICATE_ACCOUNT_MESSAGE));
        }

        let password_hash = self.hash_blocking(req.password).await?;

        let user = self
            .directory
            .insert(&NewUser {
                email: req.email,
                name: req.name,
                password_hash,
                role: Role::default(),
            })
            .await
            .inspect_err(|e| {
                if matches!(e, AppError::Conflict(_)) {
                    record_auth_event("register", "conflict");
                }
            })?;

        let token = self.codec.issue(&user.id, &user.email)?;

        tracing::info!(user_id = %user.id, "User registered");
        record_auth_event("register", "success");

        Ok(AuthResponse {
            message: "User registered successfully".to_string(),
            user: user.into(),
            token,
        })
    }

    /// 用户登录
    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, AppError> {
        req.validate()?;

        let user = self.directory.find_by_email(&req.email).await?;

        // 未知用户同样执行一次校验，两条失败路径耗时一致
        let digest = match &user {
            Some(user) => user.password_hash.clone(),
            None => self.dummy_hash.to_string(),
        };
        let password_ok = self.verify_blocking(req.password, digest).await?;

        let user = match user {
            Some(user) if password_ok => user,
            _ => {
                tracing::info!("Login failed: invalid credentials");
                record_auth_event("login", "invalid_credentials");
                return Err(AppError::authentication(INVALID_CREDENTIALS));
            }
        };

        if !user.is_active {
            tracing::info!(user_id = %user.id, "Login refused: account deactivated");
            record_auth_event("login", "deactivated");
            return Err(AppError::authentication(ACCOUNT_DEACTIVATED));
        }

        // 更新最后登录时间，失败不影响登录
        let directory = self.directory.clone();
        let user_id = user.id;
        tokio::spawn(async move {
            if let Err(e) = directory.touch_last_login(user_id).await {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to record last login");
            }
        });

        let token = self.codec.issue(&user.id, &user.email)?;

        tracing::info!(user_id = %user.id, "User logged in");
        record_auth_event("login", "success");

        Ok(AuthResponse {
            message: "Login successful".to_string(),
            user: user.into(),
            token,
        })
    }

    /// 刷新令牌（身份已由认证中间件重新解析）
    pub fn refresh(&self, context: &AuthContext) -> Result<RefreshResponse, AppError> {
        let token = self
            .codec
            .issue(&context.identity.id, &context.identity.email)?;

        record_auth_event("refresh", "success");

        Ok(RefreshResponse {
            message: "Token refreshed successfully".to_string(),
            token,
        })
    }

    /// 登出：令牌无状态，客户端丢弃即可
    pub fn logout(&self) -> &'static str {
        record_auth_event("logout", "success");
        "Logout successful"
    }

    async fn hash_blocking(&self, password: String) -> Result<String, AppError> {
        let verifier = self.verifier.clone();
        let hash = tokio::task::spawn_blocking(move || verifier.hash(&password))
            .await
            .map_err(|e| AppError::internal_error(&format!("hashing task failed: {}", e)))??;
        Ok(hash)
    }

    async fn verify_blocking(&self, password: String, digest: String) -> Result<bool, AppError> {
        let verifier = self.verifier.clone();
        tokio::task::spawn_blocking(move || verifier.matches(&password, &digest))
            .await
            .map_err(|e| AppError::internal_error(&format!("verification task failed: {}", e)))
    }
}
