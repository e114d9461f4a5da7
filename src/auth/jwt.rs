//! Signed, time-limited identity tokens (HS256 JWT)
//!
//! Tokens are stateless: validity is decided from the signature and the
//! embedded expiry alone, there is no server-side session or denylist.

use crate::{config::AppConfig, error::AppError};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimum HS256 key length in bytes
const MIN_SECRET_LEN: usize = 32;

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (identity ID)
    pub sub: String,

    pub email: String,

    /// Issued at
    pub iat: i64,

    /// Expiration
    pub exp: i64,
}

/// Claims that survived verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub identity_id: Uuid,
    pub email: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Bad signature, malformed token or expired. Callers must not
    /// distinguish between these.
    #[error("invalid or expired token")]
    Invalid,

    #[error("signing secret too short (min {MIN_SECRET_LEN} bytes)")]
    WeakSecret,

    #[error("failed to encode token: {0}")]
    Encode(jsonwebtoken::errors::Error),
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Invalid => AppError::authentication("Invalid or expired token"),
            TokenError::WeakSecret => AppError::Config(e.to_string()),
            TokenError::Encode(_) => AppError::Internal(e.to_string()),
        }
    }
}

/// Issues and verifies identity tokens
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: u64,
}

impl TokenCodec {
    pub fn new(secret: &[u8], ttl_secs: u64) -> Result<Self, TokenError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(TokenError::WeakSecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl_secs,
        })
    }

    /// Create codec from config
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let secret = config.security.jwt_secret.expose_secret();
        Ok(Self::new(secret.as_bytes(), config.security.token_exp_secs)?)
    }

    /// Issue a token for the given identity, expiring `ttl_secs` from now
    pub fn issue(&self, identity_id: &Uuid, email: &str) -> Result<String, TokenError> {
        self.issue_at(identity_id, email, Utc::now())
    }

    fn issue_at(
        &self,
        identity_id: &Uuid,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let expiration = now + Duration::seconds(self.ttl_secs as i64);

        let claims = Claims {
            sub: identity_id.to_string(),
            email: email.to_string(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode token: {:?}", e);
            TokenError::Encode(e)
        })
    }

    /// Verify signature and expiry, returning the embedded identity
    pub fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!("Token validation failed: {:?}", e);
                TokenError::Invalid
            })?
            .claims;

        // jsonwebtoken accepts exp == now; a token is only valid strictly before expiry
        if Utc::now().timestamp() >= claims.exp {
            tracing::debug!(exp = claims.exp, "Token expired");
            return Err(TokenError::Invalid);
        }

        let identity_id = Uuid::parse_str(&claims.sub).map_err(|_| {
            tracing::debug!("Token subject is not a valid identity id");
            TokenError::Invalid
        })?;

        Ok(VerifiedToken {
            identity_id,
            email: claims.email,
        })
    }
}
