//! Password hashing and verification using Argon2id

use crate::{config::SecurityConfig, error::AppError};
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("invalid argon2 parameters: {0}")]
    Params(String),

    #[error("failed to hash password: {0}")]
    Hashing(String),

    /// The stored digest could not be parsed
    #[error("malformed password digest")]
    MalformedDigest,
}

impl From<CredentialError> for AppError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::Params(_) => AppError::Config(e.to_string()),
            CredentialError::Hashing(_) | CredentialError::MalformedDigest => {
                AppError::Internal(e.to_string())
            }
        }
    }
}

/// Salted one-way hashing of secrets with configurable cost
#[derive(Clone)]
pub struct CredentialVerifier {
    argon2: Argon2<'static>,
}

impl CredentialVerifier {
    /// Create verifier with explicit cost parameters
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, CredentialError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| CredentialError::Params(e.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn from_config(config: &SecurityConfig) -> Result<Self, CredentialError> {
        Self::new(
            config.password_memory_kib,
            config.password_iterations,
            config.password_parallelism,
        )
    }

    /// Hash a secret; every call draws a fresh salt
    pub fn hash(&self, password: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                tracing::error!("Failed to hash password: {:?}", e);
                CredentialError::Hashing(e.to_string())
            })?
            .to_string();

        Ok(password_hash)
    }

    /// Compare a secret against a stored digest.
    ///
    /// The digest carries its own parameters, so digests produced under an
    /// older cost setting still verify.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, CredentialError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|e| {
            tracing::debug!("Failed to parse password hash: {:?}", e);
            CredentialError::MalformedDigest
        })?;

        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Like [`verify`](Self::verify), but a malformed digest counts as a mismatch
    pub fn matches(&self, password: &str, hash: &str) -> bool {
        match self.verify(password, hash) {
            Ok(matched) => matched,
            Err(e) => {
                tracing::warn!(error = %e, "Stored credential could not be verified");
                false
            }
        }
    }

    /// Validate password against policy
    pub fn validate_password_policy(password: &str, policy: &SecurityConfig) -> Result<(), AppError> {
        if password.chars().count() < policy.password_min_length {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters",
                policy.password_min_length
            )));
        }

        if policy.password_require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            return Err(AppError::Validation(
                "Password must contain at least one uppercase letter".to_string(),
            ));
        }

        if policy.password_require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(AppError::Validation(
                "Password must contain at least one digit".to_string(),
            ));
        }

        Ok(())
    }
}
