//! Database repository layer
//!
//! Each store is a trait so the HTTP layer can run against PostgreSQL in
//! production and against the in-memory implementations in tests.

pub mod contact_repo;
pub mod inquiry_repo;
pub mod memory;
pub mod user_repo;

pub use contact_repo::*;
pub use inquiry_repo::*;
pub use memory::*;
pub use user_repo::*;

use crate::error::AppError;
use std::{future::Future, time::Duration};

/// Bound a store call by the configured query timeout
pub(crate) async fn with_timeout<T, F>(
    timeout: Duration,
    operation: &'static str,
    fut: F,
) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(
                operation,
                timeout_ms = timeout.as_millis() as u64,
                "Store call timed out"
            );
            Err(AppError::Upstream(format!("{} timed out", operation)))
        }
    }
}
