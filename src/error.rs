//! Error types for the result cache
//!
//! Provides the cache error taxonomy and its HTTP mapping using thiserror.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache core.
///
/// Cloneable so a single dedup outcome can be delivered to every waiter.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Transient backend failure; the operation could not be confirmed
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Key-building input could not be serialized
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The in-flight computation for a key was cancelled
    #[error("Computation cancelled: {0}")]
    ComputationCancelled(String),

    /// The caller-supplied computation failed
    #[error("Computation failed: {0}")]
    Computation(Arc<anyhow::Error>),
}

impl CacheError {
    /// Wraps a resolver failure so it can be shared across waiters.
    pub fn computation(err: anyhow::Error) -> Self {
        CacheError::Computation(Arc::new(err))
    }

    /// True for backend failures that callers should treat as "could not confirm".
    pub fn is_storage(&self) -> bool {
        matches!(self, CacheError::StorageUnavailable(_))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache core.
pub type Result<T> = std::result::Result<T, CacheError>;

// == API Error Enum ==
/// Error type for the HTTP layer.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Failure inside the cache or the resolver it ran
    #[error(transparent)]
    Cache(#[from] CacheError),
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Cache(CacheError::InvalidArguments(_)) => StatusCode::BAD_REQUEST,
            ApiError::Cache(CacheError::StorageUnavailable(_))
            | ApiError::Cache(CacheError::ComputationCancelled(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Cache(CacheError::Computation(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::StorageUnavailable("shard 3".to_string());
        assert_eq!(err.to_string(), "Storage unavailable: shard 3");

        let err = CacheError::computation(anyhow::anyhow!("boom"));
        assert_eq!(err.to_string(), "Computation failed: boom");
    }

    #[test]
    fn test_clone_shares_computation_error() {
        let err = CacheError::computation(anyhow::anyhow!("db down"));
        let cloned = err.clone();

        match (&err, &cloned) {
            (CacheError::Computation(a), CacheError::Computation(b)) => {
                assert!(Arc::ptr_eq(a, b));
            }
            _ => panic!("expected computation errors"),
        }
    }

    #[test]
    fn test_is_storage() {
        assert!(CacheError::StorageUnavailable("x".into()).is_storage());
        assert!(!CacheError::InvalidArguments("x".into()).is_storage());
    }

    #[test]
    fn test_api_error_status() {
        let cases = [
            (ApiError::NotFound("user 42".into()), StatusCode::NOT_FOUND),
            (ApiError::BadRequest("name".into()), StatusCode::BAD_REQUEST),
            (CacheError::InvalidArguments("x".into()).into(), StatusCode::BAD_REQUEST),
            (CacheError::StorageUnavailable("x".into()).into(), StatusCode::SERVICE_UNAVAILABLE),
            (CacheError::computation(anyhow::anyhow!("x")).into(), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
