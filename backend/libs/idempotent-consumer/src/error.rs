//! Error types for idempotent consumer library

use error_types::ServiceError;
use thiserror::Error;

/// Result type for idempotency operations
pub type IdempotencyResult<T> = Result<T, IdempotencyError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdempotencyError {
    /// Backing store unreachable
    #[error("Idempotency store unavailable: {0}")]
    StoreUnavailable(String),

    /// Event ID validation failed (empty, too long)
    #[error("Invalid event ID: {0}")]
    InvalidEventId(String),

    #[error("Invalid retention: {0}")]
    InvalidRetention(String),
}

impl IdempotencyError {
    /// Check if error is transient (should retry)
    pub fn is_transient(&self) -> bool {
        matches!(self, IdempotencyError::StoreUnavailable(_))
    }
}

impl From<IdempotencyError> for ServiceError {
    fn from(err: IdempotencyError) -> Self {
        match err {
            IdempotencyError::StoreUnavailable(msg) => ServiceError::Unavailable(msg),
            IdempotencyError::InvalidEventId(msg) => ServiceError::InvalidArgument(msg),
            IdempotencyError::InvalidRetention(msg) => ServiceError::Internal(msg),
        }
    }
}
