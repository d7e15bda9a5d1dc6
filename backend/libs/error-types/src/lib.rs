use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Service-level error shared by the chat and notification services.
///
/// Request-path callers see `NotFound`, `InvalidArgument` and `Unauthorized`
/// directly. Consumers use [`ServiceError::is_retryable`] to decide between
/// redelivery and dead-lettering.
///
/// ```ignore
/// match store.get(id).await? {
///     Some(conversation) => Ok(conversation),
///     None => Err(ServiceError::NotFound(format!("conversation {id}"))),
/// }
/// ```
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        ServiceError::NotFound(what.into())
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        ServiceError::InvalidArgument(reason.into())
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        ServiceError::Unavailable(reason.into())
    }

    /// Only transient downstream failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Unavailable(_))
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::NotFound(_) => 404,
            ServiceError::InvalidArgument(_) => 400,
            ServiceError::Unauthorized => 401,
            ServiceError::Conflict(_) => 409,
            ServiceError::Unavailable(_) => 503,
            ServiceError::Internal(_) => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::InvalidArgument(_) => "INVALID_ARGUMENT",
            ServiceError::Conflict(_) => "CONFLICT",
            ServiceError::Unavailable(_) => "UNAVAILABLE",
            ServiceError::Unauthorized => "UNAUTHORIZED",
            ServiceError::Internal(_) => "INTERNAL",
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            status: self.status_code(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Wire shape for surfacing a rejected operation to a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub status: u16,
    pub timestamp: String,
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_is_retryable() {
        assert!(ServiceError::unavailable("store down").is_retryable());
        assert!(!ServiceError::not_found("conversation").is_retryable());
        assert!(!ServiceError::invalid("self conversation").is_retryable());
        assert!(!ServiceError::Conflict("pair".into()).is_retryable());
        assert!(!ServiceError::Internal("boom".into()).is_retryable());
    }

    #[test]
    fn test_error_response_carries_code() {
        let response = ServiceError::not_found("message 42").to_response();
        assert_eq!(response.code, "NOT_FOUND");
        assert_eq!(response.status, 404);
        assert!(response.message.contains("message 42"));
    }
}
