use resilience::TimeoutError;

pub use error_types::ServiceError as AppError;

pub type AppResult<T> = Result<T, AppError>;

/// A channel send that timed out is reported like an unreachable transport
pub fn from_timeout(err: TimeoutError<AppError>) -> AppError {
    match err {
        TimeoutError::Elapsed(after) => {
            AppError::Unavailable(format!("channel send timed out after {after:?}"))
        }
        TimeoutError::OperationFailed(e) => e,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_timeout_is_retryable() {
        let err = from_timeout(TimeoutError::Elapsed(Duration::from_millis(10)));
        assert!(err.is_retryable());

        let err = from_timeout(TimeoutError::OperationFailed(AppError::invalid("bad token")));
        assert!(!err.is_retryable());
    }
}
