use event_bus::BusError;
use resilience::{RetryError, TimeoutError};

pub use error_types::ServiceError as AppError;

pub type AppResult<T> = Result<T, AppError>;

/// Whether a failed publish is worth another attempt
pub fn is_transient_bus_error(err: &BusError) -> bool {
    matches!(err, BusError::Unavailable(_))
}

/// Flatten a retry outcome into the error of the last attempt
pub fn from_retry<E: Into<AppError>>(err: RetryError<E>) -> AppError {
    err.into_inner().into()
}

pub fn from_timeout<E: Into<AppError>>(err: TimeoutError<E>) -> AppError {
    match err {
        TimeoutError::Elapsed(after) => {
            AppError::Unavailable(format!("operation timed out after {after:?}"))
        }
        TimeoutError::OperationFailed(e) => e.into(),
    }
}
