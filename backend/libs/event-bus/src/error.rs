//! Error types for the event bus

use error_types::ServiceError;
use thiserror::Error;

pub type BusResult<T> = Result<T, BusError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Broker unreachable or rejected the request
    #[error("Event bus unavailable: {0}")]
    Unavailable(String),

    /// The bus was shut down
    #[error("Event bus closed")]
    Closed,

    /// Commit or nack referenced a record this subscription never handed out
    #[error("Invalid delivery: {0}")]
    InvalidDelivery(String),
}

impl From<BusError> for ServiceError {
    fn from(err: BusError) -> Self {
        match err {
            BusError::Unavailable(msg) => ServiceError::Unavailable(msg),
            BusError::Closed => ServiceError::Unavailable("event bus closed".to_string()),
            BusError::InvalidDelivery(msg) => ServiceError::Internal(msg),
        }
    }
}
