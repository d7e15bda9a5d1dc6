/// Resilience patterns shared by the chat and notification services
///
/// - **Timeout**: Enforces time limits on channel sends and session delivery
/// - **Retry**: Exponential backoff with jitter for transient failures; the same
///   schedule drives bus redelivery backoff
///
/// # Example: Publish with retry on transient errors only
///
/// ```rust,no_run
/// use resilience::{with_retry_if, RetryConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let result = with_retry_if(
///         RetryConfig::default(),
///         |e: &String| e.starts_with("unavailable"),
///         || async { Ok::<_, String>(()) },
///     )
///     .await;
///     assert!(result.is_ok());
/// }
/// ```
pub mod retry;
pub mod timeout;

pub use retry::{with_retry, with_retry_if, RetryConfig, RetryError};
pub use timeout::{with_timeout, with_timeout_result, TimeoutError};
