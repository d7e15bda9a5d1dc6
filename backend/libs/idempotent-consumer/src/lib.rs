//! # Idempotent Consumer Library
//!
//! Guards event handlers against at-least-once redelivery. Each event is
//! identified by a key; the first caller to claim the key runs the handler,
//! and the key is marked processed only after the handler succeeds. A failed
//! handler releases its claim so a redelivery can try again.
//!
//! ## Architecture
//!
//! ```text
//! Bus → Consumer → IdempotencyGuard → Handler
//!                        ↓
//!                  (claim/complete)
//!                        ↓
//!               ProcessedEventStore
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use idempotent_consumer::{IdempotencyGuard, ProcessingResult};
//! use std::time::Duration;
//!
//! let guard = IdempotencyGuard::in_memory(Duration::from_secs(86400));
//!
//! match guard.process_if_new("event-123", || async {
//!     create_notification().await
//! }).await? {
//!     ProcessingResult::Success => {}
//!     ProcessingResult::AlreadyProcessed => {}
//!     ProcessingResult::InProgress => { /* another worker holds it; retry later */ }
//!     ProcessingResult::Failed(err) => return Err(err),
//! }
//! ```
//!
//! ## Key strategies
//!
//! - Payload-supplied event id when the producer stamps one.
//! - Otherwise a natural key derived from the payload. Two deliveries of the
//!   same logical event must map to the same key.
//! - `topic-partition-offset` only dedups redelivery of one record, never a
//!   producer-side duplicate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

mod error;

pub use error::{IdempotencyError, IdempotencyResult};

const MAX_EVENT_ID_LEN: usize = 255;

/// Result of processing an event with idempotency check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingResult<E = String> {
    /// Event was processed successfully (first time)
    Success,

    /// Event was already processed before (duplicate)
    AlreadyProcessed,

    /// Another caller currently holds the claim for this key
    InProgress,

    /// Handler returned an error; the claim was released
    Failed(E),
}

impl<E> ProcessingResult<E> {
    /// Check if processing was successful (either first time or already processed)
    pub fn is_ok(&self) -> bool {
        matches!(
            self,
            ProcessingResult::Success | ProcessingResult::AlreadyProcessed
        )
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ProcessingResult::Failed(_))
    }
}

/// A completed event record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedEvent {
    pub event_id: String,
    pub processed_at: DateTime<Utc>,
    /// Optional metadata about processing (topic, partition, offset)
    pub metadata: Option<serde_json::Value>,
}

/// Outcome of trying to take ownership of an event key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    Acquired,
    AlreadyProcessed,
    InProgress,
}

/// Storage for claimed and processed event keys
#[async_trait]
pub trait ProcessedEventStore: Send + Sync {
    async fn find(&self, event_id: &str) -> IdempotencyResult<Option<ProcessedEvent>>;

    /// Atomically claim `event_id` unless it is processed or already claimed.
    async fn claim(&self, event_id: &str) -> IdempotencyResult<Claim>;

    /// Record `event_id` as processed. Returns `false` if it already was.
    async fn complete(
        &self,
        event_id: &str,
        metadata: Option<serde_json::Value>,
    ) -> IdempotencyResult<bool>;

    /// Drop a claim that did not complete.
    async fn release(&self, event_id: &str) -> IdempotencyResult<()>;

    /// Delete processed records older than `cutoff`; returns the count removed.
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> IdempotencyResult<u64>;
}

#[derive(Debug, Clone)]
enum Slot {
    Pending,
    Done(ProcessedEvent),
}

/// DashMap-backed store; processed keys expire after `ttl`
pub struct InMemoryProcessedEventStore {
    entries: DashMap<String, Slot>,
    ttl: chrono::Duration,
}

impl InMemoryProcessedEventStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: chrono::Duration::from_std(ttl)
                .unwrap_or_else(|_| chrono::Duration::days(36_500)),
        }
    }

    fn is_expired(&self, event: &ProcessedEvent) -> bool {
        Utc::now() - event.processed_at > self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ProcessedEventStore for InMemoryProcessedEventStore {
    async fn find(&self, event_id: &str) -> IdempotencyResult<Option<ProcessedEvent>> {
        let found = match self.entries.get(event_id).as_deref() {
            Some(Slot::Done(event)) => Some(event.clone()),
            _ => None,
        };
        match found {
            Some(event) if self.is_expired(&event) => {
                debug!(event_id = %event_id, "Expired dedup entry");
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn claim(&self, event_id: &str) -> IdempotencyResult<Claim> {
        match self.entries.entry(event_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                let claim = match occupied.get() {
                    Slot::Pending => Claim::InProgress,
                    Slot::Done(event) if self.is_expired(event) => Claim::Acquired,
                    Slot::Done(_) => Claim::AlreadyProcessed,
                };
                if claim == Claim::Acquired {
                    occupied.insert(Slot::Pending);
                }
                Ok(claim)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot::Pending);
                Ok(Claim::Acquired)
            }
        }
    }

    async fn complete(
        &self,
        event_id: &str,
        metadata: Option<serde_json::Value>,
    ) -> IdempotencyResult<bool> {
        let record = ProcessedEvent {
            event_id: event_id.to_string(),
            processed_at: Utc::now(),
            metadata,
        };
        match self.entries.entry(event_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                let fresh = match occupied.get() {
                    Slot::Pending => true,
                    Slot::Done(existing) => self.is_expired(existing),
                };
                if fresh {
                    occupied.insert(Slot::Done(record));
                }
                Ok(fresh)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot::Done(record));
                Ok(true)
            }
        }
    }

    async fn release(&self, event_id: &str) -> IdempotencyResult<()> {
        self.entries
            .remove_if(event_id, |_, slot| matches!(slot, Slot::Pending));
        Ok(())
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> IdempotencyResult<u64> {
        let before = self.entries.len();
        self.entries.retain(|_, slot| match slot {
            Slot::Pending => true,
            Slot::Done(event) => event.processed_at >= cutoff,
        });
        Ok(before.saturating_sub(self.entries.len()) as u64)
    }
}

/// Idempotency guard for event processing
///
/// Cheap to clone; clones share the same store.
#[derive(Clone)]
pub struct IdempotencyGuard {
    store: Arc<dyn ProcessedEventStore>,
    retention_duration: Duration,
}

impl IdempotencyGuard {
    pub fn new(store: Arc<dyn ProcessedEventStore>, retention_duration: Duration) -> Self {
        Self {
            store,
            retention_duration,
        }
    }

    /// Guard over a fresh [`InMemoryProcessedEventStore`] with matching TTL
    pub fn in_memory(retention_duration: Duration) -> Self {
        Self::new(
            Arc::new(InMemoryProcessedEventStore::new(retention_duration)),
            retention_duration,
        )
    }

    pub async fn is_processed(&self, event_id: &str) -> IdempotencyResult<bool> {
        Self::validate_event_id(event_id)?;

        let exists = self.store.find(event_id).await?.is_some();
        if exists {
            debug!(event_id = %event_id, "Event already processed");
        }
        Ok(exists)
    }

    /// Mark an event as processed
    ///
    /// Returns `true` on first mark, `false` for a duplicate.
    pub async fn mark_processed(
        &self,
        event_id: &str,
        metadata: Option<serde_json::Value>,
    ) -> IdempotencyResult<bool> {
        Self::validate_event_id(event_id)?;

        let has_metadata = metadata.is_some();
        let was_inserted = self.store.complete(event_id, metadata).await?;
        if was_inserted {
            debug!(event_id = %event_id, has_metadata, "Event marked as processed");
        } else {
            debug!(event_id = %event_id, "Event already marked as processed (duplicate)");
        }
        Ok(was_inserted)
    }

    /// Run `f` only if `event_id` has not been processed
    ///
    /// 1. Claim the key (fails fast on duplicates and concurrent holders)
    /// 2. Run `f`
    /// 3. On success mark processed; on error release the claim
    ///
    /// If 10 callers race on one key, exactly one runs `f`; the rest see
    /// `InProgress` or, once it finishes, `AlreadyProcessed`.
    pub async fn process_if_new<F, Fut, E>(
        &self,
        event_id: &str,
        f: F,
    ) -> IdempotencyResult<ProcessingResult<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        Self::validate_event_id(event_id)?;

        match self.store.claim(event_id).await? {
            Claim::AlreadyProcessed => {
                debug!(event_id = %event_id, "Duplicate event skipped");
                return Ok(ProcessingResult::AlreadyProcessed);
            }
            Claim::InProgress => return Ok(ProcessingResult::InProgress),
            Claim::Acquired => {}
        }

        match f().await {
            Ok(()) => {
                self.store.complete(event_id, None).await?;
                Ok(ProcessingResult::Success)
            }
            Err(e) => {
                warn!(event_id = %event_id, error = %e, "Event processing failed");
                if let Err(release_err) = self.store.release(event_id).await {
                    warn!(event_id = %event_id, error = %release_err, "Failed to release claim");
                }
                Ok(ProcessingResult::Failed(e))
            }
        }
    }

    /// Delete processed keys older than the retention window
    pub async fn cleanup_old_events(&self) -> IdempotencyResult<u64> {
        let retention = chrono::Duration::from_std(self.retention_duration)
            .map_err(|e| IdempotencyError::InvalidRetention(e.to_string()))?;
        let cutoff_time = Utc::now() - retention;

        let deleted_count = self.store.purge_before(cutoff_time).await?;
        if deleted_count > 0 {
            info!(
                deleted_count,
                cutoff_time = %cutoff_time,
                "Cleaned up old processed events"
            );
        } else {
            debug!("No old events to cleanup");
        }
        Ok(deleted_count)
    }

    fn validate_event_id(event_id: &str) -> IdempotencyResult<()> {
        if event_id.is_empty() {
            return Err(IdempotencyError::InvalidEventId(
                "Event ID cannot be empty".to_string(),
            ));
        }

        if event_id.len() > MAX_EVENT_ID_LEN {
            return Err(IdempotencyError::InvalidEventId(format!(
                "Event ID too long: {} characters (max {MAX_EVENT_ID_LEN})",
                event_id.len()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_event_id() {
        assert!(IdempotencyGuard::validate_event_id("event-123").is_ok());
        assert!(IdempotencyGuard::validate_event_id(&"x".repeat(255)).is_ok());

        let err = IdempotencyGuard::validate_event_id("").unwrap_err();
        assert!(matches!(err, IdempotencyError::InvalidEventId(_)));

        let err = IdempotencyGuard::validate_event_id(&"x".repeat(256)).unwrap_err();
        assert!(matches!(err, IdempotencyError::InvalidEventId(_)));
    }

    #[test]
    fn test_processing_result() {
        assert!(ProcessingResult::<String>::Success.is_ok());
        assert!(ProcessingResult::<String>::AlreadyProcessed.is_ok());
        assert!(!ProcessingResult::<String>::InProgress.is_ok());
        assert!(!ProcessingResult::Failed("error".to_string()).is_ok());
        assert!(ProcessingResult::Failed("error".to_string()).is_failed());
    }

    #[tokio::test]
    async fn test_claim_blocks_second_claimant_until_release() {
        let store = InMemoryProcessedEventStore::new(Duration::from_secs(60));
        assert_eq!(store.claim("k").await.unwrap(), Claim::Acquired);
        assert_eq!(store.claim("k").await.unwrap(), Claim::InProgress);

        store.release("k").await.unwrap();
        assert_eq!(store.claim("k").await.unwrap(), Claim::Acquired);

        assert!(store.complete("k", None).await.unwrap());
        assert_eq!(store.claim("k").await.unwrap(), Claim::AlreadyProcessed);
    }

    #[tokio::test]
    async fn test_release_keeps_completed_record() {
        let store = InMemoryProcessedEventStore::new(Duration::from_secs(60));
        store.complete("k", None).await.unwrap();
        store.release("k").await.unwrap();
        assert!(store.find("k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_zero_ttl_expires_immediately() {
        let store = InMemoryProcessedEventStore::new(Duration::ZERO);
        store.complete("k", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(store.find("k").await.unwrap().is_none());
        assert_eq!(store.claim("k").await.unwrap(), Claim::Acquired);
    }
}
