//! # Event Bus
//!
//! Topic-based publish/subscribe transport with at-least-once delivery.
//!
//! - Records are routed to a partition by key; order holds within a partition only.
//! - Subscriptions belong to a consumer group; offsets are committed manually.
//! - `nack` rewinds the partition so the record comes back with `attempt + 1`.
//!
//! ```text
//! producer ──publish(topic, key)──▶ partition(key) ──▶ Subscription(group)
//!                                                         │ next()
//!                                                         ├─ commit() on success
//!                                                         └─ nack()   on transient failure
//! ```
//!
//! [`InMemoryEventBus`] backs tests and single-process deployments. The Kafka
//! implementation lives behind the `kafka` feature.

use async_trait::async_trait;

mod error;
pub mod memory;

#[cfg(feature = "kafka")]
pub mod kafka;

pub use error::{BusError, BusResult};
pub use memory::InMemoryEventBus;

#[cfg(feature = "kafka")]
pub use kafka::KafkaEventBus;

/// A record handed to a consumer, detached from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
    /// 1 on first delivery, incremented on every redelivery after `nack`
    pub attempt: u32,
}

#[async_trait]
pub trait EventBus: Send + Sync {
    /// Append `payload` to `topic`; `key` selects the partition.
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> BusResult<()>;

    /// Join `group_id` on `topic`, resuming from the group's committed offsets.
    async fn subscribe(&self, topic: &str, group_id: &str) -> BusResult<Box<dyn Subscription>>;
}

#[async_trait]
pub trait Subscription: Send {
    fn topic(&self) -> &str;

    /// Wait for the next record. `None` means the bus was closed.
    ///
    /// Cancel-safe: dropping the future before it resolves loses nothing.
    async fn next(&mut self) -> Option<BusResult<Delivery>>;

    /// Mark `delivery` and everything before it in its partition as consumed.
    async fn commit(&mut self, delivery: &Delivery) -> BusResult<()>;

    /// Hand `delivery` back for redelivery.
    async fn nack(&mut self, delivery: &Delivery) -> BusResult<()>;
}
