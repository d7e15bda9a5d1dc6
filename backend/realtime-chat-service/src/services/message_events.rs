//! `NEW_MESSAGE` producer
//!
//! Publishes to `message-events` keyed by the receiver id so all of one
//! user's message notifications stay in a single partition.

use crate::error::is_transient_bus_error;
use crate::models::Message;
use event_bus::{BusError, EventBus};
use event_schema::DomainEvent;
use resilience::{with_retry_if, RetryConfig};
use std::sync::Arc;

#[derive(Clone)]
pub struct MessageEventPublisher {
    bus: Arc<dyn EventBus>,
    retry: RetryConfig,
}

impl MessageEventPublisher {
    pub fn new(bus: Arc<dyn EventBus>, retry: RetryConfig) -> Self {
        Self { bus, retry }
    }

    /// Publish `NEW_MESSAGE` for a persisted message.
    ///
    /// Failure is logged and reported as `false`; the message stays stored.
    pub async fn publish_new_message(&self, message: &Message, sender_name: &str) -> bool {
        let event = DomainEvent::new_message(
            message.conversation_id.to_string(),
            message.sender_id.as_str(),
            sender_name,
            message.receiver_id.as_str(),
        );
        let payload = match event.encode() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    message_id = %message.id,
                    "Failed to encode NEW_MESSAGE"
                );
                return false;
            }
        };

        let (Some(topic), Some(key)) = (event.topic(), event.partition_key()) else {
            tracing::error!(
                message_id = %message.id,
                kind = event.kind(),
                "Event has no topic or partition key"
            );
            return false;
        };

        let bus = self.bus.as_ref();
        let bytes = payload.as_slice();
        let result = with_retry_if(self.retry.clone(), is_transient_bus_error, move || {
            bus.publish(topic, key, bytes)
        })
        .await;

        match result {
            Ok(()) => {
                tracing::debug!(
                    message_id = %message.id,
                    receiver_id = %message.receiver_id,
                    "NEW_MESSAGE published"
                );
                true
            }
            Err(e) => {
                let e: BusError = e.into_inner();
                tracing::warn!(
                    error = %e,
                    message_id = %message.id,
                    conversation_id = %message.conversation_id,
                    "Failed to publish NEW_MESSAGE; message remains stored"
                );
                false
            }
        }
    }
}
