/// Notification Dispatcher
///
/// Turns one domain event payload into at most one stored notification:
///
/// ```text
/// RECEIVED -> MAPPED -> FILTERED (skip | pass) -> PERSISTED -> SENT (per channel)
/// ```
///
/// Persistence runs under an [`IdempotencyGuard`] so a redelivered event does
/// not create a second record. Channel sends happen after persistence and
/// their failures are only logged.
///
/// The returned error, if any, is always a persistence or preference lookup
/// failure. The consumer runtime decides between redelivery and dead-letter
/// based on [`AppError::is_retryable`].
use super::channel::ChannelSender;
use super::notification_store::NotificationStore;
use super::preferences::PreferenceStore;
use super::templates::{map_event, Mapped};
use crate::error::{from_timeout, AppError, AppResult};
use crate::models::{Category, Channel, Notification, NotificationDraft, NotificationSettings};
use chrono::Utc;
use event_schema::{discriminator, DomainEvent};
use futures::future::join_all;
use idempotent_consumer::{IdempotencyGuard, ProcessingResult};
use resilience::with_timeout_result;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Record stored; `channels` lists the extra channels that accepted it
    Persisted {
        notification: Notification,
        channels: Vec<Channel>,
    },
    /// Recipient has in-app notifications off for this category
    Filtered,
    /// Same event was already persisted
    Duplicate,
    /// No template for this discriminator
    Ignored(String),
    /// Payload could not be decoded or mapped
    Malformed(String),
}

pub struct Dispatcher {
    preferences: Arc<dyn PreferenceStore>,
    notifications: Arc<dyn NotificationStore>,
    sender: Arc<dyn ChannelSender>,
    guard: IdempotencyGuard,
    dedup_bucket_secs: i64,
    channel_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        preferences: Arc<dyn PreferenceStore>,
        notifications: Arc<dyn NotificationStore>,
        sender: Arc<dyn ChannelSender>,
        guard: IdempotencyGuard,
        dedup_bucket_secs: i64,
        channel_timeout: Duration,
    ) -> Self {
        Self {
            preferences,
            notifications,
            sender,
            guard,
            dedup_bucket_secs: dedup_bucket_secs.max(1),
            channel_timeout,
        }
    }

    pub async fn dispatch(&self, payload: &[u8]) -> AppResult<DispatchOutcome> {
        // RECEIVED
        let event = match DomainEvent::decode(payload) {
            Ok(event) => event,
            Err(e) => {
                let kind = discriminator(payload).unwrap_or_else(|| "<none>".into());
                error!(event_type = %kind, error = %e, "Malformed event payload, skipping");
                return Ok(DispatchOutcome::Malformed(e.to_string()));
            }
        };
        debug!(event_type = event.kind(), event_id = ?event.event_id(), "Event received");

        // MAPPED
        let draft = match map_event(&event) {
            Mapped::Draft(draft) => draft,
            Mapped::Unknown => {
                let kind = discriminator(payload).unwrap_or_default();
                debug!(event_type = %kind, "No template for event type, dropping");
                return Ok(DispatchOutcome::Ignored(kind));
            }
            Mapped::Invalid(reason) => {
                error!(event_type = event.kind(), reason = %reason, "Unusable event, skipping");
                return Ok(DispatchOutcome::Malformed(reason));
            }
        };

        // FILTERED
        let settings = self.preferences.get(&draft.user_id).await?;
        let category = draft.notification_type.category();
        if let Some(category) = category {
            if !settings.allows(Channel::InApp, category) {
                debug!(
                    user_id = %draft.user_id,
                    notification_type = %draft.notification_type,
                    "In-app notifications disabled, skipping"
                );
                return Ok(DispatchOutcome::Filtered);
            }
        }

        // PERSISTED
        let key = match event.event_id() {
            Some(id) => format!("event:{id}"),
            None => natural_key(&draft, Utc::now().timestamp() / self.dedup_bucket_secs),
        };
        let notification = Notification::new(draft);
        let store = self.notifications.clone();
        let record = notification.clone();
        let result = self
            .guard
            .process_if_new(&key, move || async move { store.insert(record).await.map(|_| ()) })
            .await?;

        match result {
            ProcessingResult::Success => {}
            ProcessingResult::AlreadyProcessed => {
                debug!(dedup_key = %key, "Duplicate delivery, notification already stored");
                return Ok(DispatchOutcome::Duplicate);
            }
            ProcessingResult::InProgress => {
                return Err(AppError::unavailable(format!(
                    "event {key} is being processed elsewhere"
                )));
            }
            ProcessingResult::Failed(e) => return Err(e),
        }

        info!(
            notification_id = %notification.id,
            user_id = %notification.user_id,
            notification_type = %notification.notification_type,
            "Notification persisted"
        );

        // SENT
        let channels = match category {
            Some(category) => self.fan_out(&notification, &settings, category).await,
            None => Vec::new(),
        };

        Ok(DispatchOutcome::Persisted {
            notification,
            channels,
        })
    }

    /// Best-effort push and email; returns the channels that succeeded
    async fn fan_out(
        &self,
        notification: &Notification,
        settings: &NotificationSettings,
        category: Category,
    ) -> Vec<Channel> {
        let mut targets = Vec::new();
        if settings.allows(Channel::Push, category) {
            if settings.push_target().is_some() {
                targets.push(Channel::Push);
            } else {
                debug!(user_id = %notification.user_id, "No push token, skipping push");
            }
        }
        if settings.allows(Channel::Email, category) {
            targets.push(Channel::Email);
        }

        let sends = targets.into_iter().map(|channel| async move {
            let sent = with_timeout_result(
                self.channel_timeout,
                self.sender.send(&notification.user_id, channel, notification),
            )
            .await
            .map_err(from_timeout);
            (channel, sent)
        });

        let mut delivered = Vec::new();
        for (channel, sent) in join_all(sends).await {
            match sent {
                Ok(()) => delivered.push(channel),
                Err(e) => warn!(
                    notification_id = %notification.id,
                    user_id = %notification.user_id,
                    channel = %channel,
                    error = %e,
                    "Channel send failed"
                ),
            }
        }
        delivered
    }
}

/// Dedup key for events without an id
///
/// Two deliveries of one event inside the same time bucket share a key.
/// Deliveries straddling a bucket boundary do not. The digest covers a
/// length-prefixed encoding of the fields, so keys stay stable across builds
/// and can live in a durable `ProcessedEventStore`.
fn natural_key(draft: &NotificationDraft, bucket: i64) -> String {
    fn field(hasher: &mut Sha256, value: &str) {
        hasher.update((value.len() as u64).to_be_bytes());
        hasher.update(value.as_bytes());
    }

    let mut hasher = Sha256::new();
    field(&mut hasher, &draft.sender_id);
    field(&mut hasher, &draft.user_id);
    field(&mut hasher, &draft.target_id);
    match &draft.metadata {
        None => hasher.update([0u8]),
        Some(metadata) => {
            hasher.update([1u8]);
            for (key, value) in metadata {
                field(&mut hasher, key);
                field(&mut hasher, value);
            }
        }
    }
    hasher.update(bucket.to_be_bytes());
    format!(
        "natural:{}:{}",
        draft.notification_type,
        hex::encode(hasher.finalize())
    )
}
