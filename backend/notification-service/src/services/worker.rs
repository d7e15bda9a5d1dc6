/// Consumer runtime for the dispatcher
///
/// One loop per topic. Each record is dispatched, then:
/// - success, filtered, duplicate, unknown or malformed: commit
/// - retryable failure with attempts left: back off, then nack for redelivery
/// - anything else: copy to `<topic>.dlq`, then commit
///
/// On shutdown a loop stops pulling, finishes the record in hand and exits.
use super::dispatcher::{DispatchOutcome, Dispatcher};
use crate::error::{AppError, AppResult};
use event_bus::{Delivery, EventBus, Subscription};
use event_schema::topics;
use futures::future::join_all;
use resilience::RetryConfig;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// What happened to one delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Committed,
    Redelivered,
    DeadLettered,
}

#[derive(Clone)]
pub struct NotificationWorker {
    bus: Arc<dyn EventBus>,
    dispatcher: Arc<Dispatcher>,
    group_id: String,
    topics: Vec<String>,
    redelivery: RetryConfig,
}

impl NotificationWorker {
    pub fn new(
        bus: Arc<dyn EventBus>,
        dispatcher: Arc<Dispatcher>,
        group_id: impl Into<String>,
        topics: Vec<String>,
        redelivery: RetryConfig,
    ) -> Self {
        Self {
            bus,
            dispatcher,
            group_id: group_id.into(),
            topics,
            redelivery,
        }
    }

    /// Consume every configured topic until `shutdown` turns true
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> AppResult<()> {
        let mut subscriptions = Vec::with_capacity(self.topics.len());
        for topic in &self.topics {
            let subscription = self.bus.subscribe(topic, &self.group_id).await?;
            subscriptions.push(subscription);
        }
        info!(
            group_id = %self.group_id,
            topics = ?self.topics,
            "Notification worker started"
        );

        let loops = subscriptions.into_iter().map(|subscription| {
            let worker = self.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { worker.consume(subscription, shutdown).await })
        });
        for joined in join_all(loops).await {
            if let Err(e) = joined {
                error!(error = %e, "Consumer loop panicked");
            }
        }

        info!(group_id = %self.group_id, "Notification worker stopped");
        Ok(())
    }

    async fn consume(
        &self,
        mut subscription: Box<dyn Subscription>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let topic = subscription.topic().to_string();
        loop {
            if *shutdown.borrow() {
                break;
            }

            let next = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        // sender dropped
                        break;
                    }
                    continue;
                }
                next = subscription.next() => next,
            };

            match next {
                None => {
                    debug!(topic = %topic, "Subscription closed");
                    break;
                }
                Some(Err(e)) => {
                    warn!(topic = %topic, error = %e, "Failed to fetch record");
                    tokio::time::sleep(self.redelivery.backoff_for(1)).await;
                }
                Some(Ok(delivery)) => {
                    if let Err(e) = self.handle(subscription.as_mut(), &delivery).await {
                        warn!(
                            topic = %topic,
                            partition = delivery.partition,
                            offset = delivery.offset,
                            error = %e,
                            "Failed to settle record"
                        );
                    }
                }
            }
        }
        debug!(topic = %topic, "Consumer loop exited");
    }

    /// Dispatch one delivery and settle it on the subscription
    pub async fn handle(
        &self,
        subscription: &mut dyn Subscription,
        delivery: &Delivery,
    ) -> AppResult<Disposition> {
        let failure = match self.dispatcher.dispatch(&delivery.payload).await {
            Ok(outcome) => {
                if let DispatchOutcome::Persisted { channels, .. } = &outcome {
                    debug!(offset = delivery.offset, ?channels, "Record dispatched");
                }
                subscription.commit(delivery).await?;
                return Ok(Disposition::Committed);
            }
            Err(e) => e,
        };

        if failure.is_retryable() && self.redelivery.should_retry(delivery.attempt) {
            let delay = self.redelivery.delay_for(delivery.attempt);
            warn!(
                topic = %delivery.topic,
                offset = delivery.offset,
                attempt = delivery.attempt,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "Dispatch failed, scheduling redelivery"
            );
            tokio::time::sleep(delay).await;
            subscription.nack(delivery).await?;
            return Ok(Disposition::Redelivered);
        }

        if let Err(e) = self.dead_letter(delivery, &failure).await {
            // keep the record rather than commit past it
            tokio::time::sleep(self.redelivery.max_backoff).await;
            subscription.nack(delivery).await?;
            return Err(e);
        }
        subscription.commit(delivery).await?;
        Ok(Disposition::DeadLettered)
    }

    async fn dead_letter(&self, delivery: &Delivery, failure: &AppError) -> AppResult<()> {
        let destination = topics::dead_letter(&delivery.topic);
        let key = delivery.key.as_deref().unwrap_or_default();
        self.bus
            .publish(&destination, key, &delivery.payload)
            .await?;
        error!(
            topic = %delivery.topic,
            dead_letter_topic = %destination,
            offset = delivery.offset,
            attempt = delivery.attempt,
            error = %failure,
            "Record dead-lettered"
        );
        Ok(())
    }
}
