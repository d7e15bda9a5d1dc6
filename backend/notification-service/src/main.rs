use anyhow::Context;
use event_bus::{EventBus, KafkaEventBus};
use idempotent_consumer::IdempotencyGuard;
use notification_service::{
    logging, Dispatcher, DispatcherConfig, InMemoryNotificationStore, InMemoryPreferenceStore,
    LoggingChannelSender, NotificationWorker,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = DispatcherConfig::from_env().context("Failed to load NOTIFY_* configuration")?;
    logging::init_tracing(config.json_logs);

    tracing::info!(
        brokers = %config.kafka_brokers,
        group_id = %config.group_id,
        "Starting notification worker"
    );

    let bus: Arc<dyn EventBus> = Arc::new(
        KafkaEventBus::new(&config.kafka_brokers).context("Failed to connect to Kafka")?,
    );

    let guard = IdempotencyGuard::in_memory(config.dedup_ttl());
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(InMemoryPreferenceStore::new()),
        Arc::new(InMemoryNotificationStore::new()),
        Arc::new(LoggingChannelSender),
        guard.clone(),
        config.dedup_bucket_secs(),
        config.channel_timeout(),
    ));

    let worker = NotificationWorker::new(
        bus,
        dispatcher,
        config.group_id.clone(),
        config.topics.clone(),
        config.redelivery(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut cleanup_shutdown = shutdown_rx.clone();
    let cleanup_every = config.dedup_ttl().max(Duration::from_secs(60));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cleanup_every);
        loop {
            tokio::select! {
                _ = cleanup_shutdown.changed() => break,
                _ = ticker.tick() => {
                    if let Err(e) = guard.cleanup_old_events().await {
                        tracing::warn!(error = %e, "Dedup key cleanup failed");
                    }
                }
            }
        }
    });

    let handle = tokio::spawn(async move { worker.run(shutdown_rx).await });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received, draining consumers");
    let _ = shutdown_tx.send(true);

    handle
        .await
        .context("Worker task panicked")?
        .context("Worker failed")?;

    tracing::info!("Notification worker exited");
    Ok(())
}
