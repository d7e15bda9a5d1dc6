#![allow(dead_code)]

use async_trait::async_trait;
use notification_service::error::{AppError, AppResult};
use notification_service::models::{Channel, Notification};
use notification_service::{
    ChannelSender, Dispatcher, InMemoryNotificationStore, InMemoryPreferenceStore,
    NotificationStore,
};
use idempotent_consumer::IdempotencyGuard;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};
use uuid::Uuid;

/// Records every send; channels in `failing` return `Unavailable`
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<(String, Channel, Uuid)>>,
    pub failing: Mutex<HashSet<Channel>>,
    pub delay: Mutex<Option<Duration>>,
}

impl RecordingSender {
    pub fn fail(&self, channel: Channel) {
        self.failing.lock().unwrap().insert(channel);
    }

    pub fn stall_for(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn channels(&self) -> Vec<Channel> {
        self.sent.lock().unwrap().iter().map(|(_, c, _)| *c).collect()
    }
}

#[async_trait]
impl ChannelSender for RecordingSender {
    async fn send(
        &self,
        user_id: &str,
        channel: Channel,
        notification: &Notification,
    ) -> AppResult<()> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(&channel) {
            return Err(AppError::unavailable(format!("{channel} transport down")));
        }
        self.sent
            .lock()
            .unwrap()
            .push((user_id.to_string(), channel, notification.id));
        Ok(())
    }
}

/// Fails the first `failures` inserts with `error`, then delegates
pub struct FlakyStore {
    pub inner: InMemoryNotificationStore,
    failures: AtomicUsize,
    error: AppError,
    pub attempts: AtomicUsize,
}

impl FlakyStore {
    pub fn new(failures: usize, error: AppError) -> Self {
        Self {
            inner: InMemoryNotificationStore::new(),
            failures: AtomicUsize::new(failures),
            error,
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl NotificationStore for FlakyStore {
    async fn insert(&self, notification: Notification) -> AppResult<Notification> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(self.error.clone());
        }
        self.inner.insert(notification).await
    }

    async fn list_for_user(&self, user_id: &str, limit: usize) -> AppResult<Vec<Notification>> {
        self.inner.list_for_user(user_id, limit).await
    }

    async fn mark_read(&self, user_id: &str, id: Uuid) -> AppResult<Notification> {
        self.inner.mark_read(user_id, id).await
    }

    async fn unread_count(&self, user_id: &str) -> AppResult<usize> {
        self.inner.unread_count(user_id).await
    }
}

/// Holds every insert until `open` is called; `entered` fires when one is waiting
pub struct GatedStore {
    pub inner: InMemoryNotificationStore,
    pub entered: Notify,
    gate: Semaphore,
}

impl GatedStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryNotificationStore::new(),
            entered: Notify::new(),
            gate: Semaphore::new(0),
        }
    }

    pub fn open(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }
}

#[async_trait]
impl NotificationStore for GatedStore {
    async fn insert(&self, notification: Notification) -> AppResult<Notification> {
        self.entered.notify_one();
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| AppError::unavailable(e.to_string()))?;
        self.inner.insert(notification).await
    }

    async fn list_for_user(&self, user_id: &str, limit: usize) -> AppResult<Vec<Notification>> {
        self.inner.list_for_user(user_id, limit).await
    }

    async fn mark_read(&self, user_id: &str, id: Uuid) -> AppResult<Notification> {
        self.inner.mark_read(user_id, id).await
    }

    async fn unread_count(&self, user_id: &str) -> AppResult<usize> {
        self.inner.unread_count(user_id).await
    }
}

pub struct Fixture {
    pub preferences: Arc<InMemoryPreferenceStore>,
    pub sender: Arc<RecordingSender>,
    pub dispatcher: Arc<Dispatcher>,
}

pub fn fixture(store: Arc<dyn NotificationStore>) -> Fixture {
    let preferences = Arc::new(InMemoryPreferenceStore::new());
    let sender = Arc::new(RecordingSender::default());
    let dispatcher = Arc::new(Dispatcher::new(
        preferences.clone(),
        store,
        sender.clone(),
        IdempotencyGuard::in_memory(Duration::from_secs(3600)),
        3600,
        Duration::from_millis(50),
    ));
    Fixture {
        preferences,
        sender,
        dispatcher,
    }
}

pub fn post_liked(owner: &str, liker: &str, event_id: Option<Uuid>) -> Vec<u8> {
    let mut value = serde_json::json!({
        "type": "POST_LIKED",
        "postId": "p1",
        "postOwnerId": owner,
        "userId": liker,
        "username": "carol",
    });
    if let Some(id) = event_id {
        value["eventId"] = serde_json::json!(id);
    }
    serde_json::to_vec(&value).unwrap()
}

/// Poll `condition` until true or fail after five seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
