use crate::error::{AppError, AppResult};
use crate::models::Notification;
use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

/// Append-only notification records per recipient
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, notification: Notification) -> AppResult<Notification>;

    /// Newest first, at most `limit`
    async fn list_for_user(&self, user_id: &str, limit: usize) -> AppResult<Vec<Notification>>;

    /// `NotFound` when `id` does not belong to `user_id`
    async fn mark_read(&self, user_id: &str, id: Uuid) -> AppResult<Notification>;

    async fn unread_count(&self, user_id: &str) -> AppResult<usize>;
}

#[derive(Default)]
pub struct InMemoryNotificationStore {
    by_user: DashMap<String, Vec<Notification>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total records across all users
    pub fn len(&self) -> usize {
        self.by_user.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn insert(&self, notification: Notification) -> AppResult<Notification> {
        self.by_user
            .entry(notification.user_id.clone())
            .or_default()
            .push(notification.clone());
        Ok(notification)
    }

    async fn list_for_user(&self, user_id: &str, limit: usize) -> AppResult<Vec<Notification>> {
        Ok(self
            .by_user
            .get(user_id)
            .map(|list| list.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn mark_read(&self, user_id: &str, id: Uuid) -> AppResult<Notification> {
        let not_found = || AppError::not_found(format!("notification {id}"));
        let mut list = self.by_user.get_mut(user_id).ok_or_else(not_found)?;
        let notification = list
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(not_found)?;
        notification.is_read = true;
        Ok(notification.clone())
    }

    async fn unread_count(&self, user_id: &str) -> AppResult<usize> {
        Ok(self
            .by_user
            .get(user_id)
            .map_or(0, |list| list.iter().filter(|n| !n.is_read).count()))
    }
}
