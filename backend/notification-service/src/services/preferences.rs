/// Per-user notification settings
///
/// Read/replace only: `set` swaps the whole record. Merging partial updates
/// belongs to whoever calls it.
use crate::error::AppResult;
use crate::models::NotificationSettings;
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Stored settings, or all-enabled defaults when the user has none
    async fn get(&self, user_id: &str) -> AppResult<NotificationSettings>;

    async fn set(&self, user_id: &str, settings: NotificationSettings) -> AppResult<()>;
}

#[derive(Default)]
pub struct InMemoryPreferenceStore {
    settings: DashMap<String, NotificationSettings>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for InMemoryPreferenceStore {
    async fn get(&self, user_id: &str) -> AppResult<NotificationSettings> {
        Ok(self
            .settings
            .get(user_id)
            .map(|s| s.clone())
            .unwrap_or_default())
    }

    async fn set(&self, user_id: &str, settings: NotificationSettings) -> AppResult<()> {
        self.settings.insert(user_id.to_string(), settings);
        debug!(user_id = %user_id, "Notification settings replaced");
        Ok(())
    }
}
