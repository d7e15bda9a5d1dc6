//! External collaborators: user profiles and media storage

use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// `NotFound` when the user does not exist
    async fn get_by_id(&self, id: &str) -> AppResult<UserProfile>;
}

#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: DashMap<String, UserProfile>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: &str, display_name: &str) {
        self.users.insert(
            id.to_string(),
            UserProfile {
                id: id.to_string(),
                display_name: display_name.to_string(),
                avatar_url: None,
            },
        );
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get_by_id(&self, id: &str) -> AppResult<UserProfile> {
        self.users
            .get(id)
            .map(|u| u.clone())
            .ok_or_else(|| AppError::not_found(format!("user {id}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    fn folder(&self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Video => "videos",
        }
    }
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store `bytes` and return a URL for them
    async fn save(&self, bytes: Vec<u8>, kind: MediaKind) -> AppResult<String>;
}

/// Keeps uploads in memory under `/uploads/{images|videos}/{uuid}`
#[derive(Default)]
pub struct InMemoryMediaStore {
    objects: DashMap<String, Vec<u8>>,
}

impl InMemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<Vec<u8>> {
        self.objects.get(url).map(|b| b.clone())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl MediaStore for InMemoryMediaStore {
    async fn save(&self, bytes: Vec<u8>, kind: MediaKind) -> AppResult<String> {
        if bytes.is_empty() {
            return Err(AppError::invalid("empty upload"));
        }
        let url = format!("/uploads/{}/{}", kind.folder(), Uuid::new_v4());
        self.objects.insert(url.clone(), bytes);
        tracing::debug!(url = %url, "Media saved");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let directory = InMemoryUserDirectory::new();
        directory.insert("alice", "Alice");

        assert_eq!(
            directory.get_by_id("alice").await.unwrap().display_name,
            "Alice"
        );
        let err = directory.get_by_id("mallory").await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_media_urls_are_grouped_by_kind() {
        let store = InMemoryMediaStore::new();
        let url = store.save(vec![1, 2, 3], MediaKind::Video).await.unwrap();
        assert!(url.starts_with("/uploads/videos/"));
        assert_eq!(store.get(&url), Some(vec![1, 2, 3]));
        assert!(store.save(Vec::new(), MediaKind::Image).await.is_err());
    }
}
