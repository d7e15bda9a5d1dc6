use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Notification type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    /// User started following
    Follow,
    /// User liked a post
    LikePost,
    /// User commented on a post
    Comment,
    /// Direct message received
    Message,
    Registration,
    Login,
    PictureUpload,
    /// User mentioned in a post/comment
    Mention,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Follow => "FOLLOW",
            NotificationType::LikePost => "LIKE_POST",
            NotificationType::Comment => "COMMENT",
            NotificationType::Message => "MESSAGE",
            NotificationType::Registration => "REGISTRATION",
            NotificationType::Login => "LOGIN",
            NotificationType::PictureUpload => "PICTURE_UPLOAD",
            NotificationType::Mention => "MENTION",
        }
    }

    /// Preference category, `None` for account notices that ignore preferences
    pub fn category(&self) -> Option<Category> {
        match self {
            NotificationType::Follow => Some(Category::Follow),
            NotificationType::LikePost => Some(Category::Like),
            NotificationType::Comment => Some(Category::Comment),
            NotificationType::Message => Some(Category::Message),
            NotificationType::Mention => Some(Category::Mention),
            NotificationType::Registration
            | NotificationType::Login
            | NotificationType::PictureUpload => None,
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event categories a user can toggle per channel
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Follow,
    Comment,
    Like,
    Mention,
    Message,
}

/// Delivery medium
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    InApp,
    Push,
    Email,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::InApp => "in_app",
            Channel::Push => "push",
            Channel::Email => "email",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core notification model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,

    /// Recipient user ID
    pub user_id: String,

    pub sender_id: String,

    #[serde(rename = "type")]
    pub notification_type: NotificationType,

    pub title: String,

    pub message: String,

    /// Entity the notification points to (post, conversation, user)
    pub target_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,

    pub created_at: DateTime<Utc>,

    pub is_read: bool,
}

impl Notification {
    pub fn new(draft: NotificationDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: draft.user_id,
            sender_id: draft.sender_id,
            notification_type: draft.notification_type,
            title: draft.title,
            message: draft.message,
            target_id: draft.target_id,
            metadata: draft.metadata,
            created_at: Utc::now(),
            is_read: false,
        }
    }
}

/// Notification content before it gets an id and timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub user_id: String,
    pub sender_id: String,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub target_id: String,
    pub metadata: Option<BTreeMap<String, String>>,
}

fn enabled() -> bool {
    true
}

/// Per-user channel x category matrix plus the push token
///
/// Missing fields deserialize as enabled; a user without a record gets
/// [`NotificationSettings::default`], which enables everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    #[serde(default = "enabled")]
    pub email_on_follow: bool,
    #[serde(default = "enabled")]
    pub email_on_comment: bool,
    #[serde(default = "enabled")]
    pub email_on_like: bool,
    #[serde(default = "enabled")]
    pub email_on_mention: bool,
    #[serde(default = "enabled")]
    pub email_on_message: bool,

    #[serde(default = "enabled")]
    pub push_on_follow: bool,
    #[serde(default = "enabled")]
    pub push_on_comment: bool,
    #[serde(default = "enabled")]
    pub push_on_like: bool,
    #[serde(default = "enabled")]
    pub push_on_mention: bool,
    #[serde(default = "enabled")]
    pub push_on_message: bool,

    #[serde(default = "enabled")]
    pub in_app_on_follow: bool,
    #[serde(default = "enabled")]
    pub in_app_on_comment: bool,
    #[serde(default = "enabled")]
    pub in_app_on_like: bool,
    #[serde(default = "enabled")]
    pub in_app_on_mention: bool,
    #[serde(default = "enabled")]
    pub in_app_on_message: bool,

    /// Device token for push delivery
    #[serde(default, alias = "fcmToken", skip_serializing_if = "Option::is_none")]
    pub push_token: Option<String>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            email_on_follow: true,
            email_on_comment: true,
            email_on_like: true,
            email_on_mention: true,
            email_on_message: true,
            push_on_follow: true,
            push_on_comment: true,
            push_on_like: true,
            push_on_mention: true,
            push_on_message: true,
            in_app_on_follow: true,
            in_app_on_comment: true,
            in_app_on_like: true,
            in_app_on_mention: true,
            in_app_on_message: true,
            push_token: None,
        }
    }
}

impl NotificationSettings {
    pub fn allows(&self, channel: Channel, category: Category) -> bool {
        match (channel, category) {
            (Channel::Email, Category::Follow) => self.email_on_follow,
            (Channel::Email, Category::Comment) => self.email_on_comment,
            (Channel::Email, Category::Like) => self.email_on_like,
            (Channel::Email, Category::Mention) => self.email_on_mention,
            (Channel::Email, Category::Message) => self.email_on_message,
            (Channel::Push, Category::Follow) => self.push_on_follow,
            (Channel::Push, Category::Comment) => self.push_on_comment,
            (Channel::Push, Category::Like) => self.push_on_like,
            (Channel::Push, Category::Mention) => self.push_on_mention,
            (Channel::Push, Category::Message) => self.push_on_message,
            (Channel::InApp, Category::Follow) => self.in_app_on_follow,
            (Channel::InApp, Category::Comment) => self.in_app_on_comment,
            (Channel::InApp, Category::Like) => self.in_app_on_like,
            (Channel::InApp, Category::Mention) => self.in_app_on_mention,
            (Channel::InApp, Category::Message) => self.in_app_on_message,
        }
    }

    /// Builder-style toggle, mostly for tests and admin tooling
    pub fn with(mut self, channel: Channel, category: Category, on: bool) -> Self {
        let slot = match (channel, category) {
            (Channel::Email, Category::Follow) => &mut self.email_on_follow,
            (Channel::Email, Category::Comment) => &mut self.email_on_comment,
            (Channel::Email, Category::Like) => &mut self.email_on_like,
            (Channel::Email, Category::Mention) => &mut self.email_on_mention,
            (Channel::Email, Category::Message) => &mut self.email_on_message,
            (Channel::Push, Category::Follow) => &mut self.push_on_follow,
            (Channel::Push, Category::Comment) => &mut self.push_on_comment,
            (Channel::Push, Category::Like) => &mut self.push_on_like,
            (Channel::Push, Category::Mention) => &mut self.push_on_mention,
            (Channel::Push, Category::Message) => &mut self.push_on_message,
            (Channel::InApp, Category::Follow) => &mut self.in_app_on_follow,
            (Channel::InApp, Category::Comment) => &mut self.in_app_on_comment,
            (Channel::InApp, Category::Like) => &mut self.in_app_on_like,
            (Channel::InApp, Category::Mention) => &mut self.in_app_on_mention,
            (Channel::InApp, Category::Message) => &mut self.in_app_on_message,
        };
        *slot = on;
        self
    }

    pub fn with_push_token(mut self, token: impl Into<String>) -> Self {
        self.push_token = Some(token.into());
        self
    }

    /// Push token if present and non-blank
    pub fn push_target(&self) -> Option<&str> {
        self.push_token.as_deref().filter(|t| !t.trim().is_empty())
    }
}

impl std::str::FromStr for NotificationType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FOLLOW" => Ok(NotificationType::Follow),
            "LIKE_POST" => Ok(NotificationType::LikePost),
            "COMMENT" => Ok(NotificationType::Comment),
            "MESSAGE" => Ok(NotificationType::Message),
            "REGISTRATION" => Ok(NotificationType::Registration),
            "LOGIN" => Ok(NotificationType::Login),
            "PICTURE_UPLOAD" => Ok(NotificationType::PictureUpload),
            "MENTION" => Ok(NotificationType::Mention),
            other => Err(AppError::invalid(format!("unknown notification type: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default_all_enabled() {
        let settings = NotificationSettings::default();
        for channel in [Channel::InApp, Channel::Push, Channel::Email] {
            for category in [
                Category::Follow,
                Category::Comment,
                Category::Like,
                Category::Mention,
                Category::Message,
            ] {
                assert!(settings.allows(channel, category));
            }
        }
        assert!(settings.push_target().is_none());
    }

    #[test]
    fn test_partial_record_defaults_missing_toggles() {
        let settings: NotificationSettings =
            serde_json::from_str(r#"{"inAppOnLike":false,"fcmToken":"tok"}"#).unwrap();
        assert!(!settings.allows(Channel::InApp, Category::Like));
        assert!(settings.allows(Channel::Push, Category::Like));
        assert_eq!(settings.push_target(), Some("tok"));
    }

    #[test]
    fn test_toggle_touches_one_cell() {
        let settings =
            NotificationSettings::default().with(Channel::Email, Category::Comment, false);
        assert!(!settings.allows(Channel::Email, Category::Comment));
        assert!(settings.allows(Channel::Email, Category::Like));
        assert!(settings.allows(Channel::Push, Category::Comment));
    }

    #[test]
    fn test_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&NotificationType::LikePost).unwrap(),
            "\"LIKE_POST\""
        );
        assert_eq!(
            "picture_upload".parse::<NotificationType>().unwrap(),
            NotificationType::PictureUpload
        );
        assert!(NotificationType::Login.category().is_none());
        assert_eq!(NotificationType::Comment.category(), Some(Category::Comment));
    }
}
