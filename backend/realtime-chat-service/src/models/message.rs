use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Previews longer than this are cut with an ellipsis
pub const PREVIEW_MAX_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Text,
    Image,
    Video,
    File,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "TEXT",
            MessageType::Image => "IMAGE",
            MessageType::Video => "VIDEO",
            MessageType::File => "FILE",
        }
    }

    /// Preview shown for media messages without text
    fn placeholder(&self) -> Option<&'static str> {
        match self {
            MessageType::Text => None,
            MessageType::Image => Some("[image]"),
            MessageType::Video => Some("[video]"),
            MessageType::File => Some("[file]"),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "TEXT" => Ok(MessageType::Text),
            "IMAGE" => Ok(MessageType::Image),
            "VIDEO" => Ok(MessageType::Video),
            "FILE" => Ok(MessageType::File),
            other => Err(AppError::invalid(format!("unknown message type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub media_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(
        conversation_id: Uuid,
        sender_id: &str,
        receiver_id: &str,
        content: String,
        message_type: MessageType,
        media_url: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            content,
            message_type,
            media_url,
            created_at: Utc::now(),
            is_read: false,
            read_at: None,
        }
    }

    /// Unread -> read. Returns false if already read; never reverses.
    pub fn mark_read(&mut self, at: DateTime<Utc>) -> bool {
        if self.is_read {
            return false;
        }
        self.is_read = true;
        self.read_at = Some(at);
        true
    }

    pub fn preview(&self) -> String {
        preview_for(&self.content, self.message_type)
    }
}

pub fn preview_for(content: &str, message_type: MessageType) -> String {
    if content.trim().is_empty() {
        if let Some(placeholder) = message_type.placeholder() {
            return placeholder.to_string();
        }
    }
    truncate_message_preview(content, PREVIEW_MAX_CHARS)
}

/// Truncate on a char boundary, appending "..." when cut
pub fn truncate_message_preview(message: &str, max_len: usize) -> String {
    if message.chars().count() <= max_len {
        message.to_string()
    } else {
        let truncated: String = message.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_parsing() {
        assert_eq!("image".parse::<MessageType>().unwrap(), MessageType::Image);
        assert_eq!("TEXT".parse::<MessageType>().unwrap(), MessageType::Text);
        let err = "STICKER".parse::<MessageType>().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
    }

    #[test]
    fn test_preview_truncates_to_limit() {
        let long = "é".repeat(150);
        let preview = preview_for(&long, MessageType::Text);
        assert_eq!(preview.chars().count(), PREVIEW_MAX_CHARS);
        assert!(preview.ends_with("..."));
        assert_eq!(preview_for("hi", MessageType::Text), "hi");
    }

    #[test]
    fn test_media_without_text_uses_placeholder() {
        assert_eq!(preview_for("", MessageType::Image), "[image]");
        assert_eq!(preview_for("  ", MessageType::Video), "[video]");
        assert_eq!(preview_for("look", MessageType::File), "look");
    }

    #[test]
    fn test_mark_read_is_monotonic() {
        let mut message = Message::new(
            Uuid::new_v4(),
            "alice",
            "bob",
            "hi".into(),
            MessageType::Text,
            None,
        );
        let first = Utc::now();
        assert!(message.mark_read(first));
        assert!(!message.mark_read(Utc::now()));
        assert_eq!(message.read_at, Some(first));
    }

    #[test]
    fn test_wire_format_uses_type_field() {
        let message = Message::new(
            Uuid::new_v4(),
            "alice",
            "bob",
            "hi".into(),
            MessageType::Text,
            None,
        );
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "TEXT");
        assert_eq!(value["senderId"], "alice");
        assert_eq!(value["isRead"], false);
    }
}
