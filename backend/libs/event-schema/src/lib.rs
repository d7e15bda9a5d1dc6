/// Event schema shared by event producers (chat, social, identity) and the
/// notification dispatcher.
///
/// Every payload is a JSON object with a `type` discriminator. Unknown
/// discriminators decode to [`DomainEvent::Unknown`] so consumers can
/// acknowledge and drop them instead of failing.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod topics {
    pub const USER_EVENTS: &str = "user-events";
    pub const POST_EVENTS: &str = "post-events";
    pub const MESSAGE_EVENTS: &str = "message-events";

    /// Topics the notification dispatcher subscribes to by default
    pub const ALL: [&str; 3] = [USER_EVENTS, POST_EVENTS, MESSAGE_EVENTS];

    pub const DEAD_LETTER_SUFFIX: &str = ".dlq";

    /// Dead-letter destination for records that exhausted redelivery on `topic`
    pub fn dead_letter(topic: &str) -> String {
        format!("{topic}{DEAD_LETTER_SUFFIX}")
    }

    pub fn is_dead_letter(topic: &str) -> bool {
        topic.ends_with(DEAD_LETTER_SUFFIX)
    }
}

// ============================================================================
// USER EVENTS (user-events)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
    /// Acting user (the follower, the user who registered or logged in)
    pub user_id: String,
    pub username: String,
    /// Followed user; absent for registration and login
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_user_id: Option<String>,
}

// ============================================================================
// POST EVENTS (post-events)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
    pub post_id: String,
    pub post_owner_id: String,
    /// User who liked or commented
    pub user_id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

// ============================================================================
// MESSAGE EVENTS (message-events)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub receiver_id: String,
}

/// Tagged union over every event the platform emits, keyed by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    /// Older user-service builds publish the short `FOLLOW` name
    #[serde(rename = "USER_FOLLOWED", alias = "FOLLOW")]
    UserFollowed(UserEvent),

    #[serde(rename = "REGISTRATION")]
    Registration(UserEvent),

    #[serde(rename = "LOGIN")]
    Login(UserEvent),

    #[serde(rename = "POST_LIKED")]
    PostLiked(PostEvent),

    /// Older post-service builds publish the short `COMMENT` name
    #[serde(rename = "POST_COMMENTED", alias = "COMMENT")]
    PostCommented(PostEvent),

    #[serde(rename = "NEW_MESSAGE")]
    NewMessage(MessageEvent),

    #[serde(other)]
    Unknown,
}

impl DomainEvent {
    /// `NEW_MESSAGE` event stamped with a fresh event id
    pub fn new_message(
        conversation_id: impl Into<String>,
        sender_id: impl Into<String>,
        sender_name: impl Into<String>,
        receiver_id: impl Into<String>,
    ) -> Self {
        DomainEvent::NewMessage(MessageEvent {
            event_id: Some(Uuid::new_v4()),
            conversation_id: conversation_id.into(),
            sender_id: sender_id.into(),
            sender_name: sender_name.into(),
            receiver_id: receiver_id.into(),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::UserFollowed(_) => "USER_FOLLOWED",
            DomainEvent::Registration(_) => "REGISTRATION",
            DomainEvent::Login(_) => "LOGIN",
            DomainEvent::PostLiked(_) => "POST_LIKED",
            DomainEvent::PostCommented(_) => "POST_COMMENTED",
            DomainEvent::NewMessage(_) => "NEW_MESSAGE",
            DomainEvent::Unknown => "UNKNOWN",
        }
    }

    pub fn topic(&self) -> Option<&'static str> {
        match self {
            DomainEvent::UserFollowed(_) | DomainEvent::Registration(_) | DomainEvent::Login(_) => {
                Some(topics::USER_EVENTS)
            }
            DomainEvent::PostLiked(_) | DomainEvent::PostCommented(_) => Some(topics::POST_EVENTS),
            DomainEvent::NewMessage(_) => Some(topics::MESSAGE_EVENTS),
            DomainEvent::Unknown => None,
        }
    }

    /// Recipient user id; keeps one user's events in a single partition
    pub fn partition_key(&self) -> Option<&str> {
        match self {
            DomainEvent::UserFollowed(e) => {
                Some(e.target_user_id.as_deref().unwrap_or(e.user_id.as_str()))
            }
            DomainEvent::Registration(e) | DomainEvent::Login(e) => Some(e.user_id.as_str()),
            DomainEvent::PostLiked(e) | DomainEvent::PostCommented(e) => {
                Some(e.post_owner_id.as_str())
            }
            DomainEvent::NewMessage(e) => Some(e.receiver_id.as_str()),
            DomainEvent::Unknown => None,
        }
    }

    pub fn event_id(&self) -> Option<Uuid> {
        match self {
            DomainEvent::UserFollowed(e) | DomainEvent::Registration(e) | DomainEvent::Login(e) => {
                e.event_id
            }
            DomainEvent::PostLiked(e) | DomainEvent::PostCommented(e) => e.event_id,
            DomainEvent::NewMessage(e) => e.event_id,
            DomainEvent::Unknown => None,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

/// Raw `type` field of a payload, for logging records that fail to decode
pub fn discriminator(payload: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(payload).ok()?;
    value.get("type")?.as_str().map(str::to_string)
}
