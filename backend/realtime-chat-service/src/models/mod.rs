pub mod conversation;
pub mod message;

pub use conversation::{Conversation, ParticipantPair};
pub use message::{preview_for, truncate_message_preview, Message, MessageType};

/// Page request for newest-first listings. `token` is opaque to callers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub token: Option<String>,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}
