//! Persistence seams for conversations and messages
//!
//! Implementations must make `insert_unique` atomic on the normalized pair key
//! and both `record_message` and `settle_read` atomic per conversation, so
//! concurrent senders and readers never lose an unread update.

use crate::error::AppResult;
use crate::models::{Conversation, Message, Page, PageRequest, ParticipantPair};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

mod memory;

pub use memory::{InMemoryConversationStore, InMemoryMessageStore};

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn find_by_pair(&self, pair: &ParticipantPair) -> AppResult<Option<Conversation>>;

    /// Insert unless a conversation for the same pair exists (`Conflict`).
    async fn insert_unique(&self, conversation: Conversation) -> AppResult<Conversation>;

    /// `NotFound` if absent
    async fn get(&self, id: Uuid) -> AppResult<Conversation>;

    /// Increment `receiver_id`'s unread count by one and refresh the
    /// last-message snapshot, as one atomic step. Returns the updated record.
    async fn record_message(
        &self,
        id: Uuid,
        receiver_id: &str,
        preview: String,
        at: DateTime<Utc>,
    ) -> AppResult<Conversation>;

    /// Subtract `read` from `user_id`'s unread count as one atomic step.
    ///
    /// `read` is the number of messages a `MessageStore::mark_read_for` call
    /// actually flipped. The count is not floored at zero: a message marked
    /// read before its own `record_message` lands takes the count below zero
    /// until that increment arrives.
    async fn settle_read(&self, id: Uuid, user_id: &str, read: usize) -> AppResult<Conversation>;

    async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<Conversation>>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append(&self, message: Message) -> AppResult<Message>;

    async fn get(&self, id: Uuid) -> AppResult<Message>;

    /// Newest-first page of a conversation's messages
    async fn page(&self, conversation_id: Uuid, request: &PageRequest)
        -> AppResult<Page<Message>>;

    /// Mark every unread message addressed to `reader_id` as read; returns how many changed.
    async fn mark_read_for(
        &self,
        conversation_id: Uuid,
        reader_id: &str,
        at: DateTime<Utc>,
    ) -> AppResult<usize>;

    async fn count(&self, conversation_id: Uuid) -> AppResult<usize>;
}
