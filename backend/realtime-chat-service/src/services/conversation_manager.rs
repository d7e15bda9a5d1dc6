use crate::directory::UserDirectory;
use crate::error::{AppError, AppResult};
use crate::models::{Conversation, Message, MessageType, Page, PageRequest, ParticipantPair};
use crate::services::message_events::MessageEventPublisher;
use crate::store::{ConversationStore, MessageStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Content of a message to append
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub message_type: MessageType,
    pub media_url: Option<String>,
}

/// Sole mutator of conversations and messages
pub struct ConversationManager {
    conversations: Arc<dyn ConversationStore>,
    messages: Arc<dyn MessageStore>,
    directory: Arc<dyn UserDirectory>,
    events: MessageEventPublisher,
    create_retries: u32,
}

impl ConversationManager {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        messages: Arc<dyn MessageStore>,
        directory: Arc<dyn UserDirectory>,
        events: MessageEventPublisher,
        create_retries: u32,
    ) -> Self {
        Self {
            conversations,
            messages,
            directory,
            events,
            create_retries,
        }
    }

    /// Conversation for the unordered pair (a, b), created on first contact
    ///
    /// Two first messages racing from both directions both end up with the
    /// same conversation: the loser of `insert_unique` sees `Conflict` and
    /// re-reads.
    pub async fn find_or_create(&self, user_a: &str, user_b: &str) -> AppResult<Conversation> {
        let pair = ParticipantPair::new(user_a, user_b)?;

        for attempt in 0..=self.create_retries {
            if let Some(existing) = self.conversations.find_by_pair(&pair).await? {
                return Ok(existing);
            }

            match self
                .conversations
                .insert_unique(Conversation::new(pair.clone()))
                .await
            {
                Ok(created) => {
                    info!(
                        conversation_id = %created.id,
                        pair = %pair.key(),
                        "Conversation created"
                    );
                    return Ok(created);
                }
                Err(AppError::Conflict(_)) => {
                    debug!(pair = %pair.key(), attempt, "Lost creation race, re-reading");
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::Conflict(format!(
            "could not settle conversation for {}",
            pair.key()
        )))
    }

    pub async fn get_conversation(&self, id: Uuid) -> AppResult<Conversation> {
        self.conversations.get(id).await
    }

    /// Persist a message, bump the receiver's unread count, then publish
    /// `NEW_MESSAGE`. A failed publish does not undo the stored message.
    pub async fn append_message(
        &self,
        conversation_id: Uuid,
        new: NewMessage,
    ) -> AppResult<Message> {
        if new.sender_id == new.receiver_id {
            return Err(AppError::invalid("sender and receiver must differ"));
        }

        let conversation = self.conversations.get(conversation_id).await?;
        conversation.ensure_participant(&new.sender_id)?;
        conversation.ensure_participant(&new.receiver_id)?;

        // a sender that cannot be attributed is a hard failure
        let sender = self.directory.get_by_id(&new.sender_id).await?;

        let message = Message::new(
            conversation_id,
            &new.sender_id,
            &new.receiver_id,
            new.content,
            new.message_type,
            new.media_url,
        );
        let stored = self.messages.append(message).await?;
        self.conversations
            .record_message(
                conversation_id,
                &stored.receiver_id,
                stored.preview(),
                stored.created_at,
            )
            .await?;

        debug!(
            message_id = %stored.id,
            conversation_id = %conversation_id,
            sender_id = %stored.sender_id,
            "Message stored"
        );

        self.events
            .publish_new_message(&stored, &sender.display_name)
            .await;

        Ok(stored)
    }

    /// Newest-first page; fetching marks the reader's messages read
    ///
    /// The page reflects read state from before the fetch. Afterwards every
    /// message stored so far addressed to `reader_id` is read and the
    /// reader's unread count drops by exactly that many. Messages to the other
    /// participant are left alone.
    pub async fn get_messages(
        &self,
        conversation_id: Uuid,
        reader_id: &str,
        request: &PageRequest,
    ) -> AppResult<Page<Message>> {
        let conversation = self.conversations.get(conversation_id).await?;
        conversation.ensure_participant(reader_id)?;

        let page = self.messages.page(conversation_id, request).await?;
        self.mark_read(conversation_id, reader_id).await?;
        Ok(page)
    }

    async fn mark_read(&self, conversation_id: Uuid, reader_id: &str) -> AppResult<()> {
        let changed = self
            .messages
            .mark_read_for(conversation_id, reader_id, Utc::now())
            .await?;
        if changed == 0 {
            return Ok(());
        }

        // subtract what was flipped; an append racing this fetch keeps its increment
        self.conversations
            .settle_read(conversation_id, reader_id, changed)
            .await?;

        debug!(
            conversation_id = %conversation_id,
            reader_id = %reader_id,
            changed,
            "Messages marked read"
        );
        Ok(())
    }

    /// Conversations of `user_id`, most recent activity first
    pub async fn list_conversations(&self, user_id: &str) -> AppResult<Vec<Conversation>> {
        let mut conversations = self.conversations.list_for_user(user_id).await?;
        conversations.sort_by(|a, b| {
            b.last_message_at
                .unwrap_or(b.created_at)
                .cmp(&a.last_message_at.unwrap_or(a.created_at))
        });
        Ok(conversations)
    }

    pub async fn message_count(&self, conversation_id: Uuid) -> AppResult<usize> {
        self.messages.count(conversation_id).await
    }
}
