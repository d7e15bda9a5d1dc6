//! Request-facing chat operations
//!
//! Ties identity, media upload, persistence and live delivery together.
//! Every entry point requires an authenticated caller.

use crate::config::ChatConfig;
use crate::directory::{MediaKind, MediaStore};
use crate::error::{AppError, AppResult};
use crate::models::{Conversation, Message, MessageType, Page, PageRequest};
use crate::services::conversation_manager::{ConversationManager, NewMessage};
use crate::websocket::{SessionPayload, SessionRouter};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Identity established by the transport layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

impl AuthenticatedUser {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Attachment {
    pub bytes: Vec<u8>,
    pub kind: MediaKind,
}

#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    pub receiver_id: String,
    pub content: String,
    /// `TEXT`, `IMAGE`, `VIDEO` or `FILE`, any case
    pub message_type: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub message: Message,
    /// Whether a live session of the receiver accepted the message
    pub delivered: bool,
}

pub struct ChatService {
    manager: Arc<ConversationManager>,
    sessions: SessionRouter,
    media: Arc<dyn MediaStore>,
    config: ChatConfig,
}

impl ChatService {
    pub fn new(
        manager: Arc<ConversationManager>,
        sessions: SessionRouter,
        media: Arc<dyn MediaStore>,
        config: ChatConfig,
    ) -> Self {
        Self {
            manager,
            sessions,
            media,
            config,
        }
    }

    pub fn sessions(&self) -> &SessionRouter {
        &self.sessions
    }

    pub fn manager(&self) -> &ConversationManager {
        &self.manager
    }

    pub async fn send_message(
        &self,
        sender: Option<&AuthenticatedUser>,
        request: SendMessageRequest,
    ) -> AppResult<SendOutcome> {
        let sender = sender.ok_or(AppError::Unauthorized)?;
        if sender.user_id == request.receiver_id {
            return Err(AppError::invalid("cannot send a message to yourself"));
        }
        let message_type = MessageType::from_str(&request.message_type)?;

        let media_url = self.upload_attachments(request.attachments).await?;

        let conversation = self
            .manager
            .find_or_create(&sender.user_id, &request.receiver_id)
            .await?;
        let message = self
            .manager
            .append_message(
                conversation.id,
                NewMessage {
                    sender_id: sender.user_id.clone(),
                    receiver_id: request.receiver_id.clone(),
                    content: request.content,
                    message_type,
                    media_url,
                },
            )
            .await?;

        let delivered = self
            .sessions
            .deliver(
                &request.receiver_id,
                SessionPayload::Message {
                    message: message.clone(),
                },
            )
            .await;
        if !delivered {
            debug!(
                receiver_id = %request.receiver_id,
                message_id = %message.id,
                "Receiver offline, message stored only"
            );
        }

        Ok(SendOutcome { message, delivered })
    }

    /// Saves attachments in order and returns the first URL
    ///
    /// A failure part way through leaves already saved objects in place.
    async fn upload_attachments(&self, attachments: Vec<Attachment>) -> AppResult<Option<String>> {
        let mut first = None;
        for (index, attachment) in attachments.into_iter().enumerate() {
            let url = match self.media.save(attachment.bytes, attachment.kind).await {
                Ok(url) => url,
                Err(e) => {
                    warn!(error = %e, index, "Attachment upload failed");
                    return Err(e);
                }
            };
            if first.is_none() {
                first = Some(url);
            }
        }
        Ok(first)
    }

    /// Routes a typing indicator to the other participant
    pub async fn send_typing(
        &self,
        sender: Option<&AuthenticatedUser>,
        conversation_id: Uuid,
    ) -> AppResult<bool> {
        let sender = sender.ok_or(AppError::Unauthorized)?;
        let conversation = self.manager.get_conversation(conversation_id).await?;
        conversation.ensure_participant(&sender.user_id)?;
        let other = conversation
            .other_participant(&sender.user_id)
            .ok_or_else(|| AppError::invalid("conversation has no other participant"))?;

        Ok(self
            .sessions
            .deliver(
                other,
                SessionPayload::Typing {
                    conversation_id,
                    user_id: sender.user_id.clone(),
                },
            )
            .await)
    }

    pub async fn get_messages(
        &self,
        reader: Option<&AuthenticatedUser>,
        conversation_id: Uuid,
        page_token: Option<String>,
        page_size: Option<usize>,
    ) -> AppResult<Page<Message>> {
        let reader = reader.ok_or(AppError::Unauthorized)?;
        let request = PageRequest {
            token: page_token,
            size: self.config.page_size(page_size),
        };
        self.manager
            .get_messages(conversation_id, &reader.user_id, &request)
            .await
    }

    pub async fn list_conversations(
        &self,
        user: Option<&AuthenticatedUser>,
    ) -> AppResult<Vec<Conversation>> {
        let user = user.ok_or(AppError::Unauthorized)?;
        self.manager.list_conversations(&user.user_id).await
    }
}
