use super::{ConversationStore, MessageStore};
use crate::error::{AppError, AppResult};
use crate::models::{Conversation, Message, Page, PageRequest, ParticipantPair};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

/// Conversations keyed by id, with a unique index on the normalized pair key
#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: DashMap<Uuid, Conversation>,
    by_pair: DashMap<String, Uuid>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}

fn conversation_not_found(id: Uuid) -> AppError {
    AppError::not_found(format!("conversation {id}"))
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn find_by_pair(&self, pair: &ParticipantPair) -> AppResult<Option<Conversation>> {
        let id = match self.by_pair.get(&pair.key()) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.conversations.get(&id).map(|c| c.clone()))
    }

    async fn insert_unique(&self, conversation: Conversation) -> AppResult<Conversation> {
        match self.by_pair.entry(conversation.participants.key()) {
            Entry::Occupied(existing) => Err(AppError::Conflict(format!(
                "conversation {} already exists for {}",
                existing.get(),
                existing.key()
            ))),
            Entry::Vacant(slot) => {
                // visible by id before the pair index points at it
                self.conversations
                    .insert(conversation.id, conversation.clone());
                slot.insert(conversation.id);
                Ok(conversation)
            }
        }
    }

    async fn get(&self, id: Uuid) -> AppResult<Conversation> {
        self.conversations
            .get(&id)
            .map(|c| c.clone())
            .ok_or_else(|| conversation_not_found(id))
    }

    async fn record_message(
        &self,
        id: Uuid,
        receiver_id: &str,
        preview: String,
        at: DateTime<Utc>,
    ) -> AppResult<Conversation> {
        let mut conversation = self
            .conversations
            .get_mut(&id)
            .ok_or_else(|| conversation_not_found(id))?;

        *conversation
            .unread_counts
            .entry(receiver_id.to_string())
            .or_insert(0) += 1;

        if conversation.last_message_at.map_or(true, |last| at >= last) {
            conversation.last_message_preview = Some(preview);
            conversation.last_message_at = Some(at);
        }
        Ok(conversation.clone())
    }

    async fn settle_read(
        &self,
        id: Uuid,
        user_id: &str,
        read: usize,
    ) -> AppResult<Conversation> {
        let mut conversation = self
            .conversations
            .get_mut(&id)
            .ok_or_else(|| conversation_not_found(id))?;
        let read = i64::try_from(read).unwrap_or(i64::MAX);
        *conversation
            .unread_counts
            .entry(user_id.to_string())
            .or_insert(0) -= read;
        Ok(conversation.clone())
    }

    async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<Conversation>> {
        Ok(self
            .conversations
            .iter()
            .filter(|c| c.is_participant(user_id))
            .map(|c| c.clone())
            .collect())
    }
}

/// Append-only per-conversation message logs in write order
#[derive(Default)]
pub struct InMemoryMessageStore {
    logs: DashMap<Uuid, Vec<Message>>,
    /// message id -> conversation id
    index: DashMap<Uuid, Uuid>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn parse_offset(token: Option<&str>) -> AppResult<usize> {
    match token {
        None => Ok(0),
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| AppError::invalid(format!("malformed page token: {raw}"))),
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn append(&self, message: Message) -> AppResult<Message> {
        self.index.insert(message.id, message.conversation_id);
        self.logs
            .entry(message.conversation_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn get(&self, id: Uuid) -> AppResult<Message> {
        let not_found = || AppError::not_found(format!("message {id}"));
        let conversation_id = *self.index.get(&id).ok_or_else(not_found)?;
        let log = self.logs.get(&conversation_id).ok_or_else(not_found)?;
        log.iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn page(
        &self,
        conversation_id: Uuid,
        request: &PageRequest,
    ) -> AppResult<Page<Message>> {
        let offset = parse_offset(request.token.as_deref())?;
        let size = request.size.max(1);

        let Some(log) = self.logs.get(&conversation_id) else {
            return Ok(Page {
                items: Vec::new(),
                next_page_token: None,
            });
        };

        let items: Vec<Message> = log.iter().rev().skip(offset).take(size).cloned().collect();
        let next = offset + items.len();
        let next_page_token = (next < log.len()).then(|| next.to_string());

        Ok(Page {
            items,
            next_page_token,
        })
    }

    async fn mark_read_for(
        &self,
        conversation_id: Uuid,
        reader_id: &str,
        at: DateTime<Utc>,
    ) -> AppResult<usize> {
        let Some(mut log) = self.logs.get_mut(&conversation_id) else {
            return Ok(0);
        };
        let mut changed = 0;
        for message in log.iter_mut().filter(|m| m.receiver_id == reader_id) {
            if message.mark_read(at) {
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn count(&self, conversation_id: Uuid) -> AppResult<usize> {
        Ok(self.logs.get(&conversation_id).map_or(0, |log| log.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageType;

    fn message(conversation_id: Uuid, from: &str, to: &str, text: &str) -> Message {
        Message::new(
            conversation_id,
            from,
            to,
            text.to_string(),
            MessageType::Text,
            None,
        )
    }

    #[tokio::test]
    async fn test_insert_unique_conflicts_on_same_pair() {
        let store = InMemoryConversationStore::new();
        let first = Conversation::new(ParticipantPair::new("a", "b").unwrap());
        let second = Conversation::new(ParticipantPair::new("b", "a").unwrap());

        store.insert_unique(first.clone()).await.unwrap();
        let err = store.insert_unique(second).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let found = store
            .find_by_pair(&ParticipantPair::new("b", "a").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, first.id);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_record_message_keeps_latest_snapshot() {
        let store = InMemoryConversationStore::new();
        let conversation = store
            .insert_unique(Conversation::new(ParticipantPair::new("a", "b").unwrap()))
            .await
            .unwrap();

        let later = Utc::now();
        let earlier = later - chrono::Duration::seconds(5);
        store
            .record_message(conversation.id, "b", "second".into(), later)
            .await
            .unwrap();
        let updated = store
            .record_message(conversation.id, "b", "first".into(), earlier)
            .await
            .unwrap();

        assert_eq!(updated.unread_for("b"), 2);
        assert_eq!(updated.last_message_preview.as_deref(), Some("second"));
        assert_eq!(updated.last_message_at, Some(later));
    }

    #[tokio::test]
    async fn test_settle_read_before_increment_balances_out() {
        let store = InMemoryConversationStore::new();
        let conversation = store
            .insert_unique(Conversation::new(ParticipantPair::new("a", "b").unwrap()))
            .await
            .unwrap();

        store
            .record_message(conversation.id, "b", "one".into(), Utc::now())
            .await
            .unwrap();
        // the second message was read before its increment landed
        let early = store.settle_read(conversation.id, "b", 2).await.unwrap();
        assert_eq!(early.unread_for("b"), 0);

        let settled = store
            .record_message(conversation.id, "b", "two".into(), Utc::now())
            .await
            .unwrap();
        assert_eq!(settled.unread_for("b"), 0);

        let next = store
            .record_message(conversation.id, "b", "three".into(), Utc::now())
            .await
            .unwrap();
        assert_eq!(next.unread_for("b"), 1);
    }

    #[tokio::test]
    async fn test_page_is_newest_first_with_token() {
        let store = InMemoryMessageStore::new();
        let conversation_id = Uuid::new_v4();
        for i in 0..5 {
            store
                .append(message(conversation_id, "a", "b", &format!("m{i}")))
                .await
                .unwrap();
        }

        let request = PageRequest {
            token: None,
            size: 2,
        };
        let first = store.page(conversation_id, &request).await.unwrap();
        let contents: Vec<_> = first.items.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m4", "m3"]);
        assert_eq!(first.next_page_token.as_deref(), Some("2"));

        let last = store
            .page(
                conversation_id,
                &PageRequest {
                    token: Some("4".into()),
                    size: 2,
                },
            )
            .await
            .unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].content, "m0");
        assert!(last.next_page_token.is_none());
    }

    #[tokio::test]
    async fn test_malformed_page_token_rejected() {
        let store = InMemoryMessageStore::new();
        let request = PageRequest {
            token: Some("abc".into()),
            size: 10,
        };
        let err = store.page(Uuid::new_v4(), &request).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn test_mark_read_only_touches_reader() {
        let store = InMemoryMessageStore::new();
        let conversation_id = Uuid::new_v4();
        let to_b = store
            .append(message(conversation_id, "a", "b", "for b"))
            .await
            .unwrap();
        let to_a = store
            .append(message(conversation_id, "b", "a", "for a"))
            .await
            .unwrap();

        let changed = store
            .mark_read_for(conversation_id, "b", Utc::now())
            .await
            .unwrap();
        assert_eq!(changed, 1);
        assert!(store.get(to_b.id).await.unwrap().is_read);
        assert!(!store.get(to_a.id).await.unwrap().is_read);

        let again = store
            .mark_read_for(conversation_id, "b", Utc::now())
            .await
            .unwrap();
        assert_eq!(again, 0);
    }
}
