use async_trait::async_trait;
use chrono::{DateTime, Utc};
use event_bus::{EventBus, InMemoryEventBus};
use futures::future::join_all;
use realtime_chat_service::directory::InMemoryUserDirectory;
use realtime_chat_service::models::{
    Conversation, Message, MessageType, Page, PageRequest, ParticipantPair,
};
use realtime_chat_service::services::{ConversationManager, MessageEventPublisher, NewMessage};
use realtime_chat_service::store::{
    ConversationStore, InMemoryConversationStore, InMemoryMessageStore, MessageStore,
};
use realtime_chat_service::AppResult;
use resilience::RetryConfig;
use std::sync::Arc;
use uuid::Uuid;

/// Suspends before every call so store writes interleave like real I/O
#[derive(Default)]
struct YieldingConversations(InMemoryConversationStore);

#[async_trait]
impl ConversationStore for YieldingConversations {
    async fn find_by_pair(&self, pair: &ParticipantPair) -> AppResult<Option<Conversation>> {
        tokio::task::yield_now().await;
        self.0.find_by_pair(pair).await
    }

    async fn insert_unique(&self, conversation: Conversation) -> AppResult<Conversation> {
        tokio::task::yield_now().await;
        self.0.insert_unique(conversation).await
    }

    async fn get(&self, id: Uuid) -> AppResult<Conversation> {
        tokio::task::yield_now().await;
        self.0.get(id).await
    }

    async fn record_message(
        &self,
        id: Uuid,
        receiver_id: &str,
        preview: String,
        at: DateTime<Utc>,
    ) -> AppResult<Conversation> {
        tokio::task::yield_now().await;
        self.0.record_message(id, receiver_id, preview, at).await
    }

    async fn settle_read(
        &self,
        id: Uuid,
        user_id: &str,
        read: usize,
    ) -> AppResult<Conversation> {
        tokio::task::yield_now().await;
        self.0.settle_read(id, user_id, read).await
    }

    async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<Conversation>> {
        tokio::task::yield_now().await;
        self.0.list_for_user(user_id).await
    }
}

#[derive(Default)]
struct YieldingMessages(InMemoryMessageStore);

#[async_trait]
impl MessageStore for YieldingMessages {
    async fn append(&self, message: Message) -> AppResult<Message> {
        tokio::task::yield_now().await;
        self.0.append(message).await
    }

    async fn get(&self, id: Uuid) -> AppResult<Message> {
        tokio::task::yield_now().await;
        self.0.get(id).await
    }

    async fn page(&self, conversation_id: Uuid, request: &PageRequest) -> AppResult<Page<Message>> {
        tokio::task::yield_now().await;
        self.0.page(conversation_id, request).await
    }

    async fn mark_read_for(
        &self,
        conversation_id: Uuid,
        reader_id: &str,
        at: DateTime<Utc>,
    ) -> AppResult<usize> {
        tokio::task::yield_now().await;
        self.0.mark_read_for(conversation_id, reader_id, at).await
    }

    async fn count(&self, conversation_id: Uuid) -> AppResult<usize> {
        tokio::task::yield_now().await;
        self.0.count(conversation_id).await
    }
}

fn manager(messages: Arc<YieldingMessages>) -> Arc<ConversationManager> {
    let directory = Arc::new(InMemoryUserDirectory::new());
    directory.insert("alice", "Alice");
    directory.insert("bob", "Bob");
    let events = MessageEventPublisher::new(
        Arc::new(InMemoryEventBus::new()) as Arc<dyn EventBus>,
        RetryConfig::default(),
    );
    Arc::new(ConversationManager::new(
        Arc::new(YieldingConversations::default()),
        messages,
        directory,
        events,
        3,
    ))
}

fn to_bob(i: usize) -> NewMessage {
    NewMessage {
        sender_id: "alice".into(),
        receiver_id: "bob".into(),
        content: format!("m{i}"),
        message_type: MessageType::Text,
        media_url: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unread_count_matches_unread_messages_under_interleaving() {
    let all = PageRequest {
        token: None,
        size: 10_000,
    };

    for round in 0..100 {
        let messages = Arc::new(YieldingMessages::default());
        let manager = manager(messages.clone());
        let conversation = manager.find_or_create("alice", "bob").await.unwrap();
        let id = conversation.id;

        let appends = (0..15).map(|i| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.append_message(id, to_bob(i)).await.map(|_| ()) })
        });
        let fetches = (0..5).map(|_| {
            let manager = manager.clone();
            let request = PageRequest {
                token: None,
                size: 20,
            };
            tokio::spawn(async move { manager.get_messages(id, "bob", &request).await.map(|_| ()) })
        });
        for result in join_all(appends.chain(fetches)).await {
            result.unwrap().unwrap();
        }

        let unread = messages
            .0
            .page(id, &all)
            .await
            .unwrap()
            .items
            .iter()
            .filter(|m| m.receiver_id == "bob" && !m.is_read)
            .count();
        let counted = manager.get_conversation(id).await.unwrap().unread_for("bob");
        assert_eq!(counted as usize, unread, "round {round}");
    }
}

#[tokio::test]
async fn test_fetch_after_appends_settles_to_zero() {
    let messages = Arc::new(YieldingMessages::default());
    let manager = manager(messages);
    let id = manager.find_or_create("alice", "bob").await.unwrap().id;

    for i in 0..3 {
        manager.append_message(id, to_bob(i)).await.unwrap();
    }
    let request = PageRequest {
        token: None,
        size: 1,
    };
    // a short page still marks everything addressed to the reader
    manager.get_messages(id, "bob", &request).await.unwrap();
    manager.get_messages(id, "bob", &request).await.unwrap();

    let conversation = manager.get_conversation(id).await.unwrap();
    assert_eq!(conversation.unread_for("bob"), 0);
}
