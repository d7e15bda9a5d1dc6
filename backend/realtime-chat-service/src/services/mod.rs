pub mod chat_service;
pub mod conversation_manager;
pub mod message_events;

pub use chat_service::{Attachment, AuthenticatedUser, ChatService, SendMessageRequest, SendOutcome};
pub use conversation_manager::{ConversationManager, NewMessage};
pub use message_events::MessageEventPublisher;
