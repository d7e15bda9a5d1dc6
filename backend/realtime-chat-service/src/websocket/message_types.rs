use crate::models::Message;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payloads pushed to a live session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionPayload {
    /// A stored chat message
    #[serde(rename = "MESSAGE")]
    Message { message: Message },

    /// Ephemeral typing indicator; never persisted
    #[serde(rename = "TYPING")]
    Typing {
        #[serde(rename = "conversationId")]
        conversation_id: Uuid,
        #[serde(rename = "userId")]
        user_id: String,
    },
}

impl SessionPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionPayload::Message { .. } => "MESSAGE",
            SessionPayload::Typing { .. } => "TYPING",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typing_wire_format() {
        let conversation_id = Uuid::new_v4();
        let payload = SessionPayload::Typing {
            conversation_id,
            user_id: "alice".into(),
        };
        let value: serde_json::Value = serde_json::from_str(&payload.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "TYPING");
        assert_eq!(value["userId"], "alice");
        assert_eq!(value["conversationId"], conversation_id.to_string());
    }

    #[test]
    fn test_message_payload_parses_back() {
        let raw = r#"{"type":"TYPING","conversationId":"6f1c2a1e-8d1b-4c55-9b7a-0e6c1f2d3a4b","userId":"bob"}"#;
        let payload = SessionPayload::from_json(raw).unwrap();
        assert_eq!(payload.kind(), "TYPING");
    }
}
