use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Two distinct participants, stored in sorted order so (a, b) == (b, a)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantPair(String, String);

impl ParticipantPair {
    pub fn new(a: &str, b: &str) -> AppResult<Self> {
        if a.is_empty() || b.is_empty() {
            return Err(AppError::invalid("participant id must not be empty"));
        }
        if a == b {
            return Err(AppError::invalid("a conversation needs two distinct participants"));
        }
        Ok(if a < b {
            Self(a.to_string(), b.to_string())
        } else {
            Self(b.to_string(), a.to_string())
        })
    }

    /// Normalized key used for the uniqueness constraint
    pub fn key(&self) -> String {
        format!("{}:{}", self.0, self.1)
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.0 == user_id || self.1 == user_id
    }

    /// The participant that is not `user_id`
    pub fn other(&self, user_id: &str) -> Option<&str> {
        if self.0 == user_id {
            Some(self.1.as_str())
        } else if self.1 == user_id {
            Some(self.0.as_str())
        } else {
            None
        }
    }

    pub fn members(&self) -> [&str; 2] {
        [self.0.as_str(), self.1.as_str()]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub participants: ParticipantPair,
    pub last_message_preview: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    /// participant id -> unread count; may dip below zero while a read
    /// settles ahead of the increment for the same message
    pub unread_counts: HashMap<String, i64>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(participants: ParticipantPair) -> Self {
        let unread_counts = participants
            .members()
            .iter()
            .map(|id| (id.to_string(), 0))
            .collect();
        Self {
            id: Uuid::new_v4(),
            participants,
            last_message_preview: None,
            last_message_at: None,
            unread_counts,
            created_at: Utc::now(),
        }
    }

    pub fn unread_for(&self, user_id: &str) -> u32 {
        let count = self.unread_counts.get(user_id).copied().unwrap_or(0);
        u32::try_from(count.max(0)).unwrap_or(u32::MAX)
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participants.contains(user_id)
    }

    pub fn other_participant(&self, user_id: &str) -> Option<&str> {
        self.participants.other(user_id)
    }

    /// Fail with `InvalidArgument` unless `user_id` belongs to this conversation
    pub fn ensure_participant(&self, user_id: &str) -> AppResult<()> {
        if self.is_participant(user_id) {
            Ok(())
        } else {
            Err(AppError::invalid(format!(
                "user {user_id} is not a participant of conversation {}",
                self.id
            )))
        }
    }
}
