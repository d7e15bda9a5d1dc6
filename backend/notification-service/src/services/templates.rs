use crate::models::{NotificationDraft, NotificationType};
use event_schema::{DomainEvent, MessageEvent, PostEvent, UserEvent};
use std::collections::BTreeMap;

/// Result of matching an event against the notification templates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mapped {
    Draft(NotificationDraft),
    /// Discriminator with no template; acknowledged and dropped
    Unknown,
    /// Known discriminator with unusable fields
    Invalid(String),
}

pub fn map_event(event: &DomainEvent) -> Mapped {
    match event {
        DomainEvent::UserFollowed(e) => follow(e),
        DomainEvent::Registration(e) => account_notice(e, NotificationType::Registration),
        DomainEvent::Login(e) => account_notice(e, NotificationType::Login),
        DomainEvent::PostLiked(e) => like(e),
        DomainEvent::PostCommented(e) => comment(e),
        DomainEvent::NewMessage(e) => message(e),
        DomainEvent::Unknown => Mapped::Unknown,
    }
}

fn follow(e: &UserEvent) -> Mapped {
    let Some(target) = e.target_user_id.as_deref().filter(|t| !t.is_empty()) else {
        return Mapped::Invalid("USER_FOLLOWED without targetUserId".into());
    };
    Mapped::Draft(NotificationDraft {
        user_id: target.to_string(),
        sender_id: e.user_id.clone(),
        notification_type: NotificationType::Follow,
        title: "New Follower".into(),
        message: format!("{} started following you", e.username),
        target_id: e.user_id.clone(),
        metadata: None,
    })
}

/// Registration and login notices go to the acting user
fn account_notice(e: &UserEvent, notification_type: NotificationType) -> Mapped {
    let (title, message) = match notification_type {
        NotificationType::Registration => (
            "Welcome",
            format!("Welcome, {}! Your account is ready", e.username),
        ),
        _ => (
            "New login",
            format!("A new login to {}'s account was detected", e.username),
        ),
    };
    Mapped::Draft(NotificationDraft {
        user_id: e.user_id.clone(),
        sender_id: e.user_id.clone(),
        notification_type,
        title: title.into(),
        message,
        target_id: e.user_id.clone(),
        metadata: None,
    })
}

fn like(e: &PostEvent) -> Mapped {
    Mapped::Draft(NotificationDraft {
        user_id: e.post_owner_id.clone(),
        sender_id: e.user_id.clone(),
        notification_type: NotificationType::LikePost,
        title: "New Like".into(),
        message: format!("{} liked your post", e.username),
        target_id: e.post_id.clone(),
        metadata: None,
    })
}

fn comment(e: &PostEvent) -> Mapped {
    let metadata = e
        .comment
        .as_ref()
        .map(|text| BTreeMap::from([("comment".to_string(), text.clone())]));
    Mapped::Draft(NotificationDraft {
        user_id: e.post_owner_id.clone(),
        sender_id: e.user_id.clone(),
        notification_type: NotificationType::Comment,
        title: "New Comment".into(),
        message: format!("{} commented on your post", e.username),
        target_id: e.post_id.clone(),
        metadata,
    })
}

fn message(e: &MessageEvent) -> Mapped {
    Mapped::Draft(NotificationDraft {
        user_id: e.receiver_id.clone(),
        sender_id: e.sender_id.clone(),
        notification_type: NotificationType::Message,
        title: "New Message".into(),
        message: format!("{} sent you a message", e.sender_name),
        target_id: e.conversation_id.clone(),
        metadata: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(json: &str) -> DomainEvent {
        DomainEvent::decode(json.as_bytes()).unwrap()
    }

    #[test]
    fn test_comment_template() {
        let event = decode(
            r#"{"type":"POST_COMMENTED","postId":"p1","postOwnerId":"u1","userId":"u2","username":"carol","comment":"nice!"}"#,
        );
        let Mapped::Draft(draft) = map_event(&event) else {
            panic!("expected a draft");
        };
        assert_eq!(draft.user_id, "u1");
        assert_eq!(draft.sender_id, "u2");
        assert_eq!(draft.notification_type, NotificationType::Comment);
        assert_eq!(draft.target_id, "p1");
        assert_eq!(draft.message, "carol commented on your post");
        assert_eq!(
            draft.metadata.unwrap().get("comment").map(String::as_str),
            Some("nice!")
        );
    }

    #[test]
    fn test_follow_alias_and_target() {
        let event = decode(r#"{"type":"FOLLOW","userId":"u2","username":"dave","targetUserId":"u1"}"#);
        let Mapped::Draft(draft) = map_event(&event) else {
            panic!("expected a draft");
        };
        assert_eq!(draft.user_id, "u1");
        assert_eq!(draft.target_id, "u2");
        assert_eq!(draft.title, "New Follower");
        assert_eq!(draft.message, "dave started following you");
    }

    #[test]
    fn test_follow_without_target_is_invalid() {
        let event = decode(r#"{"type":"USER_FOLLOWED","userId":"u2","username":"dave"}"#);
        assert!(matches!(map_event(&event), Mapped::Invalid(_)));
    }

    #[test]
    fn test_message_template_targets_conversation() {
        let event = DomainEvent::new_message("c1", "alice", "Alice", "bob");
        let Mapped::Draft(draft) = map_event(&event) else {
            panic!("expected a draft");
        };
        assert_eq!(draft.user_id, "bob");
        assert_eq!(draft.target_id, "c1");
        assert_eq!(draft.message, "Alice sent you a message");
    }

    #[test]
    fn test_unknown_discriminator() {
        let event = decode(r#"{"type":"POST_SHARED","postId":"p1"}"#);
        assert_eq!(map_event(&event), Mapped::Unknown);
    }

    #[test]
    fn test_registration_addresses_actor() {
        let event = decode(r#"{"type":"REGISTRATION","userId":"u9","username":"erin"}"#);
        let Mapped::Draft(draft) = map_event(&event) else {
            panic!("expected a draft");
        };
        assert_eq!(draft.user_id, "u9");
        assert_eq!(draft.title, "Welcome");
        assert!(draft.notification_type.category().is_none());
    }
}
