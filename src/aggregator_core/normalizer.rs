//! Bot API message normalization into engine `Item`s

use super::item::{Actor, Candidate, Item, Origin};
use crate::telegram::types::{Chat, Message};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// Message carries no photo sizes at all
    NoPhoto,
}

impl std::fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormalizeError::NoPhoto => write!(f, "Message has no photo"),
        }
    }
}

impl std::error::Error for NormalizeError {}

/// Convert a photo message into an `Item`
pub fn normalize(message: &Message) -> Result<Item, NormalizeError> {
    let candidates: Vec<Candidate> = message
        .photo
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|size| Candidate {
            file_ref: size.file_id.clone(),
            width: size.width,
            height: size.height,
            size: size.file_size.unwrap_or(0),
        })
        .collect();

    if candidates.is_empty() {
        return Err(NormalizeError::NoPhoto);
    }

    let actor = message
        .from
        .as_ref()
        .map(|user| Actor {
            id: user.id,
            handle: user.username.clone(),
        })
        .unwrap_or_default();

    Ok(Item {
        batch_key: message.media_group_id.clone(),
        sequence_id: message.message_id.to_string(),
        candidates,
        caption: Some(message.caption.clone().unwrap_or_default()),
        origin: resolve_origin(message),
        actor,
        reply_chat_id: Some(message.chat.id),
    })
}

/// Where the content came from: the forwarded chat if any, else the current one
pub fn resolve_origin(message: &Message) -> Origin {
    if message.is_forwarded() {
        return match message.forwarded_chat() {
            Some(chat) => Origin {
                display_name: chat
                    .title
                    .clone()
                    .or_else(|| chat.username.clone())
                    .unwrap_or_else(|| "Unknown chat".to_string()),
                context_id: chat.id.to_string(),
            },
            None => Origin {
                display_name: "Unknown chat (forwarded)".to_string(),
                context_id: "unknown".to_string(),
            },
        };
    }

    Origin {
        display_name: current_chat_name(&message.chat),
        context_id: message.chat.id.to_string(),
    }
}

fn current_chat_name(chat: &Chat) -> String {
    chat.title
        .clone()
        .or_else(|| chat.username.clone())
        .or_else(|| chat.first_name.clone())
        .unwrap_or_else(|| "Private chat".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Message {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_normalize_album_photo() {
        let message = parse(
            r#"{
                "message_id": 77,
                "from": {"id": 42, "is_bot": false, "username": "ana"},
                "chat": {"id": -500, "type": "group", "title": "Family"},
                "date": 1700000000,
                "media_group_id": "g-1",
                "caption": "trip",
                "photo": [
                    {"file_id": "a", "width": 90, "height": 90, "file_size": 100},
                    {"file_id": "b", "width": 1280, "height": 1280}
                ]
            }"#,
        );

        let item = normalize(&message).unwrap();
        assert_eq!(item.batch_key.as_deref(), Some("g-1"));
        assert_eq!(item.sequence_id, "77");
        assert_eq!(item.candidates.len(), 2);
        assert_eq!(item.candidates[1].size, 0);
        assert_eq!(item.caption.as_deref(), Some("trip"));
        assert_eq!(item.actor, Actor { id: 42, handle: Some("ana".to_string()) });
        assert_eq!(item.origin.display_name, "Family");
        assert_eq!(item.origin.context_id, "-500");
        assert_eq!(item.reply_chat_id, Some(-500));
    }

    #[test]
    fn test_normalize_rejects_missing_photo() {
        let no_photo = parse(r#"{"message_id": 1, "chat": {"id": 1, "type": "private"}, "text": "hi"}"#);
        assert_eq!(normalize(&no_photo).unwrap_err(), NormalizeError::NoPhoto);

        let empty = parse(r#"{"message_id": 1, "chat": {"id": 1, "type": "private"}, "photo": []}"#);
        assert_eq!(normalize(&empty).unwrap_err(), NormalizeError::NoPhoto);
    }

    #[test]
    fn test_origin_private_chat_fallbacks() {
        let named = parse(r#"{"message_id": 1, "chat": {"id": 9, "type": "private", "first_name": "Bo"}}"#);
        assert_eq!(resolve_origin(&named).display_name, "Bo");

        let anonymous = parse(r#"{"message_id": 1, "chat": {"id": 9, "type": "private"}}"#);
        assert_eq!(resolve_origin(&anonymous).display_name, "Private chat");
    }

    #[test]
    fn test_origin_forwarded_from_channel() {
        let message = parse(
            r#"{
                "message_id": 1,
                "chat": {"id": 9, "type": "private", "first_name": "Bo"},
                "forward_origin": {"type": "channel", "chat": {"id": -100777, "type": "channel", "username": "deals"}}
            }"#,
        );

        let origin = resolve_origin(&message);
        assert_eq!(origin.display_name, "deals");
        assert_eq!(origin.context_id, "-100777");
    }

    #[test]
    fn test_origin_forwarded_without_chat() {
        let message = parse(
            r#"{
                "message_id": 1,
                "chat": {"id": 9, "type": "private"},
                "forward_date": 1700000000
            }"#,
        );

        let origin = resolve_origin(&message);
        assert_eq!(origin.display_name, "Unknown chat (forwarded)");
        assert_eq!(origin.context_id, "unknown");
    }
}
