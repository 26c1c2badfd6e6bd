//! Bot API wire types
//!
//! Only the fields the relay reads are modelled; everything else in the
//! upstream JSON is ignored by serde.

use serde::{Deserialize, Serialize};

/// Envelope every Bot API method answers with
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub date: i64,
    pub media_group_id: Option<String>,
    pub photo: Option<Vec<PhotoSize>>,
    pub caption: Option<String>,
    pub text: Option<String>,
    /// Bot API 7.0+ forward information
    pub forward_origin: Option<MessageOrigin>,
    /// Pre-7.0 forward information, still sent by some gateways
    pub forward_date: Option<i64>,
    pub forward_from_chat: Option<Chat>,
}

impl Message {
    pub fn is_forwarded(&self) -> bool {
        self.forward_origin.is_some() || self.forward_date.is_some()
    }

    /// Chat the forwarded content came from, when the platform exposes it
    pub fn forwarded_chat(&self) -> Option<&Chat> {
        self.forward_origin
            .as_ref()
            .and_then(|origin| origin.chat.as_ref().or(origin.sender_chat.as_ref()))
            .or(self.forward_from_chat.as_ref())
    }
}

/// `forward_origin` object; `chat` is set for channel origins, `sender_chat` for chat origins
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageOrigin {
    #[serde(rename = "type")]
    pub kind: String,
    pub chat: Option<Chat>,
    pub sender_chat: Option<Chat>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub title: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: Option<String>,
    pub username: Option<String>,
}

/// One resolution variant of a photo
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub file_unique_id: Option<String>,
    pub width: u32,
    pub height: u32,
    pub file_size: Option<u64>,
}

/// Result of getFile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub file_id: String,
    pub file_size: Option<u64>,
    pub file_path: Option<String>,
}

/// Element of a sendMediaGroup request
#[derive(Debug, Clone, Serialize)]
pub struct InputMediaPhoto {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub media: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl InputMediaPhoto {
    pub fn new(media: impl Into<String>, caption: Option<String>) -> Self {
        Self {
            kind: "photo",
            media: media.into(),
            caption,
        }
    }
}
