//! Telegram Bot API types
//!
//! Data structures for the subset of the Bot API the transport speaks, plus
//! the mapping from an inbound [`Message`] onto a transport-neutral
//! [`InboundEvent`].

use bridge_traits::transport::{Attachment, ChatId, InboundEvent, MediaKind};
use serde::{Deserialize, Serialize};

/// Envelope wrapped around every Bot API response.
///
/// See: https://core.telegram.org/bots/api#making-requests
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,

    pub result: Option<T>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub error_code: Option<u16>,

    #[serde(default)]
    pub parameters: Option<ResponseParameters>,
}

/// Extra details attached to some failed requests
#[derive(Debug, Deserialize)]
pub struct ResponseParameters {
    /// Seconds to wait before repeating a flood-controlled request
    #[serde(default)]
    pub retry_after: Option<u64>,

    /// The group moved to a supergroup with this id
    #[serde(default)]
    pub migrate_to_chat_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,

    #[serde(default)]
    pub is_bot: bool,

    #[serde(default)]
    pub first_name: String,

    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,

    /// `private`, `group`, `supergroup` or `channel`
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub title: Option<String>,
}

impl Chat {
    pub fn is_channel(&self) -> bool {
        self.kind == "channel"
    }
}

/// Origin of a forwarded message (Bot API 7.0+).
#[derive(Debug, Clone, Deserialize)]
pub struct MessageOrigin {
    /// `user`, `hidden_user`, `chat` or `channel`
    #[serde(rename = "type")]
    pub kind: String,

    /// Present for channel origins
    #[serde(default)]
    pub chat: Option<Chat>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,

    #[serde(default)]
    pub width: u32,

    #[serde(default)]
    pub height: u32,

    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Video {
    pub file_id: String,

    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub file_id: String,

    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,

    pub chat: Chat,

    #[serde(default)]
    pub from: Option<User>,

    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub caption: Option<String>,

    #[serde(default)]
    pub photo: Vec<PhotoSize>,

    #[serde(default)]
    pub video: Option<Video>,

    #[serde(default)]
    pub animation: Option<Video>,

    #[serde(default)]
    pub document: Option<Document>,

    #[serde(default)]
    pub forward_origin: Option<MessageOrigin>,

    /// Pre-7.0 forward fields, still sent by older Bot API servers
    #[serde(default)]
    pub forward_from_chat: Option<Chat>,

    #[serde(default)]
    pub forward_date: Option<i64>,
}

impl Message {
    /// File id of the largest photo size.
    pub fn largest_photo(&self) -> Option<&PhotoSize> {
        self.photo.iter().max_by_key(|size| {
            (
                u64::from(size.width) * u64::from(size.height),
                size.file_size.unwrap_or(0),
            )
        })
    }

    /// Remote id of the media the message carries, preferring `kind`.
    pub fn media_file_id(&self, kind: MediaKind) -> Option<String> {
        let photo = || self.largest_photo().map(|p| p.file_id.clone());
        let video = || {
            self.video
                .as_ref()
                .or(self.animation.as_ref())
                .map(|v| v.file_id.clone())
        };
        let document = || self.document.as_ref().map(|d| d.file_id.clone());

        // Telegram may store a media send under a different field than the
        // method used (e.g. a video it cannot transcode comes back as a document).
        match kind {
            MediaKind::Photo => photo().or_else(document),
            MediaKind::Video => video().or_else(document),
            MediaKind::Document => document().or_else(video).or_else(photo),
        }
    }

    fn channel_origin(&self) -> Option<ChatId> {
        if let Some(origin) = &self.forward_origin {
            return match (&origin.kind[..], &origin.chat) {
                ("channel", Some(chat)) => Some(ChatId::from(chat.id)),
                _ => None,
            };
        }
        self.forward_from_chat
            .as_ref()
            .filter(|chat| chat.is_channel())
            .map(|chat| ChatId::from(chat.id))
    }

    fn attachment(&self) -> Option<Attachment> {
        if let Some(photo) = self.largest_photo() {
            return Some(Attachment {
                kind: MediaKind::Photo,
                remote_id: photo.file_id.clone(),
                file_name: None,
            });
        }
        if let Some(video) = self.video.as_ref().or(self.animation.as_ref()) {
            return Some(Attachment {
                kind: MediaKind::Video,
                remote_id: video.file_id.clone(),
                file_name: video.file_name.clone(),
            });
        }
        self.document.as_ref().map(|document| Attachment {
            kind: MediaKind::Document,
            remote_id: document.file_id.clone(),
            file_name: document.file_name.clone(),
        })
    }

    pub fn into_inbound_event(self) -> InboundEvent {
        InboundEvent {
            session: ChatId::from(self.chat.id),
            sender: self.from.as_ref().map(|user| user.id),
            attachment: self.attachment(),
            forwarded_from_channel: self.channel_origin(),
            forwarded: self.forward_origin.is_some() || self.forward_date.is_some(),
            text: self.text,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,

    #[serde(default)]
    pub message: Option<Message>,
}

/// Result of `getFile`
#[derive(Debug, Clone, Deserialize)]
pub struct File {
    pub file_id: String,

    #[serde(default)]
    pub file_size: Option<u64>,

    /// Relative download path, valid for at least an hour
    #[serde(default)]
    pub file_path: Option<String>,
}

/// `reply_markup` of `sendMessage`
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ReplyMarkup {
    Keyboard {
        keyboard: Vec<Vec<String>>,
        resize_keyboard: bool,
        one_time_keyboard: bool,
    },
    Remove {
        remove_keyboard: bool,
    },
}

#[derive(Debug, Serialize)]
pub struct SendMessageRequest<'a> {
    pub chat_id: &'a str,
    pub text: &'a str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<&'static str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<ReplyMarkup>,
}

/// `getUpdates` parameters
#[derive(Debug, Serialize)]
pub struct GetUpdatesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    pub timeout: u64,
    pub allowed_updates: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct GetFileRequest<'a> {
    pub file_id: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_error_envelope() {
        let json = r#"{
            "ok": false,
            "error_code": 429,
            "description": "Too Many Requests: retry after 5",
            "parameters": {"retry_after": 5}
        }"#;

        let response: ApiResponse<Message> = serde_json::from_str(json).unwrap();
        assert!(!response.ok);
        assert!(response.result.is_none());
        assert_eq!(response.error_code, Some(429));
        assert_eq!(response.parameters.unwrap().retry_after, Some(5));
    }

    #[test]
    fn test_forward_origin_channel() {
        let json = r#"{
            "message_id": 10,
            "chat": {"id": 7, "type": "private"},
            "from": {"id": 7, "is_bot": false, "first_name": "Op"},
            "forward_origin": {"type": "channel", "chat": {"id": -100555, "type": "channel"}, "message_id": 3, "date": 0},
            "forward_date": 1700000000,
            "text": "hello"
        }"#;

        let message: Message = serde_json::from_str(json).unwrap();
        let event = message.into_inbound_event();
        assert_eq!(event.session, ChatId::from(7i64));
        assert_eq!(event.sender, Some(7));
        assert_eq!(event.forwarded_from_channel, Some(ChatId::from(-100555i64)));
        assert!(event.forwarded);
    }

    #[test]
    fn test_forward_from_user_is_not_a_channel() {
        let json = r#"{
            "message_id": 11,
            "chat": {"id": 7, "type": "private"},
            "forward_origin": {"type": "user", "sender_user": {"id": 9, "first_name": "X"}, "date": 0},
            "text": "hi"
        }"#;

        let event = serde_json::from_str::<Message>(json)
            .unwrap()
            .into_inbound_event();
        assert!(event.forwarded);
        assert!(event.forwarded_from_channel.is_none());
    }

    #[test]
    fn test_legacy_forward_from_chat() {
        let json = r#"{
            "message_id": 12,
            "chat": {"id": 7, "type": "private"},
            "forward_from_chat": {"id": -100777, "type": "channel", "title": "Vault"},
            "forward_date": 1700000000
        }"#;

        let event = serde_json::from_str::<Message>(json)
            .unwrap()
            .into_inbound_event();
        assert_eq!(event.forwarded_from_channel, Some(ChatId::from(-100777i64)));
    }

    #[test]
    fn test_photo_attachment_uses_largest_size() {
        let json = r#"{
            "message_id": 13,
            "chat": {"id": 7, "type": "private"},
            "photo": [
                {"file_id": "small", "width": 90, "height": 90, "file_size": 1000},
                {"file_id": "large", "width": 1280, "height": 960, "file_size": 90000},
                {"file_id": "medium", "width": 320, "height": 240, "file_size": 9000}
            ],
            "caption": "Path: a.jpg"
        }"#;

        let event = serde_json::from_str::<Message>(json)
            .unwrap()
            .into_inbound_event();
        let attachment = event.attachment.unwrap();
        assert_eq!(attachment.kind, MediaKind::Photo);
        assert_eq!(attachment.remote_id, "large");
        assert!(event.text.is_none());
    }

    #[test]
    fn test_video_falls_back_to_document() {
        let json = r#"{
            "message_id": 14,
            "chat": {"id": -100, "type": "channel"},
            "document": {"file_id": "doc-1", "file_name": "clip.avi"}
        }"#;

        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.media_file_id(MediaKind::Video), Some("doc-1".to_string()));
        assert_eq!(message.media_file_id(MediaKind::Photo), Some("doc-1".to_string()));
    }

    #[test]
    fn test_reply_markup_serialization() {
        let remove = serde_json::to_value(ReplyMarkup::Remove {
            remove_keyboard: true,
        })
        .unwrap();
        assert_eq!(remove, serde_json::json!({"remove_keyboard": true}));

        let keyboard = serde_json::to_value(ReplyMarkup::Keyboard {
            keyboard: vec![vec!["Help".to_string()]],
            resize_keyboard: true,
            one_time_keyboard: true,
        })
        .unwrap();
        assert_eq!(keyboard["keyboard"][0][0], "Help");
        assert_eq!(keyboard["resize_keyboard"], true);
    }
}
