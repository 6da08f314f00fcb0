//! Chat Transport Abstraction
//!
//! The capability set the backup engine needs from a chat platform: send
//! text and media to a destination, fetch a previously sent object back as a
//! byte stream, and receive inbound events from operators.
//!
//! A transport instance is one authenticated identity (one bot). The engine
//! spreads work across several of them.

use async_trait::async_trait;
use bytes::Bytes;
use core_async::io::BoxedReader;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{BridgeError, Result};

/// Identifier of a chat, channel or session.
///
/// Numeric ids (`-1001234567890`) and public handles (`@my_channel`) are both
/// accepted, so the id is kept as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(String);

impl ChatId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ChatId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ChatId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl FromStr for ChatId {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(BridgeError::OperationFailed(
                "Chat id cannot be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// How a payload is presented on the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    Document,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local payload read as it is sent.
pub struct UploadStream {
    pub file_name: String,
    /// Exact number of bytes `reader` yields.
    pub length: u64,
    pub reader: BoxedReader,
}

impl UploadStream {
    pub fn new(file_name: impl Into<String>, length: u64, reader: BoxedReader) -> Self {
        Self {
            file_name: file_name.into(),
            length,
            reader,
        }
    }

    /// Payload already held in memory.
    pub fn from_bytes(file_name: impl Into<String>, data: Bytes) -> Self {
        let length = data.len() as u64;
        Self::new(file_name, length, Box::new(std::io::Cursor::new(data)))
    }
}

impl fmt::Debug for UploadStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadStream")
            .field("file_name", &self.file_name)
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// Payload of a media send.
#[derive(Debug)]
pub enum MediaSource {
    /// Fresh upload streamed from local storage.
    Upload(UploadStream),
    /// Re-send of an object the platform already stores.
    Remote(String),
}

/// Reply keyboard shown alongside a text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyboardHint {
    /// Rows of button labels.
    Menu(Vec<Vec<String>>),
    /// Hide any keyboard currently shown.
    Remove,
}

/// Options for [`ChatTransport::send_text`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextOptions {
    pub keyboard: Option<KeyboardHint>,
    pub markdown: bool,
}

/// Media carried by an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub kind: MediaKind,
    pub remote_id: String,
    pub file_name: Option<String>,
}

/// An inbound message from an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Conversation the message arrived in.
    pub session: ChatId,
    pub sender: Option<i64>,
    pub text: Option<String>,
    pub attachment: Option<Attachment>,
    /// Set when the message was forwarded out of a channel.
    pub forwarded_from_channel: Option<ChatId>,
    /// Set for any forward, including forwards from users.
    pub forwarded: bool,
}

impl InboundEvent {
    /// Plain text message in `session`.
    pub fn text(session: impl Into<ChatId>, text: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            sender: None,
            text: Some(text.into()),
            attachment: None,
            forwarded_from_channel: None,
            forwarded: false,
        }
    }

    /// Message forwarded from `channel` into `session`.
    pub fn forwarded_from(session: impl Into<ChatId>, channel: impl Into<ChatId>) -> Self {
        Self {
            session: session.into(),
            sender: None,
            text: None,
            attachment: None,
            forwarded_from_channel: Some(channel.into()),
            forwarded: true,
        }
    }
}

/// Chat transport trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::transport::{ChatTransport, MediaSource, UploadStream};
///
/// async fn backup(transport: &dyn ChatTransport, channel: &ChatId, data: Bytes) -> Result<String> {
///     let source = MediaSource::Upload(UploadStream::from_bytes("a.jpg", data));
///     transport.send_photo(channel, source, Some("Path: a.jpg")).await
/// }
/// ```
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Short, non-secret label used in logs.
    fn label(&self) -> &str;

    /// Check the credentials and return the identity's username.
    async fn verify(&self) -> Result<String>;

    async fn send_text(&self, destination: &ChatId, text: &str, options: TextOptions)
        -> Result<()>;

    /// Send a photo, returning the remote object id.
    async fn send_photo(
        &self,
        destination: &ChatId,
        source: MediaSource,
        caption: Option<&str>,
    ) -> Result<String>;

    /// Send a video, returning the remote object id.
    async fn send_video(
        &self,
        destination: &ChatId,
        source: MediaSource,
        caption: Option<&str>,
    ) -> Result<String>;

    /// Send a document, returning the remote object id.
    async fn send_document(
        &self,
        destination: &ChatId,
        source: MediaSource,
        caption: Option<&str>,
    ) -> Result<String>;

    /// Stream a previously sent object back.
    async fn fetch_object(&self, remote_object_id: &str) -> Result<BoxedReader>;

    /// Wait up to `timeout` for inbound events.
    async fn poll_events(&self, timeout: Duration) -> Result<Vec<InboundEvent>>;

    /// Dispatch to the send method matching `kind`.
    async fn send_media(
        &self,
        kind: MediaKind,
        destination: &ChatId,
        source: MediaSource,
        caption: Option<&str>,
    ) -> Result<String> {
        match kind {
            MediaKind::Photo => self.send_photo(destination, source, caption).await,
            MediaKind::Video => self.send_video(destination, source, caption).await,
            MediaKind::Document => self.send_document(destination, source, caption).await,
        }
    }
}
