//! Telegram Bot API connector
//!
//! Implements the `ChatTransport` trait for one bot identity over the Bot API.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, MultipartForm};
use bridge_traits::transport::{
    ChatId, ChatTransport, InboundEvent, KeyboardHint, MediaKind, MediaSource, TextOptions,
};
use core_async::io::BoxedReader;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::error::TelegramError;
use crate::types::{
    ApiResponse, File, GetFileRequest, GetUpdatesRequest, Message, ReplyMarkup,
    SendMessageRequest, Update, User,
};

/// Bot API base URL
const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Timeout for plain API calls
const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for media uploads
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Slack added on top of the long-poll timeout before the HTTP call gives up
const POLL_SLACK: Duration = Duration::from_secs(10);

/// Telegram bot connector
///
/// One instance is one authenticated bot. The token only ever appears in
/// request URLs; logs identify the bot by [`label`](ChatTransport::label).
///
/// # Example
///
/// ```ignore
/// use provider_telegram::TelegramBotClient;
/// use bridge_traits::transport::ChatTransport;
///
/// let bot = TelegramBotClient::new(http_client, token.expose());
/// let username = bot.verify().await?;
/// ```
pub struct TelegramBotClient {
    http_client: Arc<dyn HttpClient>,
    token: String,
    label: String,
    api_base: String,
    /// Next `getUpdates` offset, 0 until the first batch arrives
    next_update: AtomicI64,
}

impl TelegramBotClient {
    /// Create a connector for the bot owning `token`.
    pub fn new(http_client: Arc<dyn HttpClient>, token: impl Into<String>) -> Self {
        let token = token.into();
        let label = Self::label_for(&token);
        Self {
            http_client,
            token,
            label,
            api_base: TELEGRAM_API_BASE.to_string(),
            next_update: AtomicI64::new(0),
        }
    }

    /// Point the connector at a self-hosted Bot API server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// `bot<id>` derived from the public half of the token.
    fn label_for(token: &str) -> String {
        match token.split_once(':') {
            Some((id, _)) if !id.is_empty() => format!("bot{}", id),
            _ => "bot".to_string(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base, self.token, file_path)
    }

    fn json_request<T: Serialize>(
        &self,
        method: &str,
        body: &T,
        timeout: Duration,
    ) -> Result<HttpRequest> {
        Ok(HttpRequest::new(HttpMethod::Post, self.method_url(method))
            .header("Accept", "application/json")
            .json(body)?
            .timeout(timeout))
    }

    /// Execute once and unwrap the `{ok, result}` envelope.
    async fn call<T: DeserializeOwned>(&self, method: &str, request: HttpRequest) -> Result<T> {
        let response = self.http_client.execute(request).await?;
        debug!(
            identity = %self.label,
            method,
            status = response.status,
            "Bot API response"
        );
        Self::parse_response(response).map_err(|e| {
            warn!(identity = %self.label, method, error = %e, "Bot API call failed");
            e.into()
        })
    }

    fn parse_response<T: DeserializeOwned>(
        response: HttpResponse,
    ) -> std::result::Result<T, TelegramError> {
        let status = response.status;
        let envelope = match response.json::<ApiResponse<T>>() {
            Ok(envelope) => envelope,
            Err(e) => {
                return Err(match status {
                    429 => TelegramError::RateLimited {
                        retry_after_seconds: None,
                    },
                    200..=299 => TelegramError::ParseError(e.to_string()),
                    _ => TelegramError::Api {
                        status,
                        description: String::from_utf8_lossy(&response.body).to_string(),
                    },
                });
            }
        };

        if envelope.ok {
            return envelope
                .result
                .ok_or_else(|| TelegramError::ParseError("ok response without result".into()));
        }

        let code = envelope.error_code.unwrap_or(status);
        let retry_after = envelope.parameters.as_ref().and_then(|p| p.retry_after);
        if code == 429 || retry_after.is_some() {
            return Err(TelegramError::RateLimited {
                retry_after_seconds: retry_after,
            });
        }

        Err(TelegramError::Api {
            status: code,
            description: envelope
                .description
                .unwrap_or_else(|| format!("request failed with status {}", status)),
        })
    }

    /// Shared body of the three media sends.
    async fn send_media_message(
        &self,
        kind: MediaKind,
        destination: &ChatId,
        source: MediaSource,
        caption: Option<&str>,
    ) -> Result<String> {
        let (method, field) = match kind {
            MediaKind::Photo => ("sendPhoto", "photo"),
            MediaKind::Video => ("sendVideo", "video"),
            MediaKind::Document => ("sendDocument", "document"),
        };

        let request = match source {
            MediaSource::Upload(upload) => {
                debug!(identity = %self.label, method, bytes = upload.length, "Uploading media");
                let mut form = MultipartForm::new().text("chat_id", destination.as_str());
                if let Some(caption) = caption {
                    form = form.text("caption", caption);
                }
                form = form.file(field, upload.file_name, None, upload.length, upload.reader);
                HttpRequest::new(HttpMethod::Post, self.method_url(method))
                    .multipart(form)
                    .timeout(UPLOAD_TIMEOUT)
            }
            MediaSource::Remote(file_id) => {
                let mut body = json!({ "chat_id": destination.as_str() });
                body[field] = json!(file_id);
                if let Some(caption) = caption {
                    body["caption"] = json!(caption);
                }
                self.json_request(method, &body, API_TIMEOUT)?
            }
        };

        let message: Message = self.call(method, request).await?;
        message
            .media_file_id(kind)
            .ok_or_else(|| TelegramError::MissingFileId(kind.as_str()).into())
    }

    fn reply_markup(keyboard: Option<KeyboardHint>) -> Option<ReplyMarkup> {
        keyboard.map(|hint| match hint {
            KeyboardHint::Menu(rows) => ReplyMarkup::Keyboard {
                keyboard: rows,
                resize_keyboard: true,
                one_time_keyboard: true,
            },
            KeyboardHint::Remove => ReplyMarkup::Remove {
                remove_keyboard: true,
            },
        })
    }
}

#[async_trait]
impl ChatTransport for TelegramBotClient {
    fn label(&self) -> &str {
        &self.label
    }

    #[instrument(skip(self), fields(identity = %self.label))]
    async fn verify(&self) -> Result<String> {
        let request = HttpRequest::new(HttpMethod::Get, self.method_url("getMe"))
            .header("Accept", "application/json")
            .timeout(API_TIMEOUT);
        let me: User = self.call("getMe", request).await?;
        let username = me.username.unwrap_or(me.first_name);
        info!("Bot identity verified: @{}", username);
        Ok(username)
    }

    #[instrument(skip(self, text, options), fields(identity = %self.label, chat = %destination))]
    async fn send_text(
        &self,
        destination: &ChatId,
        text: &str,
        options: TextOptions,
    ) -> Result<()> {
        let body = SendMessageRequest {
            chat_id: destination.as_str(),
            text,
            parse_mode: options.markdown.then_some("Markdown"),
            reply_markup: Self::reply_markup(options.keyboard),
        };
        let request = self.json_request("sendMessage", &body, API_TIMEOUT)?;
        let _: Message = self.call("sendMessage", request).await?;
        Ok(())
    }

    #[instrument(skip(self, source, caption), fields(identity = %self.label, chat = %destination))]
    async fn send_photo(
        &self,
        destination: &ChatId,
        source: MediaSource,
        caption: Option<&str>,
    ) -> Result<String> {
        self.send_media_message(MediaKind::Photo, destination, source, caption)
            .await
    }

    #[instrument(skip(self, source, caption), fields(identity = %self.label, chat = %destination))]
    async fn send_video(
        &self,
        destination: &ChatId,
        source: MediaSource,
        caption: Option<&str>,
    ) -> Result<String> {
        self.send_media_message(MediaKind::Video, destination, source, caption)
            .await
    }

    #[instrument(skip(self, source, caption), fields(identity = %self.label, chat = %destination))]
    async fn send_document(
        &self,
        destination: &ChatId,
        source: MediaSource,
        caption: Option<&str>,
    ) -> Result<String> {
        self.send_media_message(MediaKind::Document, destination, source, caption)
            .await
    }

    #[instrument(skip(self), fields(identity = %self.label))]
    async fn fetch_object(&self, remote_object_id: &str) -> Result<BoxedReader> {
        let request = self.json_request(
            "getFile",
            &GetFileRequest {
                file_id: remote_object_id,
            },
            API_TIMEOUT,
        )?;
        let file: File = self.call("getFile", request).await?;

        let file_path = file
            .file_path
            .ok_or_else(|| TelegramError::MissingFilePath(file.file_id.clone()))?;
        debug!(size = ?file.file_size, "Downloading object");

        self.http_client
            .download_stream(self.file_url(&file_path))
            .await
    }

    async fn poll_events(&self, timeout: Duration) -> Result<Vec<InboundEvent>> {
        let offset = self.next_update.load(Ordering::Acquire);
        let body = GetUpdatesRequest {
            offset: (offset > 0).then_some(offset),
            timeout: timeout.as_secs(),
            allowed_updates: vec!["message"],
        };
        let request = self.json_request("getUpdates", &body, timeout + POLL_SLACK)?;
        let updates: Vec<Update> = self.call("getUpdates", request).await?;

        if let Some(last) = updates.iter().map(|u| u.update_id).max() {
            self.next_update.fetch_max(last + 1, Ordering::AcqRel);
        }

        let events: Vec<InboundEvent> = updates
            .into_iter()
            .filter_map(|update| update.message)
            .map(Message::into_inbound_event)
            .collect();

        if !events.is_empty() {
            debug!(identity = %self.label, count = events.len(), "Received inbound events");
        }
        Ok(events)
    }
}

impl std::fmt::Debug for TelegramBotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBotClient")
            .field("label", &self.label)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}
