//! # Core Configuration Module
//!
//! Configuration boundary for the backup engine.
//!
//! ## Overview
//!
//! A `CoreConfig` is built either programmatically through
//! [`CoreConfigBuilder`] or from environment variables with
//! [`CoreConfig::from_env`]. Both paths end in [`CoreConfig::validate`], which
//! fails fast with an actionable message before any component starts.
//!
//! ## Environment
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `TELEGRAM_BOT_TOKENS` | comma-separated bot tokens (required) |
//! | `STORAGE_CHANNEL_IDS` | comma-separated pre-registered channels |
//! | `CHAT_IDS` | comma-separated authorized session ids (required) |
//! | `ADMIN_CHAT_ID` | destination for progress reports (required) |
//! | `DEFAULT_DRIVE_PATH` | local scan root (required) |
//! | `RESTORE_OUTPUT_PATH` | restore root, default `restored` |
//! | `TELECLOUD_*` | tuning knobs, see [`CoreConfig::from_lookup`] |
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .bot_token("123456:secret")
//!     .authorized_session("111")
//!     .admin_chat("111")
//!     .scan_root("/mnt/photos")
//!     .build()?;
//! assert_eq!(config.effective_concurrency(), 2);
//! ```

use crate::error::{Error, Result};
use crate::logging::{mask_bot_token, LogFormat, LogLevel, LoggingConfig};
use bridge_traits::ChatId;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default snapshot file, relative to the working directory.
pub const DEFAULT_SNAPSHOT_PATH: &str = "uploaded_files.tcsnap";

/// Default restore root, relative to the working directory.
pub const DEFAULT_RESTORE_PATH: &str = "restored";

/// Extensions picked up by the local scan when none are configured.
pub const DEFAULT_SCAN_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tiff", "mp4", "mov", "avi",
];

/// A bot credential. `Debug` and `Display` never print the secret half.
#[derive(Clone, PartialEq, Eq)]
pub struct BotToken(String);

impl BotToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building API URLs only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Public bot id part of the token.
    pub fn masked(&self) -> String {
        mask_bot_token(&self.0)
    }
}

impl fmt::Debug for BotToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BotToken({})", self.masked())
    }
}

impl fmt::Display for BotToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

/// Upload scheduler tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSettings {
    /// Worker count; `None` means two per bot identity.
    pub concurrency: Option<usize>,
    /// Attempts per file before it is marked failed.
    pub max_attempts: u32,
    /// Backoff step; attempt `n` waits `n * retry_base_delay`.
    pub retry_base_delay: Duration,
    /// Backoff cap.
    pub retry_max_delay: Duration,
    /// Interval between progress reports.
    pub progress_interval: Duration,
    /// Successful files between snapshot saves during a run.
    pub flush_every: usize,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            concurrency: None,
            max_attempts: 5,
            retry_base_delay: Duration::from_secs(10),
            retry_max_delay: Duration::from_secs(30),
            progress_interval: Duration::from_secs(10 * 60),
            flush_every: 10,
        }
    }
}

/// Core configuration for the backup engine.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// One client identity per token
    pub bot_tokens: Vec<BotToken>,

    /// Storage channels known before any registration handshake
    pub storage_channels: Vec<ChatId>,

    /// Sessions allowed to talk to the bots
    pub authorized_sessions: Vec<ChatId>,

    /// Destination of progress and summary reports
    pub admin_chat: ChatId,

    /// Local root scanned for upload candidates
    pub scan_root: PathBuf,

    /// Local root restored files are written under
    pub restore_root: PathBuf,

    /// Location of the metadata snapshot
    pub snapshot_path: PathBuf,

    /// Lowercase file extensions included in the scan
    pub scan_extensions: Vec<String>,

    /// Upload scheduler tuning
    pub upload: UploadSettings,

    /// Long-poll timeout for inbound events
    pub poll_timeout: Duration,

    /// Upper bound on the shutdown drain
    pub shutdown_grace: Duration,

    /// Logging setup for the binary
    pub logging: LoggingConfig,
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    ///
    /// Besides the required variables this reads `TELECLOUD_SNAPSHOT_PATH`,
    /// `TELECLOUD_CONCURRENCY`, `TELECLOUD_MAX_ATTEMPTS`,
    /// `TELECLOUD_RETRY_BASE_SECS`, `TELECLOUD_RETRY_MAX_SECS`,
    /// `TELECLOUD_PROGRESS_INTERVAL_SECS`, `TELECLOUD_FLUSH_EVERY`,
    /// `TELECLOUD_SCAN_EXTENSIONS`, `TELECLOUD_POLL_TIMEOUT_SECS`,
    /// `TELECLOUD_SHUTDOWN_GRACE_SECS`, `TELECLOUD_LOG_FORMAT`,
    /// `TELECLOUD_LOG_LEVEL` and `RUST_LOG`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let require = |key: &str| {
            get(key).ok_or_else(|| {
                Error::Config(format!("{} is required but not set", key))
            })
        };

        let mut builder = CoreConfig::builder()
            .admin_chat(require("ADMIN_CHAT_ID")?)
            .scan_root(require("DEFAULT_DRIVE_PATH")?);

        for token in split_list(&require("TELEGRAM_BOT_TOKENS")?) {
            builder = builder.bot_token(token);
        }
        for session in split_list(&require("CHAT_IDS")?) {
            builder = builder.authorized_session(session);
        }
        if let Some(channels) = get("STORAGE_CHANNEL_IDS") {
            for channel in split_list(&channels) {
                builder = builder.storage_channel(channel);
            }
        }
        if let Some(path) = get("RESTORE_OUTPUT_PATH") {
            builder = builder.restore_root(path);
        }
        if let Some(path) = get("TELECLOUD_SNAPSHOT_PATH") {
            builder = builder.snapshot_path(path);
        }
        if let Some(extensions) = get("TELECLOUD_SCAN_EXTENSIONS") {
            builder = builder.scan_extensions(split_list(&extensions));
        }

        let mut upload = UploadSettings::default();
        if let Some(value) = get("TELECLOUD_CONCURRENCY") {
            upload.concurrency = Some(parse_number("TELECLOUD_CONCURRENCY", &value)?);
        }
        if let Some(value) = get("TELECLOUD_MAX_ATTEMPTS") {
            upload.max_attempts = parse_number("TELECLOUD_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = get("TELECLOUD_RETRY_BASE_SECS") {
            upload.retry_base_delay = parse_secs("TELECLOUD_RETRY_BASE_SECS", &value)?;
        }
        if let Some(value) = get("TELECLOUD_RETRY_MAX_SECS") {
            upload.retry_max_delay = parse_secs("TELECLOUD_RETRY_MAX_SECS", &value)?;
        }
        if let Some(value) = get("TELECLOUD_PROGRESS_INTERVAL_SECS") {
            upload.progress_interval = parse_secs("TELECLOUD_PROGRESS_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = get("TELECLOUD_FLUSH_EVERY") {
            upload.flush_every = parse_number("TELECLOUD_FLUSH_EVERY", &value)?;
        }
        builder = builder.upload_settings(upload);

        if let Some(value) = get("TELECLOUD_POLL_TIMEOUT_SECS") {
            builder = builder.poll_timeout(parse_secs("TELECLOUD_POLL_TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = get("TELECLOUD_SHUTDOWN_GRACE_SECS") {
            builder =
                builder.shutdown_grace(parse_secs("TELECLOUD_SHUTDOWN_GRACE_SECS", &value)?);
        }

        let mut logging = LoggingConfig::default();
        if let Some(value) = get("TELECLOUD_LOG_FORMAT") {
            logging = logging.with_format(LogFormat::from_str(&value)?);
        }
        if let Some(value) = get("TELECLOUD_LOG_LEVEL") {
            logging = logging.with_level(LogLevel::from_str(&value)?);
        }
        if let Some(value) = get("RUST_LOG") {
            logging = logging.with_filter(value);
        }

        builder.logging(logging).build()
    }

    /// Worker count for upload runs.
    pub fn effective_concurrency(&self) -> usize {
        self.upload
            .concurrency
            .unwrap_or(self.bot_tokens.len() * 2)
            .max(1)
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.bot_tokens.is_empty() {
            return Err(Error::Config(
                "At least one bot token is required (TELEGRAM_BOT_TOKENS)".to_string(),
            ));
        }

        if let Some(token) = self
            .bot_tokens
            .iter()
            .find(|token| !token.expose().contains(':'))
        {
            return Err(Error::Config(format!(
                "Bot token {} is malformed; expected <bot id>:<secret>",
                token
            )));
        }

        if self.authorized_sessions.is_empty() {
            return Err(Error::Config(
                "At least one authorized session is required (CHAT_IDS)".to_string(),
            ));
        }

        if self.scan_root.as_os_str().is_empty() {
            return Err(Error::Config("Scan root cannot be empty".to_string()));
        }

        if self.restore_root.as_os_str().is_empty() {
            return Err(Error::Config("Restore root cannot be empty".to_string()));
        }

        if self.snapshot_path.file_name().is_none() {
            return Err(Error::Config(format!(
                "Snapshot path {} must name a file",
                self.snapshot_path.display()
            )));
        }

        if self.upload.concurrency == Some(0) {
            return Err(Error::Config(
                "Upload concurrency must be greater than 0".to_string(),
            ));
        }

        if self.upload.max_attempts == 0 {
            return Err(Error::Config(
                "Max attempts must be greater than 0".to_string(),
            ));
        }

        if self.upload.retry_base_delay > self.upload.retry_max_delay {
            return Err(Error::Config(
                "Retry base delay cannot exceed the retry cap".to_string(),
            ));
        }

        if self.upload.progress_interval.is_zero() {
            return Err(Error::Config(
                "Progress interval must be greater than 0".to_string(),
            ));
        }

        if self.upload.flush_every == 0 {
            return Err(Error::Config("Flush cadence must be at least 1".to_string()));
        }

        if self.scan_extensions.is_empty() {
            return Err(Error::Config(
                "At least one scan extension is required".to_string(),
            ));
        }

        Ok(())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("{} must be a non-negative integer, got {:?}", key, value)))
}

fn parse_secs(key: &str, value: &str) -> Result<Duration> {
    parse_number::<u64>(key, value).map(Duration::from_secs)
}

/// Builder for [`CoreConfig`].
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    bot_tokens: Vec<BotToken>,
    storage_channels: Vec<ChatId>,
    authorized_sessions: Vec<ChatId>,
    admin_chat: Option<ChatId>,
    scan_root: Option<PathBuf>,
    restore_root: Option<PathBuf>,
    snapshot_path: Option<PathBuf>,
    scan_extensions: Option<Vec<String>>,
    upload: Option<UploadSettings>,
    poll_timeout: Option<Duration>,
    shutdown_grace: Option<Duration>,
    logging: Option<LoggingConfig>,
}

impl CoreConfigBuilder {
    pub fn bot_token(mut self, token: impl Into<String>) -> Self {
        self.bot_tokens.push(BotToken::new(token));
        self
    }

    pub fn storage_channel(mut self, channel: impl Into<ChatId>) -> Self {
        let channel = channel.into();
        if !self.storage_channels.contains(&channel) {
            self.storage_channels.push(channel);
        }
        self
    }

    pub fn authorized_session(mut self, session: impl Into<ChatId>) -> Self {
        self.authorized_sessions.push(session.into());
        self
    }

    pub fn admin_chat(mut self, chat: impl Into<ChatId>) -> Self {
        self.admin_chat = Some(chat.into());
        self
    }

    pub fn scan_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.scan_root = Some(path.into());
        self
    }

    pub fn restore_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.restore_root = Some(path.into());
        self
    }

    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Extensions are normalized to lowercase without a leading dot.
    pub fn scan_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.scan_extensions = Some(
            extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        );
        self
    }

    pub fn upload_settings(mut self, settings: UploadSettings) -> Self {
        self.upload = Some(settings);
        self
    }

    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = Some(timeout);
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = Some(grace);
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Builds and validates the final `CoreConfig`.
    pub fn build(self) -> Result<CoreConfig> {
        let admin_chat = self.admin_chat.ok_or_else(|| {
            Error::Config("Admin chat is required. Use .admin_chat() or ADMIN_CHAT_ID.".to_string())
        })?;

        let scan_root = self.scan_root.ok_or_else(|| {
            Error::Config(
                "Scan root is required. Use .scan_root() or DEFAULT_DRIVE_PATH.".to_string(),
            )
        })?;

        let config = CoreConfig {
            bot_tokens: self.bot_tokens,
            storage_channels: self.storage_channels,
            authorized_sessions: self.authorized_sessions,
            admin_chat,
            scan_root,
            restore_root: self
                .restore_root
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RESTORE_PATH)),
            snapshot_path: self
                .snapshot_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_PATH)),
            scan_extensions: self.scan_extensions.unwrap_or_else(|| {
                DEFAULT_SCAN_EXTENSIONS
                    .iter()
                    .map(|ext| ext.to_string())
                    .collect()
            }),
            upload: self.upload.unwrap_or_default(),
            poll_timeout: self.poll_timeout.unwrap_or(Duration::from_secs(30)),
            shutdown_grace: self.shutdown_grace.unwrap_or(Duration::from_secs(30)),
            logging: self.logging.unwrap_or_default(),
        };

        config.validate()?;

        Ok(config)
    }
}
