//! # Host Bridge Traits
//!
//! Capability traits the backup engine depends on, with no knowledge of any
//! concrete platform.
//!
//! ## Traits
//!
//! - [`ChatTransport`](transport::ChatTransport) - Send/receive through one chat identity
//! - [`HttpClient`](http::HttpClient) - Single-attempt HTTP with multipart and streaming
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Local file I/O
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! must map platform failures onto its variants so callers can classify them:
//!
//! - throttling → `RateLimited { retry_after }`
//! - connect/reset/timeout → `Network`
//! - any other remote rejection → `Api { status, message }`
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so one instance can be
//! shared by many upload workers.

pub mod error;
pub mod http;
pub mod storage;
pub mod transport;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, MultipartForm, MultipartPart};
pub use storage::{FileMetadata, FileSystemAccess};
pub use transport::{
    Attachment, ChatId, ChatTransport, InboundEvent, KeyboardHint, MediaKind, MediaSource,
    TextOptions, UploadStream,
};
