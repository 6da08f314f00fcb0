//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (chat transports and
//! filesystem) into the backup engine. Desktop builds enable the
//! `desktop-shims` feature, which builds the dependencies from `bridge-desktop`
//! and one Telegram transport per configured bot token.

pub mod error;
pub mod reports;
pub mod service;

pub use error::{Result, ServiceError};
pub use service::{ServiceDependencies, ShutdownReport, TeleCloudService};

#[cfg(feature = "desktop-shims")]
use std::sync::Arc;

#[cfg(feature = "desktop-shims")]
use bridge_traits::{ChatTransport, HttpClient};
#[cfg(feature = "desktop-shims")]
use core_runtime::config::CoreConfig;

/// Build a service backed by desktop bridges and the Telegram Bot API.
///
/// ```ignore
/// use core_service::bootstrap;
///
/// let config = CoreConfig::from_env()?;
/// let service = bootstrap(config)?;
/// service.start().await?;
/// ```
#[cfg(feature = "desktop-shims")]
pub fn bootstrap(config: CoreConfig) -> Result<TeleCloudService> {
    use bridge_desktop::{ReqwestHttpClient, TokioFileSystem};
    use provider_telegram::TelegramBotClient;

    let http_client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new()?);
    let transports = config
        .bot_tokens
        .iter()
        .map(|token| {
            Arc::new(TelegramBotClient::new(
                Arc::clone(&http_client),
                token.expose(),
            )) as Arc<dyn ChatTransport>
        })
        .collect();

    TeleCloudService::new(
        config,
        ServiceDependencies {
            transports,
            file_system: Arc::new(TokioFileSystem::new()),
        },
    )
}
