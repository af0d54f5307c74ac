//! Error types for the transport layer.

use thiserror::Error;

/// Errors that can occur in the bots and the HTTP surface.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// A required environment variable is missing.
    #[error("{0} environment variable not set")]
    MissingEnv(&'static str),

    /// Malformed configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] ragbot_core::CoreError),

    #[error(transparent)]
    Store(#[from] ragbot_store::StoreError),

    #[error(transparent)]
    Ai(#[from] ragbot_ai::AiError),

    #[error(transparent)]
    Crm(#[from] ragbot_crm::CrmError),

    /// Telegram API failure.
    #[error("Telegram request failed: {0}")]
    Request(#[from] teloxide::RequestError),

    /// Telegram file download failure (voice notes).
    #[error("Telegram download failed: {0}")]
    Download(#[from] teloxide::DownloadError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TelegramError>;
