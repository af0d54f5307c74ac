//! Error types for the AI provider layer.

use thiserror::Error;

/// Errors that can occur talking to an LLM provider.
#[derive(Debug, Error)]
pub enum AiError {
    /// Provider misconfigured (missing API key, unsupported operation).
    #[error("AI configuration error: {0}")]
    Configuration(String),

    /// HTTP transport failure.
    #[error("AI request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned a non-success status.
    #[error("AI API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Response body did not match the expected shape.
    #[error("AI response parse error: {0}")]
    ResponseParse(String),
}

/// Result type for AI operations.
pub type Result<T> = std::result::Result<T, AiError>;
