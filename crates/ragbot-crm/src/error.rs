//! Error types for the CRM client.

use thiserror::Error;

/// Errors that can occur while talking to the CRM.
#[derive(Debug, Error)]
pub enum CrmError {
    /// Transport-level failure (timeout, DNS, TLS).
    #[error("CRM request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("CRM API error {status}: {body}")]
    Api { status: u16, body: String },

    /// The contact creation response carried no contact.
    #[error("CRM created no contact")]
    NoContactCreated,

    /// The integration is not configured.
    #[error("CRM integration is not configured")]
    NotConfigured,
}

/// Result type for CRM operations.
pub type Result<T> = std::result::Result<T, CrmError>;
