//! Error type for the conversation core.

use thiserror::Error;

/// Errors surfaced by the conversation engine.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Ai(#[from] ragbot_ai::AiError),

    #[error(transparent)]
    Store(#[from] ragbot_store::StoreError),

    #[error(transparent)]
    Crm(#[from] ragbot_crm::CrmError),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
