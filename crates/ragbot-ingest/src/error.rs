//! Error types for ingestion.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Ai(#[from] ragbot_ai::AiError),

    #[error(transparent)]
    Store(#[from] ragbot_store::StoreError),

    #[error("feed fetch failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed XML parse error: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("feed date parse error: {0}")]
    Date(#[from] chrono::ParseError),

    #[error("source file error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IngestError>;
