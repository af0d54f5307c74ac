//! Knowledge ingestion: background embedding indexer and the two
//! automated chunk sources (line-per-chunk files and Yandex YML
//! catalog feeds). The admin bot is the third writer to the chunk
//! store and lives in the Telegram crate.

mod error;
mod file;
mod indexer;
mod yml;

pub use error::{IngestError, Result};
pub use file::FileSource;
pub use indexer::EmbeddingIndexer;
pub use yml::{upsert_action, UpsertAction, YmlFeedSource};
