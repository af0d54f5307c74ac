//! Provider trait and environment-based selection.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;
use crate::hash::HashProvider;
use crate::openai::OpenAiProvider;

/// Environment variable for the OpenAI API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable that forces the keyless hash provider.
pub const USE_LOCAL_MODEL_ENV: &str = "USE_LOCAL_MODEL";

/// Operations the core needs from an LLM provider.
///
/// All calls are blocking I/O boundaries; none of them is retried here.
/// Callers decide what a failure means (fatal for the answer composer,
/// skip-and-continue for the embedding indexer).
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Compute an embedding vector for `text`.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate a completion for a fully composed prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Transcribe a voice note. `format` is the container extension
    /// ("ogg", "mp3", ...).
    async fn transcribe(&self, audio: &[u8], format: &str) -> Result<String>;
}

/// Select a provider from environment variables.
///
/// `USE_LOCAL_MODEL=true` selects the hash provider (embeddings only);
/// otherwise `OPENAI_API_KEY` is required.
pub fn provider_from_env() -> Result<Arc<dyn AiProvider>> {
    if std::env::var(USE_LOCAL_MODEL_ENV).as_deref() == Ok("true") {
        warn!("USE_LOCAL_MODEL=true: using hash-based embeddings, generation disabled");
        return Ok(Arc::new(HashProvider::default()));
    }

    let api_key = std::env::var(OPENAI_API_KEY_ENV).map_err(|_| {
        crate::AiError::Configuration(format!("{} not set", OPENAI_API_KEY_ENV))
    })?;
    Ok(Arc::new(OpenAiProvider::new(api_key)?))
}
