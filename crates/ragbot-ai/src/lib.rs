//! LLM provider abstraction for ragbot.
//!
//! The core consumes three operations: text embedding, text generation
//! and voice-note transcription. [`OpenAiProvider`] is the production
//! implementation; [`HashProvider`] is a deterministic keyless fallback
//! for embeddings (tests, offline indexing).

mod error;
mod hash;
mod openai;
mod provider;

pub use error::{AiError, Result};
pub use hash::HashProvider;
pub use openai::OpenAiProvider;
pub use provider::{provider_from_env, AiProvider};
