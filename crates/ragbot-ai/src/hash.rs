//! Deterministic hash-based embeddings for keyless operation.

use async_trait::async_trait;

use crate::error::{AiError, Result};
use crate::provider::AiProvider;

/// Default dimensionality, matching text-embedding-3-small.
pub const DEFAULT_DIMENSION: usize = 1536;

/// Keyless fallback provider.
///
/// Embeddings are derived from token hashes and normalized, so identical
/// texts always map to identical vectors and similar token sets land
/// close together. Generation and transcription have no offline analog
/// and report a configuration error.
#[derive(Debug, Clone)]
pub struct HashProvider {
    dimension: usize,
}

impl Default for HashProvider {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
        }
    }
}

impl HashProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

#[async_trait]
impl AiProvider for HashProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(hash_embedding(text, self.dimension))
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(AiError::Configuration(
            "text generation requires OPENAI_API_KEY".to_string(),
        ))
    }

    async fn transcribe(&self, _audio: &[u8], _format: &str) -> Result<String> {
        Err(AiError::Configuration(
            "transcription requires OPENAI_API_KEY".to_string(),
        ))
    }
}

/// Hash each lowercase token into a bucket and accumulate, then
/// L2-normalize. Not semantically meaningful, but stable and cheap.
fn hash_embedding(text: &str, dimension: usize) -> Vec<f32> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut vec = vec![0.0f32; dimension];
    for token in text.to_lowercase().split_whitespace() {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        let h = hasher.finish();
        let idx = (h % dimension as u64) as usize;
        let sign = if h & (1 << 63) == 0 { 1.0 } else { -1.0 };
        vec[idx] += sign;
    }

    let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vec {
            *v /= norm;
        }
    }
    vec
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embedding_is_deterministic() {
        let provider = HashProvider::new(64);
        let a = provider.embed("сальса для начинающих").await.unwrap();
        let b = provider.embed("сальса для начинающих").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn different_texts_differ() {
        let provider = HashProvider::new(64);
        let a = provider.embed("расписание занятий").await.unwrap();
        let b = provider.embed("стоимость абонемента").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn embedding_is_normalized() {
        let provider = HashProvider::new(64);
        let v = provider.embed("hip hop kids").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn generation_reports_configuration_error() {
        let provider = HashProvider::default();
        let err = provider.generate("prompt").await.unwrap_err();
        assert!(matches!(err, AiError::Configuration(_)));
    }
}
