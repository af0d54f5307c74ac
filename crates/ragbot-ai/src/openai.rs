//! OpenAI API client: embeddings, chat completions, transcription.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AiError, Result};
use crate::provider::AiProvider;

/// Embedding model used for both indexing and queries. The nearest
/// neighbor metric only makes sense if every vector in the store came
/// from the same model.
pub const EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Chat model used for answer generation and dialogue digests.
pub const CHAT_MODEL: &str = "gpt-4o-mini";

/// Transcription model for voice notes.
pub const TRANSCRIPTION_MODEL: &str = "whisper-1";

const EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const TRANSCRIPTIONS_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Per-request timeout. The upstream has none; an unbounded LLM call
/// would stall a chat turn indefinitely under provider degradation.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const MAX_TOKENS: u32 = 1024;
const TEMPERATURE: f32 = 0.2;

/// OpenAI-backed provider.
#[derive(Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
        })
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: EMBEDDING_MODEL,
            input: text,
        };

        let response = self
            .client
            .post(EMBEDDINGS_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = self.check(response).await?;

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AiError::ResponseParse(e.to_string()))?;

        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| AiError::ResponseParse("empty embedding data".to_string()))
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: CHAT_MODEL,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = self.check(response).await?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| AiError::ResponseParse(e.to_string()))?;

        debug!(
            tokens = body.usage.as_ref().map_or(0, |u| u.total_tokens),
            "Chat completion received"
        );

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .ok_or_else(|| AiError::ResponseParse("empty chat choices".to_string()))
    }

    async fn transcribe(&self, audio: &[u8], format: &str) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name(format!("voice.{}", format))
            .mime_str("application/octet-stream")
            .map_err(|e| AiError::Configuration(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .text("model", TRANSCRIPTION_MODEL)
            .part("file", part);

        let response = self
            .client
            .post(TRANSCRIPTIONS_URL)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        let response = self.check(response).await?;

        let body: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| AiError::ResponseParse(e.to_string()))?;
        Ok(body.text)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_construction_succeeds() {
        assert!(OpenAiProvider::new("sk-test").is_ok());
    }

    #[test]
    fn chat_request_serializes() {
        let request = ChatRequest {
            model: CHAT_MODEL,
            messages: vec![ChatMessage {
                role: "user",
                content: "Вопрос: привет\nОтвет:\n",
            }],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(CHAT_MODEL));
        assert!(json.contains("привет"));
    }

    #[test]
    fn chat_response_deserializes() {
        let json = r#"{
            "choices": [{"message": {"role": "assistant", "content": "Здравствуйте!"}}],
            "usage": {"total_tokens": 12}
        }"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            response.choices[0].message.content.as_deref(),
            Some("Здравствуйте!")
        );
    }

    #[test]
    fn embedding_response_deserializes() {
        let json = r#"{"data": [{"embedding": [0.1, -0.2, 0.3]}]}"#;
        let response: EmbeddingResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.data[0].embedding.len(), 3);
    }
}
