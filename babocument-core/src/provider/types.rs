//! Common types for embedding providers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when interacting with a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Provider error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Provider trait for embedding backends.
///
/// Implementations must be deterministic: the same text and model always
/// produce the same vector, otherwise stored embeddings and query embeddings
/// stop being comparable.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short identifier of the backend (e.g. "ollama").
    fn name(&self) -> &str;

    /// Generate an embedding vector for the given text.
    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for several texts, in input order.
    ///
    /// The default implementation calls [`embed`](Self::embed) once per text.
    async fn embed_batch(&self, texts: &[&str], model: &str) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text, model).await?);
        }
        Ok(embeddings)
    }
}

/// Request for generating embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedRequest {
    pub model: String,
    pub input: Vec<String>,
}

/// Response containing embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub model: String,

    #[serde(default)]
    pub embeddings: Vec<Vec<f32>>,
}
