//! Embedding generation using providers.
//!
//! This module converts text into vector embeddings through a [`Provider`]
//! and enforces the dimension the index was created with.

use crate::provider::{Provider, ProviderError};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during embedding generation.
#[derive(Debug, Error)]
pub enum EmbedderError {
    /// The provider returned an error.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The response contained no embeddings.
    ///
    /// This typically indicates a problem with the model or request format.
    #[error("No embeddings returned")]
    NoEmbeddings,

    /// The provider answered a batch with the wrong number of vectors.
    #[error("Expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    /// A vector does not have the configured width.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedderError>;

/// Generates fixed-width embeddings with a configured model.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn Provider>,
    model: String,
    dimension: usize,
}

impl Embedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            provider,
            model: model.into(),
            dimension,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Generates a vector embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails or the vector does not have
    /// [`dimension`](Self::dimension) entries.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = self.provider.embed(text, &self.model).await?;
        self.check_dimension(&embedding)?;
        Ok(embedding)
    }

    /// Generates embeddings for a batch of texts, in input order.
    pub async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self.provider.embed_batch(texts, &self.model).await?;
        if embeddings.is_empty() {
            return Err(EmbedderError::NoEmbeddings);
        }
        if embeddings.len() != texts.len() {
            return Err(EmbedderError::CountMismatch {
                expected: texts.len(),
                actual: embeddings.len(),
            });
        }
        for embedding in &embeddings {
            self.check_dimension(embedding)?;
        }
        Ok(embeddings)
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(EmbedderError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        Ok(())
    }
}
