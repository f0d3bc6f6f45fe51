//! Local sentence-embedding provider backed by `fastembed`.
//!
//! Runs ONNX sentence-transformer models in-process. Model files are
//! downloaded into the cache directory on first use; after that no network is
//! needed.

use super::types::*;
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Resolves a configured model name to a fastembed model and its width.
///
/// Accepts the Ollama-style short names used elsewhere in the config
/// (`all-minilm`) as well as the sentence-transformers names.
pub fn resolve_model(name: &str) -> Result<(EmbeddingModel, usize)> {
    let resolved = match name.to_ascii_lowercase().as_str() {
        "all-minilm" | "all-minilm-l6-v2" | "sentence-transformers/all-minilm-l6-v2" => {
            (EmbeddingModel::AllMiniLML6V2, 384)
        }
        "bge-small-en-v1.5" | "baai/bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384),
        "bge-base-en-v1.5" | "baai/bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, 768),
        "bge-large-en-v1.5" | "baai/bge-large-en-v1.5" => (EmbeddingModel::BGELargeENV15, 1024),
        "nomic-embed-text" | "nomic-embed-text-v1.5" => (EmbeddingModel::NomicEmbedTextV15, 768),
        "paraphrase-multilingual-minilm-l12-v2" => (EmbeddingModel::ParaphraseMLMiniLML12V2, 384),
        _ => {
            return Err(ProviderError::Other(format!(
                "Unsupported fastembed model: {}",
                name
            )))
        }
    };
    Ok(resolved)
}

/// In-process embedding model.
///
/// The model sits behind an async mutex; clones share one loaded model.
#[derive(Clone)]
pub struct FastEmbedProvider {
    model: Arc<Mutex<TextEmbedding>>,
    model_name: String,
    dimension: usize,
}

impl FastEmbedProvider {
    /// Loads `model_name`, downloading it into `cache_dir` if needed.
    ///
    /// # Errors
    ///
    /// Fails for an unknown model name or if the model cannot be loaded.
    pub fn new(model_name: &str, cache_dir: Option<PathBuf>) -> Result<Self> {
        let (model_type, dimension) = resolve_model(model_name)?;

        let mut init_options = InitOptions::new(model_type);
        if let Some(dir) = cache_dir {
            init_options = init_options.with_cache_dir(dir);
        }

        let text_embedding = TextEmbedding::try_new(init_options)
            .map_err(|e| ProviderError::Other(format!("Failed to initialize fastembed model: {}", e)))?;

        info!(model = %model_name, dimension, "fastembed model loaded");

        Ok(Self {
            model: Arc::new(Mutex::new(text_embedding)),
            model_name: model_name.to_string(),
            dimension,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .finish()
    }
}

#[async_trait]
impl Provider for FastEmbedProvider {
    fn name(&self) -> &str {
        "fastembed"
    }

    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text], model)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Other("No embeddings returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str], _model: &str) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let inputs: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        let mut model = self.model.lock().await;
        model
            .embed(inputs, None)
            .map_err(|e| ProviderError::Other(format!("Embedding generation failed: {}", e)))
    }
}
