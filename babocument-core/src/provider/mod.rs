//! Embedding provider abstraction layer.
//!
//! This module defines a common interface for the backends that turn text
//! into vectors (an in-process fastembed model, Ollama over HTTP) and a
//! factory that picks one from configuration. The hashing embedder needs
//! no model and backs offline tests.

mod types;
pub mod fastembed;
pub mod hashing;
pub mod ollama;

// Re-export common types
pub use types::{EmbedRequest, EmbedResponse, Provider, ProviderError, Result};

// Re-export provider implementations
pub use self::fastembed::FastEmbedProvider;
pub use hashing::HashingProvider;
pub use ollama::OllamaProvider;

use crate::config::{EmbeddingBackend, EmbeddingConfig};
use std::path::PathBuf;
use std::sync::Arc;

/// Creates the embedding provider named by the configuration.
///
/// For fastembed the model is loaded here, and its width must equal
/// `config.dimension`.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn Provider>> {
    match config.provider {
        EmbeddingBackend::FastEmbed => {
            let (_, dimension) = self::fastembed::resolve_model(&config.model)?;
            check_dimension(&config.model, dimension, config.dimension)?;
            let cache_dir = config.cache_dir.as_ref().map(PathBuf::from);
            Ok(Arc::new(FastEmbedProvider::new(&config.model, cache_dir)?))
        }
        EmbeddingBackend::Ollama => Ok(Arc::new(OllamaProvider::new(&config.base_url))),
    }
}

fn check_dimension(model: &str, model_dimension: usize, configured: usize) -> Result<()> {
    if model_dimension != configured {
        return Err(ProviderError::Other(format!(
            "Model {} produces {}-dimensional embeddings but embedding.dimension is {}",
            model, model_dimension, configured
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_follows_backend() {
        let config = EmbeddingConfig {
            provider: EmbeddingBackend::Ollama,
            ..EmbeddingConfig::default()
        };
        assert_eq!(create_provider(&config).unwrap().name(), "ollama");
    }

    #[test]
    fn test_fastembed_dimension_must_match_model() {
        let config = EmbeddingConfig {
            provider: EmbeddingBackend::FastEmbed,
            model: "bge-base-en-v1.5".to_string(),
            dimension: 384,
            ..EmbeddingConfig::default()
        };
        let err = create_provider(&config).err().unwrap();
        assert!(err.to_string().contains("768"));
    }

    #[test]
    fn test_fastembed_unknown_model_rejected() {
        let config = EmbeddingConfig {
            provider: EmbeddingBackend::FastEmbed,
            model: "no-such-model".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(matches!(create_provider(&config), Err(ProviderError::Other(_))));
    }

    #[test]
    #[ignore] // Downloads all-MiniLM-L6-v2 on first run
    fn test_create_default_provider() {
        let provider = create_provider(&EmbeddingConfig::default()).unwrap();
        assert_eq!(provider.name(), "fastembed");
    }
}
