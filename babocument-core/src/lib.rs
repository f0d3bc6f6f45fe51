//! babocument-core - Vector document store for research papers
//!
//! Provides the building blocks for semantic paper search:
//! - Embedding provider abstraction (in-process fastembed, Ollama)
//! - Document store over an embedded LanceDB index
//! - Plain-text paper import
//! - Configuration management
//!
//! ## Primary API
//!
//! Users should interact with the collection via [`DocumentStore`].

// Public modules
pub mod config;
pub mod import;
pub mod patterns;
pub mod provider;
pub mod store;

// Public exports
pub use config::{Config, EmbeddingBackend, EmbeddingConfig, ImportConfig, StorageConfig, StorageMode};
pub use store::{
    DistanceMetric, DocumentMetadata, DocumentRecord, DocumentStore, DocumentView, SearchFilters,
    SearchResult, StoreError, StoreStats,
};

// Provider exports
pub use provider::{FastEmbedProvider, HashingProvider, OllamaProvider, Provider, ProviderError};
