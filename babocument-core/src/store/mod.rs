//! Research-paper document store.
//!
//! This module keeps a collection of papers in a vector index and answers
//! semantic queries over it.
//!
//! # Architecture
//!
//! - [`DocumentStore`]: the operations callers use (ingest, search, similar,
//!   lookup, delete, reset, stats)
//! - [`embedder`]: turns text into fixed-width vectors through a provider
//! - [`VectorStore`]: the index backend ([`LanceDbStore`] on disk,
//!   [`MemoryStore`] in-process)
//! - [`compose`]: what text gets embedded and what metadata gets stored
//!
//! # How It Works
//!
//! 1. **Ingest**: each paper's title and abstract (doubled) plus the start of
//!    its body are embedded in one batch and upserted by id
//! 2. **Search**: the query is embedded with the same model, the index returns
//!    the nearest documents that pass the metadata filters, and each raw
//!    distance `d` is reported as a similarity `1 / (1 + d)`

mod backend;
pub mod compose;
mod embedder;
mod lancedb_store;
mod memory_store;
mod score;
mod types;

pub use backend::{create_vector_store, VectorStore};
pub use embedder::{Embedder, EmbedderError};
pub use lancedb_store::LanceDbStore;
pub use memory_store::MemoryStore;
pub use score::{distance_to_similarity, DistanceMetric};
pub use types::{
    DocumentMetadata, DocumentRecord, DocumentView, ScoredDocument, SearchFilters, SearchResult,
    StoreStats, StoredDocument,
};

use crate::config::{Config, ConfigError, ImportConfig, StorageConfig};
use crate::import::{self, ImportError};
use crate::provider::{create_provider, Provider, ProviderError};
use compose::{compose_embedding_text, extract_metadata};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Papers embedded and upserted per batch during directory import.
pub const IMPORT_BATCH_SIZE: usize = 32;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Input rejected before anything was written.
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Embedding provider unavailable: {0}")]
    Provider(#[from] ProviderError),

    #[error("Embedding failed: {0}")]
    Embedder(#[from] EmbedderError),

    #[error("Import failed: {0}")]
    Import(#[from] ImportError),

    /// The index backend could not complete the operation.
    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A persistent, searchable collection of research papers.
///
/// Construct one per storage location and share it by reference or `Arc`;
/// every method takes `&self` and is safe to call from concurrent tasks.
/// Missing ids are never errors: lookups return `None`, deletes return
/// `false`, similarity queries return an empty list.
///
/// # Example
///
/// ```no_run
/// # use babocument_core::{Config, DocumentStore, store::{DocumentRecord, SearchFilters}};
/// # async fn example() -> babocument_core::store::Result<()> {
/// let store = DocumentStore::new(&Config::default()).await?;
///
/// let paper = DocumentRecord::new("paper2", "Hydrogel-Based Bioinks for 3D Printing")
///     .with_year(2022);
/// store.ingest(&[paper]).await?;
///
/// let filters = SearchFilters::new().with_year_min(2020);
/// for hit in store.search("bioink hydrogel printing", 5, &filters).await? {
///     println!("{:.2} {}", hit.similarity, hit.metadata.title);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DocumentStore {
    embedder: Embedder,
    index: Arc<dyn VectorStore>,
    storage: StorageConfig,
}

impl DocumentStore {
    /// Opens the store with the embedding provider named in `config`.
    ///
    /// With the default fastembed backend this loads the model, downloading
    /// it on first use.
    pub async fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let provider = create_provider(&config.embedding)?;
        Self::with_provider(config, provider).await
    }

    /// Opens the store with an explicit embedding provider.
    ///
    /// The index is opened, or created empty with the configured dimension.
    pub async fn with_provider(config: &Config, provider: Arc<dyn Provider>) -> Result<Self> {
        config.validate()?;

        let embedder = Embedder::new(
            provider,
            config.embedding.model.clone(),
            config.embedding.dimension,
        );
        let index = create_vector_store(&config.storage, config.embedding.dimension).await?;

        info!(
            location = %config.storage.storage_mode.location(),
            collection = %config.storage.collection_name,
            model = %config.embedding.model,
            "Document store ready"
        );

        Ok(Self::from_parts(embedder, index, config.storage.clone()))
    }

    /// Assembles a store from an existing embedder and index.
    pub fn from_parts(embedder: Embedder, index: Arc<dyn VectorStore>, storage: StorageConfig) -> Self {
        Self {
            embedder,
            index,
            storage,
        }
    }

    /// Result count to use when a caller has none.
    pub fn default_limit(&self) -> usize {
        self.storage.default_limit
    }

    /// Adds or replaces papers, keyed by id.
    ///
    /// The whole batch is validated before anything is embedded: every id must
    /// be non-empty and unique within the batch. Returns the number of papers
    /// written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] for a bad batch, otherwise
    /// propagates embedding and storage failures; a failed batch writes
    /// nothing.
    pub async fn ingest(&self, documents: &[DocumentRecord]) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }
        validate_batch(documents)?;

        let texts: Vec<String> = documents.iter().map(compose_embedding_text).collect();
        let text_refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();

        debug!(count = documents.len(), "Embedding documents");
        let embeddings = self.embedder.embed_batch(&text_refs).await?;

        let stored: Vec<StoredDocument> = documents
            .iter()
            .zip(texts)
            .zip(embeddings)
            .map(|((record, text), embedding)| StoredDocument {
                id: record.id.clone(),
                text,
                metadata: extract_metadata(record),
                embedding,
            })
            .collect();

        let count = stored.len();
        self.index.upsert(stored).await?;

        info!(count, "Ingested documents");
        Ok(count)
    }

    /// Finds the papers closest in meaning to `query`.
    ///
    /// Results come closest first, at most `limit` of them, each restricted by
    /// `filters`. An empty store or a zero limit gives an empty list.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let count = self.index.count().await?;
        if count == 0 {
            debug!("Store is empty, returning no results");
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await?;
        debug!(limit, filtered = !filters.is_empty(), "Searching documents");

        let hits = self.index.search(&query_embedding, limit, filters).await?;
        Ok(hits.into_iter().map(to_search_result).collect())
    }

    /// Finds the papers closest to an already-stored paper.
    ///
    /// The seed paper itself is never part of the result. An unknown id gives
    /// an empty list.
    pub async fn find_similar(&self, id: &str, limit: usize) -> Result<Vec<SearchResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let Some(seed) = self.index.get(id).await? else {
            debug!(id = %id, "Seed document not found");
            return Ok(Vec::new());
        };

        // One extra hit makes room for the seed, which is always closest
        let hits = self
            .index
            .search(&seed.embedding, limit + 1, &SearchFilters::default())
            .await?;

        Ok(hits
            .into_iter()
            .filter(|hit| hit.document.id != id)
            .take(limit)
            .map(to_search_result)
            .collect())
    }

    /// Looks up one paper by id.
    pub async fn get_document(&self, id: &str) -> Result<Option<DocumentView>> {
        Ok(self.index.get(id).await?.map(DocumentView::from))
    }

    /// Removes one paper. Returns `false` if the id was not stored.
    pub async fn delete_document(&self, id: &str) -> Result<bool> {
        let deleted = self.index.delete(id).await?;
        if deleted {
            info!(id = %id, "Deleted document");
        } else {
            debug!(id = %id, "Nothing to delete");
        }
        Ok(deleted)
    }

    /// Removes every paper and re-creates an empty collection.
    ///
    /// Safe to call repeatedly; the store stays usable afterwards.
    pub async fn reset(&self) -> Result<()> {
        warn!(collection = %self.storage.collection_name, "Resetting document store");
        self.index.clear().await?;
        Ok(())
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            total_documents: self.index.count().await?,
            embedding_model: self.embedder.model().to_string(),
            embedding_dimension: self.embedder.dimension(),
            storage_path: self.storage.storage_mode.location().to_string(),
            collection_name: self.storage.collection_name.clone(),
            distance: self.storage.distance.to_string(),
        })
    }

    /// Imports every paper text file under `dir_path`.
    ///
    /// Each file becomes one paper (see [`import::parse_paper`]), ingested
    /// [`IMPORT_BATCH_SIZE`] at a time. Empty files are skipped. Returns the
    /// number of papers written.
    pub async fn import_directory(&self, dir_path: &Path, config: &ImportConfig) -> Result<usize> {
        let files = import::collect_files(dir_path, config).await?;
        info!(count = files.len(), dir = %dir_path.display(), "Found paper files");

        let mut imported = 0;
        let mut batch = Vec::with_capacity(IMPORT_BATCH_SIZE);

        for file in files {
            if file.content.trim().is_empty() {
                warn!(file = %file.path.display(), "Skipping empty file");
                continue;
            }

            debug!(file = %file.path.display(), "Parsing paper");
            batch.push(import::parse_paper(&file.path, &file.content));

            if batch.len() >= IMPORT_BATCH_SIZE {
                imported += self.ingest(&batch).await?;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            imported += self.ingest(&batch).await?;
        }

        info!(count = imported, "Import complete");
        Ok(imported)
    }
}

fn validate_batch(documents: &[DocumentRecord]) -> Result<()> {
    let mut seen = HashSet::with_capacity(documents.len());
    for (position, document) in documents.iter().enumerate() {
        if document.id.trim().is_empty() {
            return Err(StoreError::Validation(format!(
                "document at position {} has an empty id",
                position
            )));
        }
        if !seen.insert(document.id.as_str()) {
            return Err(StoreError::Validation(format!(
                "duplicate id in batch: {}",
                document.id
            )));
        }
    }
    Ok(())
}

fn to_search_result(hit: ScoredDocument) -> SearchResult {
    SearchResult {
        id: hit.document.id,
        similarity: distance_to_similarity(hit.distance),
        text: hit.document.text,
        metadata: hit.document.metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmbeddingBackend, StorageMode};
    use crate::provider::HashingProvider;
    use tempfile::TempDir;

    fn memory_config() -> Config {
        let mut config = Config::default();
        config.storage.storage_mode = StorageMode::Memory;
        config.storage.collection_name = "test_papers".to_string();
        config
    }

    async fn memory_store() -> DocumentStore {
        let config = memory_config();
        let provider = Arc::new(HashingProvider::new(config.embedding.dimension));
        DocumentStore::with_provider(&config, provider).await.unwrap()
    }

    fn sample_papers() -> Vec<DocumentRecord> {
        vec![
            DocumentRecord::new("paper1", "CRISPR Gene Editing in Bioink Scaffolds")
                .with_abstract("We demonstrate CRISPR-Cas9 gene editing capabilities in 3D bioprinted scaffolds for tissue engineering applications.")
                .with_authors(["Smith, J.", "Johnson, A."])
                .with_year(2023)
                .with_source("test")
                .with_doi("10.1234/test.001"),
            DocumentRecord::new("paper2", "Hydrogel-Based Bioinks for 3D Printing")
                .with_abstract("Novel hydrogel formulations for improved printability and cell encapsulation in bioprinting.")
                .with_authors(["Lee, K.", "Wang, M."])
                .with_year(2022)
                .with_source("test"),
            DocumentRecord::new("paper3", "Neural Network Applications in Manufacturing")
                .with_abstract("Machine learning approaches for optimizing manufacturing processes using neural networks.")
                .with_authors(["Brown, R."])
                .with_year(2024)
                .with_source("test")
                .with_arxiv_id("2401.12345"),
        ]
    }

    #[tokio::test]
    async fn test_ingest_empty_batch() {
        let store = memory_store().await;
        assert_eq!(store.ingest(&[]).await.unwrap(), 0);
        assert_eq!(store.stats().await.unwrap().total_documents, 0);
    }

    #[tokio::test]
    async fn test_ingest_rejects_whole_batch() {
        let store = memory_store().await;

        let batch = vec![DocumentRecord::new("ok", "Fine"), DocumentRecord::new("  ", "No id")];
        let err = store.ingest(&batch).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let batch = vec![DocumentRecord::new("dup", "One"), DocumentRecord::new("dup", "Two")];
        let err = store.ingest(&batch).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        assert_eq!(store.stats().await.unwrap().total_documents, 0);
    }

    #[tokio::test]
    async fn test_ingest_round_trips_metadata() {
        let store = memory_store().await;
        assert_eq!(store.ingest(&sample_papers()).await.unwrap(), 3);

        let view = store.get_document("paper1").await.unwrap().unwrap();
        assert_eq!(view.metadata.title, "CRISPR Gene Editing in Bioink Scaffolds");
        assert_eq!(view.metadata.authors.as_deref(), Some("Smith, J., Johnson, A."));
        assert_eq!(view.metadata.year, Some(2023));
        assert_eq!(view.metadata.doi.as_deref(), Some("10.1234/test.001"));
        assert!(view.text.starts_with("CRISPR Gene Editing in Bioink Scaffolds CRISPR Gene Editing"));

        let view = store.get_document("paper3").await.unwrap().unwrap();
        assert_eq!(view.metadata.arxiv_id.as_deref(), Some("2401.12345"));
        assert!(view.metadata.doi.is_none());
    }

    #[tokio::test]
    async fn test_reingest_replaces_by_id() {
        let store = memory_store().await;
        store.ingest(&sample_papers()).await.unwrap();

        let updated = DocumentRecord::new("paper2", "Revised Title").with_year(2025);
        store.ingest(&[updated]).await.unwrap();

        assert_eq!(store.stats().await.unwrap().total_documents, 3);
        let view = store.get_document("paper2").await.unwrap().unwrap();
        assert_eq!(view.metadata.title, "Revised Title");
        assert_eq!(view.metadata.source, compose::DEFAULT_SOURCE);
    }

    #[tokio::test]
    async fn test_search_ranks_related_papers_first() {
        let store = memory_store().await;
        store.ingest(&sample_papers()).await.unwrap();

        let results = store
            .search("bioink hydrogel printing", 3, &SearchFilters::default())
            .await
            .unwrap();

        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["paper2", "paper1", "paper3"]);
        assert!(results.windows(2).all(|w| w[0].similarity > w[1].similarity));
        for result in &results {
            assert!(result.similarity > 0.0 && result.similarity <= 1.0);
        }
    }

    #[tokio::test]
    async fn test_find_similar_ranks_by_closeness() {
        let store = memory_store().await;
        store.ingest(&sample_papers()).await.unwrap();

        let results = store.find_similar("paper1", 5).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["paper2", "paper3"]);
        assert!(results[0].similarity > results[1].similarity);
    }

    #[tokio::test]
    async fn test_search_exact_text_scores_one() {
        let store = memory_store().await;
        store.ingest(&[DocumentRecord::new("only", "Bioink printability")]).await.unwrap();

        // the stored text is the title twice
        let results = store
            .search("Bioink printability Bioink printability", 1, &SearchFilters::default())
            .await
            .unwrap();
        assert!((results[0].similarity - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_search_year_filter_conjunction() {
        let store = memory_store().await;
        store.ingest(&sample_papers()).await.unwrap();
        store
            .ingest(&[DocumentRecord::new("undated", "Bioink without a year").with_source("test")])
            .await
            .unwrap();

        let filters = SearchFilters::new().with_year_min(2023).with_year_max(2023);
        let results = store.search("bioink", 10, &filters).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["paper1"]);

        let filters = SearchFilters::new().with_year_min(2023);
        let results = store.search("bioink", 10, &filters).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.metadata.year.is_some_and(|y| y >= 2023)));

        let filters = SearchFilters::new().with_source("elsewhere");
        assert!(store.search("bioink", 10, &filters).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_empty_store_and_zero_limit() {
        let store = memory_store().await;
        assert!(store.search("anything", 5, &SearchFilters::default()).await.unwrap().is_empty());

        store.ingest(&sample_papers()).await.unwrap();
        assert!(store.search("bioink", 0, &SearchFilters::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_similar_excludes_seed_for_every_limit() {
        let store = memory_store().await;
        store.ingest(&sample_papers()).await.unwrap();

        for limit in 0..5 {
            let results = store.find_similar("paper1", limit).await.unwrap();
            assert!(results.len() <= limit);
            assert_eq!(results.len(), limit.min(2));
            assert!(results.iter().all(|r| r.id != "paper1"));
        }
    }

    #[tokio::test]
    async fn test_find_similar_unknown_id() {
        let store = memory_store().await;
        store.ingest(&sample_papers()).await.unwrap();
        assert!(store.find_similar("missing", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_then_get() {
        let store = memory_store().await;
        store.ingest(&sample_papers()).await.unwrap();

        assert!(store.delete_document("paper3").await.unwrap());
        assert!(store.get_document("paper3").await.unwrap().is_none());
        assert!(!store.delete_document("paper3").await.unwrap());
        assert_eq!(store.stats().await.unwrap().total_documents, 2);
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let store = memory_store().await;
        store.ingest(&sample_papers()).await.unwrap();

        store.reset().await.unwrap();
        store.reset().await.unwrap();
        assert_eq!(store.stats().await.unwrap().total_documents, 0);
        assert!(store.get_document("paper1").await.unwrap().is_none());

        assert_eq!(store.ingest(&sample_papers()[..1]).await.unwrap(), 1);
        assert_eq!(store.stats().await.unwrap().total_documents, 1);
    }

    #[tokio::test]
    async fn test_stats_reports_configuration() {
        let store = memory_store().await;
        let stats = store.stats().await.unwrap();

        assert_eq!(stats.embedding_model, "all-minilm");
        assert_eq!(stats.embedding_dimension, 384);
        assert_eq!(stats.storage_path, ":memory:");
        assert_eq!(stats.collection_name, "test_papers");
        assert_eq!(stats.distance, "l2");
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_embedder_error() {
        let config = memory_config();
        let store = DocumentStore::with_provider(&config, Arc::new(HashingProvider::new(8)))
            .await
            .unwrap();

        let err = store.ingest(&sample_papers()).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Embedder(EmbedderError::DimensionMismatch { expected: 384, actual: 8 })
        ));
        assert_eq!(store.stats().await.unwrap().total_documents, 0);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = memory_config();
        config.embedding.dimension = 0;
        let result = DocumentStore::new(&config).await;
        assert!(matches!(result, Err(StoreError::Config(_))));

        let result = DocumentStore::with_provider(&config, Arc::new(HashingProvider::new(0))).await;
        assert!(matches!(result, Err(StoreError::Config(_))));
    }

    #[tokio::test]
    async fn test_unknown_fastembed_model_is_provider_error() {
        let mut config = memory_config();
        config.embedding.provider = EmbeddingBackend::FastEmbed;
        config.embedding.model = "no-such-model".to_string();
        let result = DocumentStore::new(&config).await;
        assert!(matches!(result, Err(StoreError::Provider(_))));
    }

    #[tokio::test]
    async fn test_ollama_backend_opens_without_server() {
        let mut config = memory_config();
        config.embedding.provider = EmbeddingBackend::Ollama;
        let store = DocumentStore::new(&config).await.unwrap();
        assert_eq!(store.stats().await.unwrap().total_documents, 0);
    }

    #[tokio::test]
    async fn test_import_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("hydrogel_bioinks.txt"),
            "Hydrogel-Based Bioinks for 3D Printing\n\nNovel hydrogel formulations for improved printability.",
        )
        .unwrap();
        std::fs::write(dir.path().join("blank.txt"), "   \n").unwrap();
        std::fs::write(dir.path().join("notes.csv"), "not a paper").unwrap();

        let store = memory_store().await;
        let imported = store
            .import_directory(dir.path(), &ImportConfig::default())
            .await
            .unwrap();
        assert_eq!(imported, 1);

        let view = store.get_document("hydrogel_bioinks").await.unwrap().unwrap();
        assert_eq!(view.metadata.title, "Hydrogel-Based Bioinks for 3D Printing");
        assert_eq!(view.metadata.source, import::LOCAL_SOURCE);
        assert!(view.metadata.file_path.unwrap().ends_with("hydrogel_bioinks.txt"));
    }
}
