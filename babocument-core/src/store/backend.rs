//! Vector store abstraction and factory.
//!
//! This module provides a unified interface for the index backends the
//! document store can sit on.

use super::lancedb_store::LanceDbStore;
use super::memory_store::MemoryStore;
use super::score::DistanceMetric;
use super::types::{ScoredDocument, SearchFilters, StoredDocument};
use crate::config::{StorageConfig, StorageMode};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Unified interface for vector index operations.
///
/// Implementations hold exactly one embedding per id and must be safe to call
/// from several tasks; a write is visible to every later read on the same
/// handle.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Inserts or replaces documents keyed by id.
    async fn upsert(&self, documents: Vec<StoredDocument>) -> Result<()>;

    /// Returns up to `limit` documents matching `filters`, closest first.
    ///
    /// Distances are raw values of the backend's metric; returned documents
    /// carry no embedding.
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<ScoredDocument>>;

    /// Fetches one document including its embedding.
    async fn get(&self, id: &str) -> Result<Option<StoredDocument>>;

    /// Removes a document. Returns `false` if the id was not present.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Returns the total number of documents in the store.
    async fn count(&self) -> Result<usize>;

    /// Drops every document and re-creates an empty collection.
    async fn clear(&self) -> Result<()>;
}

/// Creates a vector store instance based on the storage mode.
///
/// - `Embedded` mode uses LanceDB in a local directory, created if absent
/// - `Memory` mode keeps everything in-process
pub async fn create_vector_store(
    storage_config: &StorageConfig,
    dimension: usize,
) -> Result<Arc<dyn VectorStore>> {
    let metric = storage_config.distance;
    match &storage_config.storage_mode {
        StorageMode::Embedded { path } => {
            let store = LanceDbStore::new(
                path,
                &storage_config.collection_name,
                dimension,
                metric,
            ).await?;
            Ok(Arc::new(store))
        }
        StorageMode::Memory => Ok(Arc::new(MemoryStore::new(metric))),
    }
}

/// Sorts hits closest first, ties broken by id so results are reproducible.
pub(crate) fn sort_by_distance(hits: &mut [ScoredDocument]) {
    hits.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.document.id.cmp(&b.document.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::DocumentMetadata;

    fn hit(id: &str, distance: f32) -> ScoredDocument {
        ScoredDocument {
            document: StoredDocument {
                id: id.to_string(),
                text: String::new(),
                metadata: DocumentMetadata::default(),
                embedding: vec![],
            },
            distance,
        }
    }

    #[test]
    fn test_sort_by_distance_with_ties() {
        let mut hits = vec![hit("c", 0.5), hit("b", 0.1), hit("a", 0.5)];
        sort_by_distance(&mut hits);
        let ids: Vec<&str> = hits.iter().map(|h| h.document.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_create_memory_store() {
        let config = StorageConfig {
            storage_mode: StorageMode::Memory,
            ..StorageConfig::default()
        };
        let store = create_vector_store(&config, 4).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
