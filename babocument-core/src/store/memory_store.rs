//! In-memory vector storage and search.
//!
//! A process-local index with exact linear-scan search. Contents are lost
//! when the process ends; used by `storage_mode: memory` and in tests.

use super::backend::{sort_by_distance, VectorStore};
use super::score::DistanceMetric;
use super::types::{ScoredDocument, SearchFilters, StoredDocument};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// An in-memory vector store for document embeddings.
///
/// Documents are keyed by id, so adding an existing id replaces it. Search is
/// O(n * d) over all documents that pass the filters.
#[derive(Clone)]
pub struct MemoryStore {
    documents: Arc<RwLock<HashMap<String, StoredDocument>>>,
    metric: DistanceMetric,
}

impl MemoryStore {
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            documents: Arc::new(RwLock::new(HashMap::new())),
            metric,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DistanceMetric::default())
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn upsert(&self, documents: Vec<StoredDocument>) -> Result<()> {
        let mut docs = self.documents.write().await;
        for document in documents {
            docs.insert(document.id.clone(), document);
        }
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<ScoredDocument>> {
        let docs = self.documents.read().await;

        let mut results: Vec<ScoredDocument> = docs
            .values()
            .filter(|doc| filters.matches(&doc.metadata))
            .map(|doc| ScoredDocument {
                distance: self.metric.distance(query_embedding, &doc.embedding),
                document: StoredDocument {
                    embedding: vec![],
                    ..doc.clone()
                },
            })
            .collect();

        sort_by_distance(&mut results);
        results.truncate(limit);
        Ok(results)
    }

    async fn get(&self, id: &str) -> Result<Option<StoredDocument>> {
        Ok(self.documents.read().await.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.documents.write().await.remove(id).is_some())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.documents.read().await.len())
    }

    async fn clear(&self) -> Result<()> {
        self.documents.write().await.clear();
        Ok(())
    }
}
