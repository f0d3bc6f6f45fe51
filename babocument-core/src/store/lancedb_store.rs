//! LanceDB vector database storage implementation.
//!
//! This module provides integration with LanceDB for embedded, in-process,
//! persistent vector storage. One table holds the whole collection; every
//! metadata field is its own scalar column so filters run inside the query.

use super::backend::{sort_by_distance, VectorStore};
use super::score::DistanceMetric;
use super::types::{DocumentMetadata, ScoredDocument, SearchFilters, StoredDocument};
use anyhow::{bail, Context, Result};
use arrow_array::{
    array::{ArrayRef, FixedSizeListArray, Float32Array, Int32Array, StringArray},
    Array, RecordBatch, RecordBatchIterator,
};
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use lancedb::arrow::arrow_schema::{DataType, Field, Schema};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType, Table};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

const VECTOR_COLUMN: &str = "vector";
const DISTANCE_COLUMN: &str = "_distance";

/// LanceDB-based vector store for embedded deployment.
///
/// The table handle sits behind an async `RwLock`: reads and writes share it,
/// `clear` takes it exclusively while the table is dropped and re-created.
pub struct LanceDbStore {
    conn: Connection,
    table: RwLock<Table>,
    table_name: String,
    dimension: usize,
    metric: DistanceMetric,
}

#[async_trait]
impl VectorStore for LanceDbStore {
    async fn upsert(&self, documents: Vec<StoredDocument>) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let batch = self.to_record_batch(&documents)?;
        let schema_ref = batch.schema();
        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema_ref);

        let table = self.table.read().await;
        let mut merge = table.merge_insert(&["id"]);
        merge.when_matched_update_all(None).when_not_matched_insert_all();
        merge
            .execute(Box::new(reader))
            .await
            .context("Failed to upsert documents into LanceDB")?;

        debug!(count = documents.len(), table = %self.table_name, "Upserted documents");
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<ScoredDocument>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let table = self.table.read().await;
        let mut query = table
            .query()
            .nearest_to(query_embedding)?
            .column(VECTOR_COLUMN)
            .distance_type(distance_type(self.metric))
            .limit(limit);

        if let Some(predicate) = filter_predicate(filters) {
            debug!(predicate = %predicate, "Applying metadata filter");
            query = query.only_if(predicate);
        }

        let batches: Vec<RecordBatch> = query
            .execute()
            .await
            .context("Failed to execute LanceDB query")?
            .try_collect()
            .await
            .context("Failed to collect query results")?;

        let mut results = Vec::new();
        for batch in &batches {
            let distance_col = batch.column_by_name(DISTANCE_COLUMN)
                .context("Missing '_distance' column")?;
            let distance_array = distance_col.as_any().downcast_ref::<Float32Array>()
                .context("Failed to cast '_distance' to Float32Array")?;

            for (row, document) in decode_batch(batch, false)?.into_iter().enumerate() {
                results.push(ScoredDocument {
                    document,
                    distance: distance_array.value(row),
                });
            }
        }

        sort_by_distance(&mut results);
        results.truncate(limit);
        Ok(results)
    }

    async fn get(&self, id: &str) -> Result<Option<StoredDocument>> {
        let table = self.table.read().await;
        let batches: Vec<RecordBatch> = table
            .query()
            .only_if(format!("id = {}", quote(id)))
            .limit(1)
            .execute()
            .await
            .context("Failed to query document by id")?
            .try_collect()
            .await
            .context("Failed to collect query results")?;

        for batch in &batches {
            if let Some(document) = decode_batch(batch, true)?.into_iter().next() {
                return Ok(Some(document));
            }
        }
        Ok(None)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let predicate = format!("id = {}", quote(id));
        let table = self.table.read().await;

        let existing = table
            .count_rows(Some(predicate.clone()))
            .await
            .context("Failed to count documents by id")?;
        if existing == 0 {
            return Ok(false);
        }

        table
            .delete(&predicate)
            .await
            .context("Failed to delete document")?;
        Ok(true)
    }

    async fn count(&self) -> Result<usize> {
        let count = self.table.read().await.count_rows(None).await?;
        Ok(count)
    }

    async fn clear(&self) -> Result<()> {
        let mut table = self.table.write().await;

        let table_names = self.conn.table_names().execute().await?;
        if table_names.contains(&self.table_name) {
            self.conn
                .drop_table(&self.table_name, &[])
                .await
                .context("Failed to drop table")?;
        }

        let schema = Self::create_schema(self.dimension);
        *table = self.conn
            .create_empty_table(&self.table_name, schema)
            .execute()
            .await
            .context("Failed to recreate table")?;

        info!(table = %self.table_name, "LanceDB table re-created");
        Ok(())
    }
}

impl LanceDbStore {
    fn create_schema(dimension: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new(
                VECTOR_COLUMN,
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension as i32,
                ),
                false,
            ),
            Field::new("title", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("authors", DataType::Utf8, true),
            Field::new("year", DataType::Int32, true),
            Field::new("doi", DataType::Utf8, true),
            Field::new("arxiv_id", DataType::Utf8, true),
            Field::new("file_path", DataType::Utf8, true),
        ]))
    }

    /// Opens the LanceDB table in `path`, creating directory and table if needed.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory path where LanceDB should store data
    /// * `table_name` - Name of the table to use
    /// * `dimension` - Width of the embedding vectors
    /// * `metric` - Distance used for nearest-neighbor search
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created, or if an existing table was
    /// built for a different embedding dimension.
    pub async fn new(
        path: &str,
        table_name: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<Self> {
        tokio::fs::create_dir_all(path)
            .await
            .with_context(|| format!("Failed to create storage directory {}", path))?;

        let conn = connect(path)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        let table_names = conn.table_names().execute().await?;

        let table = if table_names.iter().any(|name| name == table_name) {
            let table = conn.open_table(table_name)
                .execute()
                .await
                .context("Failed to open LanceDB table")?;
            verify_dimension(&table, dimension).await?;
            table
        } else {
            let schema = Self::create_schema(dimension);

            conn.create_empty_table(table_name, schema)
                .execute()
                .await
                .context("Failed to create LanceDB table")?
        };

        info!(path = %path, table = %table_name, dimension, "LanceDB store ready");

        Ok(Self {
            conn,
            table: RwLock::new(table),
            table_name: table_name.to_string(),
            dimension,
            metric,
        })
    }

    fn to_record_batch(&self, documents: &[StoredDocument]) -> Result<RecordBatch> {
        for document in documents {
            if document.embedding.len() != self.dimension {
                bail!(
                    "Embedding for '{}' has {} dimensions, table expects {}",
                    document.id,
                    document.embedding.len(),
                    self.dimension
                );
            }
        }

        let schema = Self::create_schema(self.dimension);

        let id_array = StringArray::from(documents.iter().map(|d| d.id.as_str()).collect::<Vec<_>>());
        let text_array = StringArray::from(documents.iter().map(|d| d.text.as_str()).collect::<Vec<_>>());

        let vector_values = Float32Array::from(
            documents
                .iter()
                .flat_map(|d| d.embedding.iter().copied())
                .collect::<Vec<f32>>(),
        );
        let vector_array = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            self.dimension as i32,
            Arc::new(vector_values),
            None,
        )
        .context("Failed to build vector column")?;

        let title_array = StringArray::from(
            documents.iter().map(|d| d.metadata.title.as_str()).collect::<Vec<_>>(),
        );
        let source_array = StringArray::from(
            documents.iter().map(|d| d.metadata.source.as_str()).collect::<Vec<_>>(),
        );
        let authors_array = optional_strings(documents, |m| m.authors.as_deref());
        let year_array = Int32Array::from(documents.iter().map(|d| d.metadata.year).collect::<Vec<_>>());
        let doi_array = optional_strings(documents, |m| m.doi.as_deref());
        let arxiv_array = optional_strings(documents, |m| m.arxiv_id.as_deref());
        let file_path_array = optional_strings(documents, |m| m.file_path.as_deref());

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(id_array) as ArrayRef,
                Arc::new(text_array) as ArrayRef,
                Arc::new(vector_array) as ArrayRef,
                Arc::new(title_array) as ArrayRef,
                Arc::new(source_array) as ArrayRef,
                Arc::new(authors_array) as ArrayRef,
                Arc::new(year_array) as ArrayRef,
                Arc::new(doi_array) as ArrayRef,
                Arc::new(arxiv_array) as ArrayRef,
                Arc::new(file_path_array) as ArrayRef,
            ],
        )
        .context("Failed to create record batch")
    }
}

async fn verify_dimension(table: &Table, dimension: usize) -> Result<()> {
    let schema = table.schema().await.context("Failed to read table schema")?;
    let field = schema
        .field_with_name(VECTOR_COLUMN)
        .context("Table has no 'vector' column")?;

    match field.data_type() {
        DataType::FixedSizeList(_, size) if *size as usize == dimension => Ok(()),
        DataType::FixedSizeList(_, size) => bail!(
            "Existing table stores {}-dimensional vectors but the embedder produces {}",
            size,
            dimension
        ),
        other => bail!("Unexpected vector column type: {:?}", other),
    }
}

fn distance_type(metric: DistanceMetric) -> DistanceType {
    match metric {
        DistanceMetric::L2 => DistanceType::L2,
        DistanceMetric::Cosine => DistanceType::Cosine,
    }
}

fn optional_strings<F>(documents: &[StoredDocument], field: F) -> StringArray
where
    F: Fn(&DocumentMetadata) -> Option<&str>,
{
    StringArray::from(documents.iter().map(|d| field(&d.metadata)).collect::<Vec<Option<&str>>>())
}

/// Quotes a string literal for a LanceDB SQL predicate.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Compiles search filters into a SQL predicate, `None` when nothing applies.
pub(crate) fn filter_predicate(filters: &SearchFilters) -> Option<String> {
    let mut clauses = Vec::new();

    if let Some(year_min) = filters.year_min {
        clauses.push(format!("year >= {}", year_min));
    }
    if let Some(year_max) = filters.year_max {
        clauses.push(format!("year <= {}", year_max));
    }
    if let Some(source) = &filters.source {
        clauses.push(format!("source = {}", quote(source)));
    }

    if clauses.is_empty() {
        None
    } else {
        Some(clauses.join(" AND "))
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch.column_by_name(name)
        .with_context(|| format!("Missing '{}' column", name))?
        .as_any()
        .downcast_ref::<StringArray>()
        .with_context(|| format!("Failed to cast '{}' to StringArray", name))
}

fn optional_value(array: &StringArray, row: usize) -> Option<String> {
    if array.is_null(row) {
        None
    } else {
        Some(array.value(row).to_string())
    }
}

fn decode_batch(batch: &RecordBatch, include_embedding: bool) -> Result<Vec<StoredDocument>> {
    let id_array = string_column(batch, "id")?;
    let text_array = string_column(batch, "text")?;
    let title_array = string_column(batch, "title")?;
    let source_array = string_column(batch, "source")?;
    let authors_array = string_column(batch, "authors")?;
    let doi_array = string_column(batch, "doi")?;
    let arxiv_array = string_column(batch, "arxiv_id")?;
    let file_path_array = string_column(batch, "file_path")?;

    let year_array = batch.column_by_name("year")
        .context("Missing 'year' column")?
        .as_any()
        .downcast_ref::<Int32Array>()
        .context("Failed to cast 'year' to Int32Array")?;

    let vector_array = if include_embedding {
        Some(
            batch.column_by_name(VECTOR_COLUMN)
                .context("Missing 'vector' column")?
                .as_any()
                .downcast_ref::<FixedSizeListArray>()
                .context("Failed to cast 'vector' to FixedSizeListArray")?,
        )
    } else {
        None
    };

    let mut documents = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let embedding = match vector_array {
            Some(vectors) => {
                let values = vectors.value(row);
                values
                    .as_any()
                    .downcast_ref::<Float32Array>()
                    .context("Failed to cast vector values to Float32Array")?
                    .values()
                    .to_vec()
            }
            None => Vec::new(),
        };

        documents.push(StoredDocument {
            id: id_array.value(row).to_string(),
            text: text_array.value(row).to_string(),
            metadata: DocumentMetadata {
                title: title_array.value(row).to_string(),
                source: source_array.value(row).to_string(),
                authors: optional_value(authors_array, row),
                year: if year_array.is_null(row) { None } else { Some(year_array.value(row)) },
                doi: optional_value(doi_array, row),
                arxiv_id: optional_value(arxiv_array, row),
                file_path: optional_value(file_path_array, row),
            },
            embedding,
        });
    }

    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn doc(id: &str, year: Option<i32>, source: &str, embedding: Vec<f32>) -> StoredDocument {
        StoredDocument {
            id: id.to_string(),
            text: format!("text of {}", id),
            metadata: DocumentMetadata {
                title: format!("Title {}", id),
                source: source.to_string(),
                authors: Some("Smith, J., Johnson, A.".to_string()),
                year,
                doi: None,
                arxiv_id: None,
                file_path: None,
            },
            embedding,
        }
    }

    async fn open(dir: &TempDir, dimension: usize) -> LanceDbStore {
        let path = dir.path().join("vectordb");
        LanceDbStore::new(path.to_str().unwrap(), "test_papers", dimension, DistanceMetric::L2)
            .await
            .unwrap()
    }

    #[test]
    fn test_filter_predicate_year_range() {
        let filters = SearchFilters::new().with_year_min(2020).with_year_max(2023);
        assert_eq!(
            filter_predicate(&filters).as_deref(),
            Some("year >= 2020 AND year <= 2023")
        );
    }

    #[test]
    fn test_filter_predicate_empty() {
        assert_eq!(filter_predicate(&SearchFilters::default()), None);
    }

    #[test]
    fn test_filter_predicate_escapes_source() {
        let filters = SearchFilters::new().with_source("o'reilly");
        assert_eq!(filter_predicate(&filters).as_deref(), Some("source = 'o''reilly'"));
    }

    #[tokio::test]
    async fn test_upsert_and_get_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, 3).await;

        store.upsert(vec![doc("paper1", Some(2023), "test", vec![1.0, 0.0, 0.0])]).await.unwrap();

        let stored = store.get("paper1").await.unwrap().unwrap();
        assert_eq!(stored.text, "text of paper1");
        assert_eq!(stored.metadata.title, "Title paper1");
        assert_eq!(stored.metadata.year, Some(2023));
        assert_eq!(stored.metadata.authors.as_deref(), Some("Smith, J., Johnson, A."));
        assert!(stored.metadata.doi.is_none());
        assert_eq!(stored.embedding, vec![1.0, 0.0, 0.0]);

        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_overwrites_same_id() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, 2).await;

        store.upsert(vec![doc("p", Some(2020), "a", vec![1.0, 0.0])]).await.unwrap();
        store.upsert(vec![doc("p", Some(2021), "b", vec![0.0, 1.0])]).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let stored = store.get("p").await.unwrap().unwrap();
        assert_eq!(stored.metadata.source, "b");
        assert_eq!(stored.embedding, vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn test_search_orders_and_filters() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, 2).await;

        store
            .upsert(vec![
                doc("exact", Some(2024), "test", vec![1.0, 0.0]),
                doc("near", Some(2022), "test", vec![0.9, 0.1]),
                doc("far", Some(2023), "other", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.0], 3, &SearchFilters::default()).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.document.id.as_str()).collect();
        assert_eq!(ids, vec!["exact", "near", "far"]);
        assert!(results[0].distance.abs() < 1e-6);
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));

        let filters = SearchFilters::new().with_year_min(2023);
        let results = store.search(&[1.0, 0.0], 3, &filters).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.document.id.as_str()).collect();
        assert_eq!(ids, vec!["exact", "far"]);

        let filters = SearchFilters::new().with_year_min(2023).with_source("other");
        let results = store.search(&[1.0, 0.0], 3, &filters).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.id, "far");
    }

    #[tokio::test]
    async fn test_cosine_search_ignores_magnitude() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vectordb");
        let store = LanceDbStore::new(path.to_str().unwrap(), "test_papers", 2, DistanceMetric::Cosine)
            .await
            .unwrap();

        store
            .upsert(vec![
                doc("scaled", Some(2024), "test", vec![3.0, 0.0]),
                doc("near", Some(2022), "test", vec![0.9, 0.1]),
                doc("far", Some(2023), "test", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        // under L2, "scaled" would rank last
        let results = store.search(&[1.0, 0.0], 3, &SearchFilters::default()).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.document.id.as_str()).collect();
        assert_eq!(ids, vec!["scaled", "near", "far"]);
        assert!(results[0].distance.abs() < 1e-5);
        assert!((results[2].distance - 1.0).abs() < 1e-5);
        assert!(results.windows(2).all(|w| w[0].distance < w[1].distance));

        for result in &results {
            let similarity = super::super::distance_to_similarity(result.distance);
            assert!(similarity > 0.0 && similarity <= 1.0);
        }
    }

    #[tokio::test]
    async fn test_search_empty_table() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, 2).await;
        let results = store.search(&[1.0, 0.0], 5, &SearchFilters::default()).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_delete_reports_presence() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, 2).await;
        store.upsert(vec![doc("p", None, "test", vec![1.0, 0.0])]).await.unwrap();

        assert!(store.delete("p").await.unwrap());
        assert!(!store.delete("p").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, 2).await;
        store.upsert(vec![doc("p", None, "test", vec![1.0, 0.0])]).await.unwrap();

        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);

        store.upsert(vec![doc("q", None, "test", vec![0.0, 1.0])]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reopen_persists_and_checks_dimension() {
        let dir = TempDir::new().unwrap();
        {
            let store = open(&dir, 2).await;
            store.upsert(vec![doc("p", None, "test", vec![1.0, 0.0])]).await.unwrap();
        }

        let store = open(&dir, 2).await;
        assert_eq!(store.count().await.unwrap(), 1);

        let path = dir.path().join("vectordb");
        let result = LanceDbStore::new(path.to_str().unwrap(), "test_papers", 3, DistanceMetric::L2).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_upsert_rejects_wrong_dimension() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, 3).await;
        let result = store.upsert(vec![doc("p", None, "test", vec![1.0, 0.0])]).await;
        assert!(result.is_err());
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
