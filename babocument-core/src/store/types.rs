use serde::{Deserialize, Deserializer, Serialize};

/// A paper as submitted for ingestion.
///
/// Only `id` is required; text fields default to empty. The embedding is
/// never supplied by the caller, it is derived from the text fields.
///
/// # Example
///
/// ```no_run
/// # use babocument_core::store::DocumentRecord;
/// let record: DocumentRecord = serde_json::from_str(r#"{
///     "id": "paper2",
///     "title": "Hydrogel-Based Bioinks for 3D Printing",
///     "authors": ["Lee, K.", "Wang, M."],
///     "year": "2022"
/// }"#).unwrap();
/// assert_eq!(record.year, Some(2022));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub full_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_year", skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub arxiv_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl DocumentRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_abstract(mut self, abstract_text: impl Into<String>) -> Self {
        self.abstract_text = abstract_text.into();
        self
    }

    pub fn with_full_text(mut self, full_text: impl Into<String>) -> Self {
        self.full_text = full_text.into();
        self
    }

    pub fn with_authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors = Some(authors.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_doi(mut self, doi: impl Into<String>) -> Self {
        self.doi = Some(doi.into());
        self
    }

    pub fn with_arxiv_id(mut self, arxiv_id: impl Into<String>) -> Self {
        self.arxiv_id = Some(arxiv_id.into());
        self
    }

    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

/// Accepts `2023` or `"2023"`.
fn lenient_year<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<Scalar>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Scalar::Int(value)) => i32::try_from(value)
            .map(Some)
            .map_err(|_| D::Error::custom(format!("year out of range: {}", value))),
        Some(Scalar::Float(value)) if value.fract() == 0.0 && value.abs() <= i32::MAX as f64 => {
            Ok(Some(value as i32))
        }
        Some(Scalar::Float(value)) => Err(D::Error::custom(format!("year is not an integer: {}", value))),
        Some(Scalar::Text(text)) => text
            .trim()
            .parse::<i32>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("year is not an integer: {:?}", text))),
    }
}

/// Accepts strings verbatim and stringifies numbers.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|scalar| match scalar {
        Scalar::Int(value) => value.to_string(),
        Scalar::Float(value) => value.to_string(),
        Scalar::Text(text) => text,
    }))
}

/// Scalar-only metadata stored next to every embedding.
///
/// `authors` is kept as one comma-joined string because the index stores
/// scalar columns only; use [`authors_list`](Self::authors_list) to split it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arxiv_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl DocumentMetadata {
    pub fn authors_list(&self) -> Vec<String> {
        match &self.authors {
            Some(joined) if !joined.is_empty() => {
                joined.split(", ").map(|name| name.to_string()).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// A row of the vector index: composed text, metadata and embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub text: String,
    pub metadata: DocumentMetadata,
    pub embedding: Vec<f32>,
}

/// A nearest-neighbor hit as reported by a backend, before normalization.
///
/// `distance` is the raw, non-negative dissimilarity of the configured metric.
/// Backends leave `document.embedding` empty.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: StoredDocument,
    pub distance: f32,
}

/// A search hit returned to callers.
///
/// # Score Range
///
/// `similarity` is always in `(0, 1]`; `1.0` means zero distance and the
/// value falls strictly as the distance grows.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub similarity: f32,
    pub text: String,
    pub metadata: DocumentMetadata,
}

/// Point-lookup result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentView {
    pub id: String,
    pub text: String,
    pub metadata: DocumentMetadata,
}

impl From<StoredDocument> for DocumentView {
    fn from(document: StoredDocument) -> Self {
        Self {
            id: document.id,
            text: document.text,
            metadata: document.metadata,
        }
    }
}

/// Metadata predicates applied during nearest-neighbor search.
///
/// Constraints combine with AND; absent ones do not apply. A document without
/// a year never satisfies a year bound.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Inclusive lower bound on `year`
    #[serde(default)]
    pub year_min: Option<i32>,
    /// Inclusive upper bound on `year`
    #[serde(default)]
    pub year_max: Option<i32>,
    /// Exact match on `source`
    #[serde(default)]
    pub source: Option<String>,
}

impl SearchFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_year_min(mut self, year: i32) -> Self {
        self.year_min = Some(year);
        self
    }

    pub fn with_year_max(mut self, year: i32) -> Self {
        self.year_max = Some(year);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.year_min.is_none() && self.year_max.is_none() && self.source.is_none()
    }

    pub fn matches(&self, metadata: &DocumentMetadata) -> bool {
        if self.year_min.is_some() || self.year_max.is_some() {
            let Some(year) = metadata.year else {
                return false;
            };
            if self.year_min.is_some_and(|min| year < min) {
                return false;
            }
            if self.year_max.is_some_and(|max| year > max) {
                return false;
            }
        }

        match &self.source {
            Some(source) => metadata.source == *source,
            None => true,
        }
    }
}

/// Observational snapshot of the store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_documents: usize,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub storage_path: String,
    pub collection_name: String,
    pub distance: String,
}
