use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::store::DistanceMetric;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration for the document store and its collaborators.
///
/// Every section falls back to its defaults, so a config file only needs to
/// name the values it changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

/// Which embedding backend turns text into vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// In-process ONNX model via fastembed (default)
    FastEmbed,
    /// Ollama HTTP API (`/api/embed`)
    Ollama,
}

/// Configuration for embedding generation.
///
/// `dimension` is declared up front and checked against every vector the
/// provider returns; the vector index is created with this width.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_backend")]
    pub provider: EmbeddingBackend,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Where fastembed keeps downloaded model files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,
}

fn default_backend() -> EmbeddingBackend {
    EmbeddingBackend::FastEmbed
}

fn default_embedding_model() -> String {
    // all-MiniLM-L6-v2 as published by Ollama
    "all-minilm".to_string()
}

fn default_dimension() -> usize {
    384
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_backend(),
            model: default_embedding_model(),
            dimension: default_dimension(),
            base_url: default_base_url(),
            cache_dir: None,
        }
    }
}

/// Vector database storage mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum StorageMode {
    /// Embedded LanceDB in a local directory (default)
    Embedded { path: String },
    /// Process-local, non-persistent index
    Memory,
}

impl Default for StorageMode {
    fn default() -> Self {
        Self::Embedded {
            path: "./data/vectordb".to_string(),
        }
    }
}

impl StorageMode {
    /// Human-readable location of the index, reported by `stats`.
    pub fn location(&self) -> &str {
        match self {
            StorageMode::Embedded { path } => path,
            StorageMode::Memory => ":memory:",
        }
    }
}

/// Storage configuration for the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub storage_mode: StorageMode,
    /// Collection/table name holding the papers
    #[serde(default = "default_collection_name")]
    pub collection_name: String,
    /// Distance the nearest-neighbor search ranks by
    #[serde(default)]
    pub distance: DistanceMetric,
    /// Result count used when a caller does not pass a limit
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

fn default_collection_name() -> String {
    "research_papers".to_string()
}

fn default_limit() -> usize {
    10
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_mode: StorageMode::default(),
            collection_name: default_collection_name(),
            distance: DistanceMetric::default(),
            default_limit: default_limit(),
        }
    }
}

/// Configuration for plain-text paper import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// File extensions to import (e.g., ["txt", "md"])
    /// Empty list means every readable text file
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Skips directories/files whose name contains one of these strings
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,
}

fn default_extensions() -> Vec<String> {
    vec!["txt".to_string(), "md".to_string()]
}

fn default_exclude_patterns() -> Vec<String> {
    crate::patterns::default_exclude_patterns()
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            exclude_patterns: default_exclude_patterns(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`, or the defaults if the file does not exist.
    ///
    /// A file that exists but cannot be read, parsed or validated is an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        match Self::load(path) {
            Err(ConfigError::FileRead(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Rejects values the store cannot be constructed with.
    pub fn validate(&self) -> Result<()> {
        if self.embedding.dimension == 0 {
            return Err(ConfigError::Invalid(
                "embedding.dimension must be greater than zero".to_string(),
            ));
        }
        if self.storage.collection_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "storage.collection_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
