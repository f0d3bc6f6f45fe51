//! babocument - Research-paper document store
//!
//! This is the convenience wrapper crate that re-exports the babocument
//! components.
//!
//! # Quick Start
//!
//! ```no_run
//! use babocument::prelude::*;
//!
//! # async fn example() -> Result<(), StoreError> {
//! let store = DocumentStore::new(&Config::default()).await?;
//! let hits = store.search("bioink hydrogel printing", 5, &SearchFilters::default()).await?;
//! # Ok(())
//! # }
//! ```

// Re-export core
pub use babocument_core::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use babocument_core::{
        Config, DocumentRecord, DocumentStore, DocumentView, SearchFilters, SearchResult,
        StoreError, StoreStats,
    };
}
