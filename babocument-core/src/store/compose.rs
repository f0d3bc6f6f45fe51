//! Turns a [`DocumentRecord`] into the text that gets embedded and the
//! scalar metadata that gets stored.

use super::types::{DocumentMetadata, DocumentRecord};

/// Number of leading `full_text` characters that take part in the embedding.
pub const FULL_TEXT_EMBED_CHARS: usize = 2000;

/// Source tag used when a record does not name one.
pub const DEFAULT_SOURCE: &str = "unknown";

/// Builds the embedding input for a paper.
///
/// Title and abstract appear twice so they weigh roughly double against the
/// body, which is cut to [`FULL_TEXT_EMBED_CHARS`] characters. The cut never
/// splits a character.
pub fn compose_embedding_text(record: &DocumentRecord) -> String {
    let body = truncate_chars(&record.full_text, FULL_TEXT_EMBED_CHARS);
    let combined = format!(
        "{title} {title} {abstract_text} {abstract_text} {body}",
        title = record.title,
        abstract_text = record.abstract_text,
        body = body,
    );
    combined.trim().to_string()
}

/// Extracts the stored metadata for a paper.
///
/// Optional fields are carried only when the record has them.
pub fn extract_metadata(record: &DocumentRecord) -> DocumentMetadata {
    DocumentMetadata {
        title: record.title.clone(),
        source: record
            .source
            .clone()
            .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
        authors: record.authors.as_ref().map(|authors| authors.join(", ")),
        year: record.year,
        doi: record.doi.clone(),
        arxiv_id: record.arxiv_id.clone(),
        file_path: record.file_path.clone(),
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
