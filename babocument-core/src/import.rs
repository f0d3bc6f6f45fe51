//! Plain-text paper import.
//!
//! This module provides functionality to:
//! - Recursively collect paper text files from directories
//! - Filter files by extension and exclude patterns
//! - Derive a [`DocumentRecord`] from a paper's raw text

use crate::config::ImportConfig;
use crate::patterns::should_exclude;
use crate::store::DocumentRecord;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Longest title kept before it is cut and suffixed with `...`.
pub const MAX_TITLE_CHARS: usize = 200;

/// Longest abstract taken from a paper's text.
pub const MAX_ABSTRACT_CHARS: usize = 1000;

/// Shortest text accepted as an abstract or fallback paragraph.
const MIN_ABSTRACT_CHARS: usize = 100;

const ABSTRACT_MARKERS: [&str; 3] = ["abstract", "summary", "overview"];

const SECTION_MARKERS: [&str; 6] = [
    "\nintroduction",
    "\nbackground",
    "\nmethods",
    "\n1.",
    "\n2.",
    "\ni.",
];

/// Source tag given to every imported paper.
pub const LOCAL_SOURCE: &str = "local";

/// Errors that can occur during paper import.
#[derive(Debug, Error)]
pub enum ImportError {
    /// An I/O error occurred while reading files or directories.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The import root does not exist or is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Result type for import operations.
pub type Result<T> = std::result::Result<T, ImportError>;

/// A paper file that has been collected and read.
#[derive(Debug, Clone)]
pub struct PaperFile {
    pub path: PathBuf,
    pub content: String,
}

/// Recursively collects all importable files from a directory.
///
/// Files are filtered on `config.extensions` (all files when empty) and on
/// `config.exclude_patterns`, which are matched against the names of entries
/// below `dir_path` only, never against `dir_path` itself or its parents.
/// Files that are not valid UTF-8 are skipped. Results are sorted by path.
pub async fn collect_files(dir_path: impl AsRef<Path>, config: &ImportConfig) -> Result<Vec<PaperFile>> {
    let dir_path = dir_path.as_ref();
    if !fs::metadata(dir_path).await.map(|m| m.is_dir()).unwrap_or(false) {
        return Err(ImportError::NotADirectory(dir_path.to_path_buf()));
    }

    let mut files = Vec::new();
    collect_files_recursive(dir_path, &mut files, config).await?;
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

fn collect_files_recursive<'a>(
    dir: &'a Path,
    files: &'a mut Vec<PaperFile>,
    config: &'a ImportConfig,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let mut entries = fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();

            if should_exclude(Path::new(&entry.file_name()), &config.exclude_patterns) {
                continue;
            }

            if entry.file_type().await?.is_dir() {
                collect_files_recursive(&path, files, config).await?;
            } else if is_importable(&path, &config.extensions) {
                match fs::read_to_string(&path).await {
                    Ok(content) => files.push(PaperFile { path, content }),
                    Err(e) => tracing::debug!(file = %path.display(), error = %e, "Skipping unreadable file"),
                }
            }
        }

        Ok(())
    })
}

/// Checks if a file should be imported based on its extension.
///
/// Matching is case-insensitive. An empty list accepts every file.
fn is_importable(path: &Path, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }

    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Builds a paper record from a file's text.
///
/// The id is the file stem, so re-importing a directory replaces rather than
/// duplicates papers.
pub fn parse_paper(path: &Path, content: &str) -> DocumentRecord {
    let id = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string());

    let file_path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

    DocumentRecord::new(id, extract_title(content))
        .with_abstract(extract_abstract(content))
        .with_full_text(content)
        .with_source(LOCAL_SOURCE)
        .with_file_path(file_path.to_string_lossy())
}

/// First non-blank line, trimmed; `"Untitled"` when there is none.
pub fn extract_title(text: &str) -> String {
    let Some(first_line) = text.lines().map(str::trim).find(|line| !line.is_empty()) else {
        return "Untitled".to_string();
    };

    if first_line.chars().count() > MAX_TITLE_CHARS {
        format!("{}...", take_chars(first_line, MAX_TITLE_CHARS))
    } else {
        first_line.to_string()
    }
}

/// Finds the abstract of a paper.
///
/// Each marker is tried in turn; the text after its first occurrence runs up
/// to the nearest section heading or [`MAX_ABSTRACT_CHARS`] characters. When
/// no candidate is long enough, the first substantial paragraph is used.
pub fn extract_abstract(text: &str) -> String {
    // ASCII lowering keeps byte offsets aligned with `text`
    let lowered = text.to_ascii_lowercase();

    for marker in ABSTRACT_MARKERS {
        let Some(marker_pos) = lowered.find(marker) else {
            continue;
        };
        let start = marker_pos + marker.len();

        let mut end = byte_offset_after_chars(text, start, MAX_ABSTRACT_CHARS);
        for section in SECTION_MARKERS {
            if let Some(pos) = lowered[start..].find(section) {
                end = end.min(start + pos);
            }
        }

        let candidate = text[start..end].trim();
        if candidate.chars().count() > MIN_ABSTRACT_CHARS {
            return candidate.to_string();
        }
    }

    text.split("\n\n")
        .map(str::trim)
        .find(|paragraph| paragraph.chars().count() > MIN_ABSTRACT_CHARS)
        .map(|paragraph| take_chars(paragraph, MAX_ABSTRACT_CHARS).to_string())
        .unwrap_or_default()
}

fn take_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

fn byte_offset_after_chars(text: &str, start: usize, chars: usize) -> usize {
    start + take_chars(&text[start..], chars).len()
}
