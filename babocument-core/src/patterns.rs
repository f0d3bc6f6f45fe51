/// File patterns used when walking a directory of papers for import.
use std::path::Path;

/// Default patterns to exclude from paper import.
pub fn default_exclude_patterns() -> Vec<String> {
    vec![
        // Version control
        ".git".to_string(),
        ".svn".to_string(),
        ".hg".to_string(),

        // Vector index and caches living next to the papers
        "vectordb".to_string(),
        ".lance".to_string(),
        "__pycache__".to_string(),
        ".cache".to_string(),

        // IDEs
        ".vscode".to_string(),
        ".idea".to_string(),

        // OS
        ".DS_Store".to_string(),
        "Thumbs.db".to_string(),
    ]
}

/// Extensions that never hold extracted paper text.
pub fn binary_extensions() -> Vec<&'static str> {
    vec![
        // Source documents (text must be extracted first)
        "pdf", "doc", "docx", "epub", "ps",
        // Images
        "png", "jpg", "jpeg", "gif", "svg", "webp", "tiff",
        // Archives
        "zip", "tar", "gz", "bz2", "7z",
        // Binary data
        "bin", "dat", "db", "sqlite", "lance", "arrow", "parquet",
    ]
}

/// Checks if a path should be skipped during import.
///
/// A path is excluded if any of its components contains an exclude pattern,
/// or if its extension is a known binary format.
pub fn should_exclude(path: &Path, exclude_patterns: &[String]) -> bool {
    let excluded_component = path.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .map(|name| exclude_patterns.iter().any(|pattern| name.contains(pattern.as_str())))
            .unwrap_or(false)
    });
    if excluded_component {
        return true;
    }

    if let Some(ext) = path.extension() {
        let ext = ext.to_string_lossy().to_lowercase();
        if binary_extensions().contains(&ext.as_str()) {
            return true;
        }
    }

    false
}
