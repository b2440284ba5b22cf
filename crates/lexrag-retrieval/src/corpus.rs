//! Loading statute records from the source corpus.

use std::path::Path;

use lexrag_core::{LexError, StatuteRecord};

/// Load a JSON array of statute records.
///
/// # Errors
///
/// Returns [`LexError::FileNotFound`] if `path` does not exist,
/// [`LexError::Io`] if it cannot be read, or [`LexError::Corpus`] if it is
/// not a JSON array of records.
pub fn load_corpus(path: &Path) -> Result<Vec<StatuteRecord>, LexError> {
    if !path.exists() {
        return Err(LexError::FileNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    let records = parse_corpus(&content)
        .map_err(|e| LexError::Corpus(format!("{}: {e}", path.display())))?;
    tracing::debug!(path = %path.display(), records = records.len(), "loaded corpus");
    Ok(records)
}

/// Parse statute records from a JSON array.
///
/// # Errors
///
/// Returns the underlying `serde_json` error on malformed input.
///
/// # Examples
///
/// ```
/// use lexrag_retrieval::corpus::parse_corpus;
///
/// let records = parse_corpus(r#"[{"bns_section": "2", "subject": "Definitions", "extra_data": "In this Sanhita ..."}]"#).unwrap();
/// assert_eq!(records[0].section, "2");
/// ```
pub fn parse_corpus(content: &str) -> Result<Vec<StatuteRecord>, serde_json::Error> {
    serde_json::from_str(content)
}
