use std::path::PathBuf;

/// Errors that can occur across lexrag.
///
/// Library crates return this type directly; the binary converts to a
/// `miette` report at the boundary. An empty retrieval is not an error: it is
/// signalled by an absent context.
///
/// # Examples
///
/// ```
/// use lexrag_core::LexError;
///
/// let err = LexError::Config("missing GROQ_API_KEY".into());
/// assert!(err.to_string().contains("GROQ_API_KEY"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum LexError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(help("check .lexrag.toml or run `lexrag doctor`"))]
    Config(String),

    /// An upstream service answered with a non-success status.
    #[error("{service} returned {status}: {body}")]
    Upstream {
        /// Which collaborator failed (`"generation"` or `"embedding"`).
        service: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body, kept for diagnostics.
        body: String,
    },

    /// Generation API transport or response error.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Embedding API transport or response error.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Index storage failure.
    #[error("database error: {0}")]
    Database(String),

    /// Unreadable or malformed statute corpus.
    #[error("corpus error: {0}")]
    Corpus(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The index file exists but no build ever completed into it.
    #[error("index at {} has not been built", .0.display())]
    #[diagnostic(help("run `lexrag index` to build it"))]
    IndexNotBuilt(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: LexError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = LexError::Config("bad value".into());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn upstream_error_carries_status_and_body() {
        let err = LexError::Upstream {
            service: "generation",
            status: 429,
            body: "rate limited".into(),
        };
        assert_eq!(err.to_string(), "generation returned 429: rate limited");
    }

    #[test]
    fn file_not_found_shows_path() {
        let err = LexError::FileNotFound(PathBuf::from("/tmp/index.db"));
        assert!(err.to_string().contains("/tmp/index.db"));
    }

    #[test]
    fn index_not_built_names_path() {
        let err = LexError::IndexNotBuilt(PathBuf::from(".lexrag/index.db"));
        assert_eq!(err.to_string(), "index at .lexrag/index.db has not been built");
    }
}
