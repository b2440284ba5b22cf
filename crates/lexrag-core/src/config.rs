use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::LexError;

/// File name looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = ".lexrag.toml";

/// Top-level configuration loaded from `.lexrag.toml`.
///
/// Resolution order: explicit path > `.lexrag.toml` in the working directory >
/// defaults. Credentials additionally fall back to environment variables when
/// the clients are constructed.
///
/// # Examples
///
/// ```
/// use lexrag_core::LexConfig;
///
/// let config = LexConfig::default();
/// assert_eq!(config.retrieval.k, 5);
/// assert_eq!(config.index.label, "BNS Section");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LexConfig {
    /// Generation service settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Embedding service settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Corpus and index locations.
    #[serde(default)]
    pub index: IndexConfig,
    /// Query-time retrieval policy.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

impl LexConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LexError::FileNotFound`] if the file does not exist,
    /// [`LexError::Io`] if it cannot be read, or [`LexError::Toml`] if the
    /// content is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, LexError> {
        if !path.exists() {
            return Err(LexError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`LexError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use lexrag_core::LexConfig;
    ///
    /// let toml = r#"
    /// [retrieval]
    /// k = 8
    /// dedupe = true
    /// "#;
    /// let config = LexConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.retrieval.k, 8);
    /// assert!(config.retrieval.dedupe);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, LexError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Resolve configuration for a process.
    ///
    /// An explicit path must exist. Without one, `.lexrag.toml` in `cwd` is
    /// used when present, otherwise defaults apply. The result is validated.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`LexConfig::from_file`] and
    /// [`LexConfig::validate`].
    pub fn load(explicit: Option<&Path>, cwd: &Path) -> Result<Self, LexError> {
        let config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = cwd.join(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`LexError::Config`] if the document label lacks the word
    /// `Section` (the exact-section scan relies on it), or if `k` is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use lexrag_core::LexConfig;
    ///
    /// let mut config = LexConfig::default();
    /// config.index.label = "BNS Clause".into();
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), LexError> {
        if !self.index.label.contains("Section") {
            return Err(LexError::Config(format!(
                "index.label must contain the word 'Section', got '{}'",
                self.index.label
            )));
        }
        if self.retrieval.k == 0 {
            return Err(LexError::Config("retrieval.k must be at least 1".into()));
        }
        Ok(())
    }
}

/// Generation service configuration (OpenAI-compatible chat completions).
///
/// # Examples
///
/// ```
/// use lexrag_core::LlmConfig;
///
/// let config = LlmConfig::default();
/// assert_eq!(config.model, "llama3-70b-8192");
/// assert_eq!(config.api_key_env, "GROQ_API_KEY");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// API key; falls back to the variable named by `api_key_env`.
    pub api_key: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: String,
    /// Base URL; `/v1/chat/completions` is appended.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    /// Sampling temperature, omitted from requests when unset.
    pub temperature: Option<f32>,
    /// Request timeout in seconds.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "llama3-70b-8192".into()
}

fn default_llm_key_env() -> String {
    "GROQ_API_KEY".into()
}

fn default_llm_base_url() -> String {
    "https://api.groq.com/openai".into()
}

fn default_llm_timeout() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: None,
            api_key_env: default_llm_key_env(),
            base_url: default_llm_base_url(),
            temperature: None,
            timeout_secs: default_llm_timeout(),
        }
    }
}

/// Embedding service configuration (OpenAI-compatible `/v1/embeddings`).
///
/// The same model must be used to build and to query an index; the model
/// name is recorded in the index and checked when it is opened.
///
/// # Examples
///
/// ```
/// use lexrag_core::EmbeddingConfig;
///
/// let config = EmbeddingConfig::default();
/// assert_eq!(config.model, "sentence-transformers/all-mpnet-base-v2");
/// assert_eq!(config.dimensions, 768);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name.
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Base URL; `/v1/embeddings` is appended.
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    /// Optional API key; falls back to `LEXRAG_EMBEDDING_API_KEY`.
    pub api_key: Option<String>,
    /// Expected vector length.
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,
    /// Request timeout in seconds.
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_embedding_model() -> String {
    "sentence-transformers/all-mpnet-base-v2".into()
}

fn default_embedding_base_url() -> String {
    "http://localhost:8080".into()
}

fn default_embedding_dimensions() -> usize {
    768
}

fn default_embedding_timeout() -> u64 {
    60
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            base_url: default_embedding_base_url(),
            api_key: None,
            dimensions: default_embedding_dimensions(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

/// Corpus and index locations.
///
/// # Examples
///
/// ```
/// use lexrag_core::IndexConfig;
///
/// let config = IndexConfig::default();
/// assert_eq!(config.path.to_str(), Some(".lexrag/index.db"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// SQLite index database.
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
    /// JSON array of statute records.
    #[serde(default = "default_corpus_path")]
    pub corpus: PathBuf,
    /// Label rendered before the section number, e.g. `"BNS Section"`.
    #[serde(default = "default_label")]
    pub label: String,
}

fn default_index_path() -> PathBuf {
    PathBuf::from(".lexrag/index.db")
}

fn default_corpus_path() -> PathBuf {
    PathBuf::from("data/bns.json")
}

fn default_label() -> String {
    "BNS Section".into()
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            corpus: default_corpus_path(),
            label: default_label(),
        }
    }
}

/// Query-time retrieval policy.
///
/// # Examples
///
/// ```
/// use lexrag_core::RetrievalConfig;
///
/// let config = RetrievalConfig::default();
/// assert_eq!(config.k, 5);
/// assert_eq!(config.min_chars, 30);
/// assert!(config.section_fallback);
/// assert!(!config.dedupe);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Nearest-neighbour hits to fetch (default: 5).
    #[serde(default = "default_k")]
    pub k: usize,
    /// Documents whose trimmed text is at most this many characters are dropped.
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    /// Promote an exact section match named in the query (default: true).
    #[serde(default = "default_true")]
    pub section_fallback: bool,
    /// Drop repeated document ids from the context (default: false).
    #[serde(default)]
    pub dedupe: bool,
}

fn default_k() -> usize {
    5
}

fn default_min_chars() -> usize {
    30
}

fn default_true() -> bool {
    true
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            min_chars: default_min_chars(),
            section_fallback: true,
            dedupe: false,
        }
    }
}
