//! Embedding collaborator: the [`Embedder`] seam and an OpenAI-compatible
//! HTTP client implementing it.
//!
//! Works with any server exposing `POST /v1/embeddings` (text-embeddings-inference,
//! Ollama, vLLM, OpenAI). Index build and query time must use the same model.

use std::future::Future;
use std::time::Duration;

use lexrag_core::{EmbeddingConfig, LexError};
use serde::{Deserialize, Serialize};

/// Environment variable consulted when `embedding.api_key` is unset.
pub const API_KEY_ENV: &str = "LEXRAG_EMBEDDING_API_KEY";

const BATCH_SIZE: usize = 64;

/// Text to fixed-length vector.
///
/// Implementations must be deterministic for a given model version, and
/// `embed_batch` must return one vector per input, in input order.
pub trait Embedder: Send + Sync {
    /// Embed a batch of documents.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, LexError>> + Send;

    /// Embed a single search query.
    fn embed_query(&self, query: &str) -> impl Future<Output = Result<Vec<f32>, LexError>> + Send;

    /// Model identifier recorded in the index.
    fn model(&self) -> &str;
}

/// Client for an OpenAI-compatible embeddings endpoint.
///
/// # Examples
///
/// ```
/// use lexrag_retrieval::embedding::{Embedder, EmbeddingClient};
///
/// let client = EmbeddingClient::new("http://localhost:8080", "all-mpnet-base-v2");
/// assert_eq!(client.model(), "all-mpnet-base-v2");
/// ```
pub struct EmbeddingClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    dimensions: Option<usize>,
}

impl std::fmt::Debug for EmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDataItem>,
}

#[derive(Deserialize)]
struct EmbedDataItem {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

impl EmbeddingClient {
    /// Create a client without authentication or dimension checks.
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: None,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimensions: None,
        }
    }

    /// Create a client from an [`EmbeddingConfig`].
    ///
    /// The API key is optional (local servers rarely need one) and falls back
    /// to `LEXRAG_EMBEDDING_API_KEY`. Returned vectors are checked against
    /// `config.dimensions`.
    ///
    /// # Errors
    ///
    /// Returns [`LexError::Embedding`] if the HTTP client cannot be built.
    ///
    /// # Examples
    ///
    /// ```
    /// use lexrag_core::EmbeddingConfig;
    /// use lexrag_retrieval::embedding::EmbeddingClient;
    ///
    /// let client = EmbeddingClient::with_config(&EmbeddingConfig::default()).unwrap();
    /// ```
    pub fn with_config(config: &EmbeddingConfig) -> Result<Self, LexError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LexError::Embedding(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimensions: Some(config.dimensions),
        })
    }

    async fn request(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, LexError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = EmbedRequest {
            model: &self.model,
            input: batch,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| LexError::Embedding(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".into());
            tracing::warn!(%status, "embedding service rejected request");
            return Err(LexError::Upstream {
                service: "embedding",
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| LexError::Embedding(format!("failed to parse response: {e}")))?;

        let vectors = order_embeddings(parsed.data, batch.len())?;
        if let Some(expected) = self.dimensions {
            if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
                return Err(LexError::Embedding(format!(
                    "model '{}' returned {} dimensions but embedding.dimensions is {expected}",
                    self.model,
                    bad.len()
                )));
            }
        }
        Ok(vectors)
    }
}

/// Restore input order from the `index` field and check the count.
fn order_embeddings(
    mut data: Vec<EmbedDataItem>,
    expected: usize,
) -> Result<Vec<Vec<f32>>, LexError> {
    if data.len() != expected {
        return Err(LexError::Embedding(format!(
            "expected {expected} embeddings, got {}",
            data.len()
        )));
    }
    if data.iter().all(|item| item.index.is_some()) {
        data.sort_by_key(|item| item.index);
    }
    Ok(data.into_iter().map(|item| item.embedding).collect())
}

impl Embedder for EmbeddingClient {
    /// Embeds in sub-batches of 64 texts.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LexError> {
        let mut all_embeddings = Vec::with_capacity(texts.len());
        for (i, batch) in texts.chunks(BATCH_SIZE).enumerate() {
            tracing::debug!(batch = i, size = batch.len(), "embedding batch");
            all_embeddings.extend(self.request(batch).await?);
        }
        Ok(all_embeddings)
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, LexError> {
        self.request(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LexError::Embedding("empty response from embedding service".into()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}
