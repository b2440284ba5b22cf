//! Hybrid retrieval: nearest-neighbour search plus an exact-section fallback.
//!
//! Semantic search alone can rank paraphrases above the literal text of a
//! section the user named. When the query mentions a section number, the
//! full corpus is scanned for that section and the first match is promoted
//! to rank 0. Near-empty documents are then dropped and the survivors are
//! joined into one context block.

use lexrag_core::{HitSource, LexError, RetrievalConfig, RetrievedDocument};

use crate::embedding::Embedder;
use crate::section::{parse_section_reference, SectionMatcher};
use crate::store::StatuteIndex;

/// Separator between documents in a context block.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Hybrid search engine over a statute index.
///
/// Owns the index and the embedder for the lifetime of the serving process.
///
/// # Examples
///
/// ```
/// use lexrag_core::EmbeddingConfig;
/// use lexrag_retrieval::embedding::EmbeddingClient;
/// use lexrag_retrieval::search::HybridSearch;
/// use lexrag_retrieval::store::StatuteIndex;
///
/// let index = StatuteIndex::in_memory().unwrap();
/// let client = EmbeddingClient::with_config(&EmbeddingConfig::default()).unwrap();
/// let search = HybridSearch::new(index, client);
/// assert_eq!(search.policy().k, 5);
/// ```
pub struct HybridSearch<E> {
    index: StatuteIndex,
    embedder: E,
    policy: RetrievalConfig,
}

impl<E: Embedder> HybridSearch<E> {
    /// Create a search engine with the default retrieval policy.
    pub fn new(index: StatuteIndex, embedder: E) -> Self {
        Self {
            index,
            embedder,
            policy: RetrievalConfig::default(),
        }
    }

    /// Replace the retrieval policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RetrievalConfig) -> Self {
        self.policy = policy;
        self
    }

    /// Access the underlying index.
    pub fn index(&self) -> &StatuteIndex {
        &self.index
    }

    /// The active retrieval policy.
    pub fn policy(&self) -> &RetrievalConfig {
        &self.policy
    }

    /// Ranked candidate documents for `query`, after promotion and filtering.
    ///
    /// # Errors
    ///
    /// Returns [`LexError`] if embedding the query or reading the index fails.
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedDocument>, LexError> {
        let query_embedding = self.embedder.embed_query(query).await?;
        let vector_hits = self.index.nearest(&query_embedding, k)?;
        tracing::debug!(hits = vector_hits.len(), k, "vector search");

        let exact = if self.policy.section_fallback {
            match parse_section_reference(query) {
                Some(number) => self.find_section(&number)?,
                None => None,
            }
        } else {
            None
        };

        let mut ranked = promote_exact_match(vector_hits, exact);
        if self.policy.dedupe {
            ranked = dedupe_by_id(ranked);
        }
        Ok(filter_degenerate(ranked, self.policy.min_chars))
    }

    /// Context block for `query`, or `None` when nothing informative was found.
    ///
    /// # Errors
    ///
    /// Returns [`LexError`] if embedding the query or reading the index fails.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lexrag_core::EmbeddingConfig;
    /// use lexrag_retrieval::embedding::EmbeddingClient;
    /// use lexrag_retrieval::search::HybridSearch;
    /// use lexrag_retrieval::store::StatuteIndex;
    ///
    /// # async fn example() {
    /// let index = StatuteIndex::open_read_only(std::path::Path::new(".lexrag/index.db")).unwrap();
    /// let client = EmbeddingClient::with_config(&EmbeddingConfig::default()).unwrap();
    /// let search = HybridSearch::new(index, client);
    /// if let Some(context) = search.search("What does section 69 say?", 5).await.unwrap() {
    ///     println!("{context}");
    /// }
    /// # }
    /// ```
    pub async fn search(&self, query: &str, k: usize) -> Result<Option<String>, LexError> {
        let ranked = self.retrieve(query, k).await?;
        Ok(join_context(&ranked))
    }

    /// First document in ingestion order that cites section `number`.
    ///
    /// Scans the whole corpus, not just the vector hits.
    ///
    /// # Errors
    ///
    /// Returns [`LexError::Database`] on query failure.
    pub fn find_section(&self, number: &str) -> Result<Option<RetrievedDocument>, LexError> {
        let matcher = SectionMatcher::new(number);
        let found = self
            .index
            .all_documents()?
            .into_iter()
            .find(|doc| matcher.matches(&doc.text))
            .map(|doc| RetrievedDocument {
                id: doc.id,
                text: doc.text,
                score: 1.0,
                source: HitSource::Section,
            });

        match &found {
            Some(doc) => tracing::debug!(section = number, id = %doc.id, "exact section match"),
            None => tracing::debug!(section = number, "no exact section match"),
        }
        Ok(found)
    }
}

/// Put the exact section match, if any, in front of the vector hits.
///
/// The list may grow past `k`, and the match may appear twice.
///
/// # Examples
///
/// ```
/// use lexrag_core::{HitSource, RetrievedDocument};
/// use lexrag_retrieval::search::promote_exact_match;
///
/// let hit = |id: &str, source| RetrievedDocument { id: id.into(), text: id.into(), score: 0.5, source };
/// let ranked = promote_exact_match(
///     vec![hit("doc_1", HitSource::Vector), hit("doc_7", HitSource::Vector)],
///     Some(hit("doc_7", HitSource::Section)),
/// );
/// let ids: Vec<&str> = ranked.iter().map(|d| d.id.as_str()).collect();
/// assert_eq!(ids, ["doc_7", "doc_1", "doc_7"]);
/// ```
pub fn promote_exact_match(
    vector_hits: Vec<RetrievedDocument>,
    exact: Option<RetrievedDocument>,
) -> Vec<RetrievedDocument> {
    match exact {
        Some(doc) => std::iter::once(doc).chain(vector_hits).collect(),
        None => vector_hits,
    }
}

/// Keep the first occurrence of each document id.
pub fn dedupe_by_id(documents: Vec<RetrievedDocument>) -> Vec<RetrievedDocument> {
    let mut seen = std::collections::HashSet::new();
    documents
        .into_iter()
        .filter(|doc| seen.insert(doc.id.clone()))
        .collect()
}

/// Drop documents whose trimmed text has at most `min_chars` characters.
///
/// # Examples
///
/// ```
/// use lexrag_core::{HitSource, RetrievedDocument};
/// use lexrag_retrieval::search::filter_degenerate;
///
/// let doc = |text: &str| RetrievedDocument { id: "doc_0".into(), text: text.into(), score: 0.0, source: HitSource::Vector };
/// let kept = filter_degenerate(vec![doc("   short   "), doc(&"x".repeat(31))], 30);
/// assert_eq!(kept.len(), 1);
/// ```
pub fn filter_degenerate(
    documents: Vec<RetrievedDocument>,
    min_chars: usize,
) -> Vec<RetrievedDocument> {
    let before = documents.len();
    let kept: Vec<RetrievedDocument> = documents
        .into_iter()
        .filter(|doc| doc.text.trim().chars().count() > min_chars)
        .collect();
    if kept.len() < before {
        tracing::debug!(dropped = before - kept.len(), min_chars, "filtered degenerate documents");
    }
    kept
}

/// Join document texts into a context block, or `None` if there are none.
///
/// # Examples
///
/// ```
/// use lexrag_core::{HitSource, RetrievedDocument};
/// use lexrag_retrieval::search::join_context;
///
/// assert_eq!(join_context(&[]), None);
/// let doc = |text: &str| RetrievedDocument { id: "doc_0".into(), text: text.into(), score: 0.0, source: HitSource::Vector };
/// assert_eq!(join_context(&[doc("a"), doc("b")]).as_deref(), Some("a\n\nb"));
/// ```
pub fn join_context(documents: &[RetrievedDocument]) -> Option<String> {
    if documents.is_empty() {
        return None;
    }
    let texts: Vec<&str> = documents.iter().map(|doc| doc.text.as_str()).collect();
    Some(texts.join(CONTEXT_SEPARATOR))
}
