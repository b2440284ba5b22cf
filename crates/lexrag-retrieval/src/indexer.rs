//! Building the statute index: render, embed, store.

use lexrag_core::{LexError, StatuteRecord};
use sha2::{Digest, Sha256};

use crate::embedding::Embedder;
use crate::store::{IndexMetadata, IndexStats, IndexedDocument, StatuteIndex};

/// Render a record into the canonical document text.
///
/// The exact-section scan at query time depends on this layout: the label
/// (which contains the word `Section`) followed by `": "` and the section.
///
/// # Examples
///
/// ```
/// use lexrag_core::StatuteRecord;
/// use lexrag_retrieval::indexer::render_document;
///
/// let record = StatuteRecord {
///     section: "69".into(),
///     subject: "Sexual intercourse by employing deceitful means".into(),
///     body: "Whoever, by deceitful means ...".into(),
/// };
/// assert_eq!(
///     render_document("BNS Section", &record),
///     "BNS Section: 69\nSubject: Sexual intercourse by employing deceitful means\n\nWhoever, by deceitful means ...",
/// );
/// ```
pub fn render_document(label: &str, record: &StatuteRecord) -> String {
    format!(
        "{label}: {}\nSubject: {}\n\n{}",
        record.section, record.subject, record.body
    )
}

/// Document id for the record at `position` in ingestion order.
///
/// # Examples
///
/// ```
/// use lexrag_retrieval::indexer::document_id;
///
/// assert_eq!(document_id(0), "doc_0");
/// ```
pub fn document_id(position: usize) -> String {
    format!("doc_{position}")
}

/// SHA-256 over the rendered texts, in order.
pub fn corpus_fingerprint<S: AsRef<str>>(texts: &[S]) -> String {
    let mut hasher = Sha256::new();
    for text in texts {
        hasher.update(text.as_ref().as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Build (or rebuild) `index` from `records`.
///
/// One document per record, ids assigned in input order. The previous index
/// contents are replaced atomically. An empty corpus yields an empty index.
///
/// # Errors
///
/// Returns [`LexError::Embedding`] if the embedder returns the wrong number of
/// vectors or vectors of differing length, any error from the embedder
/// itself, and [`LexError::Database`] if the index cannot be written.
///
/// # Examples
///
/// ```no_run
/// use lexrag_core::EmbeddingConfig;
/// use lexrag_retrieval::embedding::EmbeddingClient;
/// use lexrag_retrieval::indexer::build_index;
/// use lexrag_retrieval::store::StatuteIndex;
///
/// # async fn example() {
/// let client = EmbeddingClient::with_config(&EmbeddingConfig::default()).unwrap();
/// let mut index = StatuteIndex::open(std::path::Path::new(".lexrag/index.db")).unwrap();
/// let stats = build_index(&[], &client, &mut index, "BNS Section").await.unwrap();
/// assert_eq!(stats.total_documents, 0);
/// # }
/// ```
pub async fn build_index<E: Embedder>(
    records: &[StatuteRecord],
    embedder: &E,
    index: &mut StatuteIndex,
    label: &str,
) -> Result<IndexStats, LexError> {
    let texts: Vec<String> = records.iter().map(|r| render_document(label, r)).collect();

    let embeddings = if texts.is_empty() {
        Vec::new()
    } else {
        embedder.embed_batch(&texts).await?
    };
    if embeddings.len() != texts.len() {
        return Err(LexError::Embedding(format!(
            "embedder returned {} vectors for {} documents",
            embeddings.len(),
            texts.len()
        )));
    }

    let dimensions = embeddings.first().map(Vec::len);
    if let Some(dims) = dimensions {
        if let Some(pos) = embeddings.iter().position(|e| e.len() != dims) {
            return Err(LexError::Embedding(format!(
                "inconsistent embedding dimensions: {} has {} but {} has {dims}",
                document_id(pos),
                embeddings[pos].len(),
                document_id(0),
            )));
        }
    }

    let metadata = IndexMetadata {
        model: Some(embedder.model().to_string()),
        dimensions,
        label: Some(label.to_string()),
        fingerprint: Some(corpus_fingerprint(&texts)),
        built_at: Some(chrono::Utc::now().to_rfc3339()),
    };

    let documents: Vec<IndexedDocument> = records
        .iter()
        .zip(texts)
        .zip(embeddings)
        .enumerate()
        .map(|(position, ((record, text), embedding))| IndexedDocument {
            id: document_id(position),
            section: record.section.clone(),
            text,
            embedding,
        })
        .collect();

    index.replace_all(&documents, &metadata)?;
    tracing::info!(
        documents = documents.len(),
        model = embedder.model(),
        "statute index built"
    );

    index.stats()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEmbedder;

    fn record(section: &str, subject: &str, body: &str) -> StatuteRecord {
        StatuteRecord {
            section: section.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    struct ShortEmbedder;

    impl Embedder for ShortEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LexError> {
            Ok(texts.iter().skip(1).map(|_| vec![1.0]).collect())
        }

        async fn embed_query(&self, _query: &str) -> Result<Vec<f32>, LexError> {
            Ok(vec![1.0])
        }

        fn model(&self) -> &str {
            "short"
        }
    }

    struct UnavailableEmbedder;

    impl Embedder for UnavailableEmbedder {
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, LexError> {
            Err(LexError::Upstream {
                service: "embedding",
                status: 503,
                body: "service unavailable".into(),
            })
        }

        async fn embed_query(&self, _query: &str) -> Result<Vec<f32>, LexError> {
            Ok(vec![1.0])
        }

        fn model(&self) -> &str {
            "unavailable"
        }
    }

    #[test]
    fn render_uses_label_and_blank_line() {
        let text = render_document("IPC Section", &record("420", "Cheating", "Whoever cheats ..."));
        assert_eq!(text, "IPC Section: 420\nSubject: Cheating\n\nWhoever cheats ...");
    }

    #[test]
    fn fingerprint_depends_on_order() {
        let a = corpus_fingerprint(&["x", "y"]);
        let b = corpus_fingerprint(&["y", "x"]);
        assert_ne!(a, b);
        assert_eq!(a, corpus_fingerprint(&["x".to_string(), "y".to_string()]));
    }

    #[tokio::test]
    async fn build_assigns_sequential_ids() {
        let embedder = MockEmbedder::default();
        let mut index = StatuteIndex::in_memory().unwrap();
        let records = vec![
            record("303", "Theft", "Whoever, intending to take dishonestly any movable property ..."),
            record("309", "Robbery", "In all robbery there is either theft or extortion ..."),
        ];

        let stats = build_index(&records, &embedder, &mut index, "BNS Section")
            .await
            .unwrap();
        assert_eq!(stats.total_documents, 2);
        assert_eq!(stats.dimensions, Some(256));

        let docs = index.all_documents().unwrap();
        assert_eq!(docs[0].id, "doc_0");
        assert_eq!(docs[0].section, "303");
        assert!(docs[0].text.starts_with("BNS Section: 303\nSubject: Theft\n\n"));
        assert_eq!(docs[1].id, "doc_1");

        let meta = index.metadata().unwrap();
        assert_eq!(meta.model.as_deref(), Some("mock-bag-of-words"));
        assert_eq!(meta.label.as_deref(), Some("BNS Section"));
        assert!(meta.built_at.is_some());
    }

    #[tokio::test]
    async fn empty_corpus_builds_empty_index_without_embedding() {
        let embedder = MockEmbedder::default();
        let mut index = StatuteIndex::in_memory().unwrap();

        let stats = build_index(&[], &embedder, &mut index, "BNS Section").await.unwrap();
        assert_eq!(stats.total_documents, 0);
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn rebuild_replaces_previous_index() {
        let embedder = MockEmbedder::default();
        let mut index = StatuteIndex::in_memory().unwrap();
        let first = vec![record("1", "a", "aaa"), record("2", "b", "bbb")];
        let second = vec![record("3", "c", "ccc")];

        build_index(&first, &embedder, &mut index, "BNS Section").await.unwrap();
        let stats = build_index(&second, &embedder, &mut index, "BNS Section").await.unwrap();

        assert_eq!(stats.total_documents, 1);
        assert_eq!(index.all_documents().unwrap()[0].section, "3");
    }

    #[tokio::test]
    async fn rebuild_of_same_corpus_has_same_fingerprint() {
        let embedder = MockEmbedder::default();
        let records = vec![record("1", "a", "aaa"), record("2", "b", "bbb")];
        let mut first = StatuteIndex::in_memory().unwrap();
        let mut second = StatuteIndex::in_memory().unwrap();

        build_index(&records, &embedder, &mut first, "BNS Section").await.unwrap();
        build_index(&records, &embedder, &mut second, "BNS Section").await.unwrap();

        assert_eq!(
            first.metadata().unwrap().fingerprint,
            second.metadata().unwrap().fingerprint
        );
    }

    #[tokio::test]
    async fn vector_count_mismatch_is_rejected() {
        let mut index = StatuteIndex::in_memory().unwrap();
        let records = vec![record("1", "a", "aaa"), record("2", "b", "bbb")];

        let err = build_index(&records, &ShortEmbedder, &mut index, "BNS Section")
            .await
            .unwrap_err();
        assert!(matches!(err, LexError::Embedding(_)));
        assert_eq!(index.stats().unwrap().total_documents, 0);
    }

    #[tokio::test]
    async fn failed_first_build_leaves_unqueryable_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        let records = vec![record("303", "Theft", "Whoever, intending to take dishonestly ...")];

        let mut index = StatuteIndex::open(&path).unwrap();
        let err = build_index(&records, &UnavailableEmbedder, &mut index, "BNS Section")
            .await
            .unwrap_err();
        assert!(matches!(err, LexError::Upstream { status: 503, .. }));
        drop(index);

        let result = StatuteIndex::open_read_only(&path);
        assert!(matches!(result, Err(LexError::IndexNotBuilt(_))));
    }

    #[tokio::test]
    async fn failed_rebuild_keeps_previous_index_queryable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        let records = vec![record("303", "Theft", "Whoever, intending to take dishonestly ...")];

        let mut index = StatuteIndex::open(&path).unwrap();
        build_index(&records, &MockEmbedder::default(), &mut index, "BNS Section")
            .await
            .unwrap();
        assert!(build_index(&records, &UnavailableEmbedder, &mut index, "BNS Section")
            .await
            .is_err());
        drop(index);

        let index = StatuteIndex::open_read_only(&path).unwrap();
        assert_eq!(index.stats().unwrap().total_documents, 1);
    }
}
