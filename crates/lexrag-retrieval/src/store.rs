//! SQLite storage for rendered statute documents and their embeddings.
//!
//! Embeddings are stored as little-endian `f32` BLOBs; cosine similarity is
//! computed in Rust for nearest-neighbour search. The index is replaced as a
//! whole on every build and opened read-only for queries.

use std::path::Path;

use lexrag_core::{HitSource, LexError, RetrievedDocument};
use rusqlite::{params, Connection, OpenFlags};
use serde::{Deserialize, Serialize};

const KEY_MODEL: &str = "embedding_model";
const KEY_DIMENSIONS: &str = "embedding_dimensions";
const KEY_LABEL: &str = "label";
const KEY_FINGERPRINT: &str = "corpus_sha256";
const KEY_BUILT_AT: &str = "built_at";

/// A statute provision ready for storage.
///
/// # Examples
///
/// ```
/// use lexrag_retrieval::store::IndexedDocument;
///
/// let doc = IndexedDocument {
///     id: "doc_0".into(),
///     section: "1".into(),
///     text: "BNS Section: 1\nSubject: Short title\n\n...".into(),
///     embedding: vec![0.1, 0.2],
/// };
/// assert_eq!(doc.id, "doc_0");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedDocument {
    /// Stable id (`doc_<n>`).
    pub id: String,
    /// Section label of the source record.
    pub section: String,
    /// Canonical rendered text.
    pub text: String,
    /// Embedding of `text`.
    pub embedding: Vec<f32>,
}

/// A stored document without its embedding, as returned by full scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    /// Stable id (`doc_<n>`).
    pub id: String,
    /// Section label of the source record.
    pub section: String,
    /// Canonical rendered text.
    pub text: String,
}

/// Facts about how an index was built.
///
/// # Examples
///
/// ```
/// use lexrag_retrieval::store::IndexMetadata;
///
/// let meta = IndexMetadata::default();
/// assert!(meta.model.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetadata {
    /// Embedding model used at build time.
    pub model: Option<String>,
    /// Embedding vector length.
    pub dimensions: Option<usize>,
    /// Document label, e.g. `"BNS Section"`.
    pub label: Option<String>,
    /// SHA-256 over the rendered corpus texts.
    pub fingerprint: Option<String>,
    /// RFC 3339 build timestamp.
    pub built_at: Option<String>,
}

/// Index statistics.
///
/// # Examples
///
/// ```
/// use lexrag_retrieval::store::IndexStats;
///
/// let stats = IndexStats {
///     total_documents: 358,
///     dimensions: Some(768),
///     index_size_bytes: 1_200_000,
/// };
/// assert_eq!(stats.total_documents, 358);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    /// Number of stored documents.
    pub total_documents: usize,
    /// Embedding dimensions, if the index has been built.
    pub dimensions: Option<usize>,
    /// Size of the index database in bytes.
    pub index_size_bytes: u64,
}

/// SQLite-backed statute index.
///
/// # Examples
///
/// ```
/// use lexrag_retrieval::store::StatuteIndex;
///
/// let index = StatuteIndex::in_memory().unwrap();
/// assert_eq!(index.stats().unwrap().total_documents, 0);
/// ```
pub struct StatuteIndex {
    conn: Connection,
}

impl StatuteIndex {
    /// Open or create an index database for building.
    ///
    /// # Errors
    ///
    /// Returns [`LexError::Database`] if the database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, LexError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    LexError::Database(format!("failed to create index directory: {e}"))
                })?;
            }
        }
        let conn = Connection::open(path)
            .map_err(|e| LexError::Database(format!("failed to open database: {e}")))?;

        let index = Self { conn };
        index.init_schema()?;
        Ok(index)
    }

    /// Open an existing index for querying. Writes through this handle fail.
    ///
    /// An index is only usable once a build has committed into it; a file
    /// left behind by an interrupted or failed build is rejected. An index
    /// built from an empty corpus is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`LexError::FileNotFound`] if no index exists at `path`,
    /// [`LexError::IndexNotBuilt`] if no build completed into it, or
    /// [`LexError::Database`] if it cannot be opened.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::Path;
    /// use lexrag_retrieval::store::StatuteIndex;
    ///
    /// let result = StatuteIndex::open_read_only(Path::new("/nonexistent/index.db"));
    /// assert!(result.is_err());
    /// ```
    pub fn open_read_only(path: &Path) -> Result<Self, LexError> {
        if !path.exists() {
            return Err(LexError::FileNotFound(path.to_path_buf()));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| LexError::Database(format!("failed to open database: {e}")))?;

        let index = Self { conn };
        if !index.is_built()? {
            return Err(LexError::IndexNotBuilt(path.to_path_buf()));
        }
        Ok(index)
    }

    /// Whether a build has committed into this index.
    ///
    /// # Errors
    ///
    /// Returns [`LexError::Database`] on query failure.
    pub fn is_built(&self) -> Result<bool, LexError> {
        let has_metadata: bool = self
            .conn
            .query_row(
                "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'metadata')",
                [],
                |row| row.get(0),
            )
            .map_err(|e| LexError::Database(format!("failed to inspect schema: {e}")))?;
        if !has_metadata {
            return Ok(false);
        }
        Ok(self.get_metadata(KEY_BUILT_AT)?.is_some())
    }

    /// Create an in-memory index (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`LexError::Database`] if schema creation fails.
    pub fn in_memory() -> Result<Self, LexError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            LexError::Database(format!("failed to create in-memory database: {e}"))
        })?;

        let index = Self { conn };
        index.init_schema()?;
        Ok(index)
    }

    fn init_schema(&self) -> Result<(), LexError> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS metadata (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS documents (
                    position INTEGER PRIMARY KEY,
                    id TEXT NOT NULL UNIQUE,
                    section TEXT NOT NULL,
                    text TEXT NOT NULL,
                    embedding BLOB NOT NULL
                );
                ",
            )
            .map_err(|e| LexError::Database(format!("failed to create schema: {e}")))?;

        Ok(())
    }

    /// Replace the whole index with `documents` in one transaction.
    ///
    /// Documents are stored in slice order, which is the order full scans
    /// and score ties are resolved in.
    ///
    /// # Errors
    ///
    /// Returns [`LexError::Database`] on write failure; the previous
    /// contents are kept in that case.
    ///
    /// # Examples
    ///
    /// ```
    /// use lexrag_retrieval::store::{IndexMetadata, IndexedDocument, StatuteIndex};
    ///
    /// let mut index = StatuteIndex::in_memory().unwrap();
    /// let doc = IndexedDocument {
    ///     id: "doc_0".into(),
    ///     section: "1".into(),
        ///     text: "BNS Section: 1".into(),
    ///     embedding: vec![1.0, 0.0],
    /// };
    /// index.replace_all(&[doc], &IndexMetadata::default()).unwrap();
    /// assert_eq!(index.stats().unwrap().total_documents, 1);
    /// ```
    pub fn replace_all(
        &mut self,
        documents: &[IndexedDocument],
        metadata: &IndexMetadata,
    ) -> Result<(), LexError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| LexError::Database(format!("failed to begin transaction: {e}")))?;

        tx.execute_batch("DELETE FROM documents; DELETE FROM metadata;")
            .map_err(|e| LexError::Database(format!("failed to clear index: {e}")))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO documents (position, id, section, text, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(|e| LexError::Database(format!("failed to prepare insert: {e}")))?;

            for (position, doc) in documents.iter().enumerate() {
                stmt.execute(params![
                    position as i64,
                    doc.id,
                    doc.section,
                    doc.text,
                    floats_to_bytes(&doc.embedding),
                ])
                .map_err(|e| {
                    LexError::Database(format!("failed to insert document {}: {e}", doc.id))
                })?;
            }

            let mut meta = tx
                .prepare("INSERT INTO metadata (key, value) VALUES (?1, ?2)")
                .map_err(|e| LexError::Database(format!("failed to prepare metadata: {e}")))?;
            let dimensions = metadata.dimensions.map(|d| d.to_string());
            let entries = [
                (KEY_MODEL, metadata.model.as_deref()),
                (KEY_DIMENSIONS, dimensions.as_deref()),
                (KEY_LABEL, metadata.label.as_deref()),
                (KEY_FINGERPRINT, metadata.fingerprint.as_deref()),
                (KEY_BUILT_AT, metadata.built_at.as_deref()),
            ];
            for (key, value) in entries {
                if let Some(value) = value {
                    meta.execute(params![key, value]).map_err(|e| {
                        LexError::Database(format!("failed to set metadata '{key}': {e}"))
                    })?;
                }
            }
        }

        tx.commit()
            .map_err(|e| LexError::Database(format!("failed to commit index: {e}")))?;
        Ok(())
    }

    /// Read the build metadata.
    ///
    /// # Errors
    ///
    /// Returns [`LexError::Database`] on query failure or corrupted values.
    pub fn metadata(&self) -> Result<IndexMetadata, LexError> {
        let dimensions = match self.get_metadata(KEY_DIMENSIONS)? {
            Some(v) => Some(v.parse::<usize>().map_err(|_| {
                LexError::Database(format!("Corrupted dimension metadata in index: '{v}'"))
            })?),
            None => None,
        };
        Ok(IndexMetadata {
            model: self.get_metadata(KEY_MODEL)?,
            dimensions,
            label: self.get_metadata(KEY_LABEL)?,
            fingerprint: self.get_metadata(KEY_FINGERPRINT)?,
            built_at: self.get_metadata(KEY_BUILT_AT)?,
        })
    }

    /// Refuse to query an index built with a different embedding model.
    ///
    /// Indexes without a recorded model are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`LexError::Config`] naming both models on mismatch.
    pub fn check_model(&self, model: &str) -> Result<(), LexError> {
        match self.get_metadata(KEY_MODEL)? {
            Some(stored) if stored != model => Err(LexError::Config(format!(
                "index was built with embedding model '{stored}' but '{model}' is configured. \
                 Rebuild with `lexrag index`."
            ))),
            _ => Ok(()),
        }
    }

    fn get_metadata(&self, key: &str) -> Result<Option<String>, LexError> {
        let result = self.conn.query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            params![key],
            |row| row.get(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(LexError::Database(format!(
                "failed to get metadata '{key}': {e}"
            ))),
        }
    }

    /// Nearest-neighbour search by cosine similarity.
    ///
    /// Returns up to `k` documents, most similar first. Equal scores keep
    /// ingestion order.
    ///
    /// # Errors
    ///
    /// Returns [`LexError::Database`] on query failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use lexrag_retrieval::store::StatuteIndex;
    ///
    /// let index = StatuteIndex::in_memory().unwrap();
    /// assert!(index.nearest(&[0.1, 0.2], 5).unwrap().is_empty());
    /// ```
    pub fn nearest(
        &self,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievedDocument>, LexError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, text, embedding FROM documents ORDER BY position")
            .map_err(|e| LexError::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                let embedding_bytes: Vec<u8> = row.get(2)?;
                let score = cosine_similarity(query_embedding, &bytes_to_floats(&embedding_bytes));
                Ok(RetrievedDocument {
                    id: row.get(0)?,
                    text: row.get(1)?,
                    score,
                    source: HitSource::Vector,
                })
            })
            .map_err(|e| LexError::Database(format!("failed to query documents: {e}")))?;

        let mut scored = Vec::new();
        for row in rows {
            scored.push(row.map_err(|e| LexError::Database(format!("failed to read row: {e}")))?);
        }

        // Stable sort: ties stay in ingestion order.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }

    /// Every stored document, in ingestion order.
    ///
    /// # Errors
    ///
    /// Returns [`LexError::Database`] on query failure.
    pub fn all_documents(&self) -> Result<Vec<StoredDocument>, LexError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, section, text FROM documents ORDER BY position")
            .map_err(|e| LexError::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(StoredDocument {
                    id: row.get(0)?,
                    section: row.get(1)?,
                    text: row.get(2)?,
                })
            })
            .map_err(|e| LexError::Database(format!("failed to query documents: {e}")))?;

        let mut documents = Vec::new();
        for row in rows {
            documents
                .push(row.map_err(|e| LexError::Database(format!("failed to read row: {e}")))?);
        }
        Ok(documents)
    }

    /// Get index statistics.
    ///
    /// # Errors
    ///
    /// Returns [`LexError::Database`] on query failure.
    pub fn stats(&self) -> Result<IndexStats, LexError> {
        let total_documents: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .map_err(|e| LexError::Database(format!("failed to count documents: {e}")))?;

        // For in-memory databases, page_count returns a small number
        let page_count: i64 = self
            .conn
            .query_row("PRAGMA page_count", [], |row| row.get(0))
            .unwrap_or(0);
        let page_size: i64 = self
            .conn
            .query_row("PRAGMA page_size", [], |row| row.get(0))
            .unwrap_or(4096);

        Ok(IndexStats {
            total_documents: total_documents as usize,
            dimensions: self.metadata()?.dimensions,
            index_size_bytes: (page_count * page_size) as u64,
        })
    }
}

fn floats_to_bytes(floats: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(floats.len() * 4);
    for f in floats {
        bytes.extend_from_slice(&f.to_le_bytes());
    }
    bytes
}

fn bytes_to_floats(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }

    let score = dot / denom;
    if score.is_finite() {
        score
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(n: usize, text: &str, embedding: &[f32]) -> IndexedDocument {
        IndexedDocument {
            id: format!("doc_{n}"),
            section: n.to_string(),
            text: text.into(),
            embedding: embedding.to_vec(),
        }
    }

    fn metadata() -> IndexMetadata {
        IndexMetadata {
            model: Some("mock".into()),
            dimensions: Some(3),
            label: Some("BNS Section".into()),
            fingerprint: Some("abc".into()),
            built_at: Some("2026-01-01T00:00:00Z".into()),
        }
    }

    #[test]
    fn replace_all_stores_documents_and_metadata() {
        let mut index = StatuteIndex::in_memory().unwrap();
        index
            .replace_all(
                &[doc(0, "theft", &[1.0, 0.0, 0.0]), doc(1, "murder", &[0.0, 1.0, 0.0])],
                &metadata(),
            )
            .unwrap();

        let stats = index.stats().unwrap();
        assert_eq!(stats.total_documents, 2);
        assert_eq!(stats.dimensions, Some(3));
        assert_eq!(index.metadata().unwrap(), metadata());
    }

    #[test]
    fn replace_all_discards_previous_contents() {
        let mut index = StatuteIndex::in_memory().unwrap();
        index
            .replace_all(&[doc(0, "a", &[1.0]), doc(1, "b", &[1.0])], &metadata())
            .unwrap();
        index
            .replace_all(&[doc(0, "c", &[1.0])], &IndexMetadata::default())
            .unwrap();

        let all = index.all_documents().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].text, "c");
        assert!(index.metadata().unwrap().model.is_none());
    }

    #[test]
    fn failed_replace_keeps_previous_contents() {
        let mut index = StatuteIndex::in_memory().unwrap();
        index.replace_all(&[doc(0, "kept", &[1.0])], &metadata()).unwrap();

        // Duplicate ids violate the UNIQUE constraint mid-transaction.
        let result = index.replace_all(&[doc(0, "x", &[1.0]), doc(0, "y", &[1.0])], &metadata());
        assert!(result.is_err());

        let all = index.all_documents().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].text, "kept");
    }

    #[test]
    fn nearest_orders_by_similarity() {
        let mut index = StatuteIndex::in_memory().unwrap();
        index
            .replace_all(
                &[
                    doc(0, "theft", &[1.0, 0.0, 0.0]),
                    doc(1, "murder", &[0.0, 1.0, 0.0]),
                    doc(2, "robbery", &[0.7, 0.7, 0.0]),
                ],
                &metadata(),
            )
            .unwrap();

        let hits = index.nearest(&[0.0, 0.9, 0.1], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "murder");
        assert_eq!(hits[1].text, "robbery");
        assert!(hits.iter().all(|h| h.source == HitSource::Vector));
    }

    #[test]
    fn nearest_ties_keep_ingestion_order() {
        let mut index = StatuteIndex::in_memory().unwrap();
        index
            .replace_all(
                &[doc(0, "first", &[1.0, 0.0]), doc(1, "second", &[1.0, 0.0])],
                &metadata(),
            )
            .unwrap();

        let hits = index.nearest(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].id, "doc_0");
        assert_eq!(hits[1].id, "doc_1");
    }

    #[test]
    fn all_documents_in_ingestion_order() {
        let mut index = StatuteIndex::in_memory().unwrap();
        let docs: Vec<_> = (0..12).map(|n| doc(n, &format!("text {n}"), &[1.0])).collect();
        index.replace_all(&docs, &metadata()).unwrap();

        let ids: Vec<String> = index.all_documents().unwrap().into_iter().map(|d| d.id).collect();
        let expected: Vec<String> = (0..12).map(|n| format!("doc_{n}")).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn check_model_detects_mismatch() {
        let mut index = StatuteIndex::in_memory().unwrap();
        assert!(index.check_model("anything").is_ok());

        index.replace_all(&[], &metadata()).unwrap();
        assert!(index.check_model("mock").is_ok());
        let err = index.check_model("other-model").unwrap_err().to_string();
        assert!(err.contains("mock"));
        assert!(err.contains("other-model"));
    }

    #[test]
    fn read_only_index_sees_built_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/index.db");
        {
            let mut index = StatuteIndex::open(&path).unwrap();
            index.replace_all(&[doc(0, "theft", &[1.0, 0.0])], &metadata()).unwrap();
        }

        let mut index = StatuteIndex::open_read_only(&path).unwrap();
        assert_eq!(index.stats().unwrap().total_documents, 1);
        assert!(index.replace_all(&[], &metadata()).is_err());
    }

    #[test]
    fn schema_only_index_is_not_built() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        drop(StatuteIndex::open(&path).unwrap());

        let result = StatuteIndex::open_read_only(&path);
        assert!(matches!(result, Err(LexError::IndexNotBuilt(p)) if p == path));
    }

    #[test]
    fn empty_build_is_still_built() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        {
            let mut index = StatuteIndex::open(&path).unwrap();
            assert!(!index.is_built().unwrap());
            index.replace_all(&[], &metadata()).unwrap();
            assert!(index.is_built().unwrap());
        }

        let index = StatuteIndex::open_read_only(&path).unwrap();
        assert_eq!(index.stats().unwrap().total_documents, 0);
    }

    #[test]
    fn nan_embedding_does_not_outrank_real_match() {
        let mut index = StatuteIndex::in_memory().unwrap();
        index
            .replace_all(
                &[
                    doc(0, "broken", &[f32::NAN, 0.0]),
                    doc(1, "theft", &[1.0, 0.0]),
                ],
                &metadata(),
            )
            .unwrap();

        let hits = index.nearest(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].id, "doc_1");
        assert_eq!(hits[1].score, 0.0);
    }

    #[test]
    fn open_read_only_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = StatuteIndex::open_read_only(&dir.path().join("index.db"));
        assert!(matches!(result, Err(LexError::FileNotFound(_))));
    }

    #[test]
    fn cosine_similarity_correct() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn floats_bytes_roundtrip() {
        let original = vec![1.0f32, -2.5, 0.0, 3.25];
        assert_eq!(bytes_to_floats(&floats_to_bytes(&original)), original);
    }
}
