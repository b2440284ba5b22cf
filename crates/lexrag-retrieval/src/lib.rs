//! Statute indexing and hybrid retrieval.
//!
//! Renders statute records into canonical documents, embeds them, and stores
//! them in a SQLite index. At query time, nearest-neighbour search is combined
//! with an exact-section fallback so a section the user names explicitly is
//! always surfaced first.

pub mod corpus;
pub mod embedding;
pub mod indexer;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod search;
pub mod section;
pub mod store;
