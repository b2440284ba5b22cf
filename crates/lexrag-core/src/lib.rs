//! Core types, configuration, and error handling for lexrag.
//!
//! This crate provides the shared foundation used by the other lexrag crates:
//! - [`LexError`]: unified error type using `thiserror`
//! - [`LexConfig`]: configuration loaded from `.lexrag.toml`
//! - Shared types: [`StatuteRecord`], [`RetrievedDocument`], [`HitSource`],
//!   [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{
    EmbeddingConfig, IndexConfig, LexConfig, LlmConfig, RetrievalConfig, DEFAULT_CONFIG_FILE,
};
pub use error::LexError;
pub use types::{HitSource, OutputFormat, RetrievedDocument, StatuteRecord};

/// A convenience `Result` type for lexrag operations.
pub type Result<T> = std::result::Result<T, LexError>;
