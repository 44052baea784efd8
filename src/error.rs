//! Typed errors for the knowledge base pipeline.
//!
//! Per-item failures (one URL, one record in an embedding batch) are absorbed
//! and logged where they occur; everything that crosses a component boundary
//! is one of these variants. The CLI converts them through `anyhow` for
//! display.

use thiserror::Error;

/// Pipeline-level failures surfaced by the knowledge base components.
#[derive(Debug, Error)]
pub enum KbError {
    /// A build was attempted with zero accepted documents.
    #[error("no relevant fitness content found; check the source URLs or try different sources")]
    EmptyCorpus,

    /// A query method was called before the index was built or loaded.
    #[error("knowledge base not initialized; call initialize() first")]
    NotInitialized,

    /// The embedding service rejected a request or all retries were exhausted.
    #[error("embedding request failed: {0}")]
    Embedding(String),

    /// The chat-completion service rejected a request, timed out, or all
    /// retries were exhausted.
    #[error("language model request failed: {0}")]
    Chat(String),

    /// A persisted artifact exists but does not describe a usable index.
    #[error("invalid knowledge index: {0}")]
    InvalidIndex(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
