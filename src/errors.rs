use std::fmt::Display;

use thiserror::Error;

use crate::chunker::ChunkError;

#[derive(Error, Debug)]
pub enum DocRagError {
    #[error("chunking error: {0}")]
    Chunking(#[from] ChunkError),

    #[error("{provider} {operation} failed: {message}")]
    Provider {
        provider: &'static str,
        operation: &'static str,
        message: String,
    },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("vector index '{index}' conflicts with the requested configuration: {detail}")]
    IndexConflict { index: String, detail: String },

    #[error("no relevant documents found")]
    NoRelevantDocuments,

    #[error("{backend} store {operation} failed: {message}")]
    Store {
        backend: &'static str,
        operation: &'static str,
        message: String,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DocRagError {
    /// Wrap a backend failure with the store variant and operation that hit it.
    pub(crate) fn store(
        backend: &'static str,
        operation: &'static str,
        err: impl Display,
    ) -> Self {
        Self::Store {
            backend,
            operation,
            message: err.to_string(),
        }
    }

    /// Wrap a provider failure with the provider and operation that hit it.
    pub(crate) fn provider(
        provider: &'static str,
        operation: &'static str,
        err: impl Display,
    ) -> Self {
        Self::Provider {
            provider,
            operation,
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DocRagError>;
