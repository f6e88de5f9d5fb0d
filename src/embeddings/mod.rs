//! Embedding generation for chunks and queries.

pub mod client;

use async_trait::async_trait;

use crate::errors::Result;

pub use client::OpenAiEmbeddings;

/// Capability for turning text into a fixed-dimension vector.
///
/// One deployment uses one model, so every vector a provider returns has
/// the same length; mixing providers against one index is unsupported.
/// Rate-limit retry/backoff is the caller's responsibility.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// The vector length this provider produces.
    fn dimension(&self) -> usize;
}
