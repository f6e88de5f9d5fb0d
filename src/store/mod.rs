//! Vector storage backends for embedded document chunks.
//!
//! The [`VectorStore`] trait abstracts over the two supported backends so
//! the ingestion and retrieval pipelines never branch on which engine is
//! configured:
//!
//! - [`mongo::MongoVectorStore`] — MongoDB Atlas Vector Search. Index
//!   provisioning is asynchronous and approximate-nearest-neighbor search
//!   runs through an aggregation pipeline.
//! - [`redis::RedisVectorStore`] — Redis with a FLAT (exact) vector index
//!   over hash records.
//!
//! Score normalization lives inside each backend: callers always receive
//! results where a higher score means a more relevant chunk, regardless of
//! whether the engine reports a similarity or a distance.

pub mod mongo;
pub mod redis;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::config::AppConfig;
use crate::config::StoreBackend;
use crate::errors::Result;

/// One embedded text segment, as persisted by a store.
///
/// `chunk_index` is the chunk's position in the splitter's output for its
/// source document; together with `filename` it identifies the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk: String,
    pub embedding: Vec<f32>,
    pub filename: String,
    pub filepath: String,
    pub chunk_index: usize,
}

/// A retrieved chunk with its normalized relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: String,
    pub filename: String,
    pub filepath: String,
    pub chunk_index: usize,
    pub score: f32,
}

/// Similarity metric configured on a vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    Cosine,
    DotProduct,
    Euclidean,
}

impl Metric {
    /// Spelling used by Atlas Vector Search index definitions.
    pub fn as_atlas_str(self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::DotProduct => "dotProduct",
            Metric::Euclidean => "euclidean",
        }
    }

    /// Spelling used by the Redis `FT.CREATE` vector schema.
    pub fn as_redis_str(self) -> &'static str {
        match self {
            Metric::Cosine => "COSINE",
            Metric::DotProduct => "IP",
            Metric::Euclidean => "L2",
        }
    }
}

/// Lifecycle of a search index as reported by its backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Absent,
    Creating,
    Ready,
    Failed,
}

/// Common contract for vector-search backends.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Provision the index if it does not exist yet and wait until it is
    /// usable. Idempotent; an existing index with a conflicting dimension
    /// or metric fails with `IndexConflict`.
    async fn ensure_index(&self, dimension: usize, metric: Metric) -> Result<()>;

    /// Add the record, or replace the one with the same filename and
    /// chunk index.
    async fn upsert_record(&self, record: &ChunkRecord) -> Result<()>;

    /// Return at most `top_k` chunks in descending normalized score.
    /// An empty index yields an empty vec. Fails with `DimensionMismatch`
    /// before touching the backend when the query vector has the wrong
    /// length.
    async fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>>;
}

/// Build the configured store variant.
pub async fn from_config(config: &AppConfig) -> Result<Arc<dyn VectorStore>> {
    match config.store.backend {
        StoreBackend::Mongodb => Ok(Arc::new(mongo::MongoVectorStore::connect(config).await?)),
        StoreBackend::Redis => Ok(Arc::new(redis::RedisVectorStore::connect(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_spellings_match_the_backends() {
        assert_eq!(Metric::Cosine.as_atlas_str(), "cosine");
        assert_eq!(Metric::DotProduct.as_atlas_str(), "dotProduct");
        assert_eq!(Metric::Euclidean.as_atlas_str(), "euclidean");
        assert_eq!(Metric::Cosine.as_redis_str(), "COSINE");
        assert_eq!(Metric::DotProduct.as_redis_str(), "IP");
        assert_eq!(Metric::Euclidean.as_redis_str(), "L2");
    }

    #[test]
    fn scored_chunks_serialize_with_wire_field_names() {
        let chunk = ScoredChunk {
            chunk: "some text".to_string(),
            filename: "doc.txt".to_string(),
            filepath: "/data/doc.txt".to_string(),
            chunk_index: 2,
            score: 0.91,
        };
        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["chunk"], "some text");
        assert_eq!(json["chunk_index"], 2);
    }
}
