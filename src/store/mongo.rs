//! MongoDB Atlas Vector Search backend.
//!
//! Atlas provisions search indexes asynchronously: a create request moves
//! the index into a building state and it only becomes queryable once the
//! server reports `READY`. [`MongoVectorStore::ensure_index`] drives that
//! state machine, polling at a configured interval with an optional
//! deadline. Search runs as a `$vectorSearch` aggregation with an
//! over-fetch factor to improve approximate-nearest-neighbor recall.

use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::doc;
use mongodb::bson::Bson;
use mongodb::bson::Document;
use mongodb::Client;
use mongodb::Collection;
use mongodb::SearchIndexModel;
use mongodb::SearchIndexType;
use tracing::debug;
use tracing::info;

use crate::config::AppConfig;
use crate::errors::DocRagError;
use crate::errors::Result;
use crate::store::ChunkRecord;
use crate::store::IndexState;
use crate::store::Metric;
use crate::store::ScoredChunk;
use crate::store::VectorStore;

const BACKEND: &str = "mongodb";

pub struct MongoVectorStore {
    collection: Collection<Document>,
    index_name: String,
    dimension: usize,
    candidate_factor: usize,
    poll_interval: Duration,
    ready_timeout: Option<Duration>,
}

impl MongoVectorStore {
    /// Connect to the configured cluster. The driver connects lazily, so
    /// this validates the URI but does not require the server to be up.
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let mongo = &config.store.mongodb;
        let client = Client::with_uri_str(&mongo.uri)
            .await
            .map_err(|e| DocRagError::store(BACKEND, "connect", e))?;
        let collection = client
            .database(&mongo.database)
            .collection::<Document>(&mongo.collection);

        Ok(Self {
            collection,
            index_name: mongo.index_name.clone(),
            dimension: config.embeddings.dimension,
            candidate_factor: config.retrieval.candidate_factor.max(1),
            poll_interval: Duration::from_secs(config.index.poll_interval_secs.max(1)),
            ready_timeout: config.index.ready_timeout_secs.map(Duration::from_secs),
        })
    }

    /// Look up the index by name. `None` means absent; an existing index
    /// whose definition disagrees with the requested dimension or metric
    /// is a configuration error, never silently reused.
    async fn lookup_index(&self, dimension: usize, metric: Metric) -> Result<Option<IndexState>> {
        let mut cursor = self
            .collection
            .list_search_indexes()
            .await
            .map_err(|e| DocRagError::store(BACKEND, "list_search_indexes", e))?;

        while let Some(index_doc) = cursor
            .try_next()
            .await
            .map_err(|e| DocRagError::store(BACKEND, "list_search_indexes", e))?
        {
            if index_doc.get_str("name").ok() != Some(self.index_name.as_str()) {
                continue;
            }
            if let Some(detail) = definition_conflict(&index_doc, dimension, metric) {
                return Err(DocRagError::IndexConflict {
                    index: self.index_name.clone(),
                    detail,
                });
            }
            let status = index_doc.get_str("status").unwrap_or("PENDING");
            return Ok(Some(state_from_status(status)));
        }

        Ok(None)
    }

    async fn wait_until_ready(&self, dimension: usize, metric: Metric) -> Result<()> {
        let started = Instant::now();
        loop {
            match self.lookup_index(dimension, metric).await? {
                Some(IndexState::Ready) => {
                    info!("vector index '{}' is ready", self.index_name);
                    return Ok(());
                }
                Some(IndexState::Failed) => {
                    return Err(DocRagError::store(
                        BACKEND,
                        "ensure_index",
                        format!("provisioning of index '{}' failed", self.index_name),
                    ));
                }
                _ => {}
            }
            if let Some(timeout) = self.ready_timeout {
                if started.elapsed() >= timeout {
                    return Err(DocRagError::store(
                        BACKEND,
                        "ensure_index",
                        format!(
                            "index '{}' was not ready within {}s",
                            self.index_name,
                            timeout.as_secs()
                        ),
                    ));
                }
            }
            debug!(
                "vector index '{}' still provisioning, polling again in {}s",
                self.index_name,
                self.poll_interval.as_secs()
            );
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl VectorStore for MongoVectorStore {
    async fn ensure_index(&self, dimension: usize, metric: Metric) -> Result<()> {
        match self.lookup_index(dimension, metric).await? {
            Some(IndexState::Ready) => return Ok(()),
            Some(IndexState::Failed) => {
                return Err(DocRagError::store(
                    BACKEND,
                    "ensure_index",
                    format!("previous provisioning of index '{}' failed", self.index_name),
                ));
            }
            Some(_) => {
                debug!("vector index '{}' already provisioning", self.index_name);
            }
            None => {
                info!(
                    "creating vector index '{}' ({}d, {})",
                    self.index_name,
                    dimension,
                    metric.as_atlas_str()
                );
                let model = SearchIndexModel::builder()
                    .name(self.index_name.clone())
                    .index_type(SearchIndexType::VectorSearch)
                    .definition(index_definition(dimension, metric))
                    .build();
                self.collection
                    .create_search_index(model)
                    .await
                    .map_err(|e| DocRagError::store(BACKEND, "create_search_index", e))?;
            }
        }
        self.wait_until_ready(dimension, metric).await
    }

    async fn upsert_record(&self, record: &ChunkRecord) -> Result<()> {
        if record.embedding.len() != self.dimension {
            return Err(DocRagError::DimensionMismatch {
                expected: self.dimension,
                actual: record.embedding.len(),
            });
        }
        // BSON has no f32 array; embeddings are stored as doubles.
        let embedding: Vec<f64> = record.embedding.iter().map(|v| f64::from(*v)).collect();
        let document = doc! {
            "chunk": &record.chunk,
            "embedding": embedding,
            "filename": &record.filename,
            "filepath": &record.filepath,
            "chunk_index": record.chunk_index as i64,
        };
        let filter = doc! {
            "filename": &record.filename,
            "chunk_index": record.chunk_index as i64,
        };
        self.collection
            .replace_one(filter, document)
            .upsert(true)
            .await
            .map_err(|e| DocRagError::store(BACKEND, "upsert_record", e))?;
        Ok(())
    }

    async fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>> {
        if query_vector.len() != self.dimension {
            return Err(DocRagError::DimensionMismatch {
                expected: self.dimension,
                actual: query_vector.len(),
            });
        }
        let pipeline = search_pipeline(&self.index_name, query_vector, top_k, self.candidate_factor);
        let mut cursor = self
            .collection
            .aggregate(pipeline)
            .await
            .map_err(|e| DocRagError::store(BACKEND, "search", e))?;

        let mut results = Vec::new();
        while let Some(document) = cursor
            .try_next()
            .await
            .map_err(|e| DocRagError::store(BACKEND, "search", e))?
        {
            results.push(scored_chunk_from_document(&document)?);
        }
        Ok(results)
    }
}

fn index_definition(dimension: usize, metric: Metric) -> Document {
    doc! {
        "fields": [{
            "type": "vector",
            "path": "embedding",
            "numDimensions": dimension as i64,
            "similarity": metric.as_atlas_str(),
        }]
    }
}

/// Approximate-nearest-neighbor search stage plus a projection that strips
/// internal row identifiers. Atlas reports `vectorSearchScore` already
/// normalized to higher-is-better for the configured metric.
fn search_pipeline(
    index_name: &str,
    query_vector: &[f32],
    top_k: usize,
    candidate_factor: usize,
) -> Vec<Document> {
    let query_vector: Vec<f64> = query_vector.iter().map(|v| f64::from(*v)).collect();
    vec![
        doc! {
            "$vectorSearch": {
                "index": index_name,
                "queryVector": query_vector,
                "path": "embedding",
                "numCandidates": (top_k * candidate_factor) as i64,
                "limit": top_k as i64,
            }
        },
        doc! {
            "$project": {
                "_id": 0,
                "chunk": 1,
                "filename": 1,
                "filepath": 1,
                "chunk_index": 1,
                "score": { "$meta": "vectorSearchScore" },
            }
        },
    ]
}

fn state_from_status(status: &str) -> IndexState {
    match status {
        "READY" => IndexState::Ready,
        "FAILED" => IndexState::Failed,
        _ => IndexState::Creating,
    }
}

/// Compare an existing index definition against the requested one.
/// Returns a human-readable description of the first mismatch.
fn definition_conflict(index_doc: &Document, dimension: usize, metric: Metric) -> Option<String> {
    let field = index_doc
        .get_document("latestDefinition")
        .ok()
        .and_then(|def| def.get_array("fields").ok())
        .and_then(|fields| fields.first())
        .and_then(Bson::as_document)?;

    let existing_dimension = match field.get("numDimensions") {
        Some(Bson::Int32(v)) => Some(*v as i64),
        Some(Bson::Int64(v)) => Some(*v),
        Some(Bson::Double(v)) => Some(*v as i64),
        _ => None,
    };
    if let Some(existing) = existing_dimension {
        if existing != dimension as i64 {
            return Some(format!(
                "existing index has {existing} dimensions, requested {dimension}"
            ));
        }
    }
    if let Ok(existing) = field.get_str("similarity") {
        if existing != metric.as_atlas_str() {
            return Some(format!(
                "existing index uses '{existing}' similarity, requested '{}'",
                metric.as_atlas_str()
            ));
        }
    }
    None
}

fn scored_chunk_from_document(document: &Document) -> Result<ScoredChunk> {
    let chunk_index = match document.get("chunk_index") {
        Some(Bson::Int32(v)) => *v as usize,
        Some(Bson::Int64(v)) => *v as usize,
        _ => {
            return Err(DocRagError::store(
                BACKEND,
                "search",
                "result document is missing chunk_index",
            ));
        }
    };
    let score = match document.get("score") {
        Some(Bson::Double(v)) => *v as f32,
        _ => {
            return Err(DocRagError::store(
                BACKEND,
                "search",
                "result document is missing score metadata",
            ));
        }
    };
    let get_str = |key: &str| -> Result<String> {
        document
            .get_str(key)
            .map(str::to_string)
            .map_err(|_| DocRagError::store(BACKEND, "search", format!("result document is missing {key}")))
    };

    Ok(ScoredChunk {
        chunk: get_str("chunk")?,
        filename: get_str("filename")?,
        filepath: get_str("filepath")?,
        chunk_index,
        score,
    })
}
