//! Document ingestion: file -> chunks -> embeddings -> stored records.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;
use tracing::error;
use tracing::info;

use crate::chunker::TextSplitter;
use crate::config::AppConfig;
use crate::embeddings::EmbeddingProvider;
use crate::embeddings::OpenAiEmbeddings;
use crate::errors::Result;
use crate::store::ChunkRecord;
use crate::store::Metric;
use crate::store::VectorStore;

/// Splits a document, embeds every chunk and writes the records to the
/// configured vector store.
///
/// Partial-failure policy: the first failing chunk aborts the whole
/// ingestion call. Records written before the failure stay in the store
/// (re-running the ingestion replaces them, since records are keyed by
/// filename and chunk index).
pub struct IngestionPipeline {
    splitter: TextSplitter,
    embeddings: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    metric: Metric,
}

impl IngestionPipeline {
    /// Create a pipeline from explicit collaborators.
    pub fn new(
        splitter: TextSplitter,
        embeddings: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        metric: Metric,
    ) -> Self {
        Self {
            splitter,
            embeddings,
            store,
            metric,
        }
    }

    /// Create a pipeline with the configured store and embedding provider.
    ///
    /// # Errors
    /// - Chunking configuration errors (overlap not smaller than size)
    /// - Store connection errors
    /// - Embedding client configuration errors
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let splitter = TextSplitter::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?;
        let embeddings: Arc<dyn EmbeddingProvider> = Arc::new(OpenAiEmbeddings::new(config)?);
        let store = crate::store::from_config(config).await?;
        Ok(Self::new(splitter, embeddings, store, config.metric()))
    }

    /// Ingest one document. Returns the number of records written.
    pub async fn ingest(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        info!("Ingesting document: {}", path.display());

        self.store
            .ensure_index(self.embeddings.dimension(), self.metric)
            .await?;

        // Also rejects files that are not valid text.
        let text = std::fs::read_to_string(path)?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let filepath = path.display().to_string();

        let mut written = 0;
        for (chunk_index, chunk) in self.splitter.split(&text).enumerate() {
            let embedding = match self.embeddings.embed(chunk).await {
                Ok(embedding) => embedding,
                Err(err) => {
                    error!(
                        "aborting ingestion of {} at chunk {}: {}",
                        filename, chunk_index, err
                    );
                    return Err(err);
                }
            };
            let record = ChunkRecord {
                chunk: chunk.to_string(),
                embedding,
                filename: filename.clone(),
                filepath: filepath.clone(),
                chunk_index,
            };
            if let Err(err) = self.store.upsert_record(&record).await {
                error!(
                    "aborting ingestion of {} at chunk {}: {}",
                    filename, chunk_index, err
                );
                return Err(err);
            }
            written += 1;
            debug!("stored chunk {} of {}", chunk_index, filename);
        }

        info!("Ingested {} chunks from {}", written, filename);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::errors::DocRagError;
    use crate::store::ScoredChunk;

    /// Embeds to a fixed-dimension vector; optionally fails from a given
    /// chunk onwards.
    struct StubEmbeddings {
        dimension: usize,
        fail_from_call: Option<usize>,
        calls: Mutex<usize>,
    }

    impl StubEmbeddings {
        fn new(dimension: usize) -> Self {
            Self {
                dimension,
                fail_from_call: None,
                calls: Mutex::new(0),
            }
        }

        fn failing_from(dimension: usize, call: usize) -> Self {
            Self {
                dimension,
                fail_from_call: Some(call),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for StubEmbeddings {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            let mut calls = self.calls.lock().unwrap();
            let call = *calls;
            *calls += 1;
            if self.fail_from_call.is_some_and(|fail_from| call >= fail_from) {
                return Err(DocRagError::provider("embedding", "embed", "rate limited"));
            }
            Ok(vec![0.5; self.dimension])
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        records: Mutex<Vec<ChunkRecord>>,
        ensure_calls: Mutex<usize>,
    }

    #[async_trait]
    impl VectorStore for RecordingStore {
        async fn ensure_index(&self, _dimension: usize, _metric: Metric) -> Result<()> {
            *self.ensure_calls.lock().unwrap() += 1;
            Ok(())
        }

        async fn upsert_record(&self, record: &ChunkRecord) -> Result<()> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn search(&self, _query_vector: &[f32], _top_k: usize) -> Result<Vec<ScoredChunk>> {
            Ok(vec![])
        }
    }

    fn temp_document(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn pipeline(
        embeddings: Arc<dyn EmbeddingProvider>,
        store: Arc<RecordingStore>,
    ) -> IngestionPipeline {
        IngestionPipeline::new(
            TextSplitter::new(500, 50).unwrap(),
            embeddings,
            store,
            Metric::Cosine,
        )
    }

    #[tokio::test]
    async fn ingests_chunks_with_positional_indexes() {
        let store = Arc::new(RecordingStore::default());
        let pipe = pipeline(Arc::new(StubEmbeddings::new(8)), store.clone());
        // Identical paragraphs: a content-based index lookup would collapse
        // them, the positional index must not.
        let paragraph = "The same paragraph again.";
        let file = temp_document(&format!("{0}\n\n{0}\n\n{0}\n\n", paragraph).repeat(10));

        let written = pipe.ingest(file.path()).await.unwrap();

        let records = store.records.lock().unwrap();
        assert_eq!(written, records.len());
        assert!(written >= 2);
        let indexes: Vec<usize> = records.iter().map(|r| r.chunk_index).collect();
        assert_eq!(indexes, (0..written).collect::<Vec<_>>());
        assert!(records.iter().all(|r| r.embedding.len() == 8));
        assert_eq!(*store.ensure_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn scenario_three_chunk_document_stores_three_records() {
        let store = Arc::new(RecordingStore::default());
        let pipe = pipeline(Arc::new(StubEmbeddings::new(8)), store.clone());
        let file = temp_document(&"a".repeat(1200));

        let written = pipe.ingest(file.path()).await.unwrap();

        assert_eq!(written, 3);
        let records = store.records.lock().unwrap();
        let indexes: Vec<usize> = records.iter().map(|r| r.chunk_index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn empty_document_writes_nothing() {
        let store = Arc::new(RecordingStore::default());
        let pipe = pipeline(Arc::new(StubEmbeddings::new(8)), store.clone());
        let file = temp_document("");

        assert_eq!(pipe.ingest(file.path()).await.unwrap(), 0);
        assert!(store.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn embedding_failure_aborts_the_ingestion() {
        let store = Arc::new(RecordingStore::default());
        let pipe = pipeline(Arc::new(StubEmbeddings::failing_from(8, 2)), store.clone());
        let file = temp_document(&"a".repeat(1200));

        let err = pipe.ingest(file.path()).await.unwrap_err();
        assert!(matches!(err, DocRagError::Provider { .. }));
        // Abort policy: chunks before the failure stay, nothing after it.
        assert_eq!(store.records.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unreadable_file_is_an_io_error() {
        let store = Arc::new(RecordingStore::default());
        let pipe = pipeline(Arc::new(StubEmbeddings::new(8)), store);

        let err = pipe.ingest("/nonexistent/document.txt").await.unwrap_err();
        assert!(matches!(err, DocRagError::Io(_)));
    }
}
