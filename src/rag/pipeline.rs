//! Complete RAG pipeline: Embed -> Retrieve -> Assemble -> Generate

use std::sync::Arc;

use tracing::debug;
use tracing::info;

use crate::config::AppConfig;
use crate::embeddings::EmbeddingProvider;
use crate::embeddings::OpenAiEmbeddings;
use crate::errors::DocRagError;
use crate::errors::Result;
use crate::llm::GenerationProvider;
use crate::llm::OpenAiChat;
use crate::rag::prompts;
use crate::rag::Answer;
use crate::rag::ContextAssembler;
use crate::rag::Query;
use crate::store::VectorStore;

/// Complete RAG service
pub struct RagService {
    embeddings: Arc<dyn EmbeddingProvider>,
    generation: Arc<dyn GenerationProvider>,
    store: Arc<dyn VectorStore>,
    context_assembler: ContextAssembler,
}

impl RagService {
    /// Create a service with the configured store and providers.
    ///
    /// # Errors
    /// - Store connection errors
    /// - Embedding or chat client configuration errors
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let embeddings: Arc<dyn EmbeddingProvider> = Arc::new(OpenAiEmbeddings::new(config)?);
        let generation: Arc<dyn GenerationProvider> = Arc::new(OpenAiChat::new(config)?);
        let store = crate::store::from_config(config).await?;
        Ok(Self::from_services(embeddings, generation, store))
    }

    /// Create from existing services
    #[must_use]
    pub fn from_services(
        embeddings: Arc<dyn EmbeddingProvider>,
        generation: Arc<dyn GenerationProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            embeddings,
            generation,
            store,
            context_assembler: ContextAssembler::default(),
        }
    }

    /// Answer a question grounded in the ingested documents.
    ///
    /// # Errors
    /// - `Config` when `top_k` is zero
    /// - `NoRelevantDocuments` when retrieval finds nothing; an expected
    ///   outcome, not a system fault
    /// - Provider errors from query embedding or answer generation
    /// - Store errors from the similarity search
    pub async fn answer(&self, query: Query) -> Result<Answer> {
        if query.top_k == 0 {
            return Err(DocRagError::Config(
                "top_k must be greater than zero".to_string(),
            ));
        }
        info!("Processing query: {}", query.question);

        debug!("Step 1: Embedding the question");
        let query_embedding = self.embeddings.embed(&query.question).await?;

        debug!("Step 2: Retrieving up to {} chunks", query.top_k);
        let source_chunks = self.store.search(&query_embedding, query.top_k).await?;
        if source_chunks.is_empty() {
            return Err(DocRagError::NoRelevantDocuments);
        }
        debug!("Retrieved {} chunks", source_chunks.len());

        debug!("Step 3: Assembling context");
        let context = self.context_assembler.assemble(&source_chunks);
        let user_prompt = prompts::build_user_prompt(&context, &query.question);

        debug!("Step 4: Generating the answer");
        let answer = self
            .generation
            .generate(prompts::SYSTEM_PROMPT, &user_prompt)
            .await?;

        info!("Query answered from {} source chunks", source_chunks.len());
        Ok(Answer {
            answer,
            source_chunks,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::store::ChunkRecord;
    use crate::store::Metric;
    use crate::store::ScoredChunk;

    struct StubEmbeddings;

    #[async_trait]
    impl EmbeddingProvider for StubEmbeddings {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0, 0.0])
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    /// Records the prompts it receives and echoes a canned answer.
    #[derive(Default)]
    struct StubGeneration {
        prompts: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl GenerationProvider for StubGeneration {
        async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
            self.prompts
                .lock()
                .unwrap()
                .push((system_prompt.to_string(), user_prompt.to_string()));
            Ok("a grounded answer".to_string())
        }
    }

    /// Returns a fixed result set, truncated to `top_k`.
    struct FixedStore {
        results: Vec<ScoredChunk>,
    }

    #[async_trait]
    impl VectorStore for FixedStore {
        async fn ensure_index(&self, _dimension: usize, _metric: Metric) -> Result<()> {
            Ok(())
        }

        async fn upsert_record(&self, _record: &ChunkRecord) -> Result<()> {
            Ok(())
        }

        async fn search(&self, _query_vector: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>> {
            Ok(self.results.iter().take(top_k).cloned().collect())
        }
    }

    fn scored(text: &str, index: usize, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: text.to_string(),
            filename: "doc.txt".to_string(),
            filepath: "/data/doc.txt".to_string(),
            chunk_index: index,
            score,
        }
    }

    fn service(results: Vec<ScoredChunk>) -> (RagService, Arc<StubGeneration>) {
        let generation = Arc::new(StubGeneration::default());
        let service = RagService::from_services(
            Arc::new(StubEmbeddings),
            generation.clone(),
            Arc::new(FixedStore { results }),
        );
        (service, generation)
    }

    #[tokio::test]
    async fn answers_with_sources_in_retrieval_order() {
        let (service, generation) = service(vec![
            scored("most relevant", 0, 0.9),
            scored("second", 1, 0.5),
            scored("third", 2, 0.2),
        ]);

        let answer = service.answer(Query::new("what?")).await.unwrap();

        assert_eq!(answer.answer, "a grounded answer");
        let chunks: Vec<&str> = answer.source_chunks.iter().map(|c| c.chunk.as_str()).collect();
        assert_eq!(chunks, vec!["most relevant", "second", "third"]);

        let prompts = generation.prompts.lock().unwrap();
        let (system, user) = &prompts[0];
        assert_eq!(system, prompts::SYSTEM_PROMPT);
        assert!(user.contains("most relevant\n\nsecond\n\nthird"));
        assert!(user.contains("what?"));
    }

    #[tokio::test]
    async fn equal_scores_keep_the_store_order() {
        let (service, _) = service(vec![
            scored("tied a", 0, 0.5),
            scored("tied b", 1, 0.5),
        ]);

        let answer = service.answer(Query::new("what?")).await.unwrap();
        assert_eq!(answer.source_chunks[0].chunk, "tied a");
        assert_eq!(answer.source_chunks[1].chunk, "tied b");
    }

    #[tokio::test]
    async fn empty_retrieval_is_no_relevant_documents() {
        let (service, generation) = service(vec![]);

        let err = service.answer(Query::new("what?")).await.unwrap_err();
        assert!(matches!(err, DocRagError::NoRelevantDocuments));
        // Generation must not run without grounding context.
        assert!(generation.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_top_k_is_a_configuration_error() {
        let (service, _) = service(vec![scored("chunk", 0, 0.9)]);

        let err = service
            .answer(Query::new("what?").with_top_k(0))
            .await
            .unwrap_err();
        assert!(matches!(err, DocRagError::Config(_)));
    }

    #[tokio::test]
    async fn top_k_bounds_the_retrieved_chunks() {
        let (service, _) = service(vec![
            scored("a", 0, 0.9),
            scored("b", 1, 0.8),
            scored("c", 2, 0.7),
            scored("d", 3, 0.6),
        ]);

        let answer = service
            .answer(Query::new("what?").with_top_k(2))
            .await
            .unwrap();
        assert_eq!(answer.source_chunks.len(), 2);
    }
}
