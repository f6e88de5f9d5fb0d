//! Embedding API client for OpenAI-compatible providers

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::config::AppConfig;
use crate::embeddings::EmbeddingProvider;
use crate::errors::DocRagError;
use crate::errors::Result;

const PROVIDER: &str = "embedding";

/// Client for the `/embeddings` endpoint of an OpenAI-compatible API.
pub struct OpenAiEmbeddings {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbeddings {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| DocRagError::provider(PROVIDER, "build_client", e))?;

        Ok(Self {
            client,
            endpoint: config.embeddings.endpoint.clone(),
            api_key: config.embeddings.api_key.clone(),
            model: config.embeddings.model.clone(),
            dimension: config.embeddings.dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        #[derive(Serialize)]
        struct EmbeddingRequest<'a> {
            input: &'a str,
            model: &'a str,
        }

        #[derive(Deserialize)]
        struct EmbeddingResponse {
            data: Vec<EmbeddingData>,
        }

        #[derive(Deserialize)]
        struct EmbeddingData {
            embedding: Vec<f32>,
        }

        // The provider rejects empty input anyway; fail before the call.
        if text.is_empty() {
            return Err(DocRagError::provider(
                PROVIDER,
                "embed",
                "input text is empty",
            ));
        }

        let url = format!("{}/embeddings", self.endpoint);
        debug!("Calling embeddings API: {}", url);

        let request = EmbeddingRequest {
            input: text,
            model: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| DocRagError::provider(PROVIDER, "embed", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DocRagError::provider(
                PROVIDER,
                "embed",
                format!("API error ({status}): {error_text}"),
            ));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| DocRagError::provider(PROVIDER, "embed", format!("failed to parse response: {e}")))?;

        let embedding = result
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| DocRagError::provider(PROVIDER, "embed", "no embedding in response"))?;

        // A wrong-size vector here would poison the index; refuse it.
        if embedding.len() != self.dimension {
            return Err(DocRagError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
