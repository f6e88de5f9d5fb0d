//! Chat-completion client for OpenAI-compatible providers

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::config::AppConfig;
use crate::errors::DocRagError;
use crate::errors::Result;
use crate::llm::GenerationProvider;

const PROVIDER: &str = "generation";

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

/// Client for the `/chat/completions` endpoint of an OpenAI-compatible
/// API, with fixed sampling temperature and output budget.
pub struct OpenAiChat {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiChat {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| DocRagError::provider(PROVIDER, "build_client", e))?;

        Ok(Self {
            client,
            endpoint: config.llm.llm_endpoint.clone(),
            api_key: config.llm.llm_key.clone(),
            model: config.llm.llm_model.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
        })
    }
}

#[async_trait]
impl GenerationProvider for OpenAiChat {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: Vec<ChatMessage>,
            temperature: f32,
            max_tokens: u32,
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: ResponseMessage,
        }

        #[derive(Deserialize)]
        struct ResponseMessage {
            content: String,
        }

        let url = format!("{}/chat/completions", self.endpoint);
        debug!("Calling chat completions API: {}", url);

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt.to_string(),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| DocRagError::provider(PROVIDER, "generate", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DocRagError::provider(
                PROVIDER,
                "generate",
                format!("API error ({status}): {error_text}"),
            ));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| DocRagError::provider(PROVIDER, "generate", format!("failed to parse response: {e}")))?;

        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| DocRagError::provider(PROVIDER, "generate", "no choices in response"))
    }
}
