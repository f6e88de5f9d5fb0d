//! RAG (Retrieval-Augmented Generation) module
//!
//! End-to-end question answering over ingested documents:
//! - Query embedding and vector retrieval
//! - Context assembly from the retrieved chunks
//! - LLM-based answer generation grounded in that context
//!
//! # Examples
//!
//! ```rust,no_run
//! use docrag::config::AppConfig;
//! use docrag::rag::{Query, RagService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let service = RagService::from_config(&config).await?;
//!
//!     let answer = service.answer(Query::new("What does the report conclude?")).await?;
//!     println!("Answer: {}", answer.answer);
//!     println!("Sources: {} chunks", answer.source_chunks.len());
//!
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod pipeline;
pub mod prompts;

use serde::Deserialize;
use serde::Serialize;

pub use context::ContextAssembler;
pub use pipeline::RagService;

use crate::store::ScoredChunk;

/// A question posed against the ingested documents.
#[derive(Debug, Clone, Deserialize)]
pub struct Query {
    pub question: String,
    /// How many chunks to retrieve as grounding context.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    3
}

impl Query {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            top_k: default_top_k(),
        }
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

/// A generated answer with the chunks it was grounded in, in descending
/// relevance order.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub source_chunks: Vec<ScoredChunk>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_top_k_defaults_to_three() {
        let query: Query = serde_json::from_str(r#"{"question": "what?"}"#).unwrap();
        assert_eq!(query.top_k, 3);

        let query: Query = serde_json::from_str(r#"{"question": "what?", "top_k": 7}"#).unwrap();
        assert_eq!(query.top_k, 7);
    }
}
