//! Answer generation via a chat-completion provider.

pub mod client;

use async_trait::async_trait;

use crate::errors::Result;

pub use client::OpenAiChat;

/// Capability for generating an answer from a system instruction and a
/// user turn. Sampling temperature and output length are fixed by the
/// provider's configuration, not per call.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}
