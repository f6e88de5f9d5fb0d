//! Context assembly from retrieved chunks

use crate::store::ScoredChunk;

/// Concatenates retrieved chunk texts into the grounding context for
/// generation, preserving the retrieval order (descending score).
pub struct ContextAssembler {
    max_context_length: usize,
}

impl ContextAssembler {
    #[must_use]
    pub const fn new(max_context_length: usize) -> Self {
        Self { max_context_length }
    }

    /// Join chunk texts with a blank line, stopping before the context
    /// would exceed the length budget.
    #[must_use]
    pub fn assemble(&self, chunks: &[ScoredChunk]) -> String {
        let mut context = String::new();
        for chunk in chunks {
            let extra = if context.is_empty() { 0 } else { 2 };
            if !context.is_empty()
                && context.len() + extra + chunk.chunk.len() > self.max_context_length
            {
                break;
            }
            if !context.is_empty() {
                context.push_str("\n\n");
            }
            context.push_str(&chunk.chunk);
        }
        context
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(8000)
    }
}
