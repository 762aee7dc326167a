// Embedding and completion provider module
// Wraps the external OpenAI-compatible API behind narrow trait seams

pub mod openai;

pub use openai::OpenAiClient;

use anyhow::Result;
use serde::Serialize;

/// A single chat message sent to the completion endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Converts text into embedding vectors
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier of the embedding model, recorded in the index snapshot
    fn model(&self) -> &str;

    /// Generate an embedding for a single text input
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple text inputs, in input order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Produces a chat completion for a message sequence
pub trait CompletionProvider: Send + Sync {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}
