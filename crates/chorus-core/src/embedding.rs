use async_trait::async_trait;

use crate::error::LLMError;

/// A provider capable of embedding text into dense vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>, LLMError>;
}
