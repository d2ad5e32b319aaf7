//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::{Result, SearchError};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends (a local model, Gemini,
/// OpenAI) behind a unified async interface. The default
/// [`embed_batch`](EmbeddingProvider::embed_batch) implementation calls
/// [`embed`](EmbeddingProvider::embed) sequentially and therefore preserves
/// input order; backends with native batch endpoints should override it.
///
/// Every implementation must return vectors of exactly
/// [`dimensions()`](EmbeddingProvider::dimensions) entries and fail with
/// [`SearchError::DimensionMismatch`] otherwise, rather than truncating or
/// padding. The indexer and the query engine must be configured with the
/// same provider, or stored and query vectors live in different spaces and
/// distances are meaningless.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The returned vectors are in input order. The default implementation
    /// embeds each input sequentially.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}

/// Reject a vector whose length disagrees with the expected dimension.
pub(crate) fn check_dimensions(expected: usize, embedding: &[f32]) -> Result<()> {
    if embedding.len() != expected {
        return Err(SearchError::DimensionMismatch { expected, actual: embedding.len() });
    }
    Ok(())
}
