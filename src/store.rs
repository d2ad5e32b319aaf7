//! Vector store trait for persisting and searching embedded chunks.

use async_trait::async_trait;

use crate::document::{DocChunk, SearchResult};
use crate::error::Result;

/// Metadata restrictions applied to the candidate set *before* top-k
/// selection, so `limit` always returns the k nearest among the filtered
/// rows rather than a filtered suffix of an unfiltered top-k.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter {
    /// Restrict candidates to a single folder.
    pub folder: Option<String>,
}

impl SearchFilter {
    /// A filter restricting candidates to one folder.
    pub fn folder(folder: impl Into<String>) -> Self {
        Self { folder: Some(folder.into()) }
    }

    /// Whether a chunk passes this filter.
    pub fn matches(&self, chunk: &DocChunk) -> bool {
        self.folder.as_deref().is_none_or(|f| f == chunk.folder)
    }
}

/// A storage backend for embedded document chunks with similarity search.
///
/// The contract is backend-agnostic: it must hold whether vectors are
/// scanned linearly in memory or ranked by a SQL vector index. Rows are
/// keyed by `(slug, chunk_index)` and written only by the offline indexer;
/// query-time code never mutates the store.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// The embedding dimension this store was created for.
    fn dimensions(&self) -> usize;

    /// Insert-or-update chunks keyed by `(slug, chunk_index)`.
    ///
    /// Chunks must carry embeddings of exactly [`dimensions()`](VectorStore::dimensions)
    /// entries; anything else fails with [`SearchError::DimensionMismatch`]
    /// (crate::error::SearchError) before any row is written. Upserting the
    /// same chunks twice leaves the store unchanged.
    async fn upsert(&self, chunks: &[DocChunk]) -> Result<()>;

    /// Return the `limit` most similar chunks to the query embedding,
    /// ordered by descending score with ties broken by ascending
    /// `(slug, chunk_index)`. The filter restricts candidates before
    /// ranking. Never returns more than `limit` rows.
    async fn nearest(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<SearchResult>>;

    /// Total number of stored rows (chunks, not documents).
    async fn count(&self) -> Result<usize>;

    /// Distinct slugs currently present, sorted ascending.
    async fn slugs(&self) -> Result<Vec<String>>;

    /// Remove every chunk of each given slug. Returns the number of rows
    /// removed.
    async fn remove(&self, slugs: &[&str]) -> Result<usize>;
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude. Stored embeddings are
/// L2-normalized by the providers, so this is effectively a dot product,
/// but the norms are computed anyway to keep the scan correct for
/// un-normalized input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
