//! Query-time search: embed, rank, group.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::document::{FolderGroup, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, SearchError};
use crate::session::SearchBackend;
use crate::store::{SearchFilter, VectorStore};

/// Queries shorter than this (in characters, after trimming) short-circuit
/// to an empty result set without touching the provider or the store.
pub const MIN_QUERY_LEN: usize = 2;

/// Upper bound on the number of results a single query may request.
pub const MAX_LIMIT: usize = 50;

/// Embeds a query and ranks stored chunks against it.
///
/// The engine pins one provider to one store: a query embedded by a
/// different provider than the one used at index time would produce
/// meaningless distances, so the pairing is validated at construction and
/// never changes afterwards. The engine holds no mutable state; concurrent
/// queries share it freely.
pub struct QueryEngine {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine").finish_non_exhaustive()
    }
}

impl QueryEngine {
    /// Pair a provider with a store.
    ///
    /// Fails with [`SearchError::Config`] if their dimensions disagree.
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        if provider.dimensions() != store.dimensions() {
            return Err(SearchError::Config(format!(
                "provider dimensions ({}) do not match store dimensions ({})",
                provider.dimensions(),
                store.dimensions()
            )));
        }
        Ok(Self { provider, store })
    }

    /// Search the corpus, returning at most `limit` ranked results.
    ///
    /// `limit` is clamped to 1..={`MAX_LIMIT`}. A too-short query is not a
    /// failure: it returns an empty list. Provider and store failures are
    /// logged here and surface as the stable error vocabulary only.
    pub async fn search(&self, text: &str, limit: usize) -> Result<Vec<SearchResult>> {
        self.search_filtered(text, limit, &SearchFilter::default()).await
    }

    /// Like [`search`](QueryEngine::search), restricted by a metadata filter
    /// applied before top-k selection.
    pub async fn search_filtered(
        &self,
        text: &str,
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<SearchResult>> {
        let trimmed = text.trim();
        if trimmed.chars().count() < MIN_QUERY_LEN {
            debug!(len = trimmed.len(), "query below minimum length, returning empty set");
            return Ok(Vec::new());
        }
        let limit = limit.clamp(1, MAX_LIMIT);

        let embedding = self.provider.embed(trimmed).await.inspect_err(|e| {
            error!(error = %e, "query embedding failed");
        })?;

        let results = self.store.nearest(&embedding, limit, filter).await.inspect_err(|e| {
            error!(error = %e, "vector store lookup failed");
        })?;

        debug!(query = trimmed, count = results.len(), "query completed");
        Ok(results)
    }

    /// Search and group the ranked results by folder for presentation.
    pub async fn search_grouped(&self, text: &str, limit: usize) -> Result<Vec<FolderGroup>> {
        Ok(group_by_folder(self.search(text, limit).await?))
    }
}

#[async_trait]
impl SearchBackend for QueryEngine {
    async fn search(&self, text: &str, limit: usize) -> Result<Vec<SearchResult>> {
        QueryEngine::search(self, text, limit).await
    }
}

/// Group results by folder, preserving order everywhere.
///
/// Groups appear in the order their folder first appears in the ranked
/// list, and results keep their relative rank within each group. This is a
/// pure reshaping for presentation; it never reorders results.
pub fn group_by_folder(results: Vec<SearchResult>) -> Vec<FolderGroup> {
    let mut groups: Vec<FolderGroup> = Vec::new();
    for result in results {
        match groups.iter_mut().find(|g| g.folder == result.folder) {
            Some(group) => group.results.push(result),
            None => {
                groups.push(FolderGroup { folder: result.folder.clone(), results: vec![result] })
            }
        }
    }
    groups
}
