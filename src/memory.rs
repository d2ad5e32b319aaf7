//! File-backed local vector store.
//!
//! [`LocalVectorStore`] holds chunks in a `HashMap` behind a
//! `tokio::sync::RwLock` and ranks them with a full cosine scan. At the
//! corpus scale this engine targets (tens to low hundreds of articles) the
//! scan is both acceptable and simpler than a vector index, and the store
//! honors the same [`VectorStore`] contract as the pgvector backend.
//!
//! With a snapshot path attached the store doubles as the degraded
//! fallback used when no database is configured: [`persist`](LocalVectorStore::persist)
//! writes the rows as JSON (atomically, via a temp file and rename) and
//! [`open`](LocalVectorStore::open) reloads them, so offline development and
//! CI need no external services.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{DocChunk, SearchResult};
use crate::embedding::check_dimensions;
use crate::error::{Result, SearchError};
use crate::store::{cosine_similarity, SearchFilter, VectorStore};

use async_trait::async_trait;

/// An in-memory vector store with an optional JSON snapshot on disk.
#[derive(Debug)]
pub struct LocalVectorStore {
    dimensions: usize,
    snapshot: Option<PathBuf>,
    chunks: RwLock<HashMap<(String, u32), DocChunk>>,
}

impl LocalVectorStore {
    /// Create an empty, purely in-memory store.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, snapshot: None, chunks: RwLock::new(HashMap::new()) }
    }

    /// Open a file-backed store, loading the snapshot at `path` if present.
    ///
    /// Rows whose embedding does not match `dimensions` fail the load with
    /// [`SearchError::DimensionMismatch`]; a missing file is an empty store.
    pub fn open(path: impl AsRef<Path>, dimensions: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut map = HashMap::new();

        if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| SearchError::store("local", format!("read {}: {e}", path.display())))?;
            let rows: Vec<DocChunk> = serde_json::from_str(&raw).map_err(|e| {
                SearchError::store("local", format!("parse {}: {e}", path.display()))
            })?;
            for chunk in rows {
                check_dimensions(dimensions, &chunk.embedding)?;
                map.insert((chunk.slug.clone(), chunk.chunk_index), chunk);
            }
            debug!(path = %path.display(), rows = map.len(), "loaded local store snapshot");
        }

        Ok(Self { dimensions, snapshot: Some(path), chunks: RwLock::new(map) })
    }

    /// Write the current rows to the snapshot path, if one is attached.
    ///
    /// The snapshot is written to a sibling temp file first and renamed into
    /// place so a crash mid-write cannot corrupt an existing snapshot.
    pub async fn persist(&self) -> Result<()> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };

        let rows: Vec<DocChunk> = {
            let chunks = self.chunks.read().await;
            let mut rows: Vec<DocChunk> = chunks.values().cloned().collect();
            rows.sort_by(|a, b| (&a.slug, a.chunk_index).cmp(&(&b.slug, b.chunk_index)));
            rows
        };

        let raw = serde_json::to_string(&rows)
            .map_err(|e| SearchError::store("local", format!("serialize snapshot: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw)
            .await
            .map_err(|e| SearchError::store("local", format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| SearchError::store("local", format!("rename {}: {e}", path.display())))?;

        debug!(path = %path.display(), rows = rows.len(), "persisted local store snapshot");
        Ok(())
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn upsert(&self, chunks: &[DocChunk]) -> Result<()> {
        for chunk in chunks {
            check_dimensions(self.dimensions, &chunk.embedding)?;
        }
        {
            let mut store = self.chunks.write().await;
            for chunk in chunks {
                store.insert((chunk.slug.clone(), chunk.chunk_index), chunk.clone());
            }
        }
        self.persist().await
    }

    async fn nearest(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<SearchResult>> {
        check_dimensions(self.dimensions, embedding)?;

        let store = self.chunks.read().await;
        let mut scored: Vec<SearchResult> = store
            .values()
            .filter(|chunk| filter.matches(chunk))
            .map(|chunk| SearchResult::from_chunk(chunk, cosine_similarity(&chunk.embedding, embedding)))
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| (&a.slug, a.chunk_index).cmp(&(&b.slug, b.chunk_index)))
        });
        scored.truncate(limit);
        Ok(scored)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.chunks.read().await.len())
    }

    async fn slugs(&self) -> Result<Vec<String>> {
        let store = self.chunks.read().await;
        let unique: BTreeSet<&String> = store.keys().map(|(slug, _)| slug).collect();
        Ok(unique.into_iter().cloned().collect())
    }

    async fn remove(&self, slugs: &[&str]) -> Result<usize> {
        let removed = {
            let mut store = self.chunks.write().await;
            let before = store.len();
            store.retain(|(slug, _), _| !slugs.contains(&slug.as_str()));
            before - store.len()
        };
        if removed > 0 {
            self.persist().await?;
        }
        Ok(removed)
    }
}
