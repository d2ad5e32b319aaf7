//! Offline batch indexing: chunk, embed, upsert, prune.
//!
//! The [`Indexer`] is the only writer the store ever sees. It runs as a
//! CLI/batch step, never on the request path, and is idempotent: indexing
//! the same corpus twice leaves the store with the same row count and slug
//! set.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::chunking::{Chunker, FixedSizeChunker};
use crate::document::{DocChunk, Document};
use crate::embedding::{check_dimensions, EmbeddingProvider};
use crate::error::Result;
use crate::store::VectorStore;

/// Smallest allowed embedding batch.
const MIN_BATCH: usize = 8;
/// Largest allowed embedding batch, capping memory and payload size.
const MAX_BATCH: usize = 32;
/// Default embedding batch size.
const DEFAULT_BATCH: usize = 16;

/// Outcome of one indexing run, counted in documents (not chunks).
///
/// Per-document embedding failures are accumulated here instead of aborting
/// the run, so operators can detect partial failures without losing the
/// rest of the batch. Store failures are different: they abort the run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexReport {
    /// Documents whose chunks were embedded and upserted.
    pub indexed: usize,
    /// Documents skipped before embedding (empty body).
    pub skipped: usize,
    /// Documents that failed to embed, with reasons.
    pub failed: Vec<FailedDocument>,
    /// Stale slugs removed because they were absent from the corpus.
    pub pruned: usize,
}

/// One document the indexer had to give up on.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedDocument {
    /// Slug of the failed document.
    pub slug: String,
    /// Why it failed.
    pub reason: String,
}

impl IndexReport {
    /// Whether the run had any per-document failures.
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

impl fmt::Display for IndexReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "indexed {} document(s), skipped {}, failed {}, pruned {} stale slug(s)",
            self.indexed,
            self.skipped,
            self.failed.len(),
            self.pruned
        )?;
        for failure in &self.failed {
            write!(f, "\n  failed {}: {}", failure.slug, failure.reason)?;
        }
        Ok(())
    }
}

/// Chunks of whole documents waiting for an embedding batch.
struct Pending {
    chunks: Vec<DocChunk>,
}

/// The offline indexing pipeline: chunk → embed (batched) → upsert.
///
/// Writes are serialized per batch; embedding calls within a batch are
/// amortized through [`EmbeddingProvider::embed_batch`]. Documents are
/// never split across embedding batches, which keeps the failure policy
/// and report accounting per-document.
pub struct Indexer {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    chunker: Box<dyn Chunker>,
    batch_size: usize,
    prune: bool,
}

impl Indexer {
    /// Create an indexer with the default chunker and batch size.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            provider,
            store,
            chunker: Box::new(FixedSizeChunker::default()),
            batch_size: DEFAULT_BATCH,
            prune: true,
        }
    }

    /// Replace the chunking strategy.
    pub fn with_chunker(mut self, chunker: Box<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    /// Set the embedding batch size, clamped to 8..=32.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(MIN_BATCH, MAX_BATCH);
        self
    }

    /// Enable or disable pruning of slugs absent from the corpus.
    pub fn with_prune(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    /// Index the whole corpus, returning a per-document report.
    ///
    /// A document whose embedding fails is logged, recorded in the report,
    /// and skipped; the run continues. A store failure aborts the run with
    /// `StoreUnavailable` — at indexing time that is fatal.
    pub async fn index_all(&self, documents: &[Document]) -> Result<IndexReport> {
        let mut report = IndexReport::default();
        let mut batch: Vec<Pending> = Vec::new();
        let mut batch_chunks = 0;

        for document in documents {
            let chunks = self.chunker.chunk(document);
            if chunks.is_empty() {
                info!(slug = %document.slug, "skipping document with empty body");
                report.skipped += 1;
                continue;
            }

            // Flush before this document would overflow the batch budget. A
            // single document larger than the budget still travels whole.
            if batch_chunks > 0 && batch_chunks + chunks.len() > self.batch_size {
                self.flush(&mut batch, &mut report).await?;
                batch_chunks = 0;
            }
            batch_chunks += chunks.len();
            batch.push(Pending { chunks });
            if batch_chunks >= self.batch_size {
                self.flush(&mut batch, &mut report).await?;
                batch_chunks = 0;
            }
        }
        self.flush(&mut batch, &mut report).await?;

        if self.prune {
            report.pruned = self.prune_stale(documents).await?;
        }

        info!(
            indexed = report.indexed,
            skipped = report.skipped,
            failed = report.failed.len(),
            pruned = report.pruned,
            "indexing run complete"
        );
        Ok(report)
    }

    /// Embed and upsert one batch of whole documents.
    async fn flush(&self, batch: &mut Vec<Pending>, report: &mut IndexReport) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let pending = std::mem::take(batch);

        let texts: Vec<&str> =
            pending.iter().flat_map(|p| p.chunks.iter().map(|c| c.text.as_str())).collect();

        let mut ready: Vec<DocChunk> = Vec::new();
        match self.provider.embed_batch(&texts).await {
            Ok(embeddings) if embeddings.len() == texts.len() => {
                let mut iter = embeddings.into_iter();
                for mut doc in pending {
                    let slug = doc.chunks[0].slug.clone();
                    let mut ok = true;
                    for chunk in &mut doc.chunks {
                        let embedding = iter.next().unwrap_or_default();
                        if let Err(e) = check_dimensions(self.store.dimensions(), &embedding) {
                            warn!(slug = %slug, error = %e, "rejecting document");
                            report.failed.push(FailedDocument { slug: slug.clone(), reason: e.to_string() });
                            ok = false;
                            break;
                        }
                        chunk.embedding = embedding;
                    }
                    if ok {
                        report.indexed += 1;
                        ready.extend(doc.chunks);
                    }
                }
            }
            Ok(embeddings) => {
                // A mis-sized batch response is a provider bug; fall back to
                // per-document embedding just like a batch failure.
                warn!(
                    expected = texts.len(),
                    got = embeddings.len(),
                    "provider returned mis-sized batch, retrying per document"
                );
                self.embed_individually(pending, report, &mut ready).await;
            }
            Err(e) => {
                warn!(error = %e, "batch embedding failed, retrying per document");
                self.embed_individually(pending, report, &mut ready).await;
            }
        }

        if !ready.is_empty() {
            self.store.upsert(&ready).await?;
        }
        Ok(())
    }

    /// Per-document fallback after a failed batch call, so one poisoned
    /// document cannot take its batchmates down with it.
    async fn embed_individually(
        &self,
        pending: Vec<Pending>,
        report: &mut IndexReport,
        ready: &mut Vec<DocChunk>,
    ) {
        for mut doc in pending {
            let slug = doc.chunks[0].slug.clone();
            let mut failure: Option<String> = None;
            for chunk in &mut doc.chunks {
                match self.provider.embed(&chunk.text).await {
                    Ok(embedding) => {
                        if let Err(e) = check_dimensions(self.store.dimensions(), &embedding) {
                            failure = Some(e.to_string());
                            break;
                        }
                        chunk.embedding = embedding;
                    }
                    Err(e) => {
                        failure = Some(e.to_string());
                        break;
                    }
                }
            }
            match failure {
                Some(reason) => {
                    warn!(slug = %slug, %reason, "skipping document");
                    report.failed.push(FailedDocument { slug, reason });
                }
                None => {
                    report.indexed += 1;
                    ready.append(&mut doc.chunks);
                }
            }
        }
    }

    /// Remove slugs that exist in the store but not in the corpus.
    async fn prune_stale(&self, documents: &[Document]) -> Result<usize> {
        let corpus: HashSet<&str> = documents.iter().map(|d| d.slug.as_str()).collect();
        let stored = self.store.slugs().await?;
        let stale: Vec<&str> =
            stored.iter().map(String::as_str).filter(|slug| !corpus.contains(slug)).collect();
        if stale.is_empty() {
            return Ok(0);
        }
        info!(count = stale.len(), "pruning stale slugs");
        self.store.remove(&stale).await?;
        Ok(stale.len())
    }
}
