//! # docsearch
//!
//! Semantic content search for a static documentation site.
//!
//! The crate wires four pieces together:
//!
//! - an [`EmbeddingProvider`] that turns text into fixed-length vectors,
//!   with a local in-process model (`local` feature) and two remote HTTP
//!   backends (`gemini`, `openai` features);
//! - a [`VectorStore`] holding document chunks queryable by cosine
//!   similarity, backed by PostgreSQL + pgvector (`pgvector` feature) or a
//!   file-backed local store that works offline;
//! - an offline [`Indexer`] that chunks, embeds, and upserts a corpus and
//!   reports per-document outcomes;
//! - a [`QueryEngine`] serving ranked, folder-groupable results, and a
//!   [`SearchSession`] state machine handling debounce and request
//!   cancellation for the search dialog.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docsearch::{Indexer, LocalVectorStore, QueryEngine};
//!
//! let store = Arc::new(LocalVectorStore::new(provider.dimensions()));
//! let report = Indexer::new(provider.clone(), store.clone())
//!     .index_all(&documents)
//!     .await?;
//! let engine = QueryEngine::new(provider, store)?;
//! let results = engine.search("relational SQL database", 5).await?;
//! ```

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod indexer;
pub mod memory;
pub mod query;
pub mod session;
pub mod store;

#[cfg(any(feature = "gemini", feature = "openai"))]
mod remote;

#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "local")]
pub mod local;
#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "pgvector")]
pub mod pgvector;
#[cfg(feature = "server")]
pub mod server;

pub use chunking::{Chunker, FixedSizeChunker};
pub use config::{ProviderKind, SearchConfig};
pub use document::{DocChunk, Document, FolderGroup, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{Result, SearchError};
pub use indexer::{FailedDocument, IndexReport, Indexer};
pub use memory::LocalVectorStore;
pub use query::QueryEngine;
pub use session::{SearchBackend, SearchSession, SessionSnapshot, SessionStatus};
pub use store::{cosine_similarity, SearchFilter, VectorStore};

#[cfg(feature = "gemini")]
pub use gemini::GeminiEmbeddingProvider;
#[cfg(feature = "local")]
pub use local::LocalEmbeddingProvider;
#[cfg(feature = "openai")]
pub use openai::OpenAiEmbeddingProvider;
#[cfg(feature = "pgvector")]
pub use pgvector::PgVectorStore;
