//! Error types for the `docsearch` crate.

use thiserror::Error;

/// Errors that can occur while indexing or searching.
///
/// This is the whole vocabulary that crosses component boundaries: provider
/// and store internals are translated into one of these variants before they
/// reach the query engine's callers, so raw backend errors never leak to the
/// HTTP layer or the UI.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Embedding generation failed (model load error, network failure,
    /// rate limit exhausted). Retryable from the caller's perspective.
    #[error("embedding provider unavailable ({provider}): {message}")]
    ProviderUnavailable {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector store connection could not be established or a store
    /// operation failed. Fatal for an indexing run; per-request for queries.
    #[error("vector store unavailable ({backend}): {message}")]
    StoreUnavailable {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A vector's length disagrees with the configured embedding dimension.
    /// Treated as a data-integrity fault and never silently coerced.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimension the store or provider is configured for.
        expected: usize,
        /// The dimension actually observed.
        actual: usize,
    },

    /// A malformed request, rejected before touching the provider or store.
    #[error("invalid request: {0}")]
    Validation(String),

    /// A configuration validation error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SearchError {
    /// Shorthand for a [`SearchError::ProviderUnavailable`].
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderUnavailable { provider: provider.into(), message: message.into() }
    }

    /// Shorthand for a [`SearchError::StoreUnavailable`].
    pub fn store(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StoreUnavailable { backend: backend.into(), message: message.into() }
    }
}

/// A convenience result type for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;
