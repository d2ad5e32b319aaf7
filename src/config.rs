//! Runtime configuration: provider selection, store resolution, tuning.
//!
//! Provider choice is a tagged [`ProviderKind`] resolved once at startup —
//! never string-matched at call sites. Absence of remote credentials or of
//! a database URL is not an error: the engine degrades to the local
//! provider and the file-backed store so offline development and CI work
//! without any external service.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use tracing::warn;

use crate::embedding::EmbeddingProvider;
use crate::error::{Result, SearchError};
use crate::memory::LocalVectorStore;
use crate::store::VectorStore;

/// Default path of the file-backed store snapshot.
const DEFAULT_STORE_PATH: &str = "docsearch.store.json";

/// Which embedding backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// In-process candle model (`local` feature).
    Local,
    /// Gemini embedding API (`gemini` feature).
    Gemini,
    /// OpenAI embeddings API (`openai` feature).
    OpenAi,
}

impl FromStr for ProviderKind {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            other => Err(SearchError::Config(format!(
                "unknown provider '{other}' (expected local, gemini, or openai)"
            ))),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Gemini => write!(f, "gemini"),
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

/// Validated engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// Embedding backend. Must match the provider used at index time.
    pub provider: ProviderKind,
    /// Gemini API key, if any.
    pub gemini_api_key: Option<String>,
    /// OpenAI API key, if any.
    pub openai_api_key: Option<String>,
    /// PostgreSQL connection URL; `None` selects the file-backed store.
    pub database_url: Option<String>,
    /// Snapshot path for the file-backed store.
    pub store_path: PathBuf,
    /// Chunking byte budget.
    pub chunk_size: usize,
    /// Chunking overlap.
    pub chunk_overlap: usize,
    /// Embedding batch size for indexing.
    pub batch_size: usize,
    /// Default result limit.
    pub top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Local,
            gemini_api_key: None,
            openai_api_key: None,
            database_url: None,
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            chunk_size: 1500,
            chunk_overlap: 200,
            batch_size: 16,
            top_k: 10,
        }
    }
}

impl SearchConfig {
    /// Create a new builder.
    pub fn builder() -> SearchConfigBuilder {
        SearchConfigBuilder::default()
    }

    /// Read configuration from the environment.
    ///
    /// `DOCSEARCH_PROVIDER` selects the backend (`local | gemini | openai`);
    /// `GEMINI_API_KEY` / `OPENAI_API_KEY` supply credentials;
    /// `DATABASE_URL` selects the pgvector store; `DOCSEARCH_STORE` moves
    /// the file-backed snapshot. A remote provider requested without its
    /// credential degrades to [`ProviderKind::Local`] with a warning
    /// instead of failing.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("DOCSEARCH_PROVIDER") {
            config.provider = raw.parse()?;
        }
        config.gemini_api_key = std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty());
        config.openai_api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
        config.database_url = std::env::var("DATABASE_URL").ok().filter(|u| !u.is_empty());
        if let Ok(path) = std::env::var("DOCSEARCH_STORE") {
            config.store_path = PathBuf::from(path);
        }

        match config.provider {
            ProviderKind::Gemini if config.gemini_api_key.is_none() => {
                warn!("GEMINI_API_KEY not set, falling back to the local provider");
                config.provider = ProviderKind::Local;
            }
            ProviderKind::OpenAi if config.openai_api_key.is_none() => {
                warn!("OPENAI_API_KEY not set, falling back to the local provider");
                config.provider = ProviderKind::Local;
            }
            _ => {}
        }

        Ok(config)
    }

    /// Build the configured embedding provider.
    pub fn build_provider(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        match self.provider {
            ProviderKind::Local => {
                #[cfg(feature = "local")]
                {
                    Ok(Arc::new(crate::local::LocalEmbeddingProvider::new()))
                }
                #[cfg(not(feature = "local"))]
                {
                    Err(SearchError::Config(
                        "local provider selected but docsearch was built without the `local` feature"
                            .into(),
                    ))
                }
            }
            ProviderKind::Gemini => {
                #[cfg(feature = "gemini")]
                {
                    let key = self.gemini_api_key.clone().ok_or_else(|| {
                        SearchError::Config("gemini provider selected without an API key".into())
                    })?;
                    Ok(Arc::new(crate::gemini::GeminiEmbeddingProvider::new(key)?))
                }
                #[cfg(not(feature = "gemini"))]
                {
                    Err(SearchError::Config(
                        "gemini provider selected but docsearch was built without the `gemini` feature"
                            .into(),
                    ))
                }
            }
            ProviderKind::OpenAi => {
                #[cfg(feature = "openai")]
                {
                    let key = self.openai_api_key.clone().ok_or_else(|| {
                        SearchError::Config("openai provider selected without an API key".into())
                    })?;
                    Ok(Arc::new(crate::openai::OpenAiEmbeddingProvider::new(key)?))
                }
                #[cfg(not(feature = "openai"))]
                {
                    Err(SearchError::Config(
                        "openai provider selected but docsearch was built without the `openai` feature"
                            .into(),
                    ))
                }
            }
        }
    }

    /// Resolve the store for an indexing run.
    ///
    /// At indexing time an unreachable database is fatal: silently indexing
    /// into a fallback store would leave the real one stale.
    pub async fn build_index_store(&self, dimensions: usize) -> Result<Arc<dyn VectorStore>> {
        if let Some(url) = &self.database_url {
            return self.connect_pg(url, dimensions).await;
        }
        Ok(Arc::new(LocalVectorStore::open(&self.store_path, dimensions)?))
    }

    /// Resolve the store for the query path.
    ///
    /// An unreachable database degrades to the file-backed store with a
    /// warning rather than crashing the serving process.
    pub async fn build_query_store(&self, dimensions: usize) -> Result<Arc<dyn VectorStore>> {
        if let Some(url) = &self.database_url {
            match self.connect_pg(url, dimensions).await {
                Ok(store) => return Ok(store),
                Err(e) => {
                    warn!(error = %e, "vector store unavailable, falling back to local store");
                }
            }
        }
        Ok(Arc::new(LocalVectorStore::open(&self.store_path, dimensions)?))
    }

    #[cfg(feature = "pgvector")]
    async fn connect_pg(&self, url: &str, dimensions: usize) -> Result<Arc<dyn VectorStore>> {
        Ok(Arc::new(crate::pgvector::PgVectorStore::connect(url, dimensions).await?))
    }

    #[cfg(not(feature = "pgvector"))]
    async fn connect_pg(&self, _url: &str, _dimensions: usize) -> Result<Arc<dyn VectorStore>> {
        Err(SearchError::Config(
            "DATABASE_URL is set but docsearch was built without the `pgvector` feature".into(),
        ))
    }
}

/// Builder for a validated [`SearchConfig`].
#[derive(Debug, Clone, Default)]
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    /// Select the embedding backend.
    pub fn provider(mut self, provider: ProviderKind) -> Self {
        self.config.provider = provider;
        self
    }

    /// Set the database URL for the pgvector store.
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database_url = Some(url.into());
        self
    }

    /// Set the snapshot path for the file-backed store.
    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.store_path = path.into();
        self
    }

    /// Set the chunking byte budget.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the chunking overlap.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the embedding batch size.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// Set the default result limit.
    pub fn top_k(mut self, top_k: usize) -> Self {
        self.config.top_k = top_k;
        self
    }

    /// Validate and produce the configuration.
    pub fn build(self) -> Result<SearchConfig> {
        if self.config.chunk_overlap >= self.config.chunk_size {
            return Err(SearchError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.config.chunk_overlap, self.config.chunk_size
            )));
        }
        if self.config.top_k == 0 {
            return Err(SearchError::Config("top_k must be greater than zero".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_parses_known_names() {
        assert_eq!("local".parse::<ProviderKind>().unwrap(), ProviderKind::Local);
        assert_eq!("GEMINI".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert_eq!("openai".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert!("cohere".parse::<ProviderKind>().is_err());
    }

    #[cfg(feature = "local")]
    #[test]
    fn default_config_always_yields_a_provider() {
        // The no-credentials path must produce a working provider handle
        // in the default build; the model itself loads lazily.
        let provider = SearchConfig::default().build_provider().unwrap();
        assert_eq!(provider.dimensions(), 384);
    }

    #[test]
    fn builder_rejects_inconsistent_chunking() {
        let err = SearchConfig::builder().chunk_size(100).chunk_overlap(100).build();
        assert!(matches!(err, Err(SearchError::Config(_))));
    }

    #[test]
    fn builder_rejects_zero_top_k() {
        let err = SearchConfig::builder().top_k(0).build();
        assert!(matches!(err, Err(SearchError::Config(_))));
    }
}
