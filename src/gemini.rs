//! Gemini embedding provider using the Generative Language REST API.
//!
//! This module is only available when the `gemini` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::{check_dimensions, EmbeddingProvider};
use crate::error::{Result, SearchError};
use crate::remote::send_with_retry;

const PROVIDER: &str = "gemini";

/// The default Generative Language API base URL.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// The default Gemini embedding model.
const DEFAULT_MODEL: &str = "gemini-embedding-001";

/// Native dimensionality of `gemini-embedding-001`.
const DEFAULT_DIMENSIONS: usize = 3072;

/// An [`EmbeddingProvider`] backed by the Gemini embedding API.
///
/// Uses `:embedContent` for single texts and `:batchEmbedContents` for
/// batches; both return embeddings in input order. The key travels in the
/// `x-goog-api-key` header and is never logged.
pub struct GeminiEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
    /// If set, asks the API to truncate output vectors to this size.
    output_dimensionality: Option<usize>,
}

impl GeminiEmbeddingProvider {
    /// Create a new provider with the given API key and the default model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(SearchError::provider(PROVIDER, "API key must not be empty"));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.into(),
            model: DEFAULT_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            output_dimensionality: None,
        })
    }

    /// Create a new provider using the `GEMINI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| {
            SearchError::provider(PROVIDER, "GEMINI_API_KEY environment variable not set")
        })?;
        Self::new(api_key)
    }

    /// Set the output dimensionality (truncates the embedding server-side).
    pub fn with_output_dimensionality(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.output_dimensionality = Some(dims);
        self
    }

    /// Override the API base URL (tests point this at a mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn content(text: &str) -> Content {
        Content { parts: vec![Part { text: text.to_string() }] }
    }

    async fn read_error(response: reqwest::Response) -> SearchError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        error!(provider = PROVIDER, %status, "API error");
        SearchError::provider(PROVIDER, format!("API returned {status}: {detail}"))
    }
}

// ── Gemini API request/response types ──────────────────────────────

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest {
    content: Content,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchEmbedRequest {
    requests: Vec<BatchEmbedEntry>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchEmbedEntry {
    model: String,
    content: Content,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");

        let url = format!("{}/v1beta/models/{}:embedContent", self.base_url, self.model);
        let body = EmbedContentRequest {
            content: Self::content(text),
            output_dimensionality: self.output_dimensionality,
        };

        let response = send_with_retry(PROVIDER, || {
            self.client.post(&url).header("x-goog-api-key", &self.api_key).json(&body)
        })
        .await?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let parsed: EmbedContentResponse = response.json().await.map_err(|e| {
            SearchError::provider(PROVIDER, format!("failed to parse response: {e}"))
        })?;
        check_dimensions(self.dimensions, &parsed.embedding.values)?;
        Ok(parsed.embedding.values)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER, batch_size = texts.len(), "embedding batch");

        let url = format!("{}/v1beta/models/{}:batchEmbedContents", self.base_url, self.model);
        let body = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| BatchEmbedEntry {
                    model: format!("models/{}", self.model),
                    content: Self::content(text),
                    output_dimensionality: self.output_dimensionality,
                })
                .collect(),
        };

        let response = send_with_retry(PROVIDER, || {
            self.client.post(&url).header("x-goog-api-key", &self.api_key).json(&body)
        })
        .await?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let parsed: BatchEmbedResponse = response.json().await.map_err(|e| {
            SearchError::provider(PROVIDER, format!("failed to parse response: {e}"))
        })?;

        if parsed.embeddings.len() != texts.len() {
            return Err(SearchError::provider(
                PROVIDER,
                format!("API returned {} embeddings for {} inputs", parsed.embeddings.len(), texts.len()),
            ));
        }

        let vectors: Vec<Vec<f32>> = parsed.embeddings.into_iter().map(|e| e.values).collect();
        for vector in &vectors {
            check_dimensions(self.dimensions, vector)?;
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
