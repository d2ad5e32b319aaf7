//! Shared test doubles.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use docsearch::{EmbeddingProvider, Result, SearchError};

/// Deterministic bag-of-words embedding provider.
///
/// Each distinct lowercase word gets its own axis (assigned in first-seen
/// order, so there are no hash collisions); a text embeds as its word
/// counts, L2-normalized. Cosine similarity between two texts is then a
/// direct function of their shared vocabulary, which makes ranking
/// assertions exact.
pub struct MockEmbeddingProvider {
    dimensions: usize,
    vocab: Mutex<HashMap<String, usize>>,
    calls: AtomicUsize,
    /// Embedding any text containing this marker fails, to exercise the
    /// skip-and-log path.
    fail_marker: Option<String>,
}

impl MockEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vocab: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            fail_marker: None,
        }
    }

    /// Fail any embedding whose text contains `marker`.
    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        self.fail_marker = Some(marker.into());
        self
    }

    /// Number of texts embedded so far (batch items count individually).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn embed_sync(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(marker) = &self.fail_marker {
            if text.contains(marker.as_str()) {
                return Err(SearchError::provider("mock", "poisoned text"));
            }
        }

        let mut vector = vec![0.0f32; self.dimensions];
        let mut vocab = self.vocab.lock().unwrap();
        for word in text.to_lowercase().split_whitespace() {
            let next = vocab.len();
            let axis = *vocab.entry(word.to_string()).or_insert(next) % self.dimensions;
            vector[axis] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        Ok(vector)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_sync(text)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// A provider that always reports the wrong dimension on purpose.
pub struct WrongSizeProvider {
    pub claimed: usize,
    pub actual: usize,
}

#[async_trait]
impl EmbeddingProvider for WrongSizeProvider {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.5; self.actual])
    }

    fn dimensions(&self) -> usize {
        self.claimed
    }
}

/// Convenience constructor for corpus documents.
pub fn doc(slug: &str, folder: &str, body: &str) -> docsearch::Document {
    docsearch::Document {
        slug: slug.to_string(),
        title: slug.to_uppercase(),
        folder: folder.to_string(),
        tags: vec![folder.to_string()],
        body: body.to_string(),
    }
}
