//! Data types for documents, stored chunks, and search results.

use serde::{Deserialize, Serialize};

/// Maximum snippet length carried by a [`SearchResult`], in characters.
const SNIPPET_CHARS: usize = 200;

/// One article as produced by the content-loading step.
///
/// This is the flat record the site's content extractor hands over:
/// everything the search engine knows about an article before embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique within the corpus; resolves to the article URL.
    pub slug: String,
    /// Human-readable title.
    pub title: String,
    /// Folder/category used for result grouping.
    pub folder: String,
    /// Display tags. Order matters only for presentation.
    #[serde(default)]
    pub tags: Vec<String>,
    /// The text to embed (full article or a representative excerpt).
    pub body: String,
}

/// One stored row: a passage of a [`Document`] with its embedding.
///
/// A document that fits the chunking budget is stored as a single chunk with
/// index 0. `(slug, chunk_index)` is the upsert key everywhere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocChunk {
    /// Slug of the parent document.
    pub slug: String,
    /// Position of this passage within the parent document.
    pub chunk_index: u32,
    /// Title of the parent document.
    pub title: String,
    /// Folder of the parent document.
    pub folder: String,
    /// Tags of the parent document.
    pub tags: Vec<String>,
    /// The passage text that was (or will be) embedded.
    pub text: String,
    /// The embedding vector. Empty until the indexer attaches one.
    pub embedding: Vec<f32>,
}

impl DocChunk {
    /// A short display excerpt of the chunk text, cut at a char boundary.
    pub fn snippet(&self) -> String {
        let mut end = self.text.len().min(SNIPPET_CHARS);
        while end < self.text.len() && !self.text.is_char_boundary(end) {
            end += 1;
        }
        self.text[..end].to_string()
    }
}

/// A ranked match: the projection of a chunk plus its similarity score.
///
/// Results are ordered by descending `score`; ties break on ascending
/// `(slug, chunk_index)` so rankings are deterministic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// Slug of the matched document.
    pub slug: String,
    /// Index of the matched chunk within the document.
    pub chunk_index: u32,
    /// Title for display.
    pub title: String,
    /// Folder for grouping.
    pub folder: String,
    /// Tags for display.
    pub tags: Vec<String>,
    /// Short excerpt of the matched passage.
    pub snippet: String,
    /// Cosine similarity to the query (higher is more relevant).
    pub score: f32,
}

impl SearchResult {
    /// Build a result from a stored chunk and its computed score.
    pub fn from_chunk(chunk: &DocChunk, score: f32) -> Self {
        Self {
            slug: chunk.slug.clone(),
            chunk_index: chunk.chunk_index,
            title: chunk.title.clone(),
            folder: chunk.folder.clone(),
            tags: chunk.tags.clone(),
            snippet: chunk.snippet(),
            score,
        }
    }
}

/// Results of one query sharing a folder, in their original rank order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FolderGroup {
    /// The shared folder name.
    pub folder: String,
    /// Member results, best first.
    pub results: Vec<SearchResult>,
}
