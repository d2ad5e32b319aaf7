//! Splitting long document bodies into embeddable passages.

use crate::document::{DocChunk, Document};

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`DocChunk`]s with text and metadata but no
/// embeddings; the indexer attaches those later. Chunk indices are assigned
/// sequentially from 0 in document order.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document body is empty.
    fn chunk(&self, document: &Document) -> Vec<DocChunk>;
}

/// Splits text into fixed-size chunks by character count with overlap.
///
/// A body at or under `chunk_size` yields exactly one chunk. Split points
/// are snapped forward to UTF-8 character boundaries, so a chunk may exceed
/// the budget by a few bytes on multibyte text but never splits a character.
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a chunker with the given byte budget and overlap.
    ///
    /// `chunk_size` is floored at one byte so every emitted chunk carries
    /// text. `chunk_overlap` should be smaller than `chunk_size`; the step
    /// between chunks is floored at one byte so the walk always terminates.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size: chunk_size.max(1), chunk_overlap }
    }
}

impl Default for FixedSizeChunker {
    fn default() -> Self {
        Self::new(1500, 200)
    }
}

/// Advance `index` to the next char boundary at or after it.
fn snap_forward(text: &str, mut index: usize) -> usize {
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<DocChunk> {
        let text = document.body.as_str();
        if text.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut start = 0;
        let mut chunk_index: u32 = 0;

        while start < text.len() {
            let end = snap_forward(text, (start + self.chunk_size).min(text.len()));
            chunks.push(DocChunk {
                slug: document.slug.clone(),
                chunk_index,
                title: document.title.clone(),
                folder: document.folder.clone(),
                tags: document.tags.clone(),
                text: text[start..end].to_string(),
                embedding: Vec::new(),
            });
            if end == text.len() {
                break;
            }
            chunk_index += 1;
            let step = self.chunk_size.saturating_sub(self.chunk_overlap).max(1);
            start = snap_forward(text, start + step);
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: &str) -> Document {
        Document {
            slug: "postgres".into(),
            title: "PostgreSQL".into(),
            folder: "databases".into(),
            tags: vec!["sql".into()],
            body: body.into(),
        }
    }

    #[test]
    fn short_body_yields_single_chunk() {
        let chunks = FixedSizeChunker::new(100, 20).chunk(&doc("a short body"));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "a short body");
        assert_eq!(chunks[0].folder, "databases");
    }

    #[test]
    fn empty_body_yields_no_chunks() {
        assert!(FixedSizeChunker::default().chunk(&doc("")).is_empty());
    }

    #[test]
    fn zero_chunk_size_is_floored_to_one_byte() {
        let chunks = FixedSizeChunker::new(0, 0).chunk(&doc("abc"));
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| !c.text.is_empty()));
    }

    #[test]
    fn long_body_is_split_with_sequential_indices() {
        let body = "x".repeat(250);
        let chunks = FixedSizeChunker::new(100, 10).chunk(&doc(&body));
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index as usize, i);
            assert_eq!(chunk.slug, "postgres");
        }
        // Consecutive chunks overlap by the configured amount.
        assert!(chunks[0].text.ends_with(&chunks[1].text[..10]));
    }

    #[test]
    fn multibyte_text_never_splits_a_character() {
        let body = "é".repeat(300);
        let chunks = FixedSizeChunker::new(101, 0).chunk(&doc(&body));
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.chars().all(|c| c == 'é'));
        }
        let total: usize = chunks.iter().map(|c| c.text.chars().count()).sum();
        assert_eq!(total, 300);
    }
}
