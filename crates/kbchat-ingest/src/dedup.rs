//! MD5-based duplicate filtering for documents and chunks

use std::collections::HashSet;

use kbchat_core::{Chunk, Document};

/// Hash of the text with case and whitespace differences ignored
pub fn content_hash(text: &str) -> String {
    let canonical = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    format!("{:x}", md5::compute(canonical.as_bytes()))
}

/// Remembers which contents have been seen
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the text, returning false if it was already seen
    pub fn is_new(&mut self, text: &str) -> bool {
        self.seen.insert(content_hash(text))
    }

    /// Number of distinct contents recorded so far
    pub fn seen(&self) -> usize {
        self.seen.len()
    }
}

/// Drop empty documents and repeats of earlier ones, keeping order
///
/// Returns the survivors and the number of documents removed.
pub fn dedup_documents(documents: Vec<Document>) -> (Vec<Document>, usize) {
    let mut dedup = Deduplicator::new();
    let before = documents.len();
    let kept: Vec<Document> = documents
        .into_iter()
        .filter(|doc| !doc.content.trim().is_empty() && dedup.is_new(&doc.content))
        .collect();
    let removed = before - kept.len();
    (kept, removed)
}

/// Same as [`dedup_documents`] for chunks
pub fn dedup_chunks(chunks: Vec<Chunk>) -> (Vec<Chunk>, usize) {
    let mut dedup = Deduplicator::new();
    let before = chunks.len();
    let kept: Vec<Chunk> = chunks
        .into_iter()
        .filter(|chunk| !chunk.content.trim().is_empty() && dedup.is_new(&chunk.content))
        .collect();
    let removed = before - kept.len();
    (kept, removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_ignores_case_and_spacing() {
        assert_eq!(content_hash("Hello   World"), content_hash("hello world"));
        assert_eq!(content_hash(" a\nb "), content_hash("a b"));
        assert_ne!(content_hash("hello"), content_hash("world"));
        assert_eq!(content_hash("").len(), 32);
    }

    #[test]
    fn test_deduplicator() {
        let mut dedup = Deduplicator::new();
        assert!(dedup.is_new("first"));
        assert!(!dedup.is_new("FIRST"));
        assert!(dedup.is_new("second"));
        assert_eq!(dedup.seen(), 2);
    }

    #[test]
    fn test_dedup_documents_keeps_first_in_order() {
        let docs = vec![
            Document::new("alpha", "a.txt"),
            Document::new("beta", "b.txt"),
            Document::new("Alpha", "c.txt"),
            Document::new("   ", "d.txt"),
            Document::new("gamma", "e.txt"),
        ];

        let (kept, removed) = dedup_documents(docs);
        assert_eq!(removed, 2);
        let sources: Vec<_> = kept.iter().filter_map(|d| d.source()).collect();
        assert_eq!(sources, vec!["a.txt", "b.txt", "e.txt"]);
    }
}
