//! Recursive character text splitter
//!
//! Tries the coarsest separator first (paragraphs, then lines, then words,
//! then single characters) and greedily packs the pieces into chunks of at
//! most `chunk_size` characters, carrying up to `chunk_overlap` characters of
//! trailing pieces into the next chunk. Separators stay attached to the start
//! of the piece that follows them.

use serde_json::json;
use std::collections::VecDeque;
use tracing::warn;

use kbchat_core::{Chunk, Document, Error, Result};

use crate::dedup::content_hash;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Splits documents into overlapping chunks
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: default_separators(),
        }
    }
}

fn default_separators() -> Vec<String> {
    ["\n\n", "\n", " ", ""].iter().map(|s| s.to_string()).collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

impl TextSplitter {
    /// Create a splitter, rejecting sizes that cannot make progress
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Configuration("chunk_size must be greater than 0".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: default_separators(),
        })
    }

    /// Split raw text into trimmed, non-empty chunks
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    /// Split every document, carrying its metadata onto each chunk
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for document in documents {
            for (i, content) in self.split_text(&document.content).into_iter().enumerate() {
                let mut metadata = document.metadata.clone();
                metadata["chunk_index"] = json!(i);

                chunks.push(Chunk {
                    id: content_hash(&content),
                    content,
                    metadata,
                });
            }
        }

        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut final_chunks = Vec::new();

        // First separator present in the text wins; the empty one always matches
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate.as_str();
                remaining = &separators[i + 1..];
                break;
            }
        }

        let splits: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            split_keeping_separator(text, separator)
        };

        let mut good: Vec<String> = Vec::new();
        for piece in splits {
            if char_len(&piece) < self.chunk_size {
                good.push(piece);
                continue;
            }

            if !good.is_empty() {
                final_chunks.extend(self.merge_splits(&good));
                good.clear();
            }

            if remaining.is_empty() {
                let piece = piece.trim();
                if !piece.is_empty() {
                    final_chunks.push(piece.to_string());
                }
            } else {
                final_chunks.extend(self.split_recursive(&piece, remaining));
            }
        }

        if !good.is_empty() {
            final_chunks.extend(self.merge_splits(&good));
        }

        final_chunks
    }

    /// Pack pieces into chunks; pieces already carry their separators
    fn merge_splits(&self, splits: &[String]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in splits {
            let len = char_len(piece);

            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total, self.chunk_size
                    );
                }

                if !current.is_empty() {
                    if let Some(doc) = join_pieces(&current) {
                        docs.push(doc);
                    }

                    // Drop leading pieces until what is left fits as overlap
                    while total > self.chunk_overlap || (total > 0 && total + len > self.chunk_size) {
                        let Some(first) = current.pop_front() else { break };
                        total = total.saturating_sub(char_len(first));
                    }
                }
            }

            current.push_back(piece);
            total += len;
        }

        if let Some(doc) = join_pieces(&current) {
            docs.push(doc);
        }

        docs
    }
}

/// Split before every occurrence of `separator`, so each piece after the
/// first starts with it
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut start = 0;

    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(text[start..idx].to_string());
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(text[start..].to_string());
    }

    pieces
}

fn join_pieces(pieces: &VecDeque<&str>) -> Option<String> {
    let joined: String = pieces.iter().copied().collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_sizes() {
        assert!(TextSplitter::new(0, 0).is_err());
        assert!(TextSplitter::new(100, 100).is_err());
        assert!(TextSplitter::new(100, 150).is_err());
        assert!(TextSplitter::new(100, 20).is_ok());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let splitter = TextSplitter::default();
        assert_eq!(splitter.split_text("  just a line  "), vec!["just a line"]);
        assert!(splitter.split_text("   ").is_empty());
    }

    #[test]
    fn test_word_merge_with_overlap() {
        let splitter = TextSplitter::new(10, 4).unwrap();
        let chunks = splitter.split_text("a b c d e f g h i j k l");
        assert_eq!(chunks, vec!["a b c d e", "d e f g h", "g h i j k", "j k l"]);
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let splitter = TextSplitter::new(12, 0).unwrap();
        let chunks = splitter.split_text("para one.\n\npara two.");
        assert_eq!(chunks, vec!["para one.", "para two."]);
    }

    #[test]
    fn test_unbroken_text_falls_back_to_characters() {
        let splitter = TextSplitter::new(10, 2).unwrap();
        let chunks = splitter.split_text("abcdefghijklmnopqrstuvwxyz");
        assert_eq!(chunks, vec!["abcdefghij", "ijklmnopqr", "qrstuvwxyz"]);
    }

    #[test]
    fn test_chunks_respect_size_limit() {
        let splitter = TextSplitter::default();
        let text = (0..600)
            .map(|i| format!("sentence number {i} talks about the knowledge base."))
            .collect::<Vec<_>>()
            .join(" ");

        let chunks = splitter.split_text(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= DEFAULT_CHUNK_SIZE);
        }
    }

    #[test]
    fn test_separator_stays_with_following_piece() {
        assert_eq!(
            split_keeping_separator("a\n\nb\n\n\n\nc", "\n\n"),
            vec!["a", "\n\nb", "\n\n", "\n\nc"]
        );
        assert_eq!(split_keeping_separator("\n\nlead", "\n\n"), vec!["\n\nlead"]);
        assert_eq!(split_keeping_separator("none here", "\n\n"), vec!["none here"]);
    }

    #[test]
    fn test_line_breaks_inside_chunk_are_kept() {
        let splitter = TextSplitter::new(30, 0).unwrap();
        let chunks = splitter.split_text("first line\nsecond line\nthird line here");
        assert_eq!(chunks, vec!["first line\nsecond line", "third line here"]);
    }

    #[test]
    fn test_split_documents_carries_metadata() {
        let splitter = TextSplitter::new(12, 0).unwrap();
        let doc = Document::new("para one.\n\npara two.", "notes.txt")
            .with_metadata("page", json!(3));

        let chunks = splitter.split_documents(&[doc]);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].metadata["source"], json!("notes.txt"));
        assert_eq!(chunks[1].metadata["page"], json!(3));
        assert_eq!(chunks[1].metadata["chunk_index"], json!(1));
        assert_eq!(chunks[0].id, content_hash("para one."));
    }
}
