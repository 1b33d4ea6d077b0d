//! Common types used across the kbchat system

use serde::{Deserialize, Serialize};

use crate::VectorDocument;

/// A document produced by a loader, before chunking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    /// Always carries a `source` key with the originating file path
    pub metadata: serde_json::Value,
}

impl Document {
    /// Create a document whose metadata only records its source path
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: serde_json::json!({ "source": source.into() }),
        }
    }

    /// Attach an extra metadata field
    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        if let Some(map) = self.metadata.as_object_mut() {
            map.insert(key.to_string(), value);
        }
        self
    }

    /// The file this document was loaded from
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(|s| s.as_str())
    }
}

/// A piece of a document small enough to embed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Content hash, stable across runs
    pub id: String,
    pub content: String,
    pub metadata: serde_json::Value,
}

/// An answer together with the chunks it was synthesised from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<VectorDocument>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_metadata() {
        let doc = Document::new("hello", "data/a.txt").with_metadata("page", json!(2));
        assert_eq!(doc.source(), Some("data/a.txt"));
        assert_eq!(doc.metadata["page"], json!(2));
    }
}
