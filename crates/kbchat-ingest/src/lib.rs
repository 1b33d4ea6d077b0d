//! Document ingestion for kbchat
//!
//! Loads a directory of heterogeneous files, cleans up the extracted text,
//! drops duplicates and splits everything into overlapping chunks ready to be
//! embedded.

mod dedup;
mod loader;
mod normalize;
mod pipeline;
mod splitter;


pub use dedup::{Deduplicator, content_hash, dedup_chunks, dedup_documents};
pub use loader::{LoaderKind, load_single_document};
pub use normalize::{
    collapse_whitespace, despace_garbled, normalize_text, replace_typographic, strip_diacritics,
};
pub use pipeline::{IngestConfig, IngestReport, load_and_chunk_directory};
pub use splitter::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, TextSplitter};

// Re-export core types for convenience
pub use kbchat_core::{Chunk, Document, Error, Result};

/// File extensions named when a directory yields no documents
pub const SUPPORTED_EXTENSIONS: &[&str] = &[".pdf", ".csv", ".txt", ".jsonl", ".docx", ".xlsx", ".md", ".html"];
